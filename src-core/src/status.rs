//! Result of an archive insertion attempt

/// Outcome of [`Archive::add`](crate::Archive::add).
///
/// Every variant carries an `f64` payload whose meaning depends on the
/// variant:
/// - `New`: the candidate filled a previously empty cell; payload is its
///   objective value.
/// - `Improve`: the candidate replaced the cell occupant; payload is
///   `objective - previous occupant objective`.
/// - `NotAdded`: the candidate fell short; for a grid archive the payload
///   is `objective - threshold` (non-positive), for a Pareto archive it
///   is the candidate objective. Rejection is a normal result, not an
///   error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AddStatus {
    New(f64),
    Improve(f64),
    NotAdded(f64),
}

impl AddStatus {
    /// The variant payload, regardless of outcome.
    pub fn value(&self) -> f64 {
        match *self {
            AddStatus::New(v) | AddStatus::Improve(v) | AddStatus::NotAdded(v) => v,
        }
    }

    /// True for `New` and `Improve`.
    pub fn was_added(&self) -> bool {
        !matches!(self, AddStatus::NotAdded(_))
    }
}
