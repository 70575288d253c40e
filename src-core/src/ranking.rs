//! Candidate ranking and parent selection policies for CMA-ES emitters

/// How told candidates are ordered before recombination.
///
/// All policies produce a descending ordering. The `TwoStage*` and
/// `Improvement` policies rank by the outcome of inserting each
/// candidate into the archive, so their insertions happen during
/// ranking; `Objective` and `RandomDirection` rank without touching the
/// archive and candidates are inserted in a sweep after the covariance
/// update instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ranking {
    /// Raw objective value.
    Objective,
    /// `(added to archive?, objective)`.
    TwoStageObjective,
    /// The `add` payload: objective for fresh cells, improvement over
    /// the occupant otherwise.
    Improvement,
    /// `(added to archive?, add payload)`.
    #[default]
    TwoStageImprovement,
    /// Projection of the measure onto a fixed random unit direction.
    RandomDirection,
    /// `(added to archive?, projection)`.
    TwoStageRandomDirection,
}

impl Ranking {
    pub(crate) fn adds_during_ranking(self) -> bool {
        matches!(
            self,
            Ranking::TwoStageObjective
                | Ranking::Improvement
                | Ranking::TwoStageImprovement
                | Ranking::TwoStageRandomDirection
        )
    }

    pub(crate) fn needs_direction(self) -> bool {
        matches!(self, Ranking::RandomDirection | Ranking::TwoStageRandomDirection)
    }
}

/// How parents are drawn from the ranked candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    /// Take the first μ ranked candidates.
    #[default]
    Mu,
    /// Walk the ranking, dropping candidates componentwise dominated by
    /// an already kept one in solution space (equal vectors keep the
    /// earlier index), up to μ parents.
    Filter,
}
