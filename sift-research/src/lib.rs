//! Sift Research - round-based evidence gathering
//!
//! Turns an open-ended query into a bounded sequence of research rounds.
//! Each round plans questions, fans searches out over a paced worker pool,
//! filters and deduplicates the returned citations, measures topical
//! coverage and decides whether to continue.
//!
//! ## Architecture
//!
//! - **Planner**: candidate questions and query expansion
//! - **Scheduler / Executor**: priority-ordered, bounded, retried searches
//! - **Quality filter / Deduplicator**: citation admission
//! - **Coverage analyzer**: gaps that steer the next round
//! - **Engine**: the round controller tying it together

pub mod research;

pub use research::{
    CancelHandle, CoverageAnalyzer, CoverageReport, Deduplicator, FilterDecision, Gap, Insight,
    QualityFilter, QueryOutcome, QuerySetGenerator, ResearchEngine, ResearchOutcome,
    ResearchPlanner, ResearchProgress, ResearchSession, RoundState, RoundSummary,
    SearchExecutor, SearchScheduler, TerminationReason,
};

/// Research-level error type
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("Core error: {0}")]
    Core(#[from] sift_core::SiftError),

    #[error("Dispatch error: {message}")]
    Dispatch { message: String },
}

pub type ResearchResult<T> = Result<T, ResearchError>;

impl ResearchError {
    /// Create a dispatch error
    pub fn dispatch<S: Into<String>>(message: S) -> Self {
        Self::Dispatch {
            message: message.into(),
        }
    }
}
