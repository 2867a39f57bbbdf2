//! Types for the research rounds

use super::coverage::CoverageReport;
use serde::{Deserialize, Serialize};
use sift_core::{CitationResult, QuestionCategory};
use std::fmt;
use uuid::Uuid;

/// State of the round controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundState {
    Planning,
    Searching,
    Filtering,
    AnalyzingCoverage,
    Deciding,
    Terminated,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundState::Planning => write!(f, "Planning"),
            RoundState::Searching => write!(f, "Searching"),
            RoundState::Filtering => write!(f, "Filtering"),
            RoundState::AnalyzingCoverage => write!(f, "Analyzing coverage"),
            RoundState::Deciding => write!(f, "Deciding"),
            RoundState::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Accumulated citations reached `max_sources`
    SourceLimit,
    /// Coverage, insight and source thresholds of the depth tier were met
    Sufficient,
    /// A round added no new unique citations
    Stagnation,
    /// `max_rounds` rounds were executed
    RoundBudget,
    Cancelled,
}

/// Digest of the new evidence one question produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub question_id: Uuid,
    pub question: String,
    pub round: usize,
    pub citation_urls: Vec<String>,
    pub best_relevance: f64,
    /// Leading text of the most relevant citation
    pub excerpt: String,
}

/// Bookkeeping for one executed round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: usize,
    pub questions: usize,
    pub queries: usize,
    pub raw_results: usize,
    /// Results admitted by the quality filter
    pub accepted: usize,
    pub new_citations: usize,
    pub insights: usize,
    pub coverage_score: f64,
    /// The dispatch step failed and the round was skipped
    pub skipped: bool,
    pub duration: std::time::Duration,
}

impl RoundSummary {
    pub(crate) fn skipped(
        round: usize,
        questions: usize,
        queries: usize,
        coverage_score: f64,
        duration: std::time::Duration,
    ) -> Self {
        Self {
            round,
            questions,
            queries,
            raw_results: 0,
            accepted: 0,
            new_citations: 0,
            insights: 0,
            coverage_score,
            skipped: true,
            duration,
        }
    }
}

/// Research progress update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchProgress {
    pub session_id: String,
    pub round: usize,
    pub max_rounds: usize,
    pub state: RoundState,
    pub citations: usize,
    pub coverage_score: f64,
    /// Progress percentage (0.0-1.0)
    pub progress: f64,
}

/// Result of a research session. Always produced, even when every provider call failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutcome {
    pub session_id: String,
    pub query: String,
    pub category: QuestionCategory,
    pub citations: Vec<CitationResult>,
    pub insights: Vec<Insight>,
    pub coverage: CoverageReport,
    pub rounds: Vec<RoundSummary>,
    pub rounds_executed: usize,
    pub termination: TerminationReason,
    /// No usable evidence was gathered
    pub degraded: bool,
    pub duration: std::time::Duration,
}
