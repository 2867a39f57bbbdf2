//! Round-based research orchestration
//!
//! This module provides the research pipeline:
//! - Plan candidate questions and expand them into search queries
//! - Dispatch searches by priority over a bounded, paced worker pool
//! - Filter, deduplicate and accumulate the returned citations
//! - Measure coverage and steer or stop the next round

pub mod coverage;
pub mod dedup;
pub mod engine;
pub mod executor;
pub mod planner;
pub mod quality;
pub mod scheduler;
pub mod session;
pub mod text;
pub mod types;

pub use coverage::{expected_areas, AreaCoverage, CoverageAnalyzer, CoverageReport, Gap};
pub use dedup::{Deduplicator, MergeStats};
pub use engine::ResearchEngine;
pub use executor::{QueryOutcome, SearchExecutor};
pub use planner::{classify_category, QuerySetGenerator, QuestionRequest, ResearchPlanner};
pub use quality::{FilterDecision, QualityFilter};
pub use scheduler::SearchScheduler;
pub use session::{CancelHandle, ResearchSession};
pub use types::*;
