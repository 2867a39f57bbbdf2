//! Core trait definitions
//!
//! The research engine consumes two external providers. Their transport and
//! prompt formats are opaque to this crate.

use crate::error::SiftResult;
use crate::types::CitationResult;
use async_trait::async_trait;

/// Raw citation retrieval
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one search. May return an empty list or an error
    async fn search(&self, query: &str) -> SiftResult<Vec<CitationResult>>;

    /// Provider name used in logs
    fn name(&self) -> &str {
        "search"
    }
}

/// Free-form text generation
#[async_trait]
pub trait TextGenerationProvider: Send + Sync {
    /// Complete a prompt and return the raw text
    async fn complete(&self, prompt: &str) -> SiftResult<String>;

    fn name(&self) -> &str {
        "text-generation"
    }
}
