//! 配置管理

use crate::error::{ErrorContext, SiftError, SiftResult};
use crate::async_utils::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration consumed by the research engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    pub research: ResearchSettings,
    pub search: SearchSettings,
    pub quality: QualitySettings,
    pub coverage: CoverageSettings,
    pub sufficiency: SufficiencyTable,
}

/// Round budget and termination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchSettings {
    /// Maximum number of rounds (>= 1)
    pub max_rounds: usize,
    /// Hard cap on accumulated citations (>= 1)
    pub max_sources: usize,
    /// Depth tier selecting the sufficiency thresholds
    pub depth: ResearchDepth,
    /// Coverage score that must be exceeded before the session counts as sufficient
    pub coverage_threshold: f64,
    /// Questions requested from the generator per round
    pub max_questions_per_round: usize,
    /// Search query variants per question (>= 1)
    pub max_query_variants: usize,
    /// Timeout for one text generation call
    pub generation_timeout_ms: u64,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            max_sources: 50,
            depth: ResearchDepth::Standard,
            coverage_threshold: 0.7,
            max_questions_per_round: 6,
            max_query_variants: 2,
            generation_timeout_ms: 60_000,
        }
    }
}

/// Search execution: concurrency, pacing, retries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Worker lanes, i.e. the in-flight bound (>= 1)
    pub max_parallel_searches: usize,
    /// Minimum interval between two dispatches on the same lane
    pub rate_limit_ms: u64,
    /// Overall budget for one query, retries included
    pub per_query_timeout_ms: u64,
    pub max_attempts: usize,
    /// Backoff before the second attempt; doubles afterwards
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_jitter: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_parallel_searches: 8,
            rate_limit_ms: 500,
            per_query_timeout_ms: 30_000,
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 8_000,
            backoff_jitter: false,
        }
    }
}

impl SearchSettings {
    /// Retry policy derived from these settings
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay_ms: self.initial_backoff_ms,
            max_delay_ms: self.max_backoff_ms,
            backoff_multiplier: 2.0,
            jitter: self.backoff_jitter,
        }
    }
}

/// Citation admission and deduplication.
///
/// `min_relevance_score` is the single relevance floor used everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    pub min_relevance_score: f64,
    /// Title Jaccard similarity above which two citations are duplicates
    pub similarity_threshold: f64,
    /// Citations with shorter content are dropped
    pub min_content_length: usize,
    /// Substrings that veto a domain or url
    pub blacklist: Vec<String>,
    /// Substrings that admit a domain regardless of relevance
    pub allowlist: Vec<String>,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            min_relevance_score: 0.6,
            similarity_threshold: 0.8,
            min_content_length: 150,
            blacklist: [
                "doubleclick.net",
                "googlesyndication",
                "googleadservices",
                "adservice",
                "facebook.com",
                "instagram.com",
                "tiktok.com",
                "pinterest.",
                "twitter.com",
                "quora.com",
                "/forum/spam",
                "clickbait",
                "free-download",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            allowlist: [
                ".edu",
                ".gov",
                ".org",
                "arxiv.org",
                "github.com",
                "docs.rs",
                "developer.mozilla.org",
                "stackoverflow.com",
                "ieee.org",
                "acm.org",
                "nature.com",
                "springer.com",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Coverage and gap analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageSettings {
    /// Areas scoring below this are gaps
    pub gap_threshold: f64,
    pub min_distinct_domains: usize,
    pub recency_window_days: i64,
    /// Minimum fraction of citations inside the recency window
    pub min_recent_fraction: f64,
}

impl Default for CoverageSettings {
    fn default() -> Self {
        Self {
            gap_threshold: 0.5,
            min_distinct_domains: 3,
            recency_window_days: 180,
            min_recent_fraction: 0.3,
        }
    }
}

/// Research depth tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    Quick,
    Standard,
    Deep,
    Exhaustive,
}

/// Thresholds that make a session "sufficient"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sufficiency {
    pub min_sources: usize,
    /// Insights the current round must have produced
    pub min_insights: usize,
    pub min_average_relevance: f64,
}

/// Sufficiency thresholds per depth tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SufficiencyTable {
    pub quick: Sufficiency,
    pub standard: Sufficiency,
    pub deep: Sufficiency,
    pub exhaustive: Sufficiency,
}

impl Default for SufficiencyTable {
    fn default() -> Self {
        Self {
            quick: Sufficiency {
                min_sources: 15,
                min_insights: 2,
                min_average_relevance: 0.5,
            },
            standard: Sufficiency {
                min_sources: 25,
                min_insights: 3,
                min_average_relevance: 0.55,
            },
            deep: Sufficiency {
                min_sources: 35,
                min_insights: 4,
                min_average_relevance: 0.6,
            },
            exhaustive: Sufficiency {
                min_sources: 50,
                min_insights: 5,
                min_average_relevance: 0.65,
            },
        }
    }
}

impl SufficiencyTable {
    pub fn for_depth(&self, depth: ResearchDepth) -> Sufficiency {
        match depth {
            ResearchDepth::Quick => self.quick,
            ResearchDepth::Standard => self.standard,
            ResearchDepth::Deep => self.deep,
            ResearchDepth::Exhaustive => self.exhaustive,
        }
    }
}

impl SiftConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> SiftResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SiftError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: SiftConfig = toml::from_str(&content).map_err(|e| SiftError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SiftResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| SiftError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| SiftError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// 验证配置
    pub fn validate(&self) -> SiftResult<()> {
        if self.research.max_rounds == 0 {
            return Err(crate::config_error!(
                "research.max_rounds must be greater than 0",
                "config",
                "Set research.max_rounds to a positive value"
            ));
        }

        if self.research.max_sources == 0 {
            return Err(crate::config_error!(
                "research.max_sources must be greater than 0",
                "config",
                "Set research.max_sources to a positive value"
            ));
        }

        if self.research.max_query_variants == 0 {
            return Err(crate::config_error!(
                "research.max_query_variants must be greater than 0",
                "config",
                "Set research.max_query_variants to at least 1"
            ));
        }

        if self.search.max_parallel_searches == 0 {
            return Err(crate::config_error!(
                "search.max_parallel_searches must be greater than 0",
                "config",
                "Set search.max_parallel_searches to a positive value"
            ));
        }

        if self.search.max_attempts == 0 {
            return Err(crate::config_error!(
                "search.max_attempts must be greater than 0",
                "config",
                "Set search.max_attempts to at least 1"
            ));
        }

        if self.search.per_query_timeout_ms == 0 {
            return Err(crate::config_error!(
                "search.per_query_timeout_ms must be greater than 0",
                "config",
                "Set search.per_query_timeout_ms to a positive value"
            ));
        }

        for (name, value) in [
            ("quality.min_relevance_score", self.quality.min_relevance_score),
            ("quality.similarity_threshold", self.quality.similarity_threshold),
            ("research.coverage_threshold", self.research.coverage_threshold),
            ("coverage.gap_threshold", self.coverage.gap_threshold),
            ("coverage.min_recent_fraction", self.coverage.min_recent_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(crate::config_error!(
                    format!("{} must be within [0, 1], got {}", name, value),
                    "config",
                    "Use a fraction between 0.0 and 1.0"
                ));
            }
        }

        Ok(())
    }

    /// Sufficiency thresholds for the configured depth tier
    pub fn sufficiency(&self) -> Sufficiency {
        self.sufficiency.for_depth(self.research.depth)
    }
}
