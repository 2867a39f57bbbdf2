//! Core data type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A single retrieved source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationResult {
    pub title: String,
    pub url: String,
    /// Host the citation was retrieved from, lowercased
    pub domain: String,
    pub content: String,
    /// Relevance score (0.0-1.0)
    pub relevance_score: f64,
    pub retrieved_at: DateTime<Utc>,
    /// Publication date reported by the provider, if any
    pub published_at: Option<DateTime<Utc>>,
    pub is_valid: bool,
}

impl CitationResult {
    /// Create a citation, deriving the domain from the url and clamping the score
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        content: impl Into<String>,
        relevance_score: f64,
    ) -> Self {
        let url = url.into();
        Self {
            title: title.into(),
            domain: domain_of(&url).unwrap_or_default(),
            url,
            content: content.into(),
            relevance_score: clamp_score(relevance_score),
            retrieved_at: Utc::now(),
            published_at: None,
            is_valid: true,
        }
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    pub fn with_retrieved_at(mut self, retrieved_at: DateTime<Utc>) -> Self {
        self.retrieved_at = retrieved_at;
        self
    }

    pub fn invalid(mut self) -> Self {
        self.is_valid = false;
        self
    }

    /// Domain, falling back to the url host when the provider left it blank
    pub fn effective_domain(&self) -> String {
        if self.domain.trim().is_empty() {
            domain_of(&self.url).unwrap_or_default()
        } else {
            self.domain.trim().to_lowercase()
        }
    }

    /// Date used for recency checks
    pub fn dated_at(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.retrieved_at)
    }
}

/// Extract the lowercased host of a url
pub fn domain_of(raw: &str) -> Option<String> {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_lowercase()))
}

/// Clamp a relevance score into [0, 1]; NaN becomes 0
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Priority tier of a question or query. Ordering is total: High > Medium > Low
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Tiers in submission order
    pub const DESCENDING: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {other:?}")),
        }
    }
}

/// Category of a research question; selects the expected coverage areas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Overview,
    Implementation,
    Comparison,
    BestPractices,
    Troubleshooting,
    Examples,
}

impl fmt::Display for QuestionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuestionCategory::Overview => "overview",
            QuestionCategory::Implementation => "implementation",
            QuestionCategory::Comparison => "comparison",
            QuestionCategory::BestPractices => "best_practices",
            QuestionCategory::Troubleshooting => "troubleshooting",
            QuestionCategory::Examples => "examples",
        };
        f.write_str(name)
    }
}

impl FromStr for QuestionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "overview" => Ok(QuestionCategory::Overview),
            "implementation" => Ok(QuestionCategory::Implementation),
            "comparison" => Ok(QuestionCategory::Comparison),
            "best_practices" => Ok(QuestionCategory::BestPractices),
            "troubleshooting" => Ok(QuestionCategory::Troubleshooting),
            "examples" => Ok(QuestionCategory::Examples),
            other => Err(format!("unknown question category: {other:?}")),
        }
    }
}

/// Research question with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchQuestion {
    pub id: Uuid,
    pub text: String,
    pub category: QuestionCategory,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    /// Set once the round that searched it has completed
    pub researched: bool,
    pub rationale: String,
}

impl ResearchQuestion {
    pub fn new(
        text: impl Into<String>,
        category: QuestionCategory,
        priority: Priority,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            category,
            priority,
            created_at: Utc::now(),
            researched: false,
            rationale: rationale.into(),
        }
    }
}

/// How a search query was derived from its question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// The question text as asked
    Primary,
    /// Stop words stripped
    Keywords,
    /// Question extended with a coverage-gap hint
    GapFill,
    /// Fallback query over the original research text
    Broad,
}

/// A concrete query sent to the search provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub kind: QueryKind,
    pub priority: Priority,
    pub rationale: String,
    pub question_id: Uuid,
}

impl SearchQuery {
    pub fn new(question: &ResearchQuestion, text: impl Into<String>, kind: QueryKind) -> Self {
        Self {
            text: text.into(),
            kind,
            priority: question.priority,
            rationale: question.rationale.clone(),
            question_id: question.id,
        }
    }
}
