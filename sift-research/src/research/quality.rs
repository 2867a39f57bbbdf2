//! Citation quality filter
//!
//! A blacklist match vetoes; otherwise an authority allowlist match or a
//! relevance score at or above the floor admits.

use sift_core::{CitationResult, QualitySettings};

/// Why a citation was admitted or rejected
#[derive(Debug, Clone, PartialEq)]
pub enum FilterDecision {
    /// Matched a low-authority marker
    Blacklisted(String),
    /// Matched an authority host
    Authority(String),
    /// Relevance at or above the floor
    Relevant,
    LowRelevance,
}

impl FilterDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FilterDecision::Authority(_) | FilterDecision::Relevant)
    }
}

#[derive(Debug, Clone)]
pub struct QualityFilter {
    min_relevance_score: f64,
    blacklist: Vec<String>,
    allowlist: Vec<String>,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self::new(&QualitySettings::default())
    }
}

impl QualityFilter {
    pub fn new(settings: &QualitySettings) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };

        Self {
            min_relevance_score: settings.min_relevance_score,
            blacklist: lower(&settings.blacklist),
            allowlist: lower(&settings.allowlist),
        }
    }

    /// Classify a citation.
    ///
    /// The blacklist is checked against both domain and url; the allowlist
    /// only against the domain so a path segment cannot claim authority.
    pub fn evaluate(&self, citation: &CitationResult) -> FilterDecision {
        let domain = citation.effective_domain();
        let url = citation.url.to_lowercase();

        if let Some(marker) = self
            .blacklist
            .iter()
            .find(|m| domain.contains(m.as_str()) || url.contains(m.as_str()))
        {
            return FilterDecision::Blacklisted(marker.clone());
        }

        if let Some(host) = self.allowlist.iter().find(|h| domain.contains(h.as_str())) {
            return FilterDecision::Authority(host.clone());
        }

        if citation.relevance_score >= self.min_relevance_score {
            FilterDecision::Relevant
        } else {
            FilterDecision::LowRelevance
        }
    }

    pub fn accept(&self, citation: &CitationResult) -> bool {
        self.evaluate(citation).is_accepted()
    }
}
