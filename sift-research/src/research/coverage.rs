//! Coverage and gap analysis
//!
//! Scores how well the accumulated citations cover the areas expected for a
//! question category, plus two structural checks: domain diversity and
//! recency. Every gap maps to a query suffix that steers the next round.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sift_core::{CitationResult, CoverageSettings, QuestionCategory};
use std::collections::HashSet;

/// Areas a complete answer is expected to touch, per category
pub fn expected_areas(category: QuestionCategory) -> &'static [&'static str] {
    match category {
        QuestionCategory::Overview => &["definition", "key concepts", "use cases", "history"],
        QuestionCategory::Implementation => &[
            "code examples",
            "tutorials",
            "documentation",
            "best practices",
        ],
        QuestionCategory::Comparison => &[
            "advantages",
            "disadvantages",
            "performance",
            "alternatives",
        ],
        QuestionCategory::BestPractices => &[
            "best practices",
            "real world examples",
            "common mistakes",
            "recommendations",
        ],
        QuestionCategory::Troubleshooting => &[
            "common errors",
            "debugging",
            "solutions",
            "documentation",
        ],
        QuestionCategory::Examples => &[
            "code examples",
            "real world examples",
            "tutorials",
            "use cases",
        ],
    }
}

/// Gap keyword -> query suffix appended by the planner
const GAP_QUERY_HINTS: &[(&str, &str)] = &[
    ("code examples", "code example sample implementation"),
    ("tutorials", "step by step tutorial"),
    ("documentation", "official documentation reference"),
    ("best practices", "best practices recommendations"),
    ("real world examples", "case study real world application"),
    ("common mistakes", "common mistakes pitfalls to avoid"),
    ("recommendations", "expert recommendations"),
    ("definition", "definition explained"),
    ("key concepts", "key concepts fundamentals"),
    ("use cases", "use cases applications"),
    ("history", "history evolution background"),
    ("advantages", "advantages benefits"),
    ("disadvantages", "disadvantages limitations drawbacks"),
    ("performance", "performance benchmark comparison"),
    ("alternatives", "alternatives comparison"),
    ("common errors", "common errors and fixes"),
    ("debugging", "debugging troubleshooting guide"),
    ("solutions", "solution workaround"),
    ("diversity", "overview from multiple sources"),
    ("recency", "latest developments recent updates"),
];

/// Query suffix for a gap keyword
pub fn query_hint(keyword: &str) -> Option<&'static str> {
    GAP_QUERY_HINTS
        .iter()
        .find(|(k, _)| *k == keyword)
        .map(|(_, hint)| *hint)
}

/// An under-represented dimension of the evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Gap {
    /// Topical area scoring below the gap threshold
    Area { area: String, score: f64 },
    /// Too few distinct domains
    Diversity { distinct_domains: usize },
    /// Too few recent citations
    Recency { recent_fraction: f64 },
}

impl Gap {
    /// Key into the hint table
    pub fn keyword(&self) -> &str {
        match self {
            Gap::Area { area, .. } => area,
            Gap::Diversity { .. } => "diversity",
            Gap::Recency { .. } => "recency",
        }
    }

    pub fn query_hint(&self) -> Option<&'static str> {
        query_hint(self.keyword())
    }

    pub fn describe(&self) -> String {
        match self {
            Gap::Area { area, score } => format!("low coverage of {} ({:.2})", area, score),
            Gap::Diversity { distinct_domains } => {
                format!("only {} distinct domains", distinct_domains)
            }
            Gap::Recency { recent_fraction } => {
                format!("only {:.0}% recent sources", recent_fraction * 100.0)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaCoverage {
    pub area: String,
    /// Fraction of citations mentioning the area (0.0-1.0)
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub areas: Vec<AreaCoverage>,
    pub gaps: Vec<Gap>,
    /// Mean of the area scores
    pub overall_score: f64,
    pub distinct_domains: usize,
    pub recent_fraction: f64,
    pub citation_count: usize,
}

impl CoverageReport {
    pub fn area_score(&self, area: &str) -> Option<f64> {
        self.areas.iter().find(|a| a.area == area).map(|a| a.score)
    }

    pub fn has_gap(&self, keyword: &str) -> bool {
        self.gaps.iter().any(|g| g.keyword() == keyword)
    }

    /// Query suffixes for every gap that has one, without repeats
    pub fn query_hints(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.gaps
            .iter()
            .filter_map(Gap::query_hint)
            .filter(|hint| seen.insert(*hint))
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct CoverageAnalyzer {
    settings: CoverageSettings,
}

impl Default for CoverageAnalyzer {
    fn default() -> Self {
        Self::new(CoverageSettings::default())
    }
}

impl CoverageAnalyzer {
    pub fn new(settings: CoverageSettings) -> Self {
        Self { settings }
    }

    pub fn analyze(&self, citations: &[CitationResult], expected_areas: &[&str]) -> CoverageReport {
        self.analyze_at(citations, expected_areas, Utc::now())
    }

    /// Analyze with an explicit "now" for the recency window
    pub fn analyze_at(
        &self,
        citations: &[CitationResult],
        expected_areas: &[&str],
        now: DateTime<Utc>,
    ) -> CoverageReport {
        let haystacks: Vec<String> = citations
            .iter()
            .map(|c| format!("{} {}", c.title, c.content).to_lowercase())
            .collect();

        let mut gaps = Vec::new();
        let areas: Vec<AreaCoverage> = expected_areas
            .iter()
            .map(|area| {
                let needle = area.to_lowercase();
                let score = if haystacks.is_empty() {
                    0.0
                } else {
                    let hits = haystacks.iter().filter(|h| h.contains(&needle)).count();
                    hits as f64 / haystacks.len() as f64
                };
                if score < self.settings.gap_threshold {
                    gaps.push(Gap::Area {
                        area: area.to_string(),
                        score,
                    });
                }
                AreaCoverage {
                    area: area.to_string(),
                    score,
                }
            })
            .collect();

        let overall_score = if areas.is_empty() {
            0.0
        } else {
            areas.iter().map(|a| a.score).sum::<f64>() / areas.len() as f64
        };

        let distinct_domains = citations
            .iter()
            .map(|c| c.effective_domain())
            .filter(|d| !d.is_empty())
            .collect::<HashSet<_>>()
            .len();
        if distinct_domains < self.settings.min_distinct_domains {
            gaps.push(Gap::Diversity { distinct_domains });
        }

        // Recency is undefined without evidence
        let recent_fraction = if citations.is_empty() {
            0.0
        } else {
            let cutoff = now - Duration::days(self.settings.recency_window_days);
            let recent = citations.iter().filter(|c| c.dated_at() >= cutoff).count();
            recent as f64 / citations.len() as f64
        };
        if !citations.is_empty() && recent_fraction < self.settings.min_recent_fraction {
            gaps.push(Gap::Recency { recent_fraction });
        }

        CoverageReport {
            areas,
            gaps,
            overall_score,
            distinct_domains,
            recent_fraction,
            citation_count: citations.len(),
        }
    }
}
