//! Research planning: candidate questions and query expansion

use super::text::{keywords, normalize_text};
use crate::ResearchResult;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use sift_core::{
    with_timeout, ErrorContext, Priority, QueryKind, QuestionCategory, ResearchQuestion,
    SearchQuery, SiftError, TextGenerationProvider,
};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

/// What the round controller asks the generator for
#[derive(Debug, Clone)]
pub struct QuestionRequest {
    pub query: String,
    pub category: QuestionCategory,
    pub round: usize,
    /// Query suffixes derived from the previous round's coverage gaps
    pub gap_hints: Vec<String>,
    /// Already searched topics, normalized
    pub explored_topics: Vec<String>,
    pub max_questions: usize,
}

/// Source of candidate research questions
#[async_trait]
pub trait QuerySetGenerator: Send + Sync {
    async fn generate(&self, request: &QuestionRequest) -> ResearchResult<Vec<ResearchQuestion>>;
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    text: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    rationale: Option<String>,
}

/// Default question generator.
///
/// Asks the text generation provider when one is configured and falls back
/// to fixed templates when it fails, times out or returns nothing usable.
pub struct ResearchPlanner {
    provider: Option<Arc<dyn TextGenerationProvider>>,
    timeout_ms: u64,
}

impl ResearchPlanner {
    /// Template-only planner
    pub fn new() -> Self {
        Self {
            provider: None,
            timeout_ms: 60_000,
        }
    }

    /// Planner backed by a text generation provider
    pub fn with_provider(provider: Arc<dyn TextGenerationProvider>, timeout_ms: u64) -> Self {
        Self {
            provider: Some(provider),
            timeout_ms,
        }
    }

    async fn generate_with_provider(
        &self,
        provider: &Arc<dyn TextGenerationProvider>,
        request: &QuestionRequest,
    ) -> Result<Vec<ResearchQuestion>, SiftError> {
        let prompt = build_request_text(request);
        let raw = with_timeout(provider.complete(&prompt), self.timeout_ms, "question_generation")
            .await??;

        if raw.trim().is_empty() {
            return Err(SiftError::TextGeneration {
                message: "provider returned empty output".to_string(),
                provider: Some(provider.name().to_string()),
                source: None,
                context: ErrorContext::new("planner").with_operation("generate"),
            });
        }

        let questions = parse_questions(&raw, request.category);
        if questions.is_empty() {
            return Err(SiftError::TextGeneration {
                message: "no usable questions in provider output".to_string(),
                provider: Some(provider.name().to_string()),
                source: None,
                context: ErrorContext::new("planner")
                    .with_operation("parse")
                    .with_metadata("output_len", &raw.len().to_string()),
            });
        }
        Ok(questions)
    }
}

impl Default for ResearchPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuerySetGenerator for ResearchPlanner {
    async fn generate(&self, request: &QuestionRequest) -> ResearchResult<Vec<ResearchQuestion>> {
        info!(
            round = request.round,
            gaps = request.gap_hints.len(),
            "Planning research questions"
        );

        let mut questions = match &self.provider {
            Some(provider) => match self.generate_with_provider(provider, request).await {
                Ok(questions) => questions,
                Err(e) => {
                    e.log();
                    debug!("Falling back to template-based question generation");
                    template_questions(request)
                }
            },
            None => template_questions(request),
        };

        questions.truncate(request.max_questions.max(1));
        debug!(count = questions.len(), "Generated candidate questions");
        Ok(questions)
    }
}

/// Request text handed to the provider. Phrasing is the provider's concern;
/// this only carries the facts it needs.
fn build_request_text(request: &QuestionRequest) -> String {
    let mut text = format!(
        "Research topic: {}\nCategory: {}\nRound: {}\nQuestions wanted: {}\n",
        request.query, request.category, request.round, request.max_questions
    );
    if !request.gap_hints.is_empty() {
        text.push_str(&format!("Coverage gaps: {}\n", request.gap_hints.join("; ")));
    }
    if !request.explored_topics.is_empty() {
        text.push_str(&format!(
            "Already explored: {}\n",
            request.explored_topics.join("; ")
        ));
    }
    text.push_str(
        "Respond with a JSON array of objects with fields \"text\", \"category\", \"priority\" (high|medium|low) and \"rationale\".",
    );
    text
}

/// Optional "1." / "2)" / "-" / "*" / "•" marker ahead of a list item
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d+[.)]|[-*•])?\s*(?P<text>.+?)\s*$")
        .expect("LIST_MARKER is a constant, valid pattern")
});

/// Parse provider output: a JSON array when present, otherwise one question per line
pub fn parse_questions(raw: &str, default_category: QuestionCategory) -> Vec<ResearchQuestion> {
    if let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) {
        if start < end {
            if let Ok(items) = serde_json::from_str::<Vec<RawQuestion>>(&raw[start..=end]) {
                return items
                    .into_iter()
                    .filter_map(|item| question_from_raw(item, default_category))
                    .collect();
            }
        }
        debug!("Provider output is not a JSON question array, reading lines");
    }

    raw.lines()
        .filter_map(|line| LIST_MARKER.captures(line))
        .filter_map(|caps| caps.name("text").map(|m| m.as_str().to_string()))
        .filter(|text| text.len() > 10 && !text.starts_with('[') && !text.starts_with('{'))
        .map(|text| {
            ResearchQuestion::new(
                text,
                default_category,
                Priority::Medium,
                "generated question",
            )
        })
        .collect()
}

fn question_from_raw(
    item: RawQuestion,
    default_category: QuestionCategory,
) -> Option<ResearchQuestion> {
    let text = item.text.trim().to_string();
    if text.is_empty() {
        return None;
    }

    let priority = match item.priority.as_deref() {
        None => Priority::Medium,
        Some(raw) => match raw.parse::<Priority>() {
            Ok(p) => p,
            Err(e) => {
                warn!(question = %text, error = %e, "Dropping question with unrecognized priority");
                return None;
            }
        },
    };

    let category = match item.category.as_deref() {
        None => default_category,
        Some(raw) => match raw.parse::<QuestionCategory>() {
            Ok(c) => c,
            Err(e) => {
                warn!(question = %text, error = %e, "Dropping question with unrecognized category");
                return None;
            }
        },
    };

    Some(ResearchQuestion::new(
        text,
        category,
        priority,
        item.rationale.unwrap_or_default(),
    ))
}

fn category_templates(category: QuestionCategory) -> &'static [(&'static str, Priority)] {
    match category {
        QuestionCategory::Overview => &[
            ("What is {}", Priority::High),
            ("{} key concepts explained", Priority::High),
            ("{} use cases", Priority::Medium),
            ("history of {}", Priority::Low),
        ],
        QuestionCategory::Implementation => &[
            ("how to implement {}", Priority::High),
            ("{} code examples", Priority::High),
            ("{} documentation", Priority::Medium),
            ("{} best practices", Priority::Medium),
            ("{} tutorials", Priority::Low),
        ],
        QuestionCategory::Comparison => &[
            ("{} comparison", Priority::High),
            ("{} advantages and disadvantages", Priority::High),
            ("{} performance benchmarks", Priority::Medium),
            ("{} alternatives", Priority::Low),
        ],
        QuestionCategory::BestPractices => &[
            ("{} best practices", Priority::High),
            ("{} common mistakes", Priority::High),
            ("{} real world examples", Priority::Medium),
            ("{} expert recommendations", Priority::Low),
        ],
        QuestionCategory::Troubleshooting => &[
            ("{} common errors", Priority::High),
            ("how to debug {}", Priority::High),
            ("{} solutions", Priority::Medium),
            ("{} documentation", Priority::Low),
        ],
        QuestionCategory::Examples => &[
            ("{} code examples", Priority::High),
            ("{} real world examples", Priority::High),
            ("{} tutorials", Priority::Medium),
            ("{} use cases", Priority::Low),
        ],
    }
}

/// Template fallback: one high-priority question per gap hint, then the
/// category templates
pub fn template_questions(request: &QuestionRequest) -> Vec<ResearchQuestion> {
    let topic = request.query.trim();

    let gap_questions = request.gap_hints.iter().map(|hint| {
        ResearchQuestion::new(
            format!("{} {}", topic, hint),
            request.category,
            Priority::High,
            format!("fills coverage gap: {}", hint),
        )
    });

    let templated = category_templates(request.category)
        .iter()
        .map(|(template, priority)| {
            ResearchQuestion::new(
                template.replace("{}", topic),
                request.category,
                *priority,
                "template question",
            )
        });

    gap_questions.chain(templated).collect()
}

/// Expand a question into at most `max_variants` search queries
pub fn expand_question(
    question: &ResearchQuestion,
    gap_hints: &[String],
    max_variants: usize,
) -> Vec<SearchQuery> {
    let mut variants = vec![SearchQuery::new(question, question.text.trim(), QueryKind::Primary)];

    let terms = keywords(&question.text).join(" ");
    if !terms.is_empty() && terms != normalize_text(&question.text) {
        variants.push(SearchQuery::new(question, terms.clone(), QueryKind::Keywords));
    }

    if let Some(hint) = gap_hints.first() {
        let base = if terms.is_empty() { question.text.trim() } else { terms.as_str() };
        if !base.contains(hint.as_str()) {
            variants.push(SearchQuery::new(
                question,
                format!("{} {}", base, hint),
                QueryKind::GapFill,
            ));
        }
    }

    variants.truncate(max_variants.max(1));
    variants
}

/// Guess the category of a free-text research query
pub fn classify_category(query: &str) -> QuestionCategory {
    let q = format!(" {} ", normalize_text(query));
    let has = |needles: &[&str]| needles.iter().any(|n| q.contains(n));

    if has(&[
        " vs ",
        " versus ",
        " compare",
        " comparison ",
        " difference between ",
        " better than ",
    ]) {
        QuestionCategory::Comparison
    } else if has(&[
        " error",
        " fix ",
        " debug",
        " not working ",
        " fails ",
        " crash",
        " troubleshoot",
    ]) {
        QuestionCategory::Troubleshooting
    } else if has(&[" best practice", " pitfall", " should i ", " recommended "]) {
        QuestionCategory::BestPractices
    } else if has(&[" example", " sample ", " demo "]) {
        QuestionCategory::Examples
    } else if has(&[
        " how to ",
        " implement",
        " build ",
        " setup ",
        " set up ",
        " configure ",
        " integrate ",
    ]) {
        QuestionCategory::Implementation
    } else {
        QuestionCategory::Overview
    }
}
