//! Per-session research state
//!
//! Mutated only by the round controller between rounds.

use super::dedup::{Deduplicator, MergeStats};
use super::text::normalize_text;
use super::types::Insight;
use sift_core::{CitationResult, QuestionCategory, ResearchQuestion, SiftConfig};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Cooperative cancellation flag shared with a running session
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn flag(&self) -> &AtomicBool {
        &self.0
    }
}

#[derive(Debug)]
pub struct ResearchSession {
    pub id: String,
    pub query: String,
    pub category: QuestionCategory,
    pub config: SiftConfig,
    /// Completed rounds, the running one included
    pub round: usize,
    citations: Vec<CitationResult>,
    insights: HashMap<Uuid, Insight>,
    questions: Vec<ResearchQuestion>,
    processed_questions: HashSet<String>,
    explored_topics: HashSet<String>,
    cancel: CancelHandle,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl ResearchSession {
    pub fn new(query: impl Into<String>, category: QuestionCategory, config: SiftConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            query: query.into(),
            category,
            config,
            round: 0,
            citations: Vec::new(),
            insights: HashMap::new(),
            questions: Vec::new(),
            processed_questions: HashSet::new(),
            explored_topics: HashSet::new(),
            cancel: CancelHandle::default(),
            started_at: chrono::Utc::now(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn citations(&self) -> &[CitationResult] {
        &self.citations
    }

    pub fn questions(&self) -> &[ResearchQuestion] {
        &self.questions
    }

    pub fn insight(&self, question_id: &Uuid) -> Option<&Insight> {
        self.insights.get(question_id)
    }

    /// Insights ordered by round, then question text
    pub fn insights(&self) -> Vec<Insight> {
        let mut insights: Vec<Insight> = self.insights.values().cloned().collect();
        insights.sort_by(|a, b| a.round.cmp(&b.round).then_with(|| a.question.cmp(&b.question)));
        insights
    }

    pub fn average_relevance(&self) -> f64 {
        if self.citations.is_empty() {
            return 0.0;
        }
        self.citations.iter().map(|c| c.relevance_score).sum::<f64>() / self.citations.len() as f64
    }

    pub fn is_processed(&self, text: &str) -> bool {
        self.processed_questions.contains(&normalize_text(text))
    }

    /// Keep the candidates not seen before (by normalized text) and record them
    pub fn admit_questions(&mut self, candidates: Vec<ResearchQuestion>) -> Vec<ResearchQuestion> {
        let mut fresh = Vec::new();
        for question in candidates {
            let key = normalize_text(&question.text);
            if key.is_empty() || !self.processed_questions.insert(key) {
                continue;
            }
            self.questions.push(question.clone());
            fresh.push(question);
        }
        fresh
    }

    /// Record a question unconditionally, e.g. the broad fallback query
    pub fn force_question(&mut self, question: ResearchQuestion) {
        self.processed_questions.insert(normalize_text(&question.text));
        self.questions.push(question);
    }

    pub fn mark_researched(&mut self, ids: &HashSet<Uuid>) {
        for question in self.questions.iter_mut().filter(|q| ids.contains(&q.id)) {
            question.researched = true;
        }
    }

    pub fn is_explored(&self, topic: &str) -> bool {
        self.explored_topics.contains(&normalize_text(topic))
    }

    pub fn record_explored(&mut self, topic: &str) {
        let key = normalize_text(topic);
        if !key.is_empty() {
            self.explored_topics.insert(key);
        }
    }

    /// Explored topics in stable order
    pub fn explored_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.explored_topics.iter().cloned().collect();
        topics.sort();
        topics
    }

    /// Merge filtered citations into the accumulated set, respecting `max_sources`
    pub fn merge_citations(
        &mut self,
        dedup: &Deduplicator,
        incoming: Vec<CitationResult>,
    ) -> MergeStats {
        let capacity = self.config.research.max_sources;
        dedup.merge_into(&mut self.citations, incoming, capacity)
    }

    /// Add or extend the insight for a question
    pub fn record_insight(&mut self, insight: Insight) {
        match self.insights.get_mut(&insight.question_id) {
            Some(existing) => {
                existing.citation_urls.extend(insight.citation_urls);
                if insight.best_relevance > existing.best_relevance {
                    existing.best_relevance = insight.best_relevance;
                    existing.excerpt = insight.excerpt;
                }
            }
            None => {
                self.insights.insert(insight.question_id, insight);
            }
        }
    }

    pub(crate) fn cancel_flag(&self) -> &AtomicBool {
        self.cancel.flag()
    }
}
