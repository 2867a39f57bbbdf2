//! Round controller

use super::{
    coverage::{expected_areas, CoverageAnalyzer, CoverageReport},
    dedup::Deduplicator,
    executor::{QueryOutcome, SearchExecutor},
    planner::{
        classify_category, expand_question, QuerySetGenerator, QuestionRequest, ResearchPlanner,
    },
    quality::QualityFilter,
    scheduler::SearchScheduler,
    session::ResearchSession,
    text::{normalize_text, truncate_chars},
    types::*,
};
use crate::ResearchResult;
use sift_core::{
    log_operation_start, log_operation_success, performance, CitationResult, LanePool, Priority,
    QueryKind, ResearchQuestion, SearchProvider, SearchQuery, SiftConfig, TextGenerationProvider,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EXCERPT_CHARS: usize = 280;

/// Evidence merged from one round
struct RoundMerge {
    raw_results: usize,
    accepted: usize,
    new_citations: usize,
    insights: usize,
}

/// Drives a research session through bounded rounds of planning, searching,
/// filtering and coverage analysis
pub struct ResearchEngine {
    config: SiftConfig,
    search_provider: Arc<dyn SearchProvider>,
    generator: Arc<dyn QuerySetGenerator>,
    filter: QualityFilter,
    dedup: Deduplicator,
    coverage: CoverageAnalyzer,
    progress_tx: Option<mpsc::UnboundedSender<ResearchProgress>>,
}

impl ResearchEngine {
    /// Create an engine whose questions come from a text generation provider
    pub fn new(
        config: SiftConfig,
        search_provider: Arc<dyn SearchProvider>,
        text_provider: Arc<dyn TextGenerationProvider>,
    ) -> ResearchResult<Self> {
        let planner =
            ResearchPlanner::with_provider(text_provider, config.research.generation_timeout_ms);
        Self::build(config, search_provider, Arc::new(planner))
    }

    /// Create an engine that plans from question templates only
    pub fn without_text_generation(
        config: SiftConfig,
        search_provider: Arc<dyn SearchProvider>,
    ) -> ResearchResult<Self> {
        Self::build(config, search_provider, Arc::new(ResearchPlanner::new()))
    }

    fn build(
        config: SiftConfig,
        search_provider: Arc<dyn SearchProvider>,
        generator: Arc<dyn QuerySetGenerator>,
    ) -> ResearchResult<Self> {
        config.validate()?;
        Ok(Self {
            filter: QualityFilter::new(&config.quality),
            dedup: Deduplicator::new(&config.quality),
            coverage: CoverageAnalyzer::new(config.coverage.clone()),
            config,
            search_provider,
            generator,
            progress_tx: None,
        })
    }

    /// Replace the question generator
    pub fn with_generator(mut self, generator: Arc<dyn QuerySetGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Publish progress events on `tx`
    pub fn with_progress_channel(mut self, tx: mpsc::UnboundedSender<ResearchProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &SiftConfig {
        &self.config
    }

    /// New session for `query`, categorized from its wording
    pub fn create_session(&self, query: &str) -> ResearchSession {
        let category = classify_category(query);
        ResearchSession::new(query.trim(), category, self.config.clone())
    }

    /// Research `query` to completion. Always yields an outcome.
    pub async fn execute_rounds(&self, query: &str) -> ResearchOutcome {
        let mut session = self.create_session(query);
        self.run_session(&mut session).await
    }

    /// Run the round loop on a prepared session.
    ///
    /// The session can be cancelled from outside through its
    /// [`CancelHandle`](super::session::CancelHandle).
    pub async fn run_session(&self, session: &mut ResearchSession) -> ResearchOutcome {
        let lanes = Arc::new(LanePool::new(
            session.config.search.max_parallel_searches,
            session.config.search.rate_limit_ms,
        ));
        let scheduler = SearchScheduler::new(SearchExecutor::new(
            Arc::clone(&self.search_provider),
            lanes,
            &session.config.search,
        ));
        self.run_rounds(session, &scheduler).await
    }

    /// The round loop over a session-scoped scheduler, whose lane pool is
    /// closed on exit
    async fn run_rounds(
        &self,
        session: &mut ResearchSession,
        scheduler: &SearchScheduler,
    ) -> ResearchOutcome {
        let started = Instant::now();
        let max_rounds = session.config.research.max_rounds;
        log_operation_start!(
            "research_session",
            session_id = %session.id,
            query = %session.query,
            category = %session.category,
            max_rounds
        );

        let areas = expected_areas(session.category);
        let mut report = self.coverage.analyze(session.citations(), areas);
        let mut rounds = Vec::new();

        let termination = loop {
            if session.is_cancelled() {
                break TerminationReason::Cancelled;
            }
            if session.round >= max_rounds {
                break TerminationReason::RoundBudget;
            }

            session.round += 1;
            let round = session.round;
            let round_started = Instant::now();

            self.emit(session, RoundState::Planning, &report);
            let gap_hints = if round > 1 { report.query_hints() } else { Vec::new() };
            let (questions, queries) = self.plan_round(session, &gap_hints).await;
            let query_count = queries.len();
            debug!(
                round,
                questions = questions.len(),
                queries = query_count,
                "Round planned"
            );

            self.emit(session, RoundState::Searching, &report);
            let dispatched = performance::measure_async(
                "research_round_dispatch",
                scheduler.dispatch(queries, session.cancel_flag()),
            )
            .await;

            let outcomes = match dispatched {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    warn!(round, error = %e, "Dispatch failed, skipping round");
                    rounds.push(RoundSummary::skipped(
                        round,
                        questions.len(),
                        query_count,
                        report.overall_score,
                        round_started.elapsed(),
                    ));
                    continue;
                }
            };

            if session.is_cancelled() {
                info!(
                    round,
                    discarded = outcomes.len(),
                    "Session cancelled, discarding round results"
                );
                break TerminationReason::Cancelled;
            }

            self.emit(session, RoundState::Filtering, &report);
            let merge = self.merge_round(session, &questions, outcomes);

            self.emit(session, RoundState::AnalyzingCoverage, &report);
            report = self.coverage.analyze(session.citations(), areas);

            self.emit(session, RoundState::Deciding, &report);
            rounds.push(RoundSummary {
                round,
                questions: questions.len(),
                queries: query_count,
                raw_results: merge.raw_results,
                accepted: merge.accepted,
                new_citations: merge.new_citations,
                insights: merge.insights,
                coverage_score: report.overall_score,
                skipped: false,
                duration: round_started.elapsed(),
            });
            info!(
                round,
                raw = merge.raw_results,
                accepted = merge.accepted,
                new = merge.new_citations,
                total = session.citations().len(),
                coverage = report.overall_score,
                gaps = report.gaps.len(),
                "Round complete"
            );

            let decision = self.decide(session, &report, merge.new_citations, merge.insights);
            if let Some(reason) = decision {
                break reason;
            }
        };

        scheduler.executor().lanes().close();
        self.emit(session, RoundState::Terminated, &report);

        let citations = session.citations().to_vec();
        let degraded = citations.is_empty();
        if degraded {
            warn!(session_id = %session.id, "Research produced no usable evidence");
        }
        log_operation_success!(
            "research_session",
            session_id = %session.id,
            rounds = session.round,
            citations = citations.len(),
            termination = ?termination,
            duration_ms = started.elapsed().as_millis() as u64
        );

        ResearchOutcome {
            session_id: session.id.clone(),
            query: session.query.clone(),
            category: session.category,
            citations,
            insights: session.insights(),
            coverage: report,
            rounds,
            rounds_executed: session.round,
            termination,
            degraded,
            duration: started.elapsed(),
        }
    }

    /// Pick this round's new questions and expand them into unexplored queries
    async fn plan_round(
        &self,
        session: &mut ResearchSession,
        gap_hints: &[String],
    ) -> (Vec<ResearchQuestion>, Vec<SearchQuery>) {
        let max_questions = session.config.research.max_questions_per_round;
        let max_variants = session.config.research.max_query_variants;
        let request = QuestionRequest {
            query: session.query.clone(),
            category: session.category,
            round: session.round,
            gap_hints: gap_hints.to_vec(),
            explored_topics: session.explored_topics(),
            max_questions,
        };

        let mut candidates = match self.generator.generate(&request).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(round = session.round, error = %e, "Question generation failed");
                Vec::new()
            }
        };
        candidates.truncate(max_questions.max(1));

        let questions = session.admit_questions(candidates);
        if questions.is_empty() {
            info!(round = session.round, "No new questions, falling back to a broad query");
            return self.broad_round(session);
        }

        let mut seen = HashSet::new();
        let mut queries = Vec::new();
        for question in &questions {
            for query in expand_question(question, gap_hints, max_variants) {
                let key = normalize_text(&query.text);
                if session.is_explored(&key) || !seen.insert(key) {
                    continue;
                }
                queries.push(query);
            }
        }

        if queries.is_empty() {
            info!(
                round = session.round,
                "Every expansion was already explored, falling back to a broad query"
            );
            let (broad, queries) = self.broad_round(session);
            let mut all = questions;
            all.extend(broad);
            return (all, queries);
        }

        for query in &queries {
            session.record_explored(&query.text);
        }
        (questions, queries)
    }

    /// One broad query against the original text; never filtered as explored
    fn broad_round(
        &self,
        session: &mut ResearchSession,
    ) -> (Vec<ResearchQuestion>, Vec<SearchQuery>) {
        let question = ResearchQuestion::new(
            session.query.clone(),
            session.category,
            Priority::High,
            "broad fallback on the original query",
        );
        session.force_question(question.clone());
        session.record_explored(&question.text);
        let query = SearchQuery::new(&question, question.text.clone(), QueryKind::Broad);
        (vec![question], vec![query])
    }

    /// Filter, deduplicate and merge a round's results, then digest the new
    /// evidence per originating question
    fn merge_round(
        &self,
        session: &mut ResearchSession,
        questions: &[ResearchQuestion],
        outcomes: Vec<QueryOutcome>,
    ) -> RoundMerge {
        let raw_results = outcomes.iter().map(|o| o.citations.len()).sum();

        let mut origin: HashMap<String, Uuid> = HashMap::new();
        let mut accepted = Vec::new();
        for outcome in outcomes {
            let question_id = outcome.query.question_id;
            for citation in outcome.citations {
                let decision = self.filter.evaluate(&citation);
                if !decision.is_accepted() {
                    debug!(url = %citation.url, decision = ?decision, "Citation rejected");
                    continue;
                }
                origin.entry(citation.url.clone()).or_insert(question_id);
                accepted.push(citation);
            }
        }
        let accepted_count = accepted.len();

        let stats = session.merge_citations(&self.dedup, accepted);
        if stats.over_capacity > 0 {
            debug!(refused = stats.over_capacity, "Citation set full");
        }

        let mut new_by_question: HashMap<Uuid, Vec<String>> = HashMap::new();
        for url in &stats.added {
            if let Some(question_id) = origin.get(url) {
                new_by_question.entry(*question_id).or_default().push(url.clone());
            }
        }

        let round = session.round;
        let mut insights = Vec::new();
        for question in questions {
            let Some(urls) = new_by_question.remove(&question.id) else {
                continue;
            };
            let best = urls
                .iter()
                .filter_map(|url| session.citations().iter().find(|c| &c.url == url))
                .max_by(|a, b| a.relevance_score.total_cmp(&b.relevance_score));
            if let Some(insight) = best.map(|best| digest(question, round, &urls, best)) {
                insights.push(insight);
            }
        }
        let insight_count = insights.len();
        for insight in insights {
            session.record_insight(insight);
        }

        let researched: HashSet<Uuid> = questions.iter().map(|q| q.id).collect();
        session.mark_researched(&researched);

        RoundMerge {
            raw_results,
            accepted: accepted_count,
            new_citations: stats.added.len(),
            insights: insight_count,
        }
    }

    /// Termination check, in priority order
    fn decide(
        &self,
        session: &ResearchSession,
        report: &CoverageReport,
        new_citations: usize,
        round_insights: usize,
    ) -> Option<TerminationReason> {
        let settings = &session.config.research;
        let total = session.citations().len();

        if total >= settings.max_sources {
            info!(total, "Source limit reached");
            return Some(TerminationReason::SourceLimit);
        }

        let sufficiency = session.config.sufficiency();
        if report.overall_score > settings.coverage_threshold
            && round_insights >= sufficiency.min_insights
            && total >= sufficiency.min_sources.min(settings.max_sources)
            && session.average_relevance() >= sufficiency.min_average_relevance
        {
            info!(total, coverage = report.overall_score, "Evidence is sufficient");
            return Some(TerminationReason::Sufficient);
        }

        if new_citations == 0 {
            info!(round = session.round, "Round added no new citations");
            return Some(TerminationReason::Stagnation);
        }

        if session.round >= settings.max_rounds {
            return Some(TerminationReason::RoundBudget);
        }

        if session.is_cancelled() {
            return Some(TerminationReason::Cancelled);
        }

        None
    }

    fn emit(&self, session: &ResearchSession, state: RoundState, report: &CoverageReport) {
        let Some(tx) = &self.progress_tx else {
            return;
        };
        let max_rounds = session.config.research.max_rounds;
        let progress = if state == RoundState::Terminated {
            1.0
        } else {
            session.round.saturating_sub(1) as f64 / max_rounds.max(1) as f64
        };
        let event = ResearchProgress {
            session_id: session.id.clone(),
            round: session.round,
            max_rounds,
            state,
            citations: session.citations().len(),
            coverage_score: report.overall_score,
            progress,
        };
        if tx.send(event).is_err() {
            debug!("Progress receiver dropped");
        }
    }
}

fn digest(
    question: &ResearchQuestion,
    round: usize,
    urls: &[String],
    best: &CitationResult,
) -> Insight {
    Insight {
        question_id: question.id,
        question: question.text.clone(),
        round,
        citation_urls: urls.to_vec(),
        best_relevance: best.relevance_score,
        excerpt: truncate_chars(&best.content, EXCERPT_CHARS),
    }
}
