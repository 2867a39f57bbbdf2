//! Citation deduplication
//!
//! Two citations are the same logical item when their urls are equal or when
//! their titles are near-identical token sets. The first occurrence keeps its
//! position; a later copy with a higher relevance score lends it that score
//! and its content.

use super::text::{title_tokens, token_jaccard};
use sift_core::{validation_error, CitationResult, QualitySettings, SiftResult};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Outcome of merging a batch into an accumulated set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeStats {
    /// Urls appended to the accumulated set, in order
    pub added: Vec<String>,
    /// Retained entries whose relevance was raised by a later copy
    pub upgraded: usize,
    pub duplicates: usize,
    /// Invalid or too short
    pub dropped: usize,
    /// Unique but refused because the set was full
    pub over_capacity: usize,
}

/// Running index over an accumulated citation list
struct SeenIndex {
    urls: HashMap<String, usize>,
    titles: Vec<BTreeSet<String>>,
}

impl SeenIndex {
    fn build(citations: &[CitationResult]) -> Self {
        Self {
            urls: citations
                .iter()
                .enumerate()
                .map(|(idx, c)| (c.url.clone(), idx))
                .collect(),
            titles: citations.iter().map(|c| title_tokens(&c.title)).collect(),
        }
    }

    fn find(&self, url: &str, title: &BTreeSet<String>, threshold: f64) -> Option<usize> {
        if let Some(idx) = self.urls.get(url) {
            return Some(*idx);
        }
        self.titles
            .iter()
            .position(|seen| token_jaccard(seen, title) > threshold)
    }

    fn push(&mut self, url: String, title: BTreeSet<String>) {
        self.urls.insert(url, self.titles.len());
        self.titles.push(title);
    }
}

/// Order-preserving citation deduplicator
#[derive(Debug, Clone)]
pub struct Deduplicator {
    similarity_threshold: f64,
    min_content_length: usize,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(&QualitySettings::default())
    }
}

impl Deduplicator {
    pub fn new(settings: &QualitySettings) -> Self {
        Self {
            similarity_threshold: settings.similarity_threshold,
            min_content_length: settings.min_content_length,
        }
    }

    /// Valid and carrying enough content to be worth keeping
    pub fn check_admissible(&self, citation: &CitationResult) -> SiftResult<()> {
        if !citation.is_valid {
            return Err(validation_error!("citation marked invalid", "is_valid", "dedup"));
        }
        if citation.url.trim().is_empty() {
            return Err(validation_error!("citation has no url", "url", "dedup"));
        }
        let length = citation.content.trim().chars().count();
        if length < self.min_content_length {
            return Err(validation_error!(
                format!(
                    "content is {} chars, minimum is {}",
                    length, self.min_content_length
                ),
                "content",
                "dedup"
            ));
        }
        Ok(())
    }

    /// Whether two citations are the same logical item
    pub fn is_duplicate(&self, a: &CitationResult, b: &CitationResult) -> bool {
        a.url == b.url
            || token_jaccard(&title_tokens(&a.title), &title_tokens(&b.title))
                > self.similarity_threshold
    }

    /// Drop inadmissible citations, then remove duplicates
    pub fn dedupe(&self, citations: Vec<CitationResult>) -> Vec<CitationResult> {
        let mut unique = Vec::with_capacity(citations.len());
        self.merge_into(&mut unique, citations, usize::MAX);
        unique
    }

    /// Merge `incoming` into an already deduplicated `existing` list, never
    /// growing it beyond `capacity`
    pub fn merge_into(
        &self,
        existing: &mut Vec<CitationResult>,
        incoming: Vec<CitationResult>,
        capacity: usize,
    ) -> MergeStats {
        let mut stats = MergeStats::default();
        let mut index = SeenIndex::build(existing);

        for citation in incoming {
            if let Err(e) = self.check_admissible(&citation) {
                e.log();
                stats.dropped += 1;
                continue;
            }

            let title = title_tokens(&citation.title);
            match index.find(&citation.url, &title, self.similarity_threshold) {
                Some(idx) => {
                    stats.duplicates += 1;
                    let kept = &mut existing[idx];
                    if citation.relevance_score > kept.relevance_score {
                        debug!(
                            url = %kept.url,
                            from = kept.relevance_score,
                            to = citation.relevance_score,
                            "Raising relevance of retained citation"
                        );
                        kept.relevance_score = citation.relevance_score;
                        kept.content = citation.content;
                        stats.upgraded += 1;
                    }
                }
                None if existing.len() >= capacity => {
                    stats.over_capacity += 1;
                }
                None => {
                    index.push(citation.url.clone(), title);
                    stats.added.push(citation.url.clone());
                    existing.push(citation);
                }
            }
        }

        stats
    }
}
