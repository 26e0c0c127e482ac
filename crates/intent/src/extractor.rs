use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use lapadvisor_config::DialogueArtifacts;

use crate::record::{Intent, QueryShape, Topic};

/// Pure query → [`Intent`] classifier.
///
/// Holds its own copies of the compiled patterns, the ordered keyword table,
/// and the immutable catalog name/series sets injected at startup; extraction
/// itself touches no shared mutable state.
#[derive(Debug)]
pub struct IntentExtractor {
    model_patterns: Vec<Regex>,
    series_patterns: Vec<Regex>,
    /// `(topic, lowercased keywords)` in artifact declaration order. The
    /// first topic with any keyword hit wins; file order is the tie-break.
    keyword_table: Vec<(Topic, Vec<String>)>,
    comparison_triggers: Vec<String>,
    /// Lowercased model name → canonical catalog spelling.
    canonical_names: HashMap<String, String>,
    known_series: Arc<BTreeSet<String>>,
}

impl IntentExtractor {
    pub fn new(
        artifacts: &DialogueArtifacts,
        names: Arc<BTreeSet<String>>,
        series: Arc<BTreeSet<String>>,
    ) -> Self {
        let mut keyword_table = Vec::new();
        for (key, spec) in &artifacts.intent_keywords {
            match Topic::from_key(key) {
                Some(topic) => {
                    let lowered = spec.keywords.iter().map(|k| k.to_lowercase()).collect();
                    keyword_table.push((topic, lowered));
                }
                None => warn!(topic = %key, "ignoring unknown intent topic"),
            }
        }

        let canonical_names = names
            .iter()
            .map(|name| (name.to_lowercase(), name.clone()))
            .collect();

        Self {
            model_patterns: artifacts.entity_patterns.model_name.clone(),
            series_patterns: artifacts.entity_patterns.series_key.clone(),
            keyword_table,
            comparison_triggers: artifacts
                .funnel
                .trigger_keywords
                .comparison
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            canonical_names,
            known_series: series,
        }
    }

    pub fn extract(&self, query: &str) -> Intent {
        let lowered = query.to_lowercase();

        let model_names = self.scan_models(query);
        let series_keys = self.scan_series(query);
        let mut topic = self.scan_topic(&lowered);

        // A comparison phrase plus two named models overrides the keyword
        // table, whatever matched first.
        if model_names.len() >= 2
            && self.comparison_triggers.iter().any(|t| lowered.contains(t.as_str()))
        {
            topic = Topic::Comparison;
        }

        let shape = Intent::shape_for(&model_names, &series_keys);
        let intent = Intent { model_names, series_keys, topic, shape };
        debug!(
            topic = intent.topic.as_str(),
            shape = ?intent.shape,
            models = intent.model_names.len(),
            "intent extracted"
        );
        intent
    }

    /// All pattern hits in first-occurrence order, confirmed against the
    /// catalog (case-insensitively) and rewritten to canonical spelling.
    fn scan_models(&self, query: &str) -> Vec<String> {
        let mut hits: Vec<(usize, String)> = Vec::new();
        for pattern in &self.model_patterns {
            for hit in pattern.find_iter(query) {
                let candidate = hit.as_str().trim();
                if let Some(canonical) = self.canonical_names.get(&candidate.to_lowercase()) {
                    hits.push((hit.start(), canonical.clone()));
                }
            }
        }
        dedupe_by_position(hits)
    }

    fn scan_series(&self, query: &str) -> Vec<String> {
        let mut hits: Vec<(usize, String)> = Vec::new();
        for pattern in &self.series_patterns {
            for hit in pattern.find_iter(query) {
                let candidate = hit.as_str().trim();
                if self.known_series.contains(candidate) {
                    hits.push((hit.start(), candidate.to_string()));
                }
            }
        }
        dedupe_by_position(hits)
    }

    fn scan_topic(&self, lowered_query: &str) -> Topic {
        for (topic, keywords) in &self.keyword_table {
            if keywords.iter().any(|k| lowered_query.contains(k.as_str())) {
                return *topic;
            }
        }
        Topic::General
    }
}

/// Order hits by match position, keeping the first occurrence of each value.
fn dedupe_by_position(mut hits: Vec<(usize, String)>) -> Vec<String> {
    hits.sort_by_key(|(start, _)| *start);
    let mut seen = BTreeSet::new();
    hits.into_iter()
        .filter_map(|(_, value)| seen.insert(value.clone()).then_some(value))
        .collect()
}
