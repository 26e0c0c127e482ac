//! Per-turn routing: classify, never retrieve.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use lapadvisor_funnel::{FunnelController, Scenario};
use lapadvisor_intent::Intent;

/// Where a free-text turn goes. First matching rule wins, in this order:
/// list-all, funnel activation, unknown series, direct answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    ListAll,
    Funnel(Scenario),
    UnknownSeries(Vec<String>),
    Direct,
}

pub(crate) struct Router {
    list_all_phrases: Vec<String>,
    known_series: Arc<BTreeSet<String>>,
}

impl Router {
    pub fn new(list_all_phrases: &[String], known_series: Arc<BTreeSet<String>>) -> Self {
        Self {
            list_all_phrases: list_all_phrases.iter().map(|p| p.to_lowercase()).collect(),
            known_series,
        }
    }

    pub fn route(&self, query: &str, intent: &Intent, funnel: &FunnelController) -> RouteDecision {
        let lowered = query.to_lowercase();

        if self.list_all_phrases.iter().any(|p| lowered.contains(p.as_str())) {
            info!(reason = "list-all phrase", "routing to catalog listing");
            return RouteDecision::ListAll;
        }

        if let Some(scenario) = funnel.should_activate(query, intent) {
            info!(reason = "ambiguous intent", scenario = scenario.as_str(), "routing to funnel");
            return RouteDecision::Funnel(scenario);
        }

        let unknown = self.unknown_series_tokens(query, intent);
        if !unknown.is_empty() {
            info!(reason = "unrecognized series tokens", ?unknown, "routing to series help");
            return RouteDecision::UnknownSeries(unknown);
        }

        info!(
            reason = "resolved entities or concrete topic",
            topic = intent.topic.as_str(),
            "routing to direct answer"
        );
        RouteDecision::Direct
    }

    /// Digit tokens that look like series keys but match nothing we sell.
    /// Only meaningful when the query resolved no model and no series.
    fn unknown_series_tokens(&self, query: &str, intent: &Intent) -> Vec<String> {
        if !intent.model_names.is_empty() || !intent.series_keys.is_empty() {
            return Vec::new();
        }

        let mut tokens = Vec::new();
        let mut current = String::new();
        for ch in query.chars() {
            if ch.is_ascii_digit() {
                current.push(ch);
            } else {
                if current.len() >= 3 && !tokens.contains(&current) {
                    tokens.push(std::mem::take(&mut current));
                }
                current.clear();
            }
        }
        if current.len() >= 3 && !tokens.contains(&current) {
            tokens.push(current);
        }

        tokens.retain(|token| !self.known_series.contains(token));
        tokens
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use regex::Regex;

    use lapadvisor_config::{
        DialogueArtifacts, EntityPatterns, FunnelArtifact, FunnelSettings, OptionSpec,
        QuestionSpec, TriggerKeywords,
    };
    use lapadvisor_intent::{QueryShape, Topic};

    use super::*;

    fn artifacts() -> DialogueArtifacts {
        let mut features = IndexMap::new();
        features.insert(
            "cpu".to_string(),
            QuestionSpec {
                question: "算力需求？".to_string(),
                options: vec![OptionSpec {
                    option_id: "basic".to_string(),
                    label: "文書".to_string(),
                    description: String::new(),
                    filter: IndexMap::new(),
                }],
            },
        );
        let mut priorities = IndexMap::new();
        priorities.insert("general".to_string(), vec!["cpu".to_string()]);

        DialogueArtifacts {
            intent_keywords: IndexMap::new(),
            entity_patterns: EntityPatterns {
                model_name: vec![Regex::new(r"[A-Z]{2,4}\d{3}").unwrap()],
                series_key: vec![Regex::new(r"\d{3}").unwrap()],
            },
            funnel: FunnelArtifact {
                features,
                priorities,
                trigger_keywords: TriggerKeywords {
                    vague: vec!["推薦".into()],
                    comparison: vec![],
                    list_all: vec!["所有型號".into()],
                },
                scenario_keywords: IndexMap::new(),
                lifestyle_topics: vec![],
            },
            prompt_template: "{context} {query}".to_string(),
        }
    }

    fn setup() -> (Router, FunnelController) {
        let series: BTreeSet<String> = ["958", "819"].iter().map(|s| s.to_string()).collect();
        let artifacts = artifacts();
        let router = Router::new(
            &artifacts.funnel.trigger_keywords.list_all,
            Arc::new(series),
        );
        let funnel = FunnelController::new(&artifacts, &FunnelSettings::default());
        (router, funnel)
    }

    fn intent(models: &[&str], series: &[&str], topic: Topic) -> Intent {
        let model_names: Vec<String> = models.iter().map(|s| s.to_string()).collect();
        let series_keys: Vec<String> = series.iter().map(|s| s.to_string()).collect();
        let shape = Intent::shape_for(&model_names, &series_keys);
        Intent { model_names, series_keys, topic, shape }
    }

    #[test]
    fn list_all_phrase_wins_over_everything() {
        let (router, funnel) = setup();
        let decision = router.route("推薦一下，所有型號列給我", &intent(&[], &[], Topic::General), &funnel);
        assert_eq!(decision, RouteDecision::ListAll);
    }

    #[test]
    fn vague_query_routes_to_funnel() {
        let (router, funnel) = setup();
        let decision = router.route("推薦一台筆電", &intent(&[], &[], Topic::General), &funnel);
        assert!(matches!(decision, RouteDecision::Funnel(_)));
    }

    #[test]
    fn named_model_routes_direct() {
        let (router, funnel) = setup();
        let decision = router.route(
            "AG958 的 CPU",
            &intent(&["AG958"], &["958"], Topic::Cpu),
            &funnel,
        );
        assert_eq!(decision, RouteDecision::Direct);
    }

    #[test]
    fn unknown_series_token_is_reported() {
        let (router, funnel) = setup();
        let decision = router.route("777 系列有哪些？", &intent(&[], &[], Topic::General), &funnel);
        assert_eq!(decision, RouteDecision::UnknownSeries(vec!["777".to_string()]));
    }

    #[test]
    fn known_series_does_not_trip_the_unknown_check() {
        let (router, funnel) = setup();
        let decision = router.route(
            "958 系列有哪些？",
            &intent(&[], &["958"], Topic::General),
            &funnel,
        );
        assert_eq!(decision, RouteDecision::Direct);
    }

    #[test]
    fn concrete_question_without_entities_routes_direct() {
        let (router, funnel) = setup();
        let decision = router.route("cpu 時脈怎麼比較好", &intent(&[], &[], Topic::Cpu), &funnel);
        assert_eq!(decision, RouteDecision::Direct);
    }
}
