use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use lapadvisor_catalog::is_spec_field;

use crate::filter::MatchRule;

/// The closed scenario set. Priorities in the funnel artifact must key on
/// these names exactly.
pub const SCENARIOS: &[&str] = &["gaming", "business", "study", "creation", "general"];

/// Keywords and operator notes for one intent topic.
///
/// Declaration order in the file is authoritative for topic tie-breaking, so
/// the map type must preserve it.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicKeywords {
    pub keywords: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// Compiled entity patterns. Invalid regexes are dropped at load with a
/// warning; the two required kinds must at least be present as keys.
#[derive(Debug)]
pub struct EntityPatterns {
    pub model_name: Vec<Regex>,
    pub series_key: Vec<Regex>,
}

#[derive(Debug, Clone, Deserialize)]
struct PatternSpec {
    patterns: Vec<String>,
    #[serde(default)]
    #[allow(dead_code)]
    examples: Vec<String>,
}

/// One funnel question as configured.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionSpec {
    pub question: String,
    pub options: Vec<OptionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptionSpec {
    pub option_id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    /// Partial predicate over SKU rows: spec field → match rule.
    #[serde(default)]
    pub filter: IndexMap<String, MatchRule>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TriggerKeywords {
    #[serde(default)]
    pub vague: Vec<String>,
    #[serde(default)]
    pub comparison: Vec<String>,
    #[serde(default)]
    pub list_all: Vec<String>,
}

/// The funnel artifact: questions, per-scenario orderings, and the trigger
/// vocabularies the router and activation check consume.
#[derive(Debug, Deserialize)]
pub struct FunnelArtifact {
    pub features: IndexMap<String, QuestionSpec>,
    pub priorities: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub trigger_keywords: TriggerKeywords,
    #[serde(default)]
    pub scenario_keywords: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub lifestyle_topics: Vec<String>,
}

/// The four startup artifacts, loaded once and immutable thereafter.
/// Schema drift in any of them refuses startup with a precise message.
#[derive(Debug)]
pub struct DialogueArtifacts {
    pub intent_keywords: IndexMap<String, TopicKeywords>,
    pub entity_patterns: EntityPatterns,
    pub funnel: FunnelArtifact,
    pub prompt_template: String,
}

impl DialogueArtifacts {
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let intent_keywords = load_intent_keywords(&dir.join("intent_keywords.json"))?;
        let entity_patterns = load_entity_patterns(&dir.join("entity_patterns.json"))?;
        let funnel = load_funnel(&dir.join("funnel_features.json"))?;
        let prompt_template = load_template(&dir.join("prompt_template.txt"))?;

        info!(
            topics = intent_keywords.len(),
            features = funnel.features.len(),
            scenarios = funnel.priorities.len(),
            "dialogue artifacts loaded"
        );
        Ok(Self { intent_keywords, entity_patterns, funnel, prompt_template })
    }
}

fn load_intent_keywords(path: &Path) -> Result<IndexMap<String, TopicKeywords>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("opening intent keywords at {}", path.display()))?;
    let map: IndexMap<String, TopicKeywords> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing intent keywords at {}", path.display()))?;
    if map.is_empty() {
        warn!(path = %path.display(), "intent keyword map is empty, every query will read as general");
    }
    Ok(map)
}

fn load_entity_patterns(path: &Path) -> Result<EntityPatterns> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("opening entity patterns at {}", path.display()))?;
    let mut specs: IndexMap<String, PatternSpec> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing entity patterns at {}", path.display()))?;

    let mut take = |kind: &str| -> Result<Vec<Regex>> {
        let spec = specs
            .shift_remove(kind)
            .with_context(|| format!("entity patterns at {} lack the `{kind}` kind", path.display()))?;
        let mut compiled = Vec::new();
        for pattern in spec.patterns {
            match Regex::new(&pattern) {
                Ok(regex) => compiled.push(regex),
                Err(error) => {
                    warn!(kind, %pattern, %error, "dropping invalid entity pattern");
                }
            }
        }
        Ok(compiled)
    };

    let model_name = take("MODEL_NAME")?;
    let series_key = take("SERIES_KEY")?;
    for leftover in specs.keys() {
        warn!(kind = %leftover, "ignoring unknown entity kind");
    }
    Ok(EntityPatterns { model_name, series_key })
}

fn load_funnel(path: &Path) -> Result<FunnelArtifact> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("opening funnel features at {}", path.display()))?;
    let artifact: FunnelArtifact = serde_json::from_str(&raw)
        .with_context(|| format!("parsing funnel features at {}", path.display()))?;

    for (feature_id, spec) in &artifact.features {
        if spec.options.is_empty() {
            bail!("funnel feature `{feature_id}` has no options");
        }
        let mut seen = HashSet::new();
        for option in &spec.options {
            if !seen.insert(option.option_id.as_str()) {
                bail!(
                    "funnel feature `{feature_id}` repeats option id `{}`",
                    option.option_id
                );
            }
            for field in option.filter.keys() {
                if !is_spec_field(field) {
                    bail!(
                        "funnel option `{feature_id}/{}` filters on unknown spec field `{field}`",
                        option.option_id
                    );
                }
            }
        }
    }

    for (scenario, order) in &artifact.priorities {
        if !SCENARIOS.contains(&scenario.as_str()) {
            bail!("funnel priorities key on unknown scenario `{scenario}`");
        }
        for feature_id in order {
            if !artifact.features.contains_key(feature_id) {
                warn!(%scenario, %feature_id, "priority references an unknown feature, it will be skipped");
            }
        }
    }

    Ok(artifact)
}

fn load_template(path: &Path) -> Result<String> {
    let template = fs::read_to_string(path)
        .with_context(|| format!("opening prompt template at {}", path.display()))?;
    for placeholder in ["{context}", "{query}"] {
        if !template.contains(placeholder) {
            bail!(
                "prompt template at {} is missing the `{placeholder}` placeholder",
                path.display()
            );
        }
    }
    Ok(template)
}
