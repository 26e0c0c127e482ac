//! Prompt assembly for the single completion call of a turn.
//!
//! The template comes from config and carries exactly two placeholders; this
//! module owns the layout of the `{context}` block and the reply-format
//! directives. Assembly is purely synchronous: retrieval happens before.

use lapadvisor_catalog::{COMPARISON_FIELDS, SPEC_FIELDS, SkuRow};
use lapadvisor_funnel::Preference;
use lapadvisor_intent::{Intent, Topic};

/// Longest field value injected into the context before clipping.
const MAX_CONTEXT_VALUE: usize = 200;

/// Everything the prompt needs, pre-computed by the caller.
pub struct PromptInputs<'a> {
    pub template: &'a str,
    pub query: &'a str,
    pub intent: &'a Intent,
    pub rows: &'a [SkuRow],
    pub target_names: &'a [String],
    /// Funnel selections, present only on the funnel-completion path.
    pub preferences: &'a [Preference],
}

/// Render the final prompt: intent-analysis directives, then the template
/// with `{context}` and `{query}` substituted.
pub fn build_prompt(inputs: &PromptInputs<'_>) -> String {
    let analysis = build_analysis_block(inputs);
    let context = build_context_block(inputs);
    let body = inputs
        .template
        .replace("{context}", &context)
        .replace("{query}", inputs.query);
    format!("{analysis}\n\n{body}")
}

fn build_analysis_block(inputs: &PromptInputs<'_>) -> String {
    let names = inputs.target_names.join(", ");
    format!(
        "INTENT: topic={topic}; models=[{names}].\n\
         Answer only about these models and this topic.\n\
         Reply with exactly one JSON object, no prose around it, shaped as:\n\
         {{\"summary\": \"<one short paragraph>\", \"table\": [{{\"feature\": \"<spec name>\"{columns}}}]}}\n\
         One table row per spec feature; cell values come verbatim from the data below.",
        topic = inputs.intent.topic.as_str(),
        columns = inputs
            .target_names
            .iter()
            .map(|name| format!(", \"{name}\": \"<value>\""))
            .collect::<String>(),
    )
}

fn build_context_block(inputs: &PromptInputs<'_>) -> String {
    let fields = projected_fields(inputs.intent.topic);
    let mut lines = Vec::new();

    for row in inputs.rows {
        lines.push(format!("### {}", row.model_name));
        for field in &fields {
            let value = row.field(field);
            if !value.is_empty() {
                lines.push(format!("- {field}: {}", truncate_for_prompt(value, MAX_CONTEXT_VALUE)));
            }
        }
    }

    if !inputs.preferences.is_empty() {
        lines.push("### 使用者偏好".to_string());
        for preference in inputs.preferences {
            lines.push(format!("- {}: {}", preference.question, preference.label));
        }
    }

    lines.join("\n")
}

/// Which spec fields the context carries: the topic's own field when it has
/// one, the comparison subset for broad questions, everything for an
/// explicit comparison.
fn projected_fields(topic: Topic) -> Vec<&'static str> {
    match topic {
        Topic::Comparison => SPEC_FIELDS.to_vec(),
        Topic::General | Topic::Unclear => COMPARISON_FIELDS.to_vec(),
        concrete => concrete
            .spec_field()
            .map(|field| vec![field])
            .unwrap_or_else(|| COMPARISON_FIELDS.to_vec()),
    }
}

/// Truncate `text` to at most `max_chars` characters, appending `…` when cut.
pub fn truncate_for_prompt(text: &str, max_chars: usize) -> String {
    let chars = text.chars().collect::<Vec<_>>();
    if chars.len() <= max_chars {
        return text.to_string();
    }
    let truncated: String = chars.into_iter().take(max_chars).collect();
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use lapadvisor_intent::QueryShape;

    use super::*;

    fn row(name: &str, fields: &[(&str, &str)]) -> SkuRow {
        let map: HashMap<String, String> =
            fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        SkuRow::new(name, map)
    }

    fn intent(topic: Topic) -> Intent {
        Intent {
            model_names: vec!["AG958".into()],
            series_keys: vec![],
            topic,
            shape: QueryShape::SpecificModel,
        }
    }

    #[test]
    fn placeholders_are_substituted() {
        let rows = [row("AG958", &[("cpu", "Ryzen 7 6800H")])];
        let targets = vec!["AG958".to_string()];
        let prompt = build_prompt(&PromptInputs {
            template: "DATA:\n{context}\n\nQUESTION: {query}",
            query: "AG958 的 CPU 是什麼？",
            intent: &intent(Topic::Cpu),
            rows: &rows,
            target_names: &targets,
            preferences: &[],
        });

        assert!(prompt.contains("QUESTION: AG958 的 CPU 是什麼？"));
        assert!(prompt.contains("- cpu: Ryzen 7 6800H"));
        assert!(!prompt.contains("{context}"));
        assert!(!prompt.contains("{query}"));
    }

    #[test]
    fn topic_field_projection_hides_unrelated_fields() {
        let rows = [row("AG958", &[("cpu", "Ryzen"), ("battery", "80Wh")])];
        let targets = vec!["AG958".to_string()];
        let prompt = build_prompt(&PromptInputs {
            template: "{context} {query}",
            query: "q",
            intent: &intent(Topic::Cpu),
            rows: &rows,
            target_names: &targets,
            preferences: &[],
        });
        assert!(prompt.contains("cpu"));
        assert!(!prompt.contains("battery"));
    }

    #[test]
    fn comparison_carries_all_fields() {
        let rows = [row("AG958", &[("cpu", "Ryzen"), ("thermal", "dual fan")])];
        let targets = vec!["AG958".to_string()];
        let prompt = build_prompt(&PromptInputs {
            template: "{context} {query}",
            query: "q",
            intent: &intent(Topic::Comparison),
            rows: &rows,
            target_names: &targets,
            preferences: &[],
        });
        assert!(prompt.contains("thermal: dual fan"));
    }

    #[test]
    fn preferences_appear_on_funnel_completions() {
        let rows = [row("AG958", &[("cpu", "Ryzen")])];
        let targets = vec!["AG958".to_string()];
        let preferences = [Preference {
            feature_id: "weight".into(),
            question: "重量要求？".into(),
            option_id: "light".into(),
            label: "輕薄".into(),
        }];
        let prompt = build_prompt(&PromptInputs {
            template: "{context} {query}",
            query: "q",
            intent: &intent(Topic::General),
            rows: &rows,
            target_names: &targets,
            preferences: &preferences,
        });
        assert!(prompt.contains("重量要求？: 輕薄"));
    }

    #[test]
    fn analysis_block_names_the_target_columns() {
        let rows = [row("AG958", &[("cpu", "Ryzen")])];
        let targets = vec!["AG958".to_string(), "APX958".to_string()];
        let prompt = build_prompt(&PromptInputs {
            template: "{context} {query}",
            query: "q",
            intent: &intent(Topic::Comparison),
            rows: &rows,
            target_names: &targets,
            preferences: &[],
        });
        assert!(prompt.contains("models=[AG958, APX958]"));
        assert!(prompt.contains("\"APX958\": \"<value>\""));
    }

    #[test]
    fn long_values_are_clipped_in_context() {
        let long = "x".repeat(400);
        let rows = [row("AG958", &[("cpu", long.as_str())])];
        let targets = vec!["AG958".to_string()];
        let prompt = build_prompt(&PromptInputs {
            template: "{context} {query}",
            query: "q",
            intent: &intent(Topic::Cpu),
            rows: &rows,
            target_names: &targets,
            preferences: &[],
        });
        assert!(prompt.contains('…'));
        assert!(!prompt.contains(&long));
    }
}
