//! Two-stage parse of the model's reply.
//!
//! Stage one strips the syntactically delimited `<think>` block and cuts the
//! reply down to its outermost JSON object. Stage two enforces the typed
//! shape, running a small bounded set of repair passes when strict decoding
//! fails. Anything the pipeline cannot make sense of is a typed error; the
//! shaper turns those into the rule-based fallback. No phrase heuristics.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

use crate::table::{TableRow, canonicalize_table};

/// How many times the repair passes may run before giving up.
const REPAIR_BUDGET: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no JSON object found in the model reply")]
    NoJson,
    #[error("model reply is not valid JSON after repair")]
    Syntax,
    #[error("model reply lacks a usable `summary` string")]
    BadSummary,
    #[error("model reply table has an unrecognized shape")]
    TableShape,
}

/// The validated reply: a prose summary plus the canonical table.
#[derive(Debug, Clone)]
pub struct ParsedReply {
    pub summary: String,
    pub table: Vec<TableRow>,
}

/// Parse a raw completion into a [`ParsedReply`], canonicalizing the table
/// against `target_names`.
pub fn parse_reply(raw: &str, target_names: &[String]) -> Result<ParsedReply, ParseError> {
    let visible = strip_thinking(raw);
    let candidate = extract_object(visible).ok_or(ParseError::NoJson)?;
    let value = decode_with_repair(candidate)?;

    let object = value.as_object().ok_or(ParseError::BadSummary)?;
    let summary = object
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::BadSummary)?
        .to_string();

    let table = match object.get("table") {
        None => Vec::new(),
        Some(table) => canonicalize_table(table, target_names)?,
    };

    Ok(ParsedReply { summary, table })
}

/// Drop everything up to and including the last `</think>` tag. Replies
/// without the tag pass through untouched.
fn strip_thinking(raw: &str) -> &str {
    match raw.rfind("</think>") {
        Some(position) => &raw[position + "</think>".len()..],
        None => raw,
    }
}

/// The substring from the first `{` to its matching `}`. When the braces
/// never balance, fall back to the last `}` in the text.
fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Strict decode first; on failure run the repair passes up to the budget.
/// Each pass is idempotent, so already-valid JSON round-trips unchanged.
fn decode_with_repair(candidate: &str) -> Result<Value, ParseError> {
    if let Ok(value) = serde_json::from_str(candidate) {
        return Ok(value);
    }

    let mut text = candidate.to_string();
    for attempt in 1..=REPAIR_BUDGET {
        text = repair_pass(&text);
        match serde_json::from_str(&text) {
            Ok(value) => {
                debug!(attempt, "model reply decoded after repair");
                return Ok(value);
            }
            Err(_) => continue,
        }
    }
    Err(ParseError::Syntax)
}

/// One round of mechanical JSON repair: quote bare keys, swap single for
/// double quotes, drop trailing commas, re-balance doubled braces.
fn repair_pass(text: &str) -> String {
    static BARE_KEY: OnceLock<Regex> = OnceLock::new();
    static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();

    let bare_key = BARE_KEY
        .get_or_init(|| Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_\-]*)\s*:"#).unwrap());
    let trailing_comma =
        TRAILING_COMMA.get_or_init(|| Regex::new(r#",\s*([}\]])"#).unwrap());

    let mut repaired = text.replace('\'', "\"");
    repaired = bare_key.replace_all(&repaired, "${1}\"${2}\":").into_owned();
    repaired = trailing_comma.replace_all(&repaired, "${1}").into_owned();
    balance_braces(repaired)
}

/// Trim one doubled brace from either end while the brace counts disagree.
/// Balanced text is returned untouched, which keeps the pass idempotent.
fn balance_braces(text: String) -> String {
    let opens = text.matches('{').count();
    let closes = text.matches('}').count();
    if opens > closes && text.starts_with("{{") {
        return text[1..].to_string();
    }
    if closes > opens && text.ends_with("}}") {
        return text[..text.len() - 1].to_string();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets() -> Vec<String> {
        vec!["AG958".to_string(), "APX958".to_string()]
    }

    #[test]
    fn clean_reply_parses_directly() {
        let raw = r#"{"summary": "ok", "table": [{"feature": "CPU", "AG958": "R7", "APX958": "R9"}]}"#;
        let reply = parse_reply(raw, &targets()).unwrap();
        assert_eq!(reply.summary, "ok");
        assert_eq!(reply.table.len(), 1);
    }

    #[test]
    fn thinking_block_is_discarded() {
        let raw = "<think>the user wants {not: this}</think> {\"summary\": \"ok\"}";
        let reply = parse_reply(raw, &targets()).unwrap();
        assert_eq!(reply.summary, "ok");
        assert!(reply.table.is_empty());
    }

    #[test]
    fn surrounding_prose_is_ignored() {
        let raw = "Sure! Here you go:\n{\"summary\": \"ok\", \"table\": []}\nHope that helps.";
        let reply = parse_reply(raw, &targets()).unwrap();
        assert_eq!(reply.summary, "ok");
    }

    #[test]
    fn unquoted_keys_and_single_quotes_are_repaired() {
        let raw = "<think>…</think> {summary: 'ok', table: {Feature:['CPU'], AG958:['X'], APX958:['Y']}}";
        let reply = parse_reply(raw, &targets()).unwrap();
        assert_eq!(reply.summary, "ok");
        assert_eq!(reply.table.len(), 1);
        assert_eq!(reply.table[0].feature, "CPU");
        assert_eq!(reply.table[0].cell("AG958"), Some("X"));
        assert_eq!(reply.table[0].cell("APX958"), Some("Y"));
    }

    #[test]
    fn trailing_commas_are_repaired() {
        let raw = r#"{"summary": "ok", "table": [{"feature": "CPU", "AG958": "R7", "APX958": "R9",},]}"#;
        let reply = parse_reply(raw, &targets()).unwrap();
        assert_eq!(reply.table.len(), 1);
    }

    #[test]
    fn doubled_braces_are_rebalanced() {
        let raw = r#"{{"summary": "ok", "table": []}"#;
        let reply = parse_reply(raw, &targets()).unwrap();
        assert_eq!(reply.summary, "ok");
    }

    #[test]
    fn repair_is_idempotent_on_valid_json() {
        let valid = r#"{"summary": "ok", "table": [{"feature": "CPU", "AG958": "R7", "APX958": "R9"}]}"#;
        let direct: Value = serde_json::from_str(valid).unwrap();
        let repaired: Value = serde_json::from_str(&repair_pass(valid)).unwrap();
        assert_eq!(direct, repaired);
    }

    #[test]
    fn reply_without_json_fails() {
        assert!(matches!(parse_reply("no object here", &targets()), Err(ParseError::NoJson)));
    }

    #[test]
    fn missing_summary_fails() {
        let raw = r#"{"table": []}"#;
        assert!(matches!(parse_reply(raw, &targets()), Err(ParseError::BadSummary)));
    }

    #[test]
    fn unrepairable_garbage_fails_with_syntax() {
        let raw = "{summary: [unterminated}";
        assert!(matches!(parse_reply(raw, &targets()), Err(ParseError::Syntax)));
    }

    #[test]
    fn missing_table_reads_as_empty() {
        let reply = parse_reply(r#"{"summary": "prose only"}"#, &targets()).unwrap();
        assert!(reply.table.is_empty());
    }

    #[test]
    fn unrecognized_table_shape_is_reported() {
        let raw = r#"{"summary": "ok", "table": "not a table"}"#;
        assert!(matches!(parse_reply(raw, &targets()), Err(ParseError::TableShape)));
    }
}
