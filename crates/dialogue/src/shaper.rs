//! Final response shaping, including every rule-based fallback.
//!
//! Whatever went wrong upstream, the output of this module is a plain
//! [`DirectReply`] with the same shape an LLM-backed answer has. Fallbacks
//! are first-class output, not an error channel.

use lapadvisor_catalog::{COMPARISON_FIELDS, SkuRow};
use lapadvisor_intent::Topic;
use lapadvisor_prompt::{ParsedReply, TableRow};

use crate::reply::DirectReply;

/// A successfully parsed LLM reply passes through unchanged; the table is
/// already canonical at this point.
pub(crate) fn from_parsed(parsed: ParsedReply) -> DirectReply {
    DirectReply { summary: parsed.summary, table: parsed.table }
}

/// Catalog-only reply used when the LLM is unavailable or its output is
/// unusable. One row per relevant field, columns in target order.
pub(crate) fn fallback_from_rows(
    topic: Topic,
    rows: &[SkuRow],
    target_names: &[String],
) -> DirectReply {
    let fields: Vec<&str> = match topic.spec_field() {
        Some(field) => vec![field],
        None => COMPARISON_FIELDS.to_vec(),
    };

    let table = fields
        .iter()
        .map(|field| {
            let cells = target_names
                .iter()
                .map(|name| {
                    let value = rows
                        .iter()
                        .find(|row| &row.model_name == name)
                        .map(|row| row.field(field))
                        .filter(|value| !value.is_empty())
                        .unwrap_or("N/A");
                    (name.clone(), value.to_string())
                })
                .collect();
            TableRow::new(field.to_string(), cells)
        })
        .collect();

    DirectReply {
        summary: format!(
            "以下規格直接整理自產品目錄（未經模型分析）：{}。",
            target_names.join("、")
        ),
        table,
    }
}

/// The requested field is registered for none of the retrieved models.
pub(crate) fn data_unavailable(field: &str, names: &[String]) -> DirectReply {
    DirectReply::prose(format!(
        "目前資料庫尚未登錄 {} 的 {field} 資料，請改問其他規格或型號。",
        names.join("、")
    ))
}

/// Static enumeration of everything we sell.
pub(crate) fn catalog_listing(names: &[String], series: &[String]) -> DirectReply {
    DirectReply::prose(format!(
        "目前共有 {} 個型號：{}。系列代號：{}。",
        names.len(),
        names.join("、"),
        series.join("、")
    ))
}

/// The query cited series tokens we do not carry; name what exists instead.
pub(crate) fn unknown_series(tokens: &[String], known_series: &[String]) -> DirectReply {
    DirectReply::prose(format!(
        "找不到 {} 系列。目前提供的系列有：{}。",
        tokens.join("、"),
        known_series.join("、")
    ))
}

/// Retrieval came back with nothing at all.
pub(crate) fn service_unavailable() -> DirectReply {
    DirectReply::prose("服務暫時無法取得產品資料，請稍後再試。")
}
