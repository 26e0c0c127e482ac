use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::parser::ParseError;

/// Fill value for cells the model (or the catalog) left blank.
const MISSING_CELL: &str = "N/A";

/// One canonical comparison-table row: the feature label plus one cell per
/// compared SKU, in the retrieval planner's column order. Cells keep their
/// full text; display truncation is a projection, not a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub feature: String,
    /// `(model name, value)` pairs in target-name order.
    pub cells: Vec<(String, String)>,
}

impl TableRow {
    pub fn new(feature: impl Into<String>, cells: Vec<(String, String)>) -> Self {
        Self { feature: feature.into(), cells }
    }

    /// The cell for one model, if that column exists.
    pub fn cell(&self, model_name: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == model_name)
            .map(|(_, value)| value.as_str())
    }

    /// Copy of this row with every cell clipped to `width` characters for
    /// rendering. The ellipsis counts toward nothing; callers keep `self`
    /// for the full values.
    pub fn clipped(&self, width: usize) -> Self {
        Self {
            feature: self.feature.clone(),
            cells: self
                .cells
                .iter()
                .map(|(name, value)| (name.clone(), clip(value, width)))
                .collect(),
        }
    }
}

// Keys serialize in row order: `feature` first, then the SKU columns.
impl Serialize for TableRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len() + 1))?;
        map.serialize_entry("feature", &self.feature)?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

fn clip(text: &str, width: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= width {
        return text.to_string();
    }
    let mut clipped: String = chars.into_iter().take(width).collect();
    clipped.push('…');
    clipped
}

/// Convert any accepted table shape into the canonical row list.
///
/// Accepted shapes:
/// - canonical: `[{feature, name1, name2, …}, …]`
/// - transposed: `{Feature: [f1, …], name1: [v11, …], …}`
/// - single row: `{feature, name1, …}`
///
/// Column order is forced to `feature` followed by `target_names`; cells the
/// source lacks become `"N/A"`, columns outside `target_names` are dropped.
pub fn canonicalize_table(value: &Value, target_names: &[String]) -> Result<Vec<TableRow>, ParseError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => row_from_object(map, target_names),
                _ => Err(ParseError::TableShape),
            })
            .collect(),
        Value::Object(map) => {
            if map.values().any(Value::is_array) {
                pivot_transposed(map, target_names)
            } else {
                Ok(vec![row_from_object(map, target_names)?])
            }
        }
        _ => Err(ParseError::TableShape),
    }
}

fn row_from_object(
    map: &serde_json::Map<String, Value>,
    target_names: &[String],
) -> Result<TableRow, ParseError> {
    let feature = map
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("feature"))
        .map(|(_, value)| cell_text(value))
        .ok_or(ParseError::TableShape)?;

    let cells = target_names
        .iter()
        .map(|name| {
            let value = map
                .get(name)
                .map(cell_text)
                .unwrap_or_else(|| MISSING_CELL.to_string());
            (name.clone(), value)
        })
        .collect();
    Ok(TableRow { feature, cells })
}

/// Pivot `{Feature: [...], name: [...]}` into row-major form. Every column
/// must be an array; rows beyond a short column read as `"N/A"`.
fn pivot_transposed(
    map: &serde_json::Map<String, Value>,
    target_names: &[String],
) -> Result<Vec<TableRow>, ParseError> {
    let features = map
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("feature") || key.eq_ignore_ascii_case("features"))
        .map(|(_, value)| value.as_array().ok_or(ParseError::TableShape))
        .ok_or(ParseError::TableShape)??;

    for (key, value) in map {
        if !key.eq_ignore_ascii_case("feature") && !key.eq_ignore_ascii_case("features") && !value.is_array() {
            return Err(ParseError::TableShape);
        }
    }

    let mut rows = Vec::with_capacity(features.len());
    for (index, feature) in features.iter().enumerate() {
        let cells = target_names
            .iter()
            .map(|name| {
                let value = map
                    .get(name)
                    .and_then(|column| column.as_array())
                    .and_then(|column| column.get(index))
                    .map(cell_text)
                    .unwrap_or_else(|| MISSING_CELL.to_string());
                (name.clone(), value)
            })
            .collect();
        rows.push(TableRow { feature: cell_text(feature), cells });
    }
    Ok(rows)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => MISSING_CELL.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn targets() -> Vec<String> {
        vec!["AG958".to_string(), "APX958".to_string()]
    }

    #[test]
    fn canonical_shape_passes_through() {
        let value = json!([{"feature": "CPU", "AG958": "R7", "APX958": "R9"}]);
        let rows = canonicalize_table(&value, &targets()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].feature, "CPU");
        assert_eq!(rows[0].cell("AG958"), Some("R7"));
        assert_eq!(rows[0].cell("APX958"), Some("R9"));
    }

    #[test]
    fn transposed_shape_pivots() {
        let value = json!({
            "Feature": ["CPU", "GPU"],
            "AG958": ["R7", "RX 6800M"],
            "APX958": ["R9", "RX 6850M XT"]
        });
        let rows = canonicalize_table(&value, &targets()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].feature, "GPU");
        assert_eq!(rows[1].cell("AG958"), Some("RX 6800M"));
    }

    #[test]
    fn single_row_dict_wraps() {
        let value = json!({"feature": "CPU", "AG958": "R7", "APX958": "R9"});
        let rows = canonicalize_table(&value, &targets()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cell("APX958"), Some("R9"));
    }

    #[test]
    fn missing_cells_fill_with_na() {
        let value = json!([{"feature": "CPU", "AG958": "R7"}]);
        let rows = canonicalize_table(&value, &targets()).unwrap();
        assert_eq!(rows[0].cell("APX958"), Some("N/A"));
    }

    #[test]
    fn short_transposed_columns_fill_with_na() {
        let value = json!({
            "Feature": ["CPU", "GPU"],
            "AG958": ["R7"],
            "APX958": ["R9", "RX"]
        });
        let rows = canonicalize_table(&value, &targets()).unwrap();
        assert_eq!(rows[1].cell("AG958"), Some("N/A"));
    }

    #[test]
    fn extra_columns_are_dropped() {
        let value = json!([{"feature": "CPU", "AG958": "R7", "APX958": "R9", "GHOST": "boo"}]);
        let rows = canonicalize_table(&value, &targets()).unwrap();
        assert_eq!(rows[0].cells.len(), 2);
        assert_eq!(rows[0].cell("GHOST"), None);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let value = json!([{"feature": "CPU", "AG958": "R7", "APX958": "R9"}]);
        let once = canonicalize_table(&value, &targets()).unwrap();
        let again = canonicalize_table(&serde_json::to_value(&once).unwrap(), &targets()).unwrap();
        assert_eq!(once, again);
    }

    #[test]
    fn scalar_table_is_rejected() {
        assert!(canonicalize_table(&json!("nope"), &targets()).is_err());
        assert!(canonicalize_table(&json!([1, 2]), &targets()).is_err());
    }

    #[test]
    fn row_without_feature_key_is_rejected() {
        let value = json!([{"AG958": "R7"}]);
        assert!(canonicalize_table(&value, &targets()).is_err());
    }

    #[test]
    fn serialized_rows_lead_with_feature() {
        let row = TableRow::new("CPU", vec![("AG958".to_string(), "R7".to_string())]);
        let rendered = serde_json::to_string(&row).unwrap();
        assert!(rendered.starts_with("{\"feature\":\"CPU\""));
    }

    #[test]
    fn clipping_appends_an_ellipsis() {
        let row = TableRow::new(
            "CPU",
            vec![("AG958".to_string(), "0123456789".to_string())],
        );
        let clipped = row.clipped(4);
        assert_eq!(clipped.cell("AG958"), Some("0123…"));
        // Original row keeps the full value.
        assert_eq!(row.cell("AG958"), Some("0123456789"));
    }

    #[test]
    fn numbers_and_nulls_stringify() {
        let value = json!([{"feature": "TDP", "AG958": 54, "APX958": null}]);
        let rows = canonicalize_table(&value, &targets()).unwrap();
        assert_eq!(rows[0].cell("AG958"), Some("54"));
        assert_eq!(rows[0].cell("APX958"), Some("N/A"));
    }
}
