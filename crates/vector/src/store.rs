use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

use lapadvisor_catalog::CatalogStore;

use crate::embed::{EMBED_DIM, cosine_similarity, embed_fields, embed_text};

/// Spec fields concatenated into each SKU's embedded document. Fixed at
/// startup; re-index after changing.
pub const EMBED_SOURCE_FIELDS: &[&str] =
    &["cpu", "gpu", "memory", "storage", "lcd", "battery", "weight", "price"];

/// One persisted `(model_name, embedding)` tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    model_name: String,
    embedding: Vec<f32>,
}

/// Approximate-similarity index over the catalog's embedded spec text.
///
/// Used strictly as a re-ranker: callers take the top-k hits and intersect
/// them with catalog-confirmed rows. Read-only after construction.
#[derive(Debug, Default)]
pub struct VectorStore {
    entries: Vec<VectorEntry>,
}

impl VectorStore {
    /// Load a prebuilt index from a JSON array of `{model_name, embedding}`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("opening vector index at {}", path.display()))?;
        let entries: Vec<VectorEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing vector index at {}", path.display()))?;
        for entry in &entries {
            if entry.embedding.len() != EMBED_DIM {
                bail!(
                    "vector index entry `{}` has dimension {} (expected {EMBED_DIM})",
                    entry.model_name,
                    entry.embedding.len(),
                );
            }
        }
        info!(entries = entries.len(), path = %path.display(), "vector index loaded");
        Ok(Self { entries })
    }

    /// Embed the catalog in-process. Equivalent to loading an index that the
    /// ingestion layer precomputed with the same embedder.
    pub fn from_catalog(catalog: &CatalogStore) -> Self {
        let entries: Vec<VectorEntry> = catalog
            .all()
            .into_iter()
            .map(|row| VectorEntry {
                model_name: row.model_name.clone(),
                embedding: embed_fields(EMBED_SOURCE_FIELDS.iter().map(|f| row.field(f))),
            })
            .collect();
        info!(entries = entries.len(), "vector index built from catalog");
        Self { entries }
    }

    /// Up to `k` hits sorted by decreasing similarity; ties break on model
    /// name ascending so results are deterministic.
    pub fn search(&self, text: &str, k: usize) -> Vec<(String, f32)> {
        let query = embed_text(text);
        let mut scored: Vec<(String, f32)> = self
            .entries
            .iter()
            .map(|entry| {
                (entry.model_name.clone(), cosine_similarity(&entry.embedding, &query))
            })
            .collect();
        scored.sort_by(|(an, asc), (bn, bsc)| {
            bsc.total_cmp(asc).then_with(|| an.cmp(bn))
        });
        scored.truncate(k);
        scored
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use lapadvisor_catalog::SkuRow;

    use super::*;

    fn catalog() -> CatalogStore {
        let mk = |name: &str, cpu: &str, gpu: &str| {
            let mut fields = HashMap::new();
            fields.insert("cpu".to_string(), cpu.to_string());
            fields.insert("gpu".to_string(), gpu.to_string());
            SkuRow::new(name, fields)
        };
        CatalogStore::from_rows(vec![
            mk("AG958", "Ryzen 7 6800H", "Radeon RX 6800M gaming"),
            mk("APX958", "Ryzen 9 6900HX", "Radeon RX 6850M XT gaming"),
            mk("APX819: FP7R2", "Ryzen 5 7535HS", "Radeon 660M integrated"),
        ])
        .unwrap()
    }

    #[test]
    fn search_returns_at_most_k_hits() {
        let store = VectorStore::from_catalog(&catalog());
        assert_eq!(store.search("Ryzen gaming", 2).len(), 2);
    }

    #[test]
    fn scores_are_sorted_descending() {
        let store = VectorStore::from_catalog(&catalog());
        let hits = store.search("Radeon RX gaming", 3);
        for pair in hits.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn equal_scores_tie_break_on_name() {
        let store = VectorStore::from_catalog(&catalog());
        // A query with no overlap scores 0.0 everywhere.
        let hits = store.search("zzzz", 3);
        let names: Vec<&str> = hits.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["AG958", "APX819: FP7R2", "APX958"]);
    }
}
