//! Maps a resolved intent onto concrete catalog rows.
//!
//! The planner performs no prompting itself: it decides which SKUs a turn is
//! about, in which column order they will appear, and whether the requested
//! data exists at all. Exact catalog matches always win; the vector index is
//! only a re-ranker for broad queries.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use lapadvisor_catalog::{CatalogStore, SkuRow};
use lapadvisor_config::RetrievalSettings;
use lapadvisor_funnel::FunnelOutcome;
use lapadvisor_intent::{Intent, QueryShape, Topic};
use lapadvisor_vector::VectorStore;

/// A resolved retrieval: the rows to present and the column order.
#[derive(Debug, Clone)]
pub struct Plan {
    pub rows: Vec<SkuRow>,
    pub target_names: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PlanError {
    /// The topic names a spec field and every retrieved row is blank there.
    /// The shaper answers directly from this without calling the LLM.
    #[error("no `{field}` data registered for {}", names.join(", "))]
    DataUnavailable { field: &'static str, names: Vec<String> },
    /// Nothing survived retrieval at all.
    #[error("retrieval produced no rows")]
    NoRows,
}

pub struct RetrievalPlanner {
    catalog: Arc<CatalogStore>,
    vector: Option<Arc<VectorStore>>,
    settings: RetrievalSettings,
}

impl RetrievalPlanner {
    pub fn new(
        catalog: Arc<CatalogStore>,
        vector: Option<Arc<VectorStore>>,
        settings: RetrievalSettings,
    ) -> Self {
        Self { catalog, vector, settings }
    }

    /// Resolve `intent` (optionally carrying a completed funnel) into rows.
    /// `query` is the text used for vector enrichment; callers pass the
    /// enhanced query when one exists.
    pub fn plan(
        &self,
        intent: &Intent,
        funnel: Option<&FunnelOutcome>,
        query: &str,
    ) -> Result<Plan, PlanError> {
        let mut rows: Vec<SkuRow> = match (funnel, intent.shape) {
            (None, QueryShape::SpecificModel) => self
                .catalog
                .by_name(intent.model_names.iter().map(String::as_str))
                .into_iter()
                .cloned()
                .collect(),
            (None, QueryShape::Series) => self
                .catalog
                .by_series(intent.series_keys.iter().map(String::as_str))
                .into_iter()
                .cloned()
                .collect(),
            (funnel, _) => self.filtered_rows(funnel),
        };

        if rows.is_empty() {
            return Err(PlanError::NoRows);
        }

        if matches!(intent.topic, Topic::General | Topic::Unclear) && rows.len() > 1 {
            self.enrich(&mut rows, query);
        }

        if let Some(field) = intent.topic.spec_field() {
            if rows.iter().all(|row| !row.has_value(field)) {
                let names = rows.into_iter().map(|row| row.model_name).collect();
                return Err(PlanError::DataUnavailable { field, names });
            }
        }

        let target_names = rows.iter().map(|row| row.model_name.clone()).collect();
        Ok(Plan { rows, target_names })
    }

    /// Funnel-completion path: conjunction of the collected filters over the
    /// whole catalog, falling back to the configured default series when the
    /// filters are empty or match nothing.
    fn filtered_rows(&self, funnel: Option<&FunnelOutcome>) -> Vec<SkuRow> {
        let filters = funnel.map(|f| f.filters.as_slice()).unwrap_or(&[]);

        let survivors: Vec<SkuRow> = if filters.is_empty() {
            Vec::new()
        } else {
            self.catalog
                .all()
                .into_iter()
                .filter(|row| {
                    filters.iter().all(|(field, rule)| rule.matches(row.field(field)))
                })
                .cloned()
                .collect()
        };

        if survivors.is_empty() {
            debug!(
                default_series = ?self.settings.default_series,
                "filters matched nothing, falling back to default series"
            );
            return self
                .catalog
                .by_series(self.settings.default_series.iter().map(String::as_str))
                .into_iter()
                .cloned()
                .collect();
        }
        survivors
    }

    /// Move vector-ranked survivors to the front, preserving catalog order
    /// for the rest. Hits outside the survivor set are discarded, and a
    /// missing index quietly skips enrichment.
    fn enrich(&self, rows: &mut Vec<SkuRow>, query: &str) {
        let Some(vector) = &self.vector else {
            warn!("vector index unavailable, skipping enrichment");
            return;
        };

        let hits = vector.search(query, self.settings.vector_k);
        let mut reordered: Vec<SkuRow> = Vec::with_capacity(rows.len());
        for (name, _score) in &hits {
            if let Some(pos) = rows.iter().position(|row| &row.model_name == name) {
                reordered.push(rows.remove(pos));
            }
        }
        reordered.append(rows);
        *rows = reordered;
        debug!(hits = hits.len(), "vector enrichment reordered retrieval");
    }
}
