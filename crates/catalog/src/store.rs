use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::schema::{SkuRow, is_spec_field};

/// Sentinel spellings scrubbed to `""` at load so storage never carries them.
const SENTINELS: &[&str] = &["n/a", "na", "-", "tbd", "無"];

/// Read-only view over the catalog, keyed by model name.
///
/// Built once at startup; the name and series sets are derived during load
/// and immutable for the rest of the process lifetime. Construction failure
/// is fatal, query-time operations cannot fail.
#[derive(Debug)]
pub struct CatalogStore {
    rows: Vec<SkuRow>,
    by_name: HashMap<String, usize>,
    names: Arc<BTreeSet<String>>,
    series: Arc<BTreeSet<String>>,
}

impl CatalogStore {
    /// Load the catalog from a CSV file with a `model_name` column plus one
    /// column per spec field. Unknown columns are ignored with a warning.
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening catalog at {}", path.display()))?;
        Self::from_csv_reader(file)
            .with_context(|| format!("reading catalog at {}", path.display()))
    }

    /// Parse catalog CSV from any reader. Split out from [`Self::load_csv`]
    /// so tests can feed in-memory bytes.
    pub fn from_csv_reader(reader: impl Read) -> Result<Self> {
        let mut csv = csv::Reader::from_reader(reader);
        let headers = csv.headers().context("reading catalog header row")?.clone();

        let name_col = headers
            .iter()
            .position(|h| h == "model_name")
            .context("catalog is missing the required `model_name` column")?;
        for header in headers.iter() {
            if header != "model_name" && !is_spec_field(header) {
                warn!(column = header, "ignoring unknown catalog column");
            }
        }

        let mut rows: Vec<SkuRow> = Vec::new();
        let mut skipped = 0usize;
        for record in csv.records() {
            let record = record.context("reading catalog record")?;
            let name = record.get(name_col).unwrap_or("").trim();
            if name.is_empty() || name.starts_with("Test ") || name == "Test Model" {
                skipped += 1;
                continue;
            }

            let mut fields = HashMap::new();
            for (i, header) in headers.iter().enumerate() {
                if i == name_col || !is_spec_field(header) {
                    continue;
                }
                let value = scrub_sentinel(record.get(i).unwrap_or(""));
                if !value.is_empty() {
                    fields.insert(header.to_string(), value);
                }
            }
            rows.push(SkuRow::new(name, fields));
        }

        debug!(skipped, "filtered placeholder catalog rows");
        Self::from_rows(rows)
    }

    /// Build a store from pre-constructed rows. Duplicate model names keep
    /// the first occurrence.
    pub fn from_rows(rows: Vec<SkuRow>) -> Result<Self> {
        if rows.is_empty() {
            bail!("catalog contains no usable rows");
        }

        let mut deduped: Vec<SkuRow> = Vec::with_capacity(rows.len());
        let mut by_name = HashMap::new();
        for row in rows {
            if by_name.contains_key(&row.model_name) {
                warn!(model = %row.model_name, "duplicate model name in catalog, keeping first");
                continue;
            }
            by_name.insert(row.model_name.clone(), deduped.len());
            deduped.push(row);
        }

        let names: BTreeSet<String> = deduped.iter().map(|r| r.model_name.clone()).collect();
        let series: BTreeSet<String> =
            deduped.iter().filter_map(|r| r.series_key.clone()).collect();

        info!(models = names.len(), series = series.len(), "catalog loaded");
        Ok(Self {
            rows: deduped,
            by_name,
            names: Arc::new(names),
            series: Arc::new(series),
        })
    }

    /// Rows whose model name is in `names`, preserving input order.
    /// Unknown names are silently skipped.
    pub fn by_name<'a, I>(&self, names: I) -> Vec<&SkuRow>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .filter_map(|name| self.by_name.get(name).map(|&i| &self.rows[i]))
            .collect()
    }

    /// All rows whose series key is in `keys`, ordered by model name.
    pub fn by_series<'a, I>(&self, keys: I) -> Vec<&SkuRow>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let wanted: BTreeSet<&str> = keys.into_iter().collect();
        let mut hits: Vec<&SkuRow> = self
            .rows
            .iter()
            .filter(|r| r.series_key.as_deref().is_some_and(|k| wanted.contains(k)))
            .collect();
        hits.sort_by(|a, b| a.model_name.cmp(&b.model_name));
        hits
    }

    /// Every row in stable alphabetic order.
    pub fn all(&self) -> Vec<&SkuRow> {
        let mut rows: Vec<&SkuRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| a.model_name.cmp(&b.model_name));
        rows
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    pub fn series(&self) -> &BTreeSet<String> {
        &self.series
    }

    /// Shared handle to the immutable name set, for injection into the
    /// extractor and router.
    pub fn shared_names(&self) -> Arc<BTreeSet<String>> {
        Arc::clone(&self.names)
    }

    pub fn shared_series(&self) -> Arc<BTreeSet<String>> {
        Arc::clone(&self.series)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn scrub_sentinel(raw: &str) -> String {
    let trimmed = raw.trim();
    if SENTINELS.contains(&trimmed.to_lowercase().as_str()) {
        String::new()
    } else {
        trimmed.to_string()
    }
}
