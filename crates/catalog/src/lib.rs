mod schema;
mod store;

pub use schema::{COMPARISON_FIELDS, SPEC_FIELDS, SkuRow, derive_series_key, is_spec_field};
pub use store::CatalogStore;
