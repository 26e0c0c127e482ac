mod extractor;
mod record;

pub use extractor::IntentExtractor;
pub use record::{Intent, QueryShape, Topic};
