mod embed;
mod store;

pub use embed::{EMBED_DIM, cosine_similarity, embed_fields, embed_text};
pub use store::{EMBED_SOURCE_FIELDS, VectorStore};
