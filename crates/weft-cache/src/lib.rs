//! Semantic response cache: deterministic embeddings plus a bounded,
//! mutex-guarded approximate-match store shared by all concurrent runs.

pub mod embedding;
pub mod store;

pub use embedding::{content_key, cosine_similarity, embed, normalize, EMBEDDING_DIMS};
pub use store::{CacheEntry, CacheHit, CacheStats, SemanticCache};
