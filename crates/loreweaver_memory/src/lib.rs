pub mod context;
pub mod embedding;
pub mod semantic;
pub mod store;

pub use context::ContextAssembler;
pub use embedding::{cosine_similarity, Embedder, FastembedEmbedder, HashEmbedder};
pub use semantic::{SemanticEntry, SemanticHit, SemanticIndex, SqliteSemanticIndex};
pub use store::{SqliteStore, StoreError};
