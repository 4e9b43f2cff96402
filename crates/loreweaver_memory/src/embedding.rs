use anyhow::Result;
use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};
use std::sync::Arc;

pub type Embedding = Vec<f32>;

/// Text → vector. A trait seam so the semantic index (and its tests) can run
/// without downloading a model.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Embedding>;
}

/// Production embedder backed by fastembed.
#[derive(Clone)]
pub struct FastembedEmbedder {
    model: Arc<TextEmbedding>,
}

impl FastembedEmbedder {
    pub fn new() -> Result<Self> {
        // MultilingualE5Small: good general choice for mixed-language
        // summaries, small enough to load quickly.
        let mut options = InitOptions::default();
        options.model_name = FastEmbedModel::MultilingualE5Small;
        options.show_download_progress = true;

        let model = TextEmbedding::try_new(options)?;
        Ok(Self {
            model: Arc::new(model),
        })
    }
}

impl Embedder for FastembedEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let embeddings = self.model.embed(vec![text], None)?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Failed to generate embedding"))
    }
}

/// Deterministic offline embedder: hashed bag-of-words into a fixed-size
/// vector. Not semantically meaningful, but stable — identical texts always
/// land on the same vector, which is what air-gapped runs and tests need.
#[derive(Debug, Clone, Default)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub const DIM: usize = 64;
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut vector = vec![0.0f32; Self::DIM];
        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            vector[(h % Self::DIM as u64) as usize] += 1.0;
        }
        Ok(vector)
    }
}

/// Cosine similarity between two vectors: 1.0 = identical direction,
/// 0.0 on dimension mismatch or zero-norm input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 1.0, -0.25];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_handles_mismatched_and_empty_inputs() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn hash_embedder_is_deterministic() {
        let e = HashEmbedder;
        let a = e.embed("the tavern at dusk").unwrap();
        let b = e.embed("the tavern at dusk").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HashEmbedder::DIM);
    }

    #[test]
    fn hash_embedder_scores_shared_tokens_higher() {
        let e = HashEmbedder;
        let query = e.embed("betrayal at the docks").unwrap();
        let close = e.embed("a betrayal near the docks").unwrap();
        let far = e.embed("quiet morning in the garden").unwrap();
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }
}
