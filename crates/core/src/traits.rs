use crate::error::SearchError;
use crate::models::{SearchCandidate, TextChunk};
use async_trait::async_trait;

/// Vector-store seam: one fixed-dimensionality collection scored by cosine
/// distance. Kept narrow so retrieval and evaluation can run against fakes.
#[async_trait]
pub trait VectorIndex {
    async fn index_chunks(
        &self,
        chunks: &[TextChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError>;

    async fn search_vector(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchCandidate>, SearchError>;
}
