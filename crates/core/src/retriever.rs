use crate::embeddings::Embedder;
use crate::error::SearchError;
use crate::llm::LlmClient;
use crate::models::{SearchCandidate, SearchQuery};
use crate::traits::VectorIndex;
use std::collections::HashMap;

pub const DEFAULT_QUERY_VARIANTS: usize = 3;

const EXPANSION_SYSTEM_PROMPT: &str = "You rewrite search queries. Given a user \
question, produce alternative phrasings that could retrieve relevant passages \
from a vector index. Reply with one phrasing per line and nothing else.";

/// Embed the query, search the store, return the ranked candidates.
pub struct Retriever<V, E> {
    store: V,
    embedder: E,
}

impl<V, E> Retriever<V, E>
where
    V: VectorIndex + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub fn new(store: V, embedder: E) -> Self {
        Self { store, embedder }
    }

    pub async fn retrieve(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<SearchCandidate>, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let query_vector = self.embedder.embed(&query.text);
        self.store.search_vector(&query_vector, query.top_k).await
    }
}

/// Expands one query into several phrasings through an LLM, retrieves per
/// phrasing, and fuses the ranked lists with reciprocal-rank fusion.
pub struct MultiQueryRetriever<V, E> {
    retriever: Retriever<V, E>,
    llm: LlmClient,
    variant_count: usize,
}

impl<V, E> MultiQueryRetriever<V, E>
where
    V: VectorIndex + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub fn new(retriever: Retriever<V, E>, llm: LlmClient) -> Self {
        Self {
            retriever,
            llm,
            variant_count: DEFAULT_QUERY_VARIANTS,
        }
    }

    pub fn with_variant_count(mut self, variant_count: usize) -> Self {
        self.variant_count = variant_count.max(1);
        self
    }

    pub async fn retrieve(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<SearchCandidate>, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let variants = self.expand_query(&query.text).await?;
        self.retrieve_variants(query, &variants).await
    }

    /// Retrieve each phrasing and fuse. The original query is expected to be
    /// among the variants; `retrieve` always puts it first.
    pub async fn retrieve_variants(
        &self,
        query: &SearchQuery,
        variants: &[String],
    ) -> Result<Vec<SearchCandidate>, SearchError> {
        let mut fused: HashMap<String, FusedHit> = HashMap::new();

        for variant in variants {
            let hits = self
                .retriever
                .retrieve(&SearchQuery::new(variant.clone(), query.top_k))
                .await?;
            apply_rrf(&mut fused, &hits);
        }

        let mut merged: Vec<FusedHit> = fused.into_values().collect();
        merged.sort_by(|left, right| right.score.total_cmp(&left.score));

        Ok(merged
            .into_iter()
            .take(query.top_k)
            .map(|hit| SearchCandidate {
                chunk_id: hit.chunk_id,
                source_path: hit.source_path,
                document_number: hit.document_number,
                score: hit.score,
                content: hit.content,
            })
            .collect())
    }

    async fn expand_query(&self, text: &str) -> Result<Vec<String>, SearchError> {
        let prompt = format!(
            "Generate {count} alternative phrasings of this search query:\n\n{text}",
            count = self.variant_count,
        );
        let response = self.llm.complete(Some(EXPANSION_SYSTEM_PROMPT), &prompt).await?;

        let mut variants = vec![text.to_string()];
        for variant in parse_query_variants(&response, self.variant_count) {
            if variant != text {
                variants.push(variant);
            }
        }
        Ok(variants)
    }
}

#[derive(Debug)]
struct FusedHit {
    chunk_id: String,
    source_path: String,
    document_number: u64,
    content: String,
    score: f64,
}

/// Reciprocal-rank fusion over one ranked list. Every variant's list weighs
/// equally; the raw store score contributes only as a small tiebreaker.
fn apply_rrf(target: &mut HashMap<String, FusedHit>, hits: &[SearchCandidate]) {
    const K: f64 = 60.0;

    for (position, hit) in hits.iter().enumerate() {
        let rank_component = 1.0 / (K + (position as f64 + 1.0));

        let entry = target.entry(hit.chunk_id.clone()).or_insert(FusedHit {
            chunk_id: hit.chunk_id.clone(),
            source_path: hit.source_path.clone(),
            document_number: hit.document_number,
            content: hit.content.clone(),
            score: 0.0,
        });

        entry.score += rank_component + (hit.score * 0.01);
    }
}

/// One variant per line; list markers and numbering are tolerated and
/// stripped, duplicates and blanks dropped.
fn parse_query_variants(response: &str, max: usize) -> Vec<String> {
    let mut variants = Vec::new();

    for line in response.lines() {
        let cleaned = line
            .trim()
            .trim_start_matches(|character: char| {
                character.is_ascii_digit()
                    || character == '.'
                    || character == ')'
                    || character == '-'
                    || character == '*'
            })
            .trim()
            .to_string();

        if cleaned.is_empty() || variants.contains(&cleaned) {
            continue;
        }

        variants.push(cleaned);
        if variants.len() == max {
            break;
        }
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use crate::llm::{LlmClient, LlmConfig};
    use crate::models::TextChunk;
    use async_trait::async_trait;

    struct FakeVectorIndex {
        hits: Vec<SearchCandidate>,
    }

    #[async_trait]
    impl VectorIndex for FakeVectorIndex {
        async fn index_chunks(
            &self,
            _chunks: &[TextChunk],
            _embeddings: &[Vec<f32>],
        ) -> Result<(), SearchError> {
            Ok(())
        }

        async fn search_vector(
            &self,
            _query_vector: &[f32],
            _top_k: usize,
        ) -> Result<Vec<SearchCandidate>, SearchError> {
            Ok(self.hits.clone())
        }
    }

    fn make_hit(chunk_id: &str, score: f64) -> SearchCandidate {
        SearchCandidate {
            chunk_id: chunk_id.to_string(),
            source_path: "/tmp/doc.txt".to_string(),
            document_number: 0,
            score,
            content: format!("content of {chunk_id}"),
        }
    }

    fn offline_llm() -> LlmClient {
        LlmClient::new(LlmConfig::new("http://127.0.0.1:1", "test-model"))
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let retriever = Retriever::new(
            FakeVectorIndex { hits: Vec::new() },
            HashingEmbedder::default(),
        );
        let result = retriever.retrieve(&SearchQuery::new("   ", 5)).await;
        assert!(matches!(result, Err(SearchError::Request(_))));
    }

    #[tokio::test]
    async fn retrieve_returns_store_candidates() {
        let retriever = Retriever::new(
            FakeVectorIndex {
                hits: vec![make_hit("chunk-1", 0.9)],
            },
            HashingEmbedder::default(),
        );

        let hits = retriever
            .retrieve(&SearchQuery::new("ownership in rust", 5))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "chunk-1");
    }

    #[tokio::test]
    async fn variants_fuse_repeated_chunks_to_the_top() {
        let retriever = Retriever::new(
            FakeVectorIndex {
                hits: vec![make_hit("chunk-1", 0.9), make_hit("chunk-2", 0.8)],
            },
            HashingEmbedder::default(),
        );
        let multi = MultiQueryRetriever::new(retriever, offline_llm());

        let variants = vec!["original query".to_string(), "rephrased query".to_string()];
        let hits = multi
            .retrieve_variants(&SearchQuery::new("original query", 2), &variants)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        // chunk-1 is ranked first by both variants, so its fused score
        // accumulates twice the top rank component.
        assert_eq!(hits[0].chunk_id, "chunk-1");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn fused_output_is_capped_at_top_k() {
        let retriever = Retriever::new(
            FakeVectorIndex {
                hits: vec![
                    make_hit("chunk-1", 0.9),
                    make_hit("chunk-2", 0.8),
                    make_hit("chunk-3", 0.7),
                ],
            },
            HashingEmbedder::default(),
        );
        let multi = MultiQueryRetriever::new(retriever, offline_llm());

        let variants = vec!["query".to_string()];
        let hits = multi
            .retrieve_variants(&SearchQuery::new("query", 2), &variants)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn variant_parsing_strips_markers_and_duplicates() {
        let response = "1. how does rust ensure memory safety\n\
                        2) rust borrow checker explained\n\
                        - how does rust ensure memory safety\n\
                        \n\
                        * ownership rules in rust";
        let variants = parse_query_variants(response, 5);
        assert_eq!(
            variants,
            vec![
                "how does rust ensure memory safety",
                "rust borrow checker explained",
                "ownership rules in rust",
            ]
        );
    }

    #[test]
    fn variant_parsing_respects_the_cap() {
        let response = "first\nsecond\nthird\nfourth";
        assert_eq!(parse_query_variants(response, 2).len(), 2);
    }
}
