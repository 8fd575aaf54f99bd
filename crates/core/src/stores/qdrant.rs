use crate::models::{SearchCandidate, TextChunk};
use crate::traits::VectorIndex;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        }
    }

    pub fn vector_size(&self) -> usize {
        self.vector_size
    }

    /// Create the collection with cosine distance if it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .get(format!("{}/collections/{}", self.endpoint, self.collection))
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        if !response.status().is_client_error() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .client
            .put(format!("{}/collections/{}", self.endpoint, self.collection))
            .json(&json!({
                "vectors": {
                    "size": self.vector_size,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    fn chunk_payload(chunk: &TextChunk) -> Value {
        json!({
            "chunk_id": chunk.chunk_id,
            "source_path": chunk.source_path,
            "document_number": chunk.document_number,
            "chunk_index": chunk.chunk_index,
            "content": chunk.content,
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn index_chunks(
        &self,
        chunks: &[TextChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError> {
        if chunks.len() != embeddings.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                if embedding.len() != self.vector_size {
                    return Err(SearchError::Request(format!(
                        "embedding dimension {} != {}",
                        embedding.len(),
                        self.vector_size
                    )));
                }

                Ok(json!({
                    "id": chunk.chunk_index,
                    "vector": embedding,
                    "payload": Self::chunk_payload(chunk),
                }))
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.endpoint, self.collection
            ))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn search_vector(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchCandidate>, SearchError> {
        if query_vector.len() != self.vector_size {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, self.collection
            ))
            .json(&json!({
                "vector": query_vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut result = Vec::new();
        for hit in hits {
            let chunk_id = hit
                .pointer("/payload/chunk_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    hit.pointer("/id")
                        .and_then(Value::as_u64)
                        .map(|id| id.to_string())
                })
                .unwrap_or_default();
            let source_path = hit
                .pointer("/payload/source_path")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let document_number = hit
                .pointer("/payload/document_number")
                .and_then(Value::as_u64)
                .unwrap_or_default();
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
            let content = hit
                .pointer("/payload/content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            result.push(SearchCandidate {
                chunk_id,
                source_path,
                document_number,
                score,
                content,
            });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_chunk(index: u64) -> TextChunk {
        TextChunk {
            chunk_id: format!("chunk-{index}"),
            source_path: "/tmp/doc.txt".to_string(),
            document_number: 0,
            chunk_index: index,
            content: "content".to_string(),
        }
    }

    #[tokio::test]
    async fn mismatched_embedding_count_is_rejected_before_any_request() {
        let store = QdrantStore::new("http://127.0.0.1:1", "chunks", 4);
        let result = store
            .index_chunks(&[make_chunk(0)], &[vec![0.0; 4], vec![0.0; 4]])
            .await;
        assert!(matches!(result, Err(SearchError::Request(_))));
    }

    #[tokio::test]
    async fn wrong_embedding_dimension_is_rejected_before_any_request() {
        let store = QdrantStore::new("http://127.0.0.1:1", "chunks", 4);
        let result = store.index_chunks(&[make_chunk(0)], &[vec![0.0; 3]]).await;
        assert!(matches!(result, Err(SearchError::Request(_))));
    }

    #[tokio::test]
    async fn wrong_query_dimension_is_rejected_before_any_request() {
        let store = QdrantStore::new("http://127.0.0.1:1", "chunks", 4);
        let result = store.search_vector(&[0.0; 3], 5).await;
        assert!(matches!(result, Err(SearchError::Request(_))));
    }

    #[test]
    fn chunk_payload_carries_provenance() {
        let payload = QdrantStore::chunk_payload(&make_chunk(7));
        assert_eq!(payload["chunk_index"], 7);
        assert_eq!(payload["source_path"], "/tmp/doc.txt");
        assert_eq!(payload["content"], "content");
    }
}
