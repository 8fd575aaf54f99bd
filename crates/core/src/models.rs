use serde::{Deserialize, Serialize};

/// One successfully loaded source file.
///
/// `document_number` is assigned densely in processing order: it starts at
/// zero and advances only when a file actually produces a document, so
/// skipped files never leave holes in the numbering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub source_path: String,
    pub document_number: u64,
}

/// Ordered documents from one pipeline run, in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentCollection {
    documents: Vec<Document>,
}

impl DocumentCollection {
    pub fn push(&mut self, document: Document) {
        self.documents.push(document);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.documents.iter()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Bare-text view over the same traversal, for callers that only want
    /// the loaded strings and no provenance.
    pub fn texts(&self) -> Vec<String> {
        self.documents
            .iter()
            .map(|document| document.content.clone())
            .collect()
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }
}

impl<'a> IntoIterator for &'a DocumentCollection {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

/// A piece of one document sized for embedding and indexing.
/// `chunk_index` runs globally across the whole collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub chunk_id: String,
    pub source_path: String,
    pub document_number: u64,
    pub chunk_index: u64,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            top_k,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub chunk_id: String,
    pub source_path: String,
    pub document_number: u64,
    pub score: f64,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_document(number: u64, content: &str) -> Document {
        Document {
            content: content.to_string(),
            source_path: format!("/tmp/doc-{number}.txt"),
            document_number: number,
        }
    }

    #[test]
    fn texts_preserves_document_order() {
        let mut collection = DocumentCollection::default();
        collection.push(make_document(0, "hello"));
        collection.push(make_document(1, "world"));

        assert_eq!(collection.texts(), vec!["hello", "world"]);
    }

    #[test]
    fn empty_collection_reports_empty() {
        let collection = DocumentCollection::default();
        assert!(collection.is_empty());
        assert_eq!(collection.len(), 0);
        assert!(collection.texts().is_empty());
    }
}
