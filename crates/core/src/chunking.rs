use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::models::{DocumentCollection, TextChunk};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::str::FromStr;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
            min_chars: 40,
        }
    }
}

impl ChunkingConfig {
    fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

/// Size/overlap splitter: paragraphs are packed up to `chunk_size`, and any
/// oversized chunk is re-windowed with `chunk_overlap` characters carried
/// between windows.
pub struct TextSplitter {
    config: ChunkingConfig,
}

impl TextSplitter {
    pub fn new(config: ChunkingConfig) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let config = &self.config;
        let paragraphs = text
            .split("\n\n")
            .map(normalize_whitespace)
            .filter(|paragraph| !paragraph.is_empty())
            .collect::<Vec<_>>();

        let mut chunks = Vec::new();
        let mut current = String::new();

        for paragraph in paragraphs {
            if current.is_empty() {
                current.push_str(&paragraph);
                continue;
            }

            if current.len() + paragraph.len() + 2 <= config.chunk_size {
                current.push_str("\n\n");
                current.push_str(&paragraph);
            } else {
                if current.len() >= config.min_chars {
                    chunks.push(current.clone());
                }
                current.clear();
                current.push_str(&paragraph);
            }
        }

        if current.len() >= config.min_chars {
            chunks.push(current);
        }

        let normalized = normalize_whitespace(text);
        if chunks.is_empty() && !normalized.is_empty() {
            chunks.push(normalized);
        }

        let mut with_overlap = Vec::new();
        for chunk in chunks {
            if chunk.len() <= config.chunk_size {
                with_overlap.push(chunk);
                continue;
            }

            let chars: Vec<char> = chunk.chars().collect();
            let mut start = 0;
            while start < chars.len() {
                let end = (start + config.chunk_size).min(chars.len());
                let piece: String = chars[start..end].iter().collect();
                with_overlap.push(piece);
                if end == chars.len() {
                    break;
                }
                start = start
                    .saturating_add(config.chunk_size.saturating_sub(config.chunk_overlap));
            }
        }

        with_overlap
    }

    pub fn split_documents(&self, documents: &DocumentCollection) -> Vec<TextChunk> {
        assemble_chunks(documents, |text| self.split_text(text))
    }
}

pub const SUPPORTED_BREAKPOINT_POLICIES: &[&str] = &["percentile", "interquartile", "std-dev"];

/// How the semantic splitter turns adjacent-sentence distances into a
/// breakpoint threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BreakpointPolicy {
    /// Break above this percentile of observed distances.
    Percentile(f64),
    /// Break above mean + scale * interquartile range.
    Interquartile(f64),
    /// Break above mean + scale * standard deviation.
    StdDev(f64),
}

impl Default for BreakpointPolicy {
    fn default() -> Self {
        Self::Interquartile(1.5)
    }
}

impl FromStr for BreakpointPolicy {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, IngestError> {
        match value {
            "percentile" => Ok(Self::Percentile(95.0)),
            "interquartile" => Ok(Self::Interquartile(1.5)),
            "std-dev" | "stddev" => Ok(Self::StdDev(3.0)),
            other => Err(IngestError::InvalidChunkConfig(format!(
                "unknown breakpoint policy {other:?}: must be one of {SUPPORTED_BREAKPOINT_POLICIES:?}"
            ))),
        }
    }
}

/// Embedding-driven splitter: sentences whose neighbours drift past the
/// breakpoint threshold start a new chunk. The embedding provider is
/// supplied by the caller, never defaulted.
pub struct SemanticSplitter<E: Embedder> {
    embedder: E,
    policy: BreakpointPolicy,
    sentence_boundary: Regex,
}

impl<E: Embedder> SemanticSplitter<E> {
    pub fn new(embedder: E, policy: BreakpointPolicy) -> Self {
        Self {
            embedder,
            policy,
            sentence_boundary: Regex::new(r"[.!?]\s+|\n{2,}").expect("sentence boundary pattern"),
        }
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let sentences = self.split_sentences(text);
        if sentences.len() < 2 {
            let whole = text.trim();
            return if whole.is_empty() {
                Vec::new()
            } else {
                vec![whole.to_string()]
            };
        }

        let embeddings: Vec<Vec<f32>> = sentences
            .iter()
            .map(|sentence| self.embedder.embed(sentence))
            .collect();

        let distances: Vec<f64> = embeddings
            .windows(2)
            .map(|pair| 1.0 - cosine_similarity(&pair[0], &pair[1]))
            .collect();

        let threshold = breakpoint_threshold(&distances, self.policy);

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = vec![&sentences[0]];
        for (index, distance) in distances.iter().enumerate() {
            if *distance > threshold {
                chunks.push(current.join(" "));
                current = Vec::new();
            }
            current.push(&sentences[index + 1]);
        }
        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        chunks
    }

    pub fn split_documents(&self, documents: &DocumentCollection) -> Vec<TextChunk> {
        assemble_chunks(documents, |text| self.split_text(text))
    }

    fn split_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut last = 0;

        for boundary in self.sentence_boundary.find_iter(text) {
            let piece = text[last..boundary.end()].trim();
            if !piece.is_empty() {
                sentences.push(piece.to_string());
            }
            last = boundary.end();
        }

        let tail = text[last..].trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }

        sentences
    }
}

fn assemble_chunks<F>(documents: &DocumentCollection, split: F) -> Vec<TextChunk>
where
    F: Fn(&str) -> Vec<String>,
{
    let mut chunks = Vec::new();
    let mut cursor = 0u64;

    for document in documents {
        for piece in split(&document.content) {
            let chunk_id = make_chunk_id(
                &document.source_path,
                document.document_number,
                cursor,
                &piece,
            );
            chunks.push(TextChunk {
                chunk_id,
                source_path: document.source_path.clone(),
                document_number: document.document_number,
                chunk_index: cursor,
                content: piece,
            });
            cursor += 1;
        }
    }

    chunks
}

fn make_chunk_id(source_path: &str, document_number: u64, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    hasher.update(document_number.to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn breakpoint_threshold(distances: &[f64], policy: BreakpointPolicy) -> f64 {
    let mean = distances.iter().sum::<f64>() / distances.len() as f64;
    match policy {
        BreakpointPolicy::Percentile(p) => percentile(distances, p),
        BreakpointPolicy::Interquartile(scale) => {
            let q1 = percentile(distances, 25.0);
            let q3 = percentile(distances, 75.0);
            mean + scale * (q3 - q1)
        }
        BreakpointPolicy::StdDev(scale) => {
            let variance = distances
                .iter()
                .map(|distance| (distance - mean).powi(2))
                .sum::<f64>()
                / distances.len() as f64;
            mean + scale * variance.sqrt()
        }
    }
}

fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|left, right| left.total_cmp(right));

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    if low == high {
        return sorted[low];
    }
    let weight = rank - low as f64;
    sorted[low] * (1.0 - weight) + sorted[high] * weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;

    struct AxisEmbedder;

    // Maps each sentence onto one of two orthogonal axes by leading word,
    // giving distance 0 within a topic and 1 across topics.
    impl Embedder for AxisEmbedder {
        fn dimensions(&self) -> usize {
            2
        }

        fn embed(&self, text: &str) -> Vec<f32> {
            if text.starts_with("alpha") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            }
        }
    }

    fn collection(contents: &[&str]) -> DocumentCollection {
        let mut documents = DocumentCollection::default();
        for (number, content) in contents.iter().enumerate() {
            documents.push(Document {
                content: (*content).to_string(),
                source_path: format!("/tmp/doc-{number}.txt"),
                document_number: number as u64,
            });
        }
        documents
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
    }

    #[test]
    fn config_rejects_overlap_not_smaller_than_size() {
        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            min_chars: 0,
        };
        assert!(matches!(
            TextSplitter::new(config),
            Err(IngestError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn oversized_text_is_windowed_with_overlap() {
        let splitter = TextSplitter::new(ChunkingConfig {
            chunk_size: 40,
            chunk_overlap: 10,
            min_chars: 0,
        })
        .unwrap();

        let text = "abcdefghij".repeat(10);
        let pieces = splitter.split_text(&text);

        assert!(pieces.len() > 1);
        assert!(pieces.iter().all(|piece| piece.len() <= 40));
        let first_tail: String = pieces[0].chars().rev().take(10).collect::<String>();
        let second_head: String = pieces[1].chars().take(10).collect();
        let first_tail: String = first_tail.chars().rev().collect();
        assert_eq!(first_tail, second_head);
    }

    #[test]
    fn paragraphs_pack_until_chunk_size() {
        let splitter = TextSplitter::new(ChunkingConfig {
            chunk_size: 30,
            chunk_overlap: 5,
            min_chars: 0,
        })
        .unwrap();

        let pieces = splitter.split_text("one two\n\nthree four\n\nfive six seven eight nine");
        assert_eq!(pieces[0], "one two\n\nthree four");
    }

    #[test]
    fn chunk_indexes_run_globally_across_documents() {
        let splitter = TextSplitter::new(ChunkingConfig::default()).unwrap();
        let documents = collection(&["first document text here", "second document text here"]);

        let chunks = splitter.split_documents(&documents);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].document_number, 1);
        assert_ne!(chunks[0].chunk_id, chunks[1].chunk_id);
    }

    #[test]
    fn semantic_splitter_breaks_on_topic_shift() {
        let splitter = SemanticSplitter::new(AxisEmbedder, BreakpointPolicy::Percentile(50.0));
        let pieces =
            splitter.split_text("alpha one. alpha two. beta three. beta four.");

        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0], "alpha one. alpha two.");
        assert_eq!(pieces[1], "beta three. beta four.");
    }

    #[test]
    fn semantic_splitter_keeps_single_sentence_whole() {
        let splitter = SemanticSplitter::new(AxisEmbedder, BreakpointPolicy::default());
        let pieces = splitter.split_text("alpha only sentence");
        assert_eq!(pieces, vec!["alpha only sentence"]);
    }

    #[test]
    fn unknown_breakpoint_policy_is_named_in_the_error() {
        let error = "gradient".parse::<BreakpointPolicy>().unwrap_err();
        let message = error.to_string();
        assert!(message.contains("gradient"));
        assert!(message.contains("interquartile"));
    }
}
