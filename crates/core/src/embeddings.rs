pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 256;

/// Embedding seam. Real providers are supplied by the caller; the hashing
/// embedder below is the deterministic built-in used for local runs and
/// tests. Implementations must return `dimensions()`-sized vectors.
pub trait Embedder {
    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Vec<f32>;

    fn embed_batch(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Character n-gram hashing embedder. Deterministic, dependency-free, and
/// L2-normalized, so cosine scores stay in [-1, 1].
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimensions: usize,
    ngram: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize, ngram: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            ngram: ngram.max(1),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSIONS, 3)
    }
}

impl Embedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.len() < self.ngram {
            if !chars.is_empty() {
                let bucket = (fnv1a(&lowered) % vector.len() as u64) as usize;
                vector[bucket] = 1.0;
            }
            return vector;
        }

        for window in chars.windows(self.ngram) {
            let token: String = window.iter().collect();
            let bucket = (fnv1a(&token) % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

fn fnv1a(token: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedder_is_deterministic() {
        let embedder = HashingEmbedder::default();
        let first = embedder.embed("semantic chunking and retrieval");
        let second = embedder.embed("semantic chunking and retrieval");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_configured_length() {
        let embedder = HashingEmbedder::new(32, 3);
        assert_eq!(embedder.embed("abc").len(), 32);
        assert_eq!(embedder.dimensions(), 32);
    }

    #[test]
    fn vectors_are_unit_length() {
        let embedder = HashingEmbedder::default();
        let vector = embedder.embed("some reasonably long input text");
        let magnitude: f32 = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[test]
    fn short_input_still_occupies_a_bucket() {
        let embedder = HashingEmbedder::new(16, 3);
        let vector = embedder.embed("ab");
        assert_eq!(vector.iter().filter(|value| **value > 0.0).count(), 1);
    }

    #[test]
    fn batch_matches_single_calls() {
        let embedder = HashingEmbedder::default();
        let batch = embedder.embed_batch(&["one", "two"]);
        assert_eq!(batch[0], embedder.embed("one"));
        assert_eq!(batch[1], embedder.embed("two"));
    }
}
