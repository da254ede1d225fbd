//! Deterministic hash embeddings for degraded mode
//!
//! When no embedding provider is reachable the engine still has to answer
//! ingest and search calls. These vectors carry no semantic signal; equal
//! texts land on equal vectors, so exact and near-exact matches still work
//! while the keyword branch carries the real relevance.

/// Derives a fixed-dimension vector from the BLAKE3 XOF of the text
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed one text; each component is in [0, 1)
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(text.as_bytes());
        let mut reader = hasher.finalize_xof();

        let mut bytes = vec![0u8; self.dimension * 4];
        reader.fill(&mut bytes);

        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                (word as f64 / (u32::MAX as f64 + 1.0)) as f32
            })
            .collect()
    }
}
