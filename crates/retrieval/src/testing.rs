//! Deterministic stand-ins for the embedding service, for tests across the
//! workspace. Enabled by the `testing` feature.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use contractlens_core::error::ProviderError;
use contractlens_core::provider::*;

const DIMENSIONS: usize = 256;

/// Hashes each lowercase word into a bucket, so texts sharing words have
/// positive cosine similarity and texts sharing none score (almost) zero.
#[derive(Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
    delay_per_input: Duration,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps `delay` per input text before answering, so larger batches
    /// finish later.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay_per_input: delay,
            ..Self::default()
        }
    }

    /// Number of `embed` requests served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            v[fnv1a(&word.to_lowercase()) % DIMENSIONS] += 1.0;
        }
        v
    }
}

fn fnv1a(s: &str) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash as usize
}

#[async_trait]
impl Provider for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword-embedder"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("keyword-embedder only embeds".into()))
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay_per_input.is_zero() {
            let inputs = u32::try_from(request.inputs.len()).unwrap_or(u32::MAX);
            tokio::time::sleep(self.delay_per_input.saturating_mul(inputs)).await;
        }
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|t| Self::vector(t)).collect(),
            model: request.model,
            usage: None,
        })
    }
}

/// Always fails to embed, for error-path tests.
pub struct FailingEmbedder;

#[async_trait]
impl Provider for FailingEmbedder {
    fn name(&self) -> &str {
        "failing-embedder"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("failing-embedder".into()))
    }

    async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        Err(ProviderError::ApiError { status_code: 500, message: "embedding service down".into() })
    }
}
