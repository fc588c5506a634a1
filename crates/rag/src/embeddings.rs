//! Embedding provider chain (C1): local model, two remote fallbacks, and a
//! dummy that keeps the pipeline alive even fully degraded.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use assistant_config::constants::{rag as rag_constants, timeouts};
use assistant_core::EmbeddingBackend;

use crate::cache::EmbeddingCache;
use crate::RagError;

#[cfg(feature = "onnx")]
use ndarray::Array2;
#[cfg(feature = "onnx")]
use ort::{session::builder::GraphOptimizationLevel, session::Session, value::Tensor};
#[cfg(feature = "onnx")]
use tokenizers::Tokenizer;

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub max_seq_len: usize,
    pub embedding_dim: usize,
    pub normalize: bool,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            max_seq_len: 512,
            embedding_dim: rag_constants::DEFAULT_EMBEDDING_DIM,
            normalize: true,
            batch_size: 32,
        }
    }
}

/// LocalModel: an in-process multilingual sentence embedder. With the
/// `onnx` feature compiled in it runs a real ONNX session; otherwise it
/// degrades to a deterministic hash embedding so the chain always has a
/// first candidate to try.
pub struct LocalEmbedder {
    #[cfg(feature = "onnx")]
    session: Option<Session>,
    #[cfg(feature = "onnx")]
    tokenizer: Option<Tokenizer>,
    config: EmbeddingConfig,
}

impl LocalEmbedder {
    #[cfg(feature = "onnx")]
    pub fn from_model_files(
        model_path: impl AsRef<std::path::Path>,
        tokenizer_path: impl AsRef<std::path::Path>,
        config: EmbeddingConfig,
    ) -> Result<Self, RagError> {
        let session = Session::builder()
            .map_err(|e| RagError::Embedding(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| RagError::Embedding(e.to_string()))?
            .with_intra_threads(2)
            .map_err(|e| RagError::Embedding(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| RagError::Embedding(e.to_string()))?;
        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| RagError::Embedding(e.to_string()))?;
        Ok(Self { session: Some(session), tokenizer: Some(tokenizer), config })
    }

    pub fn hash_fallback(config: EmbeddingConfig) -> Self {
        Self {
            #[cfg(feature = "onnx")]
            session: None,
            #[cfg(feature = "onnx")]
            tokenizer: None,
            config,
        }
    }

    fn hash_embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.config.embedding_dim];
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % self.config.embedding_dim;
            embedding[idx] += 1.0;
        }
        normalize_in_place(&mut embedding, self.config.normalize);
        embedding
    }

    #[cfg(feature = "onnx")]
    fn onnx_embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let (session, tokenizer) = match (&self.session, &self.tokenizer) {
            (Some(s), Some(t)) => (s, t),
            _ => return Ok(texts.iter().map(|t| self.hash_embed(t)).collect()),
        };

        let batch_size = texts.len();
        let encodings = tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        let mut input_ids = vec![0i64; batch_size * self.config.max_seq_len];
        let mut attention_mask = vec![0i64; batch_size * self.config.max_seq_len];
        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let len = ids.len().min(self.config.max_seq_len);
            let offset = i * self.config.max_seq_len;
            for j in 0..len {
                input_ids[offset + j] = ids[j] as i64;
                attention_mask[offset + j] = mask[j] as i64;
            }
        }

        let input_ids = Array2::from_shape_vec((batch_size, self.config.max_seq_len), input_ids)
            .map_err(|e| RagError::Embedding(e.to_string()))?;
        let attention_mask = Array2::from_shape_vec((batch_size, self.config.max_seq_len), attention_mask)
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        let input_ids_tensor = Tensor::from_array(input_ids).map_err(|e| RagError::Embedding(e.to_string()))?;
        let attention_mask_tensor =
            Tensor::from_array(attention_mask).map_err(|e| RagError::Embedding(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
            ])
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        let (shape, hidden_data) = outputs
            .get("last_hidden_state")
            .ok_or_else(|| RagError::Embedding("missing last_hidden_state output".to_string()))?
            .try_extract_tensor::<f32>()
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let (tensor_seq_len, tensor_hidden_dim) = match dims.len() {
            3 => (dims[1], dims[2]),
            _ => return Err(RagError::Embedding(format!("unexpected tensor shape: {:?}", dims))),
        };

        let mut results = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let seq_len = encodings[i].get_ids().len().min(self.config.max_seq_len).min(tensor_seq_len);
            let mut embedding = vec![0.0f32; self.config.embedding_dim];
            for j in 0..seq_len {
                for k in 0..self.config.embedding_dim.min(tensor_hidden_dim) {
                    let idx = i * tensor_seq_len * tensor_hidden_dim + j * tensor_hidden_dim + k;
                    if idx < hidden_data.len() {
                        embedding[k] += hidden_data[idx];
                    }
                }
            }
            for v in &mut embedding {
                *v /= seq_len.max(1) as f32;
            }
            normalize_in_place(&mut embedding, self.config.normalize);
            results.push(embedding);
        }
        Ok(results)
    }
}

fn normalize_in_place(embedding: &mut [f32], normalize: bool) {
    if !normalize {
        return;
    }
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in embedding.iter_mut() {
            *v /= norm;
        }
    }
}

#[async_trait]
impl EmbeddingBackend for LocalEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> assistant_core::Result<Vec<Vec<f32>>> {
        #[cfg(feature = "onnx")]
        {
            let mut all = Vec::with_capacity(texts.len());
            for chunk in texts.chunks(self.config.batch_size) {
                all.extend(self.onnx_embed_batch(chunk).map_err(Into::<assistant_core::Error>::into)?);
            }
            Ok(all)
        }
        #[cfg(not(feature = "onnx"))]
        {
            Ok(texts.iter().map(|t| self.hash_embed(t)).collect())
        }
    }

    fn dim(&self) -> usize {
        self.config.embedding_dim
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// RemoteApiA: a hosted feature-extraction endpoint. Retries transient
/// `model loading` (503) and rate-limit (429) responses with a backoff
/// schedule, three attempts total.
pub struct RemoteApiAEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    dim: usize,
}

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a [String],
}

impl RemoteApiAEmbedder {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, dim: usize) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeouts::EMBEDDING_REMOTE_MS))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            api_key,
            dim,
        }
    }

    const SERVICE_LOADING_BACKOFF: [u64; 3] = [10, 20, 30];
    const RATE_LIMIT_BACKOFF: [u64; 3] = [30, 60, 90];

    async fn request_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut req = self.client.post(&self.endpoint).json(&FeatureExtractionRequest { inputs: texts });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await.map_err(|e| RagError::Embedding(e.to_string()))?;
        let status = resp.status();
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(RagError::Embedding("service-loading".to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RagError::Embedding("rate-limited".to_string()));
        }
        if !status.is_success() {
            return Err(RagError::Embedding(format!("status {status}")));
        }
        resp.json::<Vec<Vec<f32>>>().await.map_err(|e| RagError::Embedding(e.to_string()))
    }
}

#[async_trait]
impl EmbeddingBackend for RemoteApiAEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> assistant_core::Result<Vec<Vec<f32>>> {
        let mut last_err = RagError::Embedding("not attempted".to_string());
        for attempt in 0..3usize {
            match self.request_once(texts).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    let backoff = if e.to_string().contains("rate-limited") {
                        Self::RATE_LIMIT_BACKOFF[attempt.min(2)]
                    } else {
                        Self::SERVICE_LOADING_BACKOFF[attempt.min(2)]
                    };
                    tracing::warn!(attempt, backoff, error = %e, "remote embedding API call failed, retrying");
                    last_err = e;
                    if attempt < 2 {
                        tokio::time::sleep(Duration::from_secs(backoff)).await;
                    }
                }
            }
        }
        Err(last_err.into())
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "remote_api_a"
    }
}

/// RemoteApiB: a local HTTP embedding daemon, one request per text. On
/// timeout or error a zero-vector is substituted so shape invariants hold
/// rather than failing the whole batch.
pub struct RemoteApiBEmbedder {
    client: reqwest::Client,
    endpoint: String,
    dim: usize,
}

#[derive(Serialize)]
struct DaemonEmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct DaemonEmbedResponse {
    embedding: Vec<f32>,
}

impl RemoteApiBEmbedder {
    pub fn new(endpoint: impl Into<String>, dim: usize) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeouts::EMBEDDING_LOCAL_MS))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            dim,
        }
    }

    async fn embed_one(&self, text: &str) -> Vec<f32> {
        let url = format!("{}/api/embeddings", self.endpoint);
        let result = self.client.post(&url).json(&DaemonEmbedRequest { input: text }).send().await;
        match result {
            Ok(resp) if resp.status().is_success() => match resp.json::<DaemonEmbedResponse>().await {
                Ok(body) => body.embedding,
                Err(_) => vec![0.0; self.dim],
            },
            _ => vec![0.0; self.dim],
        }
    }
}

#[async_trait]
impl EmbeddingBackend for RemoteApiBEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> assistant_core::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_one(text).await);
        }
        Ok(out)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "remote_api_b"
    }
}

/// Dummy: all-zero vectors. Marks the system degraded but keeps the
/// pipeline operational.
pub struct DummyEmbedder {
    dim: usize,
}

impl DummyEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl EmbeddingBackend for DummyEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> assistant_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.0; self.dim]).collect())
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "dummy"
    }
}

/// The latched provider chain. Probes each candidate in order at
/// construction and keeps the first that responds; this stable reference is
/// read by every subsequent call, written once.
pub struct EmbeddingProviderChain {
    active: Arc<dyn EmbeddingBackend>,
    cache: EmbeddingCache,
}

impl EmbeddingProviderChain {
    /// `candidates` must be non-empty and its last entry should be a
    /// `DummyEmbedder` so latching always succeeds.
    pub async fn latch(candidates: Vec<Arc<dyn EmbeddingBackend>>) -> Self {
        let mut active = None;
        for candidate in candidates {
            let probe = candidate.embed_batch(&["probe".to_string()]).await;
            if probe.is_ok() {
                tracing::info!(provider = candidate.name(), "latched embedding provider");
                active = Some(candidate);
                break;
            }
            tracing::warn!(provider = candidate.name(), "embedding provider failed probe, trying next");
        }
        let active = active.unwrap_or_else(|| Arc::new(DummyEmbedder::new(rag_constants::DEFAULT_EMBEDDING_DIM)));
        Self { active, cache: EmbeddingCache::default() }
    }

    pub fn name(&self) -> &str {
        self.active.name()
    }

    pub fn dim(&self) -> usize {
        self.active.dim()
    }

    /// Splits `texts` into cached/uncached, encodes the uncached set in one
    /// native batch (capped to `min(32, uncached_count)`), and reassembles
    /// results in original order.
    pub async fn embed(&self, texts: &[String]) -> assistant_core::Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut uncached_indices = Vec::new();
        let mut uncached_texts = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            if let Some(vector) = self.cache.get(text) {
                results[i] = Some(vector);
            } else {
                uncached_indices.push(i);
                uncached_texts.push(text.clone());
            }
        }

        if !uncached_texts.is_empty() {
            let batch_size = uncached_texts.len().min(32);
            let mut encoded = Vec::with_capacity(uncached_texts.len());
            for chunk in uncached_texts.chunks(batch_size) {
                match self.active.embed_batch(chunk).await {
                    Ok(vectors) => encoded.extend(vectors),
                    Err(e) => {
                        tracing::warn!(error = %e, "batch embedding failed, falling back to sequential");
                        for text in chunk {
                            let v = self.active.embed_batch(std::slice::from_ref(text)).await.unwrap_or_else(|_| {
                                vec![vec![0.0; self.active.dim()]]
                            });
                            encoded.push(v.into_iter().next().unwrap_or_else(|| vec![0.0; self.active.dim()]));
                        }
                    }
                }
            }
            for (idx, text, vector) in uncached_indices.into_iter().zip(uncached_texts.iter()).zip(encoded.into_iter()).map(|((i, t), v)| (i, t, v)) {
                self.cache.put(text, vector.clone());
                results[idx] = Some(vector);
            }
        }

        Ok(results.into_iter().map(|r| r.unwrap_or_default()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn latches_first_working_provider() {
        let chain = EmbeddingProviderChain::latch(vec![
            Arc::new(LocalEmbedder::hash_fallback(EmbeddingConfig::default())),
            Arc::new(DummyEmbedder::new(384)),
        ])
        .await;
        assert_eq!(chain.name(), "local");
        assert_eq!(chain.dim(), 384);
    }

    #[tokio::test]
    async fn dummy_always_latches() {
        let chain = EmbeddingProviderChain::latch(vec![Arc::new(DummyEmbedder::new(384))]).await;
        assert_eq!(chain.name(), "dummy");
        let vecs = chain.embed(&["a".to_string()]).await.unwrap();
        assert_eq!(vecs[0], vec![0.0; 384]);
    }

    #[tokio::test]
    async fn cache_returns_identical_vector_on_repeat() {
        let chain = EmbeddingProviderChain::latch(vec![Arc::new(LocalEmbedder::hash_fallback(EmbeddingConfig::default()))]).await;
        let a = chain.embed(&["bonjour".to_string()]).await.unwrap();
        let b = chain.embed(&["bonjour".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }
}
