//! Inference client: one bounded, timed call to the local model service.
//!
//! The client never retries. A failed attempt is returned to the caller as
//! is, so each model attempt stays a separate, observable event.

use crate::prompt::Prompt;
use crate::selector::ModelSpec;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("inference service unavailable: {0}")]
    Unavailable(String),
    #[error("inference timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("model not found: {0}")]
    ModelNotFound(String),
}

/// Everything a backend needs for one generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_window: u32,
}

/// Token and latency figures, when the service reports them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InferenceStats {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub service_duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply {
    pub text: String,
    pub stats: InferenceStats,
}

/// A local model service.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<BackendReply, InferenceError>;

    /// Model identifiers present in the service's local registry.
    async fn list_models(&self) -> Result<Vec<String>, InferenceError>;
}

/// The output of one inference attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawInferenceOutput {
    /// Model that produced `text`.
    pub model: String,
    pub text: String,
    pub elapsed: Duration,
    pub stats: InferenceStats,
}

/// Shared handle to the inference service with a concurrency bound.
///
/// Calls beyond the bound wait for a permit. The per-attempt timeout starts
/// once the permit is held.
#[derive(Clone)]
pub struct InferenceClient {
    backend: Arc<dyn InferenceBackend>,
    permits: Arc<Semaphore>,
}

impl InferenceClient {
    pub fn new(backend: Arc<dyn InferenceBackend>, concurrency: usize) -> Self {
        Self {
            backend,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub async fn infer(
        &self,
        prompt: &Prompt,
        model: &ModelSpec,
        timeout: Duration,
    ) -> Result<RawInferenceOutput, InferenceError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| InferenceError::Unavailable("inference client shut down".to_string()))?;

        let request = GenerateRequest {
            model: model.id.clone(),
            system: prompt.system.clone(),
            prompt: prompt.user.clone(),
            temperature: model.temperature,
            max_tokens: model.max_tokens,
            context_window: model.context_window,
        };

        let started = Instant::now();
        let reply = tokio::time::timeout(timeout, self.backend.generate(&request))
            .await
            .map_err(|_| InferenceError::Timeout(timeout))??;
        let elapsed = started.elapsed();

        debug!(
            model = %model.id,
            elapsed_ms = elapsed.as_millis() as u64,
            completion_tokens = reply.stats.completion_tokens,
            "inference attempt finished"
        );

        Ok(RawInferenceOutput {
            model: model.id.clone(),
            text: reply.text,
            elapsed,
            stats: reply.stats,
        })
    }

    pub async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        self.backend.list_models().await
    }
}
