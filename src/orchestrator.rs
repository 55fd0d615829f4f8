//! The content processor: one file in, one [`Summary`] or [`ProcessingError`] out.
//!
//! Each request walks a fixed state machine:
//!
//! ```text
//! Extracting -> Selecting -> InferringPrimary -> [InferringFallback] -> Parsing -> Done
//!                                                                     \-> Failed(kind)
//! ```
//!
//! Extraction and parsing failures end the request. An inference failure on
//! the primary model moves to the fallback model exactly once. Every
//! transition is logged with the request id, file, elapsed time and model, and
//! recorded in a [`RequestTrace`].

use crate::config::{Config, ConfigError};
use crate::engines::ExtractionEngines;
use crate::error::{ErrorKind, ProcessingError};
use crate::extract::Extractor;
use crate::health::{self, HealthReport};
use crate::inference::{InferenceBackend, InferenceClient, InferenceError, RawInferenceOutput};
use crate::ollama::OllamaBackend;
use crate::parser::SummaryParser;
use crate::prompt::{build_prompt, Prompt};
use crate::selector::{ModelSelector, ModelSpec, ModelTier};
use crate::source::SourceFile;
use crate::summary::Summary;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Selecting,
    InferringPrimary,
    InferringFallback,
    Parsing,
    Done,
    Failed(ErrorKind),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extracting => f.write_str("extracting"),
            Stage::Selecting => f.write_str("selecting"),
            Stage::InferringPrimary => f.write_str("inferring_primary"),
            Stage::InferringFallback => f.write_str("inferring_fallback"),
            Stage::Parsing => f.write_str("parsing"),
            Stage::Done => f.write_str("done"),
            Stage::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageTransition {
    pub stage: Stage,
    /// Time since the request started.
    pub elapsed: Duration,
    pub model: Option<String>,
}

/// One inference attempt as the orchestrator saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub model: String,
    pub tier: ModelTier,
    pub elapsed: Duration,
    /// `None` when the attempt produced output.
    pub error: Option<InferenceError>,
}

/// End-to-end record of one request.
#[derive(Debug, Clone)]
pub struct RequestTrace {
    pub request_id: Uuid,
    pub file: PathBuf,
    pub started_at: DateTime<Utc>,
    pub transitions: Vec<StageTransition>,
    pub attempts: Vec<AttemptRecord>,
}

impl RequestTrace {
    pub fn stages(&self) -> Vec<Stage> {
        self.transitions.iter().map(|t| t.stage).collect()
    }
}

/// Per-request bookkeeping. Owned by exactly one request.
struct Run {
    started: Instant,
    trace: RequestTrace,
}

impl Run {
    fn start(path: &Path) -> Self {
        let file = absolute(path);
        Self {
            started: Instant::now(),
            trace: RequestTrace {
                request_id: Uuid::new_v4(),
                file,
                started_at: Utc::now(),
                transitions: Vec::new(),
                attempts: Vec::new(),
            },
        }
    }

    fn enter(&mut self, stage: Stage, model: Option<&str>) {
        let elapsed = self.started.elapsed();
        info!(
            request_id = %self.trace.request_id,
            file = %self.trace.file.display(),
            stage = %stage,
            elapsed_ms = elapsed.as_millis() as u64,
            model,
            "stage entered"
        );
        self.push(stage, elapsed, model);
    }

    fn fail(&mut self, err: &ProcessingError) {
        let elapsed = self.started.elapsed();
        let stage = Stage::Failed(err.kind());
        error!(
            request_id = %self.trace.request_id,
            file = %self.trace.file.display(),
            stage = %stage,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %err.cause(),
            "request failed"
        );
        self.push(stage, elapsed, None);
    }

    fn push(&mut self, stage: Stage, elapsed: Duration, model: Option<&str>) {
        self.trace.transitions.push(StageTransition {
            stage,
            elapsed,
            model: model.map(str::to_string),
        });
    }

    fn file(&self) -> PathBuf {
        self.trace.file.clone()
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn cancelled(path: &Path) -> ProcessingError {
    let file = absolute(path);
    warn!(file = %file.display(), "request cancelled");
    ProcessingError::Cancelled { file }
}

/// Runs files through extraction, selection, inference and parsing.
///
/// Requests share the configuration, the engines and the bounded inference
/// client. Nothing else is shared between them.
pub struct ContentProcessor {
    config: Arc<Config>,
    engines: ExtractionEngines,
    selector: ModelSelector,
    inference: InferenceClient,
    parser: SummaryParser,
}

impl ContentProcessor {
    pub fn new(
        config: Arc<Config>,
        engines: ExtractionEngines,
        backend: Arc<dyn InferenceBackend>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            selector: ModelSelector::from_config(&config),
            inference: InferenceClient::new(backend, config.inference.concurrency),
            parser: SummaryParser::new(&config.summary),
            engines,
            config,
        })
    }

    /// Command-line engines and the Ollama backend, as configured.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let backend = OllamaBackend::new(&config.inference.base_url)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let engines = ExtractionEngines::from_config(&config.extraction);
        Self::new(Arc::new(config), engines, Arc::new(backend))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Models the inference service has installed.
    pub async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        self.inference.list_models().await
    }

    /// Check the inference service, the models and the extraction tools.
    pub async fn check_health(&self) -> HealthReport {
        health::check_health(&self.config, &self.inference).await
    }

    /// Summarize one file.
    pub async fn process(&self, path: &Path) -> Result<Summary, ProcessingError> {
        self.process_traced(path).await.0
    }

    /// Summarize one file and return the request trace alongside the result.
    pub async fn process_traced(
        &self,
        path: &Path,
    ) -> (Result<Summary, ProcessingError>, RequestTrace) {
        let mut run = Run::start(path);
        let span = tracing::info_span!("request", request_id = %run.trace.request_id);

        let result = self.run(&mut run).instrument(span).await;
        match &result {
            Ok(_) => run.enter(Stage::Done, None),
            Err(e) => run.fail(e),
        }
        (result, run.trace)
    }

    /// Summarize one file unless `cancel` completes first.
    ///
    /// Cancelling drops the in-flight request, which releases its scratch
    /// files and its inference permit.
    pub async fn process_until<F>(&self, path: &Path, cancel: F) -> Result<Summary, ProcessingError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.process(path) => result,
            _ = cancel => Err(cancelled(path)),
        }
    }

    /// Summarize several files, at most `parallelism` at a time.
    /// Results come back in input order.
    pub async fn process_many(
        &self,
        paths: &[PathBuf],
        parallelism: usize,
    ) -> Vec<Result<Summary, ProcessingError>> {
        self.process_many_until(paths, parallelism, std::future::pending())
            .await
    }

    /// [`process_many`](Self::process_many), stopping when `cancel` completes.
    ///
    /// Files finished before cancellation keep their result. Every other file
    /// is reported as [`ProcessingError::Cancelled`] once its request has been
    /// dropped.
    pub async fn process_many_until<F>(
        &self,
        paths: &[PathBuf],
        parallelism: usize,
        cancel: F,
    ) -> Vec<Result<Summary, ProcessingError>>
    where
        F: Future<Output = ()>,
    {
        let mut results = Vec::with_capacity(paths.len());
        {
            let mut requests = std::pin::pin!(futures_util::stream::iter(
                paths.iter().map(|path| self.process(path))
            )
            .buffered(parallelism.max(1)));
            let mut cancel = std::pin::pin!(cancel);

            loop {
                tokio::select! {
                    next = requests.next() => match next {
                        Some(result) => results.push(result),
                        None => break,
                    },
                    _ = &mut cancel => break,
                }
            }
        }

        for path in &paths[results.len()..] {
            results.push(Err(cancelled(path)));
        }
        results
    }

    async fn run(&self, run: &mut Run) -> Result<Summary, ProcessingError> {
        run.enter(Stage::Extracting, None);
        let source = SourceFile::open(&run.trace.file, self.config.max_file_size_bytes())
            .map_err(|source| ProcessingError::Extraction {
                file: run.file(),
                source,
            })?;
        let extraction = Extractor::for_category(source.category())
            .extract(&source, &self.engines, self.config.extraction.max_chars)
            .await
            .map_err(|source| ProcessingError::Extraction {
                file: run.file(),
                source,
            })?;
        if extraction.confidence.empty_content {
            return Err(ProcessingError::EmptyContent { file: run.file() });
        }

        run.enter(Stage::Selecting, None);
        let choice = self
            .selector
            .select(extraction.category, &extraction.metadata);
        let prompt = build_prompt(choice.template, &extraction, &self.config.summary);

        let output = match self
            .attempt(run, Stage::InferringPrimary, &prompt, &choice.primary)
            .await
        {
            Ok(output) => output,
            Err(primary) if choice.fallback.id == choice.primary.id => {
                // Both tiers name the same model; a second call would be a plain retry.
                return Err(ProcessingError::Inference {
                    file: run.file(),
                    source: primary,
                });
            }
            Err(primary) => {
                match self
                    .attempt(run, Stage::InferringFallback, &prompt, &choice.fallback)
                    .await
                {
                    Ok(output) => output,
                    Err(fallback) => {
                        return Err(ProcessingError::InferenceExhausted {
                            file: run.file(),
                            primary,
                            fallback,
                        })
                    }
                }
            }
        };

        run.enter(Stage::Parsing, Some(&output.model));
        let summary = self
            .parser
            .parse(&output.text, extraction.category)
            .map_err(|source| ProcessingError::Parse {
                file: run.file(),
                source,
            })?;

        Ok(summary.with_source(Arc::from(extraction.text)))
    }

    async fn attempt(
        &self,
        run: &mut Run,
        stage: Stage,
        prompt: &Prompt,
        model: &ModelSpec,
    ) -> Result<RawInferenceOutput, InferenceError> {
        run.enter(stage, Some(&model.id));
        let started = Instant::now();
        let result = self.inference.infer(prompt, model, self.config.timeout()).await;
        let elapsed = started.elapsed();

        if let Err(e) = &result {
            warn!(
                request_id = %run.trace.request_id,
                file = %run.trace.file.display(),
                stage = %stage,
                model = %model.id,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "inference attempt failed"
            );
        }

        run.trace.attempts.push(AttemptRecord {
            model: model.id.clone(),
            tier: model.tier,
            elapsed,
            error: result.as_ref().err().cloned(),
        });
        result
    }
}
