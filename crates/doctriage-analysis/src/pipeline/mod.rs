//! Classification run pipeline.
//!
//! Every document becomes a task spawned on a [`JoinSet`]. Each task prepares
//! its content (rendered pages, text layer, or hosted OCR), then calls the
//! classifier under the shared [`Governor`]. Results come back tagged with the
//! task's index, so completion order never affects attribution.

mod dataset;
mod prompt;

pub use dataset::{build_tasks, load_validation, DatasetError, DatasetFilter};
pub use prompt::{load_prompt, PromptError};

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use doctriage::config::ProvidersConfig;
use doctriage::models::{
    ClassificationResult, ClassificationTask, DocumentContent, UsageLedger, UsageRecord,
    UsageTotals,
};
use doctriage::rate_limit::Governor;
use doctriage::{ModelSpec, Provider, RunConfig};

use crate::extract::extract_classification;
use crate::render::{self, PageRasterizer, PdftoppmRasterizer, RenderError};
use crate::vision::{
    self, CallFailure, Completion, OcrBackend, OcrClient, VisionBackend, VisionClient,
    VisionError, VisionRequest,
};

/// Error recorded on a result when the run is cancelled before it finishes.
pub const INTERRUPTED: &str = "interrupted";

/// Engine tag of results classified from the PDF text layer.
pub const TEXT_LAYER_ENGINE: &str = "text-layer";

/// Called once per finished document.
pub type ProgressCallback = Arc<dyn Fn(&ClassificationResult) + Send + Sync>;

/// Errors that stop a run before any document is sent.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{model} is not usable: {hint}")]
    BackendUnavailable { model: String, hint: String },

    #[error("{model} has no text classifier configured")]
    MissingClassifier { model: String },

    #[error(transparent)]
    Vision(#[from] VisionError),
}

/// Why one document failed.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("no pages could be rendered from {0}")]
    EmptyRender(PathBuf),

    #[error("no text could be extracted from {0}")]
    EmptyText(PathBuf),

    #[error("OCR failed: {0}")]
    Ocr(#[source] CallFailure),

    #[error(transparent)]
    Provider(CallFailure),
}

impl DocumentError {
    fn retries(&self) -> u32 {
        match self {
            Self::Ocr(failure) | Self::Provider(failure) => failure.retries,
            _ => 0,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Cancelled; `aborted` documents were recorded as interrupted.
    Interrupted { aborted: usize },
}

impl RunOutcome {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

/// Everything a finished (or interrupted) run produced.
#[derive(Debug, Clone)]
pub struct ClassificationRun {
    /// One result per task, in dataset order.
    pub results: Vec<ClassificationResult>,
    pub outcome: RunOutcome,
    pub usage: UsageTotals,
    pub usage_records: Vec<UsageRecord>,
    pub elapsed: Duration,
    /// Most provider calls observed in flight at once.
    pub peak_in_flight: usize,
}

enum Engine {
    /// The model classifies page images (or the text layer) directly.
    Direct(VisionClient),
    /// A hosted OCR pass, then a text model classifies the OCR output.
    OcrThenText {
        ocr: OcrClient,
        classifier: VisionClient,
    },
}

struct Shared {
    engine: Engine,
    prompt: String,
    rasterizer: Arc<dyn PageRasterizer>,
    governor: Governor,
    ledger: Arc<UsageLedger>,
    max_pages: usize,
    max_output_tokens: u32,
    text_mode: bool,
    budget_limit: f64,
    budget_warned: AtomicBool,
}

/// Runs classification tasks for one model.
pub struct Pipeline {
    shared: Arc<Shared>,
    model: &'static ModelSpec,
    progress: Option<ProgressCallback>,
}

impl Pipeline {
    /// Build the pipeline for `run.model` from provider settings.
    ///
    /// Fails when the selected backend (or the OCR model's text classifier)
    /// lacks credentials, so no document is sent with a broken setup.
    pub fn new(
        run: &RunConfig,
        providers: &ProvidersConfig,
        prompt: String,
    ) -> Result<Self, PipelineError> {
        let spec = run.model;
        if spec.provider == Provider::Mistral {
            let classifier_spec =
                vision::text_classifier(spec).ok_or_else(|| PipelineError::MissingClassifier {
                    model: spec.name.to_string(),
                })?;
            let ocr = vision::ocr_backend(spec, providers, run.request_timeout)?;
            let classifier = vision::vision_backend(classifier_spec, providers, run.request_timeout)?;
            ensure_ocr_available(ocr.as_ref())?;
            ensure_available(classifier.as_ref())?;
            Ok(Self::with_ocr(run, prompt, ocr, classifier, classifier_spec))
        } else {
            let backend = vision::vision_backend(spec, providers, run.request_timeout)?;
            ensure_available(backend.as_ref())?;
            Ok(Self::with_backend(run, prompt, backend))
        }
    }

    /// Pipeline classifying directly with `backend`, priced as `run.model`.
    pub fn with_backend(run: &RunConfig, prompt: String, backend: Arc<dyn VisionBackend>) -> Self {
        let ledger = Arc::new(UsageLedger::new());
        let client = VisionClient::new(backend, run.model.pricing, run.retry, ledger.clone());
        Self::build(run, prompt, Engine::Direct(client), ledger)
    }

    /// Pipeline running `ocr` first, then classifying the text with `classifier`.
    pub fn with_ocr(
        run: &RunConfig,
        prompt: String,
        ocr: Arc<dyn OcrBackend>,
        classifier: Arc<dyn VisionBackend>,
        classifier_spec: &ModelSpec,
    ) -> Self {
        let ledger = Arc::new(UsageLedger::new());
        let engine = Engine::OcrThenText {
            ocr: OcrClient::new(ocr, run.model.pricing, run.retry, ledger.clone()),
            classifier: VisionClient::new(
                classifier,
                classifier_spec.pricing,
                run.retry,
                ledger.clone(),
            ),
        };
        Self::build(run, prompt, engine, ledger)
    }

    fn build(run: &RunConfig, prompt: String, engine: Engine, ledger: Arc<UsageLedger>) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine,
                prompt,
                rasterizer: Arc::new(PdftoppmRasterizer::new()),
                governor: Governor::new(run.parallel_max),
                ledger,
                max_pages: run.max_pages,
                max_output_tokens: run.max_output_tokens,
                text_mode: run.text_mode,
                budget_limit: run.budget_limit,
                budget_warned: AtomicBool::new(false),
            }),
            model: run.model,
            progress: None,
        }
    }

    /// Replace the page rasterizer.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.rasterizer = rasterizer;
        }
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn model(&self) -> &'static ModelSpec {
        self.model
    }

    pub fn governor(&self) -> &Governor {
        &self.shared.governor
    }

    /// Name of the OCR engine feeding the classifier, if any.
    pub fn ocr_engine(&self) -> Option<&str> {
        match &self.shared.engine {
            Engine::OcrThenText { ocr, .. } => Some(ocr.model_name()),
            Engine::Direct(_) if self.shared.text_mode => Some(TEXT_LAYER_ENGINE),
            Engine::Direct(_) => None,
        }
    }

    /// Classify every task to completion.
    pub async fn run(&self, tasks: Vec<ClassificationTask>) -> ClassificationRun {
        self.run_until(tasks, std::future::pending::<()>()).await
    }

    /// Classify every task, aborting in-flight documents when `shutdown`
    /// resolves. Finished results are kept either way.
    pub async fn run_until<S>(&self, tasks: Vec<ClassificationTask>, shutdown: S) -> ClassificationRun
    where
        S: Future<Output = ()>,
    {
        let start = Instant::now();
        let total = tasks.len();
        info!(
            "Classifying {} documents with {} (parallel {})",
            total,
            self.model.name,
            self.shared.governor.limit()
        );

        let mut set = JoinSet::new();
        for (index, task) in tasks.iter().cloned().enumerate() {
            let shared = self.shared.clone();
            set.spawn(async move { (index, shared.classify(task).await) });
        }

        let mut slots: Vec<Option<ClassificationResult>> = vec![None; total];
        let mut interrupted = false;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                joined = set.join_next() => match joined {
                    None => break,
                    Some(Ok((index, result))) => {
                        if let Some(ref progress) = self.progress {
                            progress(&result);
                        }
                        self.shared.check_budget();
                        slots[index] = Some(result);
                    }
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => warn!("Classification task failed: {}", e),
                },
                _ = &mut shutdown, if !interrupted => {
                    warn!("Interrupted, aborting {} unfinished documents", set.len());
                    set.abort_all();
                    interrupted = true;
                }
            }
        }

        let mut aborted = 0;
        let results: Vec<ClassificationResult> = slots
            .into_iter()
            .zip(tasks)
            .map(|(slot, task)| {
                slot.unwrap_or_else(|| {
                    aborted += 1;
                    let error = if interrupted { INTERRUPTED } else { "task failed" };
                    let mut result =
                        ClassificationResult::failed(&task.document_id, task.filename(), error);
                    result.expected_label = task.expected_label;
                    result
                })
            })
            .collect();

        let outcome = if interrupted {
            RunOutcome::Interrupted { aborted }
        } else {
            RunOutcome::Completed
        };

        ClassificationRun {
            results,
            outcome,
            usage: self.shared.ledger.totals(),
            usage_records: self.shared.ledger.records(),
            elapsed: start.elapsed(),
            peak_in_flight: self.shared.governor.peak(),
        }
    }
}

fn ensure_available(backend: &dyn VisionBackend) -> Result<(), PipelineError> {
    if backend.is_available() {
        Ok(())
    } else {
        Err(PipelineError::BackendUnavailable {
            model: backend.model_name().to_string(),
            hint: backend.availability_hint(),
        })
    }
}

fn ensure_ocr_available(backend: &dyn OcrBackend) -> Result<(), PipelineError> {
    if backend.is_available() {
        Ok(())
    } else {
        Err(PipelineError::BackendUnavailable {
            model: backend.model_name().to_string(),
            hint: backend.availability_hint(),
        })
    }
}

impl Shared {
    async fn classify(&self, task: ClassificationTask) -> ClassificationResult {
        debug!("Starting {}", task.document_id);
        let result = match &self.engine {
            Engine::Direct(client) => self.classify_direct(client, &task).await,
            Engine::OcrThenText { ocr, classifier } => {
                self.classify_ocr(ocr, classifier, &task).await
            }
        };

        match result.error {
            None => info!(
                "{} -> {}",
                result.filename,
                result.predicted_label.as_deref().unwrap_or_default()
            ),
            Some(ref e) => warn!("{} failed: {}", result.filename, e),
        }
        result
    }

    async fn classify_direct(
        &self,
        client: &VisionClient,
        task: &ClassificationTask,
    ) -> ClassificationResult {
        let ocr_engine = self.text_mode.then(|| TEXT_LAYER_ENGINE.to_string());
        let content = match self.load_content(task).await {
            Ok(content) => content,
            Err(e) => return failed(task, e, 0.0, ocr_engine),
        };

        let request = VisionRequest {
            system_prompt: &self.prompt,
            content: &content,
            max_output_tokens: self.max_output_tokens,
        };
        match client.complete_governed(&self.governor, &request).await {
            Ok(completion) => scored(task, completion, None, ocr_engine),
            Err(failure) => failed(task, DocumentError::Provider(failure), 0.0, ocr_engine),
        }
    }

    async fn classify_ocr(
        &self,
        ocr: &OcrClient,
        classifier: &VisionClient,
        task: &ClassificationTask,
    ) -> ClassificationResult {
        let ocr_engine = Some(ocr.model_name().to_string());
        if let Err(e) = render::open_document(&task.file_path) {
            return failed(task, e.into(), 0.0, ocr_engine);
        }

        let ocr_completion = match ocr
            .ocr_governed(&self.governor, &task.file_path, self.max_pages)
            .await
        {
            Ok(completion) => completion,
            Err(failure) => return failed(task, DocumentError::Ocr(failure), 0.0, ocr_engine),
        };

        let content = DocumentContent::Text(ocr_completion.text());
        if content.is_empty() {
            return failed(
                task,
                DocumentError::EmptyText(task.file_path.clone()),
                ocr_completion.cost,
                ocr_engine,
            );
        }

        let request = VisionRequest {
            system_prompt: &self.prompt,
            content: &content,
            max_output_tokens: self.max_output_tokens,
        };
        match classifier.complete_governed(&self.governor, &request).await {
            Ok(completion) => scored(task, completion, Some(&ocr_completion), ocr_engine),
            Err(failure) => failed(
                task,
                DocumentError::Provider(failure),
                ocr_completion.cost,
                ocr_engine,
            ),
        }
    }

    /// Rendered pages, or the text layer in text mode. Runs off the scheduler.
    async fn load_content(&self, task: &ClassificationTask) -> Result<DocumentContent, DocumentError> {
        let path = task.file_path.clone();
        if self.text_mode {
            let max_pages = self.max_pages;
            let text = tokio::task::spawn_blocking(move || render::extract_text(&path, max_pages))
                .await
                .map_err(|e| RenderError::Join(e.to_string()))??;
            if text.trim().is_empty() {
                return Err(DocumentError::EmptyText(task.file_path.clone()));
            }
            return Ok(DocumentContent::Text(text));
        }

        let images =
            render::render_pages_blocking(path, self.max_pages, self.rasterizer.clone()).await?;
        if images.is_empty() {
            return Err(DocumentError::EmptyRender(task.file_path.clone()));
        }
        Ok(DocumentContent::Images(images))
    }

    fn check_budget(&self) {
        let spent = self.ledger.totals().cost;
        if spent > self.budget_limit && !self.budget_warned.swap(true, Ordering::SeqCst) {
            warn!(
                "Estimated cost ${:.4} exceeds budget limit ${:.2}; continuing",
                spent, self.budget_limit
            );
        }
    }
}

fn scored(
    task: &ClassificationTask,
    completion: Completion,
    ocr: Option<&Completion>,
    ocr_engine: Option<String>,
) -> ClassificationResult {
    let text = completion.text();
    let ocr_time = ocr.map(|c| c.response_time).unwrap_or_default();
    let ocr_retries = ocr.map(|c| c.retries).unwrap_or(0);

    ClassificationResult {
        document_id: task.document_id.clone(),
        filename: task.filename(),
        predicted_label: Some(extract_classification(&text)),
        expected_label: task.expected_label.clone(),
        raw_response_text: text,
        response_time: Some(completion.response_time + ocr_time),
        estimated_cost: completion.cost,
        ocr_cost: ocr.map(|c| c.cost).unwrap_or(0.0),
        token_counts: completion.token_counts,
        retry_count: completion.retries.max(ocr_retries),
        error: None,
        ocr_engine,
    }
}

fn failed(
    task: &ClassificationTask,
    error: DocumentError,
    ocr_cost: f64,
    ocr_engine: Option<String>,
) -> ClassificationResult {
    let mut result =
        ClassificationResult::failed(&task.document_id, task.filename(), error.to_string());
    result.expected_label = task.expected_label.clone();
    result.retry_count = error.retries();
    result.ocr_cost = ocr_cost;
    result.ocr_engine = ocr_engine;
    result
}
