//! The session object that sequences load, chunk, estimate, clear, index,
//! retrieve and generate.
//!
//! ```text
//! Empty --ingest--> Loaded --populate--> Ready --ingest--> Loaded ...
//!   \--resume (index exists)-----------> Ready
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use askdoc_core::chunker::Chunker;
use askdoc_core::config::Settings;
use askdoc_core::cost::CostEstimator;
use askdoc_core::error::{Phase, PipelineContext, Step};
use askdoc_core::loader::LoaderRegistry;
use askdoc_core::traits::{Embedder, Generator, IndexService};
use askdoc_core::types::{Answer, Chunk, CostEstimate, IndexHandle, Metric};
use askdoc_core::{Error, PipelineError};

use crate::answerer::Answerer;
use crate::index_manager::IndexManager;
use crate::retriever::Retriever;

/// Knobs that are not owned by a single collaborator.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub index_name: String,
    /// Declared vector width; must equal the embedder's.
    pub dimension: usize,
    pub metric: Metric,
    pub top_k: usize,
    pub clear_before_ingest: bool,
    pub max_context_chars: usize,
    /// Chunks per embedding call during population.
    pub embed_batch: usize,
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            index_name: settings.index.name.clone(),
            dimension: settings.embedding.dimension,
            metric: settings.index.metric,
            top_k: settings.retrieval.top_k,
            clear_before_ingest: settings.index.clear_before_ingest,
            max_context_chars: settings.generation.max_context_chars,
            embed_batch: settings.embedding.batch_size,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionState {
    Empty,
    Loaded { document: PathBuf, chunks: Vec<Chunk> },
    Ready { document: Option<PathBuf>, handle: IndexHandle },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Loaded { .. } => "loaded",
            SessionState::Ready { .. } => "ready",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub document: PathBuf,
    pub chunks: usize,
    pub cost: CostEstimate,
    /// Indexes deleted before population.
    pub cleared: Vec<String>,
    pub reused: bool,
    pub handle: IndexHandle,
}

#[derive(Debug, Clone)]
pub struct EstimateReport {
    pub document: PathBuf,
    pub chunks: usize,
    pub cost: CostEstimate,
}

pub struct Pipeline {
    loaders: LoaderRegistry,
    chunker: Chunker,
    estimator: CostEstimator,
    embedder: Arc<dyn Embedder>,
    manager: IndexManager,
    retriever: Retriever,
    answerer: Answerer,
    options: PipelineOptions,
    state: SessionState,
}

impl Pipeline {
    pub fn new(
        loaders: LoaderRegistry,
        chunker: Chunker,
        estimator: CostEstimator,
        embedder: Arc<dyn Embedder>,
        service: Arc<dyn IndexService>,
        generator: Arc<dyn Generator>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            loaders,
            chunker,
            estimator,
            manager: IndexManager::new(service.clone()).with_embed_batch(options.embed_batch),
            retriever: Retriever::new(service, embedder.clone()),
            answerer: Answerer::new(generator, options.max_context_chars),
            embedder,
            options,
            state: SessionState::Empty,
        }
    }

    /// Chunker, estimator and options from `settings`; collaborators supplied by the caller.
    pub fn from_settings(
        settings: &Settings,
        loaders: LoaderRegistry,
        embedder: Arc<dyn Embedder>,
        service: Arc<dyn IndexService>,
        generator: Arc<dyn Generator>,
    ) -> askdoc_core::Result<Self> {
        let chunker = Chunker::new(settings.chunking_config())?;
        let estimator = CostEstimator::from_name(&settings.embedding.tokenizer, settings.embedding_price())?;
        Ok(Self::new(
            loaders,
            chunker,
            estimator,
            embedder,
            service,
            generator,
            PipelineOptions::from_settings(settings),
        ))
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready { .. })
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn index_manager(&self) -> &IndexManager {
        &self.manager
    }

    fn load_and_chunk(&self, path: &Path, phase: Phase) -> Result<Vec<Chunk>, PipelineError> {
        self.loaders.ensure_supported(path).at(phase, Step::Precondition)?;
        let document = self.loaders.load(path).at(phase, Step::Load)?;
        let chunks = self.chunker.chunk(&document);
        if chunks.is_empty() {
            return Err(PipelineError::new(phase, Step::Chunk, Error::EmptyDocument(path.to_path_buf())));
        }
        Ok(chunks)
    }

    /// Load, chunk and price `path` without touching any index.
    pub fn estimate(&self, path: &Path) -> Result<EstimateReport, PipelineError> {
        let chunks = self.load_and_chunk(path, Phase::Ingest)?;
        let cost = self.estimator.estimate(&chunks);
        Ok(EstimateReport { document: path.to_path_buf(), chunks: chunks.len(), cost })
    }

    /// Make `path` the session's document and bring its index to `Ready`.
    ///
    /// A failure during load or chunk leaves the previous state untouched; a
    /// later failure leaves the session `Loaded`.
    pub fn ingest(&mut self, path: &Path) -> Result<IngestReport, PipelineError> {
        let chunks = self.load_and_chunk(path, Phase::Ingest)?;
        match self.index_chunks(path, &chunks) {
            Ok(report) => {
                self.state = SessionState::Ready { document: Some(path.to_path_buf()), handle: report.handle.clone() };
                tracing::info!(index = %report.handle.name, reused = report.reused, "session ready");
                Ok(report)
            }
            Err(err) => {
                self.state = SessionState::Loaded { document: path.to_path_buf(), chunks };
                Err(err)
            }
        }
    }

    fn index_chunks(&self, path: &Path, chunks: &[Chunk]) -> Result<IngestReport, PipelineError> {
        let cost = self.estimator.estimate(chunks);
        tracing::info!(
            document = %path.display(),
            chunks = chunks.len(),
            tokens = cost.total_tokens,
            usd = cost.estimated_cost,
            "embedding cost estimate"
        );

        let cleared = if self.options.clear_before_ingest {
            self.manager.delete_all().at(Phase::Ingest, Step::Clear)?
        } else {
            Vec::new()
        };

        let population = self
            .manager
            .get_or_create_and_populate(
                &self.options.index_name,
                chunks,
                self.embedder.as_ref(),
                self.options.dimension,
                self.options.metric,
            )
            .at(Phase::Ingest, Step::Index)?;

        Ok(IngestReport {
            document: path.to_path_buf(),
            chunks: chunks.len(),
            cost,
            cleared,
            reused: population.reused,
            handle: population.handle,
        })
    }

    /// Attach to the configured index if it already exists. Returns whether the session is now `Ready`.
    pub fn resume(&mut self) -> Result<bool, PipelineError> {
        let Some(handle) = self.manager.open(&self.options.index_name).at(Phase::Answer, Step::Precondition)? else {
            return Ok(false);
        };
        tracing::info!(index = %handle.name, embedder = %handle.embedder_id, "resumed existing index");
        self.state = SessionState::Ready { document: None, handle };
        Ok(true)
    }

    /// Retrieve the top-k chunks for `question` and generate an answer from them.
    pub fn answer(&self, question: &str) -> Result<Answer, PipelineError> {
        let SessionState::Ready { handle, .. } = &self.state else {
            return Err(PipelineError::new(Phase::Answer, Step::Precondition, Error::NotReady));
        };
        if question.trim().is_empty() {
            return Err(PipelineError::new(
                Phase::Answer,
                Step::Precondition,
                Error::InvalidInput("question must not be empty".into()),
            ));
        }
        let result = self
            .retriever
            .retrieve(handle, question, self.options.top_k)
            .at(Phase::Answer, Step::Retrieve)?;
        self.answerer.answer(result, question).at(Phase::Answer, Step::Generate)
    }
}
