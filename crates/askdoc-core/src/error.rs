use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported format '{extension}' for {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Unreadable document {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("Document has no extractable text: {}", .0.display())]
    EmptyDocument(PathBuf),

    #[error("Index service unavailable: {0:#}")]
    IndexServiceUnavailable(#[source] anyhow::Error),

    #[error("Dimension mismatch: index expects {expected}, embedding has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index '{index}' was populated by '{indexed_with}' but queries use '{querying_with}'")]
    EmbeddingFunctionMismatch { index: String, indexed_with: String, querying_with: String },

    #[error("Embedding failed: {0:#}")]
    EmbeddingFailure(#[source] anyhow::Error),

    #[error("No document has been ingested yet")]
    NotReady,

    #[error("Generation failed: {0:#}")]
    GenerationFailure(#[source] anyhow::Error),

    #[error("Retrieval failed: {0:#}")]
    RetrievalFailure(#[source] anyhow::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Lifecycle phase an orchestrator failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ingest,
    Answer,
}

/// Sub-step of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Precondition,
    Load,
    Chunk,
    Estimate,
    Clear,
    Index,
    Retrieve,
    Generate,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Ingest => "ingest",
            Phase::Answer => "answer",
        })
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Precondition => "precondition",
            Step::Load => "load",
            Step::Chunk => "chunk",
            Step::Estimate => "estimate",
            Step::Clear => "clear",
            Step::Index => "index",
            Step::Retrieve => "retrieve",
            Step::Generate => "generate",
        })
    }
}

/// An [`Error`] tagged with where in the pipeline it surfaced.
#[derive(Debug, Error)]
#[error("{phase} failed at {step}: {error}")]
pub struct PipelineError {
    pub phase: Phase,
    pub step: Step,
    #[source]
    pub error: Error,
}

impl PipelineError {
    pub fn new(phase: Phase, step: Step, error: Error) -> Self {
        Self { phase, step, error }
    }

    pub fn kind(&self) -> &Error {
        &self.error
    }
}

/// Attach phase/step context to a core result.
pub trait PipelineContext<T> {
    fn at(self, phase: Phase, step: Step) -> std::result::Result<T, PipelineError>;
}

impl<T> PipelineContext<T> for Result<T> {
    fn at(self, phase: Phase, step: Step) -> std::result::Result<T, PipelineError> {
        self.map_err(|error| PipelineError::new(phase, step, error))
    }
}
