pub mod answerer;
pub mod generator;
pub mod index_manager;
pub mod pipeline;
pub mod retriever;

pub use answerer::{Answerer, NO_INFORMATION_ANSWER};
pub use generator::OpenAiChatGenerator;
pub use index_manager::{IndexManager, Population};
pub use pipeline::{EstimateReport, IngestReport, Pipeline, PipelineOptions, SessionState};
pub use retriever::Retriever;
