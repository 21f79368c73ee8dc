use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Ingestion failed: {0}")]
    Ingestion(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Scoring artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Attribution failed: {0}")]
    Attribution(String),

    #[error("Model error: {0}")]
    Model(String),
}
