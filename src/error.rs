use thiserror::Error;

/// Travers' crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline-level error, tagged by the stage that failed.
///
/// Every variant is fatal to the run it occurred in: the pipeline aborts,
/// temp files are released, and the error is surfaced to the caller verbatim.
/// Nothing here is retried or cached.
///
/// This is intentionally decoupled from `anyhow` so downstream libraries aren't forced to
/// adopt `anyhow` in their own public APIs; the stage modules use `anyhow` internally and
/// the pipeline wraps their errors at the stage boundary.
#[derive(Debug, Error)]
pub enum Error {
    #[error("ingest failed: {0:#}")]
    Ingest(anyhow::Error),

    #[error("audio normalization failed: {0:#}")]
    Normalize(anyhow::Error),

    #[error("transcription failed: {0:#}")]
    Transcribe(anyhow::Error),

    #[error("evaluation failed: {0:#}")]
    Evaluate(anyhow::Error),

    #[error("report rendering failed: {0:#}")]
    Report(anyhow::Error),
}

impl Error {
    /// The pipeline stage this error belongs to, as a stable label
    /// (useful for logging and metrics).
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Ingest(_) => "ingest",
            Error::Normalize(_) => "normalize",
            Error::Transcribe(_) => "transcribe",
            Error::Evaluate(_) => "evaluate",
            Error::Report(_) => "report",
        }
    }
}
