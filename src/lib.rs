//! `travers` — a call-recording quality-review pipeline.
//!
//! This crate provides:
//! - Scoped ingest of uploaded audio/video blobs
//! - Audio normalization to mono 16 kHz PCM (demux, decode, downmix, resample)
//! - Transcription via an OpenAI-compatible speech-to-text service
//! - Rubric-driven quality evaluation via a chat-completion service
//! - PDF report rendering (transcript + evaluation)
//!
//! The pipeline itself is a stateless function over a single uploaded file:
//! bytes + filename in, report bytes out, typed error otherwise. All session
//! state belongs to the adapters (CLI, HTTP server) built on top of it.

// High-level API (most consumers should start here).
pub mod opts;
pub mod pipeline;

// Stage implementations.
pub mod evaluate;
pub mod ingest;
pub mod normalize;
pub mod report;
pub mod transcribe;

// Audio preprocessing and decoding.
pub mod audio_pipeline;
pub mod decode;
pub mod demux;
pub mod wav;

// Rubric configuration.
pub mod rubric;

// Crate-wide error taxonomy.
pub mod error;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

pub use error::{Error, Result};
pub use evaluate::{ChatMessage, GenerationService, OpenAiEvaluator};
pub use opts::Opts;
pub use pipeline::{Analyzer, Report};
pub use rubric::Rubric;
pub use transcribe::{OpenAiTranscriber, TranscriptionService};

#[cfg(feature = "logging")]
pub use logging::init as init_logging;
