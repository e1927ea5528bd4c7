//! High-level API for running call-quality analyses.
//!
//! We expose a single entry point (`Analyzer`) that wires up
//! ingest → normalize → transcribe → evaluate → report for one uploaded file.
//!
//! The intent is:
//! - Service clients are constructed once and injected (no globals).
//! - One call to `analyze` is one pipeline run: strictly sequential, no
//!   shared mutable state, no background work, no cancellation mid-run.
//! - Every temp file created by a run is scoped to it and removed on every
//!   exit path, because cleanup rides on `TempPath` drops.
//!
//! Concurrent runs are safe as long as the injected services are: the
//! analyzer only reads its own fields, and temp-file names never collide.

use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::evaluate::{GenerationService, build_messages};
use crate::ingest::{self, extension_accepted, report_filename};
use crate::normalize::normalize;
use crate::report::{self, REPORT_MIME};
use crate::rubric::Rubric;
use crate::transcribe::TranscriptionService;

/// A rendered report ready for download.
#[derive(Debug, Clone)]
pub struct Report {
    /// The PDF document.
    pub bytes: Vec<u8>,
    /// Suggested download filename, `Travers_Analysis_<stem>.pdf`.
    pub filename: String,
    /// Always `application/pdf`.
    pub mime: &'static str,
}

/// The main analysis entry point.
///
/// `Analyzer` owns the injected service clients plus the run-independent
/// configuration (rubric, temp directory). Construct once, call `analyze`
/// per uploaded file.
pub struct Analyzer<T, G> {
    transcriber: T,
    evaluator: G,
    rubric: Rubric,
    temp_dir: PathBuf,
}

impl<T, G> Analyzer<T, G>
where
    T: TranscriptionService,
    G: GenerationService,
{
    pub fn new(transcriber: T, evaluator: G, rubric: Rubric) -> Self {
        Self {
            transcriber,
            evaluator,
            rubric,
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Scope all of the analyzer's temp files under `dir`.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// The configured rubric.
    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    /// Run the full pipeline over one uploaded file.
    ///
    /// `filename` is the name declared at upload time; its extension gates
    /// the upload (advisory) and hints container probing, and its stem names
    /// the report.
    pub fn analyze(&self, bytes: &[u8], filename: &str) -> Result<Report> {
        let run_id = Uuid::new_v4();
        info!(%run_id, filename, size = bytes.len(), "analysis run started");

        if !extension_accepted(filename) {
            return Err(Error::Ingest(anyhow::anyhow!(
                "unsupported file extension on '{filename}' (accepted: {})",
                ingest::ACCEPTED_EXTENSIONS.join(", ")
            )));
        }

        // Both temp handles live until this function returns, so cleanup is
        // unconditional: early error returns drop them just like success does.
        let media = ingest::ingest_into(&self.temp_dir, bytes, filename).map_err(Error::Ingest)?;

        let transcoded = normalize(media.path(), media.extension(), &self.temp_dir)
            .map_err(Error::Normalize)?;
        let audio_path: &Path = transcoded.as_deref().unwrap_or_else(|| media.path());

        let transcript = self
            .transcriber
            .transcribe(audio_path)
            .map_err(Error::Transcribe)?;
        info!(%run_id, chars = transcript.len(), "transcription complete");

        let messages = build_messages(&self.rubric, &transcript);
        let evaluation = self
            .evaluator
            .complete(&messages)
            .map_err(Error::Evaluate)?;
        info!(%run_id, chars = evaluation.len(), "evaluation complete");

        let pdf = report::render(&transcript, &evaluation).map_err(Error::Report)?;
        info!(%run_id, bytes = pdf.len(), "report rendered");

        Ok(Report {
            bytes: pdf,
            filename: report_filename(filename),
            mime: REPORT_MIME,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Mutex;

    use super::*;
    use crate::evaluate::ChatMessage;
    use crate::wav;

    struct StubTranscriber {
        reply: anyhow::Result<String>,
        seen_specs: Mutex<Vec<hound::WavSpec>>,
    }

    impl StubTranscriber {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_owned()),
                seen_specs: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(anyhow::anyhow!(message.to_owned())),
                seen_specs: Mutex::new(Vec::new()),
            }
        }
    }

    impl TranscriptionService for StubTranscriber {
        fn transcribe(&self, audio: &Path) -> anyhow::Result<String> {
            if let Some(spec) = wav::read_spec(audio) {
                self.seen_specs.lock().unwrap().push(spec);
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(err) => Err(anyhow::anyhow!("{err}")),
            }
        }
    }

    struct StubEvaluator {
        reply: String,
        prompts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl StubEvaluator {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_owned(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl GenerationService for StubEvaluator {
        fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.clone())
        }
    }

    fn silent_wav_bytes(seconds: u32) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let samples = vec![0.0f32; (16_000 * seconds) as usize];
        wav::write_canonical_wav(&mut cursor, &samples).expect("write silent wav");
        cursor.into_inner()
    }

    #[test]
    fn rejects_unsupported_extensions_before_touching_disk() {
        let analyzer = Analyzer::new(StubTranscriber::ok(""), StubEvaluator::new("x"), Rubric::default());

        let err = analyzer.analyze(b"data", "call.mp3").unwrap_err();
        assert_eq!(err.stage(), "ingest");
        assert!(err.to_string().contains("unsupported file extension"));
    }

    #[test]
    fn transcript_is_embedded_verbatim_in_the_evaluation_prompt() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let transcript = "Caller: my order arrived broken.";
        let transcriber = StubTranscriber::ok(transcript);
        let evaluator = StubEvaluator::new("Score: 5/10");

        let analyzer = Analyzer::new(transcriber, evaluator, Rubric::default())
            .with_temp_dir(dir.path());
        let report = analyzer.analyze(&silent_wav_bytes(1), "order.wav")?;

        assert!(!report.bytes.is_empty());
        let prompts = analyzer.evaluator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0][1].content.contains(transcript));
        Ok(())
    }

    #[test]
    fn stub_transcriber_receives_canonical_audio() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let analyzer = Analyzer::new(
            StubTranscriber::ok(""),
            StubEvaluator::new("Score: 5/10"),
            Rubric::default(),
        )
        .with_temp_dir(dir.path());

        analyzer.analyze(&silent_wav_bytes(2), "test.wav")?;

        let specs = analyzer.transcriber.seen_specs.lock().unwrap();
        assert_eq!(specs.len(), 1);
        assert!(wav::spec_is_canonical(&specs[0]));
        Ok(())
    }

    #[test]
    fn failed_transcription_aborts_with_the_transcribe_stage() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let analyzer = Analyzer::new(
            StubTranscriber::failing("connection reset by peer"),
            StubEvaluator::new("never used"),
            Rubric::default(),
        )
        .with_temp_dir(dir.path());

        let err = analyzer.analyze(&silent_wav_bytes(1), "test.wav").unwrap_err();
        assert_eq!(err.stage(), "transcribe");

        // The evaluator must never be consulted once transcription fails.
        assert!(analyzer.evaluator.prompts.lock().unwrap().is_empty());
        Ok(())
    }
}
