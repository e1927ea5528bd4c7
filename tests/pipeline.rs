use std::io::Cursor;
use std::path::Path;

use travers::evaluate::{ChatMessage, GenerationService};
use travers::transcribe::TranscriptionService;
use travers::{Analyzer, Rubric, wav};

struct StubTranscriber {
    fail: bool,
}

impl TranscriptionService for StubTranscriber {
    fn transcribe(&self, _audio: &Path) -> anyhow::Result<String> {
        if self.fail {
            anyhow::bail!("network error: connection refused");
        }
        Ok(String::new())
    }
}

struct StubEvaluator;

impl GenerationService for StubEvaluator {
    fn complete(&self, _messages: &[ChatMessage]) -> anyhow::Result<String> {
        Ok("Score: 5/10".to_owned())
    }
}

fn silent_mono_wav(seconds: u32) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    let samples = vec![0.0f32; (16_000 * seconds) as usize];
    wav::write_canonical_wav(&mut cursor, &samples).expect("write silent wav");
    cursor.into_inner()
}

fn files_in(dir: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .expect("read temp dir")
        .map(|entry| entry.expect("dir entry").path())
        .collect()
}

#[test]
fn end_to_end_silent_wav_produces_a_named_pdf() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let analyzer = Analyzer::new(
        StubTranscriber { fail: false },
        StubEvaluator,
        Rubric::default(),
    )
    .with_temp_dir(dir.path());

    let report = analyzer.analyze(&silent_mono_wav(2), "test.wav")?;

    assert!(!report.bytes.is_empty());
    assert!(report.bytes.starts_with(b"%PDF-"));
    assert_eq!(report.mime, "application/pdf");
    assert_eq!(report.filename, "Travers_Analysis_test.pdf");

    // Cleanup invariant: the run left nothing behind.
    assert!(files_in(dir.path()).is_empty());
    Ok(())
}

#[test]
fn failed_transcription_leaves_no_temp_files_and_no_report() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let analyzer = Analyzer::new(
        StubTranscriber { fail: true },
        StubEvaluator,
        Rubric::default(),
    )
    .with_temp_dir(dir.path());

    let err = analyzer
        .analyze(&silent_mono_wav(2), "test.wav")
        .unwrap_err();

    assert_eq!(err.stage(), "transcribe");
    assert!(err.to_string().contains("connection refused"));
    assert!(files_in(dir.path()).is_empty());
    Ok(())
}

#[test]
fn non_canonical_upload_is_normalized_then_cleaned_up() -> anyhow::Result<()> {
    // 8 kHz mono input forces the transcode path.
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for i in 0..8_000u32 {
            writer.write_sample(((i % 64) as i16 - 32) * 100)?;
        }
        writer.finalize()?;
    }

    let dir = tempfile::tempdir()?;
    let analyzer = Analyzer::new(
        StubTranscriber { fail: false },
        StubEvaluator,
        Rubric::default(),
    )
    .with_temp_dir(dir.path());

    let report = analyzer.analyze(&cursor.into_inner(), "lowrate.wav")?;

    assert_eq!(report.filename, "Travers_Analysis_lowrate.pdf");
    assert!(files_in(dir.path()).is_empty());
    Ok(())
}
