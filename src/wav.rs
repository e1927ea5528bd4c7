//! Canonical WAV read/write helpers.
//!
//! The canonical form is what the transcription service expects: mono,
//! 16 kHz, signed 16-bit little-endian PCM. Normalization writes it; the
//! skip check reads headers to decide whether an uploaded WAV already
//! conforms.

use std::io::{Read, Seek, Write};
use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::audio_pipeline::TARGET_SAMPLE_RATE;

/// The canonical WAV spec: mono, 16 kHz, 16-bit integer PCM.
pub fn canonical_spec() -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Whether a WAV header matches the canonical spec.
pub fn spec_is_canonical(spec: &WavSpec) -> bool {
    spec.channels == 1
        && spec.sample_rate == TARGET_SAMPLE_RATE
        && spec.bits_per_sample == 16
        && spec.sample_format == SampleFormat::Int
}

/// Read the WAV header of a file, if it parses as WAV at all.
pub fn read_spec(path: &Path) -> Option<WavSpec> {
    let file = std::fs::File::open(path).ok()?;
    WavReader::new(std::io::BufReader::new(file))
        .ok()
        .map(|reader| reader.spec())
}

/// Write mono `f32` samples in `[-1.0, 1.0]` as a canonical 16-bit PCM WAV.
///
/// Samples outside the valid range are clamped rather than wrapped, so a
/// slightly hot decode never produces wraparound artifacts.
pub fn write_canonical_wav<W>(writer: W, samples: &[f32]) -> Result<()>
where
    W: Write + Seek,
{
    let mut wav = WavWriter::new(writer, canonical_spec())
        .context("failed to start writing canonical WAV")?;

    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let pcm = (clamped * i16::MAX as f32) as i16;
        wav.write_sample(pcm)
            .context("failed to write PCM sample")?;
    }

    wav.finalize().context("failed to finalize canonical WAV")?;
    Ok(())
}

/// Load samples from a canonical WAV as normalized `f32` in `[-1.0, 1.0]`.
///
/// Rejects anything that is not already in canonical form; this is a test
/// and verification helper, not a general-purpose WAV loader.
pub fn read_canonical_samples<R>(reader: R) -> Result<(Vec<f32>, WavSpec)>
where
    R: Read + Seek,
{
    let mut reader = WavReader::new(reader).context("failed to read WAV data")?;
    let spec = reader.spec();

    if !spec_is_canonical(&spec) {
        anyhow::bail!(
            "expected canonical WAV (mono, {} Hz, 16-bit PCM), got {} ch / {} Hz / {} bit",
            TARGET_SAMPLE_RATE,
            spec.channels,
            spec.sample_rate,
            spec.bits_per_sample
        );
    }

    let mut samples = Vec::new();
    for sample in reader.samples::<i16>() {
        let pcm = sample?;
        samples.push(pcm as f32 / i16::MAX as f32);
    }

    Ok((samples, spec))
}
