//! Audio normalization: arbitrary uploaded container → canonical WAV.
//!
//! Policy:
//! - An uploaded WAV whose header already matches the canonical spec is fed
//!   straight to transcription; nothing is rewritten. The header is checked,
//!   never trusted from the extension alone.
//! - Everything else is transcoded: demux (`demux`), decode (`decode`),
//!   downmix + resample (`audio_pipeline`), then written as a 16-bit mono
//!   16 kHz WAV (`wav`).
//! - Transcoding failures abort the run. There is no fallback to feeding the
//!   raw upload to the transcription service.
//!
//! Exactly one new temp file is written per transcode; the ingested file is
//! never mutated.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tempfile::{Builder, TempPath};
use tracing::debug;

use crate::audio_pipeline::MonoResampler;
use crate::decode::{decode_packet_and_then, make_decoder_for_track};
use crate::demux::{next_packet, probe_and_select_audio_track};
use crate::wav;

/// Normalize the ingested media file at `input` into canonical WAV form.
///
/// Returns `None` when the input already conforms (use the ingested file
/// as-is), or `Some(path)` to a freshly written temp WAV under `temp_dir`.
/// The returned `TempPath` deletes the file on drop.
pub fn normalize(
    input: &Path,
    hint_extension: Option<&str>,
    temp_dir: &Path,
) -> Result<Option<TempPath>> {
    if hint_extension == Some("wav") {
        if let Some(spec) = wav::read_spec(input) {
            if wav::spec_is_canonical(&spec) {
                debug!(?input, "upload already canonical, skipping transcode");
                return Ok(None);
            }
        }
    }

    let samples = decode_to_canonical_samples(input, hint_extension)?;
    if samples.is_empty() {
        bail!("media decoded to zero audio samples");
    }

    let mut tmp = Builder::new()
        .prefix("travers-audio-")
        .suffix(".wav")
        .tempfile_in(temp_dir)
        .context("failed to create temp file for normalized audio")?;

    wav::write_canonical_wav(BufWriter::new(tmp.as_file_mut()), &samples)
        .context("failed to write normalized WAV")?;

    debug!(frames = samples.len(), "normalized audio written");
    Ok(Some(tmp.into_temp_path()))
}

/// Decode the full media file into mono 16 kHz `f32` samples.
fn decode_to_canonical_samples(input: &Path, hint_extension: Option<&str>) -> Result<Vec<f32>> {
    let file = File::open(input).context("failed to open ingested media")?;

    let (mut format, track) = probe_and_select_audio_track(Box::new(file), hint_extension)?;
    let mut decoder = make_decoder_for_track(&track)?;
    let mut resampler = MonoResampler::new();
    let mut samples = Vec::<f32>::new();

    loop {
        let Some(packet) = next_packet(&mut format)? else {
            break;
        };

        // Ignore packets from non-audio tracks (video containers).
        if packet.track_id() != track.id {
            continue;
        }

        decode_packet_and_then(&mut decoder, &packet, |decoded| {
            resampler
                .push_decoded(&decoded, &mut samples)
                .context("audio pipeline failed while processing decoded samples")
        })?;
    }

    // Flush any buffered resampler tail.
    resampler
        .finish(&mut samples)
        .context("audio pipeline failed during finalize")?;

    Ok(samples)
}
