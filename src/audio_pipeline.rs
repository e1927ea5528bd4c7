//! PCM normalization for Travers.
//!
//! Responsibilities:
//! - Convert Symphonia-decoded PCM into interleaved `f32`
//! - Downmix to mono
//! - Resample to the canonical transcription sample rate (when needed)
//!
//! The output of this stage feeds the WAV writer in `wav`, which quantizes
//! to 16-bit PCM. `finish()` must be called at end-of-stream to flush any
//! remaining resampler input.

use anyhow::{Context, Result, anyhow, bail};
use rubato::{Resampler, SincFixedIn, WindowFunction};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};

/// Canonical sample rate required by the transcription service (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// A small stateful converter that turns decoded audio into mono 16 kHz `f32` samples.
///
/// One instance handles one media file; state is the scratch sample buffer,
/// the lazily built resampler, and any source samples still waiting for a
/// full resampler block.
pub struct MonoResampler {
    // Scratch buffer used to copy decoded PCM into an interleaved `Vec<f32>`.
    sample_buf: Option<SampleBuffer<f32>>,

    // Lazily initialized resampler (only needed when the source rate differs from the target).
    resampler: Option<SincFixedIn<f32>>,

    // Mono source samples accumulated until a full rubato input block is available.
    pending: Vec<f32>,
}

impl Default for MonoResampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MonoResampler {
    pub fn new() -> Self {
        Self {
            sample_buf: None,
            resampler: None,
            pending: Vec::new(),
        }
    }

    /// Push one decoded Symphonia buffer and append normalized samples to `out`.
    pub fn push_decoded(&mut self, decoded: &AudioBufferRef<'_>, out: &mut Vec<f32>) -> Result<()> {
        let (interleaved, src_rate, channels) = self.copy_interleaved(decoded)?;
        let mono = downmix_to_mono(&interleaved, channels);

        // Fast path: already at the target sample rate.
        if src_rate == TARGET_SAMPLE_RATE {
            out.extend_from_slice(&mono);
            return Ok(());
        }

        self.ensure_resampler(src_rate)?;
        self.pending.extend_from_slice(&mono);
        self.drain_full_blocks(out)
    }

    /// Flush remaining buffered samples at end-of-stream.
    ///
    /// If resampling was never needed, this is a no-op. The final partial
    /// block is zero-padded to the resampler's block size.
    pub fn finish(&mut self, out: &mut Vec<f32>) -> Result<()> {
        let Some(rs) = self.resampler.as_ref() else {
            return Ok(());
        };

        if self.pending.is_empty() {
            return Ok(());
        }

        let in_max = rs.input_frames_max();
        let rem = self.pending.len() % in_max;
        if rem != 0 {
            self.pending.resize(self.pending.len() + (in_max - rem), 0.0);
        }

        self.drain_full_blocks(out)
    }

    fn copy_interleaved(&mut self, decoded: &AudioBufferRef<'_>) -> Result<(Vec<f32>, u32, usize)> {
        if self.sample_buf.is_none() {
            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;
            self.sample_buf = Some(SampleBuffer::<f32>::new(duration, spec));
        }

        let buf = self
            .sample_buf
            .as_mut()
            .ok_or_else(|| anyhow!("sample buffer not initialized"))?;

        buf.copy_interleaved_ref(decoded.clone());

        let src_rate = decoded.spec().rate;
        let channels = decoded.spec().channels.count();
        if channels == 0 {
            bail!("decoded audio had zero channels");
        }

        Ok((buf.samples().to_vec(), src_rate, channels))
    }

    fn ensure_resampler(&mut self, src_rate: u32) -> Result<()> {
        if self.resampler.is_some() {
            return Ok(());
        }

        // Source frames fed to rubato per `process()` call. Larger blocks favor
        // throughput, which is the right trade for a batch transcode.
        let in_block_frames = 2048;

        let rs = SincFixedIn::<f32>::new(
            TARGET_SAMPLE_RATE as f64 / src_rate as f64,
            2.0,
            rubato::SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: rubato::SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            },
            in_block_frames,
            1, // mono
        )
        .map_err(|e| anyhow!(e))
        .context("failed to init resampler")?;

        self.resampler = Some(rs);
        Ok(())
    }

    fn drain_full_blocks(&mut self, out: &mut Vec<f32>) -> Result<()> {
        loop {
            let rs = self
                .resampler
                .as_mut()
                .ok_or_else(|| anyhow!("resampler not initialized"))?;
            let in_max = rs.input_frames_max();

            if self.pending.len() < in_max {
                return Ok(());
            }

            let block: Vec<f32> = self.pending.drain(..in_max).collect();
            let resampled = rs
                .process(&[block], None)
                .map_err(|e| anyhow!(e))
                .context("resampler process failed")?;

            if resampled.len() != 1 {
                bail!("expected mono output from resampler");
            }

            out.extend_from_slice(&resampled[0]);
        }
    }
}

/// Downmix interleaved samples into mono by averaging channels.
///
/// Policy: equal-weight average across channels (simple, predictable).
fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }

    let frames = interleaved.len() / channels;
    let mut mono = Vec::with_capacity(frames);

    for f in 0..frames {
        let base = f * channels;
        let mut acc = 0.0;
        for c in 0..channels {
            acc += interleaved[base + c];
        }
        mono.push(acc / channels as f32);
    }

    mono
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_is_noop_without_resampler() -> anyhow::Result<()> {
        let mut rs = MonoResampler::new();
        let mut out = Vec::new();
        rs.finish(&mut out)?;
        assert!(out.is_empty());
        Ok(())
    }

    #[test]
    fn downmix_to_mono_single_channel_is_identity() {
        let input = vec![0.0, 1.0, -1.0];
        let mono = downmix_to_mono(&input, 1);
        assert_eq!(mono, input);
    }

    #[test]
    fn downmix_to_mono_averages_channels() {
        // Two frames of stereo: (L=1, R=3), (L=-1, R=1) => mono: 2, 0
        let interleaved = vec![1.0, 3.0, -1.0, 1.0];
        let mono = downmix_to_mono(&interleaved, 2);
        assert_eq!(mono, vec![2.0, 0.0]);
    }

    #[test]
    fn resampler_init_is_idempotent() -> anyhow::Result<()> {
        let mut rs = MonoResampler::new();
        rs.ensure_resampler(8_000)?;
        rs.ensure_resampler(8_000)?;
        assert!(rs.resampler.is_some());
        Ok(())
    }

    #[test]
    fn resample_path_emits_and_finish_flushes_remainder() -> anyhow::Result<()> {
        let mut rs = MonoResampler::new();
        rs.ensure_resampler(8_000)?;

        let in_max = rs
            .resampler
            .as_ref()
            .expect("resampler initialized")
            .input_frames_max();

        // Enough samples to force multiple full blocks plus a remainder that `finish()` flushes.
        rs.pending = vec![0.0; (in_max * 2) + 7];

        let mut out = Vec::new();
        rs.drain_full_blocks(&mut out)?;
        assert!(rs.pending.len() < in_max);

        let emitted_before_finish = out.len();
        rs.finish(&mut out)?;

        assert!(emitted_before_finish > 0);
        assert!(out.len() > emitted_before_finish);
        Ok(())
    }
}
