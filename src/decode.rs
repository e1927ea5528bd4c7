//! Codec-level decode helpers built on top of Symphonia.
//!
//! This isolates decoder construction and Symphonia's error model so the
//! transcode loop in `normalize` can treat every packet the same way.

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::AudioBufferRef;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{Packet, Track};

/// Create a decoder for the selected audio track.
///
/// Fails if the codec is unsupported or the codec parameters are invalid.
pub fn make_decoder_for_track(track: &Track) -> Result<Box<dyn Decoder>> {
    let decoder_opts: DecoderOptions = Default::default();

    symphonia::default::get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|e| anyhow!(e))
        .context("failed to create decoder for audio track")
}

/// Decode a packet and hand the PCM buffer to a callback.
///
/// Return value semantics:
/// - `Ok(true)`  → a decoded audio buffer was produced and `on_decoded` ran
/// - `Ok(false)` → packet was skipped or stream ended (recoverable)
/// - `Err(_)`    → fatal decoder error; the normalization stage aborts
///
/// A `DecodeError` means one corrupted frame, which is common in
/// phone-recorded media, so we skip it and keep going. An `IoError` is
/// treated as graceful end-of-stream.
pub fn decode_packet_and_then(
    decoder: &mut Box<dyn Decoder>,
    packet: &Packet,
    mut on_decoded: impl FnMut(AudioBufferRef<'_>) -> Result<()>,
) -> Result<bool> {
    match decoder.decode(packet) {
        Ok(buf) => {
            on_decoded(buf)?;
            Ok(true)
        }

        Err(SymphoniaError::DecodeError(_)) => Ok(false),

        Err(SymphoniaError::IoError(_)) => Ok(false),

        Err(e) => Err(anyhow!(e)).context("decoder failure"),
    }
}
