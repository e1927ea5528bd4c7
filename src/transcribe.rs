//! Transcription stage: canonical WAV in, plain text out.
//!
//! The service call is a single synchronous request; long recordings are not
//! chunked and failures are not retried. The interesting part is the
//! response-shape tolerance: deployed transcription gateways disagree on
//! whether they return `{"text": ...}`, a bare string, or something else
//! entirely, so the reply is modeled as a tagged union and every shape is
//! coerced to text rather than rejected.

use std::path::Path;

use anyhow::{Context, Result, bail};
use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::opts::Opts;

/// A component that turns an audio file into a flat text transcript.
///
/// The pipeline depends on this seam, not on a concrete client, so tests and
/// alternative engines can be injected.
pub trait TranscriptionService: Send + Sync {
    fn transcribe(&self, audio: &Path) -> Result<String>;
}

/// The shapes a transcription reply is known to arrive in.
#[derive(Debug)]
pub enum TranscriptReply {
    /// A well-formed object whose `text` field is a string.
    Structured { text: String },

    /// An object that has a `text` key of some other type.
    Mapping(serde_json::Map<String, Value>),

    /// A bare string.
    Raw(String),

    /// Anything else. Coerced to its serialized form, never an error.
    Unknown(Value),
}

#[derive(Deserialize)]
struct StructuredBody {
    text: String,
}

impl TranscriptReply {
    /// Classify a decoded JSON value into one of the known reply shapes.
    pub fn classify(value: Value) -> Self {
        if let Ok(body) = serde_json::from_value::<StructuredBody>(value.clone()) {
            return TranscriptReply::Structured { text: body.text };
        }

        match value {
            Value::Object(map) if map.contains_key("text") => TranscriptReply::Mapping(map),
            Value::String(s) => TranscriptReply::Raw(s),
            other => TranscriptReply::Unknown(other),
        }
    }

    /// Collapse the reply into transcript text. Infallible by design.
    pub fn into_text(self) -> String {
        match self {
            TranscriptReply::Structured { text } => text,
            TranscriptReply::Mapping(map) => match &map["text"] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            TranscriptReply::Raw(s) => s,
            TranscriptReply::Unknown(value) => value.to_string(),
        }
    }
}

/// Coerce a raw response body into transcript text.
///
/// A body that is not JSON at all (e.g. `response_format=text` gateways) is
/// taken verbatim.
pub fn coerce_response_text(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => TranscriptReply::classify(value).into_text(),
        Err(_) => body.to_owned(),
    }
}

/// Blocking client for an OpenAI-compatible `POST /audio/transcriptions`.
pub struct OpenAiTranscriber {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(api_key: impl Into<String>, opts: &Opts) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key: api_key.into(),
            base_url: opts.api_base_url.clone(),
            model: opts.transcription_model.clone(),
        }
    }
}

impl TranscriptionService for OpenAiTranscriber {
    fn transcribe(&self, audio: &Path) -> Result<String> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let bytes = std::fs::read(audio).context("failed to read normalized audio for upload")?;
        let file_part = Part::bytes(bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .context("invalid mime for audio part")?;

        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", file_part);

        debug!(model = %self.model, "sending audio to transcription service");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .context("transcription request failed")?;

        let status = response.status();
        let body = response
            .text()
            .context("failed to read transcription response body")?;

        if !status.is_success() {
            bail!("transcription service returned {status}: {body}");
        }

        Ok(coerce_response_text(&body))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn structured_object_with_text_yields_the_text() {
        let reply = TranscriptReply::classify(json!({"text": "hello"}));
        assert!(matches!(reply, TranscriptReply::Structured { .. }));
        assert_eq!(reply.into_text(), "hello");
    }

    #[test]
    fn mapping_with_non_string_text_is_coerced() {
        let reply = TranscriptReply::classify(json!({"text": 42}));
        assert!(matches!(reply, TranscriptReply::Mapping(_)));
        assert_eq!(reply.into_text(), "42");
    }

    #[test]
    fn bare_string_yields_itself() {
        let reply = TranscriptReply::classify(json!("hello"));
        assert!(matches!(reply, TranscriptReply::Raw(_)));
        assert_eq!(reply.into_text(), "hello");
    }

    #[test]
    fn unknown_shape_is_stringified_without_raising() {
        let reply = TranscriptReply::classify(json!({"segments": [1, 2, 3]}));
        assert!(matches!(reply, TranscriptReply::Unknown(_)));
        assert_eq!(reply.into_text(), r#"{"segments":[1,2,3]}"#);
    }

    #[test]
    fn non_json_body_is_taken_verbatim() {
        assert_eq!(coerce_response_text("plain transcript"), "plain transcript");
    }

    #[test]
    fn json_body_goes_through_classification() {
        assert_eq!(coerce_response_text(r#"{"text": "hello"}"#), "hello");
        assert_eq!(coerce_response_text(r#""hello""#), "hello");
    }
}
