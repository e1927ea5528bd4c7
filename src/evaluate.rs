//! Evaluation stage: transcript in, opaque rubric feedback out.
//!
//! The prompt is a fixed two-message exchange: a system message establishing
//! the auditor persona and a user message embedding the rubric categories and
//! the transcript verbatim. The reply is returned as-is for rendering; scores
//! are never parsed or validated here.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::opts::Opts;
use crate::rubric::Rubric;

/// System persona for the evaluation request.
pub const AUDITOR_PERSONA: &str =
    "You are an expert call-center quality auditor. Provide structured scores and feedback.";

/// One role/content pair of a chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_owned(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_owned(),
            content: content.into(),
        }
    }
}

/// A component that produces evaluative text from a chat prompt.
pub trait GenerationService: Send + Sync {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Build the fixed two-message evaluation prompt.
///
/// The transcript is embedded verbatim; the rubric categories are numbered in
/// their configured order.
pub fn build_messages(rubric: &Rubric, transcript: &str) -> Vec<ChatMessage> {
    let mut criteria = String::new();
    for (i, category) in rubric.categories.iter().enumerate() {
        criteria.push_str(&format!("{}. {}\n", i + 1, category));
    }

    let user = format!(
        "Evaluate this call on these criteria, scoring each 1-10 or N/A where \
         a category does not apply:\n{criteria}\n\
         Include:\n\
         - What went well\n\
         - Areas for improvement\n\
         - Coaching tips\n\
         - An overall summary and the averaged overall score\n\n\
         Transcription:\n{transcript}"
    );

    vec![ChatMessage::system(AUDITOR_PERSONA), ChatMessage::user(user)]
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Blocking client for an OpenAI-compatible `POST /chat/completions`.
pub struct OpenAiEvaluator {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiEvaluator {
    pub fn new(api_key: impl Into<String>, opts: &Opts) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key: api_key.into(),
            base_url: opts.api_base_url.clone(),
            model: opts.generation_model.clone(),
            temperature: opts.temperature,
        }
    }
}

impl GenerationService for OpenAiEvaluator {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        debug!(model = %self.model, temperature = self.temperature, "requesting evaluation");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("evaluation request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "unknown error".to_owned());
            bail!("generation service returned {status}: {body}");
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .context("failed to decode evaluation response")?;

        let Some(choice) = parsed.choices.into_iter().next() else {
            bail!("generation service returned no choices");
        };

        Ok(choice.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_system_then_user() {
        let messages = build_messages(&Rubric::default(), "hello there");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, AUDITOR_PERSONA);
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn user_message_embeds_transcript_verbatim() {
        let transcript = "Agent: thanks for calling Travers!\nCaller: hi.";
        let messages = build_messages(&Rubric::default(), transcript);
        assert!(messages[1].content.contains(transcript));
    }

    #[test]
    fn user_message_numbers_every_category_in_order() {
        let rubric = Rubric {
            categories: vec!["First".into(), "Second".into()],
        };
        let messages = build_messages(&rubric, "t");
        let content = &messages[1].content;

        assert!(content.contains("1. First\n"));
        assert!(content.contains("2. Second\n"));
        assert!(
            content.find("1. First").unwrap() < content.find("2. Second").unwrap(),
            "categories must keep their configured order"
        );
    }

    #[test]
    fn request_serializes_with_temperature() -> anyhow::Result<()> {
        let messages = build_messages(&Rubric::default(), "t");
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: 0.4,
        };

        let json = serde_json::to_value(&request)?;
        assert_eq!(json["model"], "gpt-4o-mini");
        let temperature = json["temperature"].as_f64().expect("temperature is a number");
        assert!((temperature - 0.4).abs() < 1e-3);
        assert_eq!(json["messages"].as_array().map(Vec::len), Some(2));
        Ok(())
    }
}
