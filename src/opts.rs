/// Default base URL for both generative service calls.
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Default transcription model identifier.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Default chat-completion model identifier used for rubric evaluation.
pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4o-mini";

/// Default sampling temperature for evaluation.
///
/// Kept low on purpose: scoring should be as consistent as a sampled model
/// allows, even though it is never fully deterministic.
pub const DEFAULT_TEMPERATURE: f32 = 0.4;

/// Options that control how an analysis run talks to the external services.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// The CLI and server are responsible for mapping user input into this type so that:
/// - the library remains reusable outside of a CLI context
/// - other frontends (APIs, tests, batch jobs) can construct options programmatically
#[derive(Debug, Clone)]
pub struct Opts {
    /// Base URL of the OpenAI-compatible API, without a trailing slash.
    ///
    /// Both the transcription and the chat-completion call are resolved
    /// against this, so tests and self-hosted gateways can redirect the
    /// whole pipeline with one setting.
    pub api_base_url: String,

    /// Model identifier sent with the transcription request.
    pub transcription_model: String,

    /// Model identifier sent with the evaluation request.
    pub generation_model: String,

    /// Sampling temperature for the evaluation request.
    pub temperature: f32,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_owned(),
            generation_model: DEFAULT_GENERATION_MODEL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_service_contract() {
        let opts = Opts::default();
        assert_eq!(opts.transcription_model, "whisper-1");
        assert_eq!(opts.generation_model, "gpt-4o-mini");
        assert!((opts.temperature - 0.4).abs() < f32::EPSILON);
        assert!(!opts.api_base_url.ends_with('/'));
    }
}
