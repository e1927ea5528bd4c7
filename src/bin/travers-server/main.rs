use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info};

mod metrics;

use travers::ingest::{ACCEPTED_EXTENSIONS, extension_accepted};
use travers::{Analyzer, OpenAiEvaluator, OpenAiTranscriber, Opts, Rubric};

#[derive(Parser, Debug)]
#[command(name = "travers-server")]
#[command(about = "HTTP server for call-recording quality analysis")]
struct Params {
    /// Host interface to bind to.
    #[arg(long = "host", default_value = "127.0.0.1")]
    host: String,

    /// TCP port to listen on.
    #[arg(long = "port", default_value_t = 8080)]
    port: u16,

    /// Maximum request body size (bytes).
    #[arg(long = "max-bytes", default_value_t = 100 * 1024 * 1024)]
    max_bytes: usize,

    /// Path to a rubric JSON file (`{"categories": [...]}`).
    #[arg(long = "rubric")]
    rubric: Option<PathBuf>,

    /// Transcription model identifier.
    #[arg(long = "transcription-model", default_value = travers::opts::DEFAULT_TRANSCRIPTION_MODEL)]
    transcription_model: String,

    /// Evaluation model identifier.
    #[arg(long = "generation-model", default_value = travers::opts::DEFAULT_GENERATION_MODEL)]
    generation_model: String,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long = "base-url", default_value = travers::opts::DEFAULT_API_BASE_URL)]
    base_url: String,
}

#[derive(Clone)]
struct AppState {
    analyzer: Arc<Analyzer<OpenAiTranscriber, OpenAiEvaluator>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unsupported_media(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    /// Map a pipeline failure onto an HTTP status.
    ///
    /// Upstream service failures read as a bad gateway; a bad upload reads as
    /// unprocessable; everything else is on us.
    fn from_pipeline(err: &travers::Error) -> Self {
        let status = match err.stage() {
            "transcribe" | "evaluate" => StatusCode::BAD_GATEWAY,
            "normalize" => StatusCode::UNPROCESSABLE_ENTITY,
            "ingest" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[tokio::main]
async fn main() {
    travers::init_logging();

    if let Err(err) = run().await {
        error!(error = ?err, "travers-server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let params = Params::parse();

    metrics::init();

    // The one external credential; absence is fatal at startup, not per-request.
    let api_key =
        std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set in the environment")?;

    let addr: SocketAddr = format!("{}:{}", params.host, params.port)
        .parse()
        .context("invalid host/port bind address")?;

    let rubric = match &params.rubric {
        Some(path) => Rubric::from_json_file(path)?,
        None => Rubric::default(),
    };

    let opts = Opts {
        api_base_url: params.base_url.clone(),
        transcription_model: params.transcription_model.clone(),
        generation_model: params.generation_model.clone(),
        ..Opts::default()
    };

    let analyzer = Analyzer::new(
        OpenAiTranscriber::new(&api_key, &opts),
        OpenAiEvaluator::new(&api_key, &opts),
        rubric,
    );

    let state = AppState {
        analyzer: Arc::new(analyzer),
    };

    let app = Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics::prometheus_metrics))
        .route("/v1/rubric", get(rubric_categories))
        .route("/v1/analyze", post(analyze))
        .route_layer(from_fn(metrics::track_http_metrics))
        .with_state(state)
        .layer(DefaultBodyLimit::max(params.max_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        );

    let listener = TcpListener::bind(addr).await.context("bind failed")?;
    info!(%addr, "listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

async fn root() -> &'static str {
    "travers-server: POST /v1/analyze (multipart field: file)"
}

async fn healthz() -> &'static str {
    "ok"
}

async fn rubric_categories(State(state): State<AppState>) -> Json<Rubric> {
    Json(state.analyzer.rubric().clone())
}

async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> std::result::Result<Response, AppError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .ok_or_else(|| AppError::bad_request("multipart field 'file' must carry a filename"))?
            .to_owned();

        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(err.to_string()))?;

        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(AppError::bad_request("multipart field 'file' is required"));
    };

    if !extension_accepted(&filename) {
        return Err(AppError::unsupported_media(format!(
            "'{filename}' has an unsupported extension (accepted: {})",
            ACCEPTED_EXTENSIONS.join(", ")
        )));
    }

    // One run blocks until it completes or fails; keep it off the async workers.
    let analyzer = state.analyzer.clone();
    let result = tokio::task::spawn_blocking(move || analyzer.analyze(&bytes, &filename))
        .await
        .map_err(|_| AppError::internal("analysis task panicked"))?;

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            metrics::record_pipeline_failure(err.stage());
            error!(stage = err.stage(), error = %err, "analysis failed");
            return Err(AppError::from_pipeline(&err));
        }
    };

    let disposition = attachment_disposition(&report.filename)
        .map_err(|_| AppError::internal("report filename is not a valid header value"))?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/pdf"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.bytes,
    )
        .into_response())
}

/// Build a `Content-Disposition: attachment` header for the report filename.
///
/// Quotes and control characters are stripped so the value stays a single
/// well-formed quoted string.
fn attachment_disposition(filename: &str) -> std::result::Result<HeaderValue, header::InvalidHeaderValue> {
    let safe: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_disposition_quotes_the_filename() -> anyhow::Result<()> {
        let value = attachment_disposition("Travers_Analysis_test.pdf")?;
        assert_eq!(
            value.to_str()?,
            "attachment; filename=\"Travers_Analysis_test.pdf\""
        );
        Ok(())
    }

    #[test]
    fn attachment_disposition_strips_header_breaking_characters() -> anyhow::Result<()> {
        let value = attachment_disposition("bad\"name\r\n.pdf")?;
        assert_eq!(value.to_str()?, "attachment; filename=\"badname.pdf\"");
        Ok(())
    }

    #[test]
    fn pipeline_errors_map_to_sensible_statuses() {
        let err = travers::Error::Transcribe(anyhow::anyhow!("quota exceeded"));
        assert_eq!(AppError::from_pipeline(&err).status, StatusCode::BAD_GATEWAY);

        let err = travers::Error::Normalize(anyhow::anyhow!("no audio track"));
        assert_eq!(
            AppError::from_pipeline(&err).status,
            StatusCode::UNPROCESSABLE_ENTITY
        );

        let err = travers::Error::Report(anyhow::anyhow!("font"));
        assert_eq!(
            AppError::from_pipeline(&err).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
