use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use travers::ingest::{ACCEPTED_EXTENSIONS, extension_accepted};
use travers::{Analyzer, OpenAiEvaluator, OpenAiTranscriber, Opts, Rubric};

#[derive(Parser, Debug)]
#[command(name = "travers")]
#[command(about = "Analyze a call recording and write a PDF quality report")]
struct Params {
    /// Path to the call recording (mp4, mov, wav or m4a).
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Where to write the report. Defaults to `Travers_Analysis_<stem>.pdf`
    /// in the current directory.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Path to a rubric JSON file (`{"categories": [...]}`).
    /// When omitted, the built-in ten-category rubric is used.
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

fn main() -> Result<()> {
    travers::init_logging();

    let params = Params::parse();

    // The one external credential; absence is fatal at startup, not per-request.
    let api_key =
        std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set in the environment")?;

    let filename = params
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .context("input path has no usable filename")?
        .to_owned();

    if !extension_accepted(&filename) {
        bail!(
            "'{filename}' has an unsupported extension (accepted: {})",
            ACCEPTED_EXTENSIONS.join(", ")
        );
    }

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

    let bytes = std::fs::read(&params.input)
        .with_context(|| format!("failed to read '{}'", params.input.display()))?;

    let report = analyzer.analyze(&bytes, &filename)?;

    let output = params
        .output
        .unwrap_or_else(|| PathBuf::from(&report.filename));
    std::fs::write(&output, &report.bytes)
        .with_context(|| format!("failed to write report to '{}'", output.display()))?;

    println!("{}", output.display());
    Ok(())
}
