use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use emoface_core::{AnalyzerConfig, OnnxAnalyzer, TensorLayout};
use emoface_intake::UploadStore;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod repl;

const DEFAULT_LOG_FILTER: &str = "info,ort=warn";

#[derive(Parser)]
#[command(name = "emoface", version, about = "Detect the dominant emotion in face images")]
struct Cli {
    /// Directory bare filenames are resolved against
    #[arg(long, env = "EMOFACE_UPLOAD_DIR", default_value = "uploads", global = true)]
    uploads: PathBuf,

    #[command(flatten)]
    models: ModelArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct ModelArgs {
    /// Directory holding det_10g.onnx and emotion_mini_xception.onnx
    #[arg(long, env = "EMOFACE_MODEL_DIR", global = true)]
    model_dir: Option<PathBuf>,

    /// Newline-separated class labels, in model output order
    #[arg(long, env = "EMOFACE_LABELS_PATH", global = true)]
    labels: Option<PathBuf>,

    /// Classifier input layout: nhwc or nchw
    #[arg(long, env = "EMOFACE_CLASSIFIER_LAYOUT", default_value = "nhwc", global = true)]
    layout: TensorLayout,

    /// Look for a face before classifying (`--face-detection false` classifies whole images)
    #[arg(
        long,
        env = "EMOFACE_FACE_DETECTION",
        action = ArgAction::Set,
        default_value_t = true,
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    face_detection: bool,

    /// Report "No face detected!" instead of classifying the whole image
    #[arg(
        long,
        env = "EMOFACE_ENFORCE_DETECTION",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    enforce_detection: bool,
}

impl ModelArgs {
    fn analyzer_config(&self) -> AnalyzerConfig {
        let model_dir = self
            .model_dir
            .clone()
            .unwrap_or_else(emoface_core::default_model_dir);
        AnalyzerConfig {
            labels_path: self.labels.clone(),
            layout: self.layout,
            face_detection: self.face_detection,
            enforce_detection: self.enforce_detection,
            ..AnalyzerConfig::new(model_dir)
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive prompt (the default)
    Repl,
    /// Analyse a single image and print its report
    Analyze {
        /// Filename in the uploads directory, or a path
        path: String,
    },
    /// List readable images in the uploads directory
    List,
}

fn main() -> Result<ExitCode> {
    // Reports go to stdout; keep logs out of the way on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let store = UploadStore::open(&cli.uploads)
        .with_context(|| format!("preparing {}", cli.uploads.display()))?;

    let command = cli.command.unwrap_or(Commands::Repl);
    if let Commands::List = command {
        repl::list_images(&store, &mut io::stdout().lock())?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = cli.models.analyzer_config();
    tracing::debug!(model_dir = %config.model_dir.display(), "loading models");
    let mut analyzer = OnnxAnalyzer::load(&config).context("loading emotion models")?;

    match command {
        Commands::Analyze { path } => {
            let detected = repl::analyze_file(&mut analyzer, &store, &path, &mut io::stdout().lock())?;
            Ok(if detected {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Repl | Commands::List => {
            repl::Session::new(&mut analyzer, &store, io::stdin().lock(), io::stdout().lock())
                .run()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
