//! Digit recognizer server and CLI
//!
//! A cross-platform binary for handwritten digit prediction via CLI or HTTP
//! server.
//!
//! # Usage
//!
//! ## CLI Mode
//! ```bash
//! digit-server predict --file seven.png --model models/mnist_cnn_model.onnx
//! digit-server predict --url "https://example.com/digit.png" --model models/mnist_cnn_model.onnx --output json
//! ```
//!
//! ## Server Mode
//! ```bash
//! digit-server serve --model models/mnist_cnn_model.onnx --port 5000 --upload-dir static/uploads
//! ```

mod cli;
mod config;
mod digit;
mod server;

use clap::{Args, Parser, Subcommand};
use digit_recognizer::processors::ResizeFilter;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "digit-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Handwritten digit prediction via CLI or HTTP server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Model options shared by both subcommands
#[derive(Args)]
struct ModelArgs {
    /// Path to the ONNX digit classifier
    #[arg(long, env = "DIGIT_MODEL", default_value = "models/mnist_cnn_model.onnx")]
    model: PathBuf,

    /// Device to use (cpu, cuda, cuda:0, etc.)
    #[arg(long, default_value = "cpu", env = "DIGIT_DEVICE")]
    device: String,

    /// JSON file with ONNX Runtime session options
    #[arg(long = "ort-config", env = "DIGIT_ORT_CONFIG")]
    ort_config: Option<PathBuf>,

    /// Number of ONNX Runtime sessions to run in parallel
    #[arg(long, default_value = "1", env = "DIGIT_SESSIONS")]
    sessions: usize,

    /// Intra-op threads per session (defaults to ONNX Runtime's choice)
    #[arg(long, env = "DIGIT_THREADS")]
    threads: Option<usize>,

    /// Resize filter used when shrinking images to 28x28
    #[arg(long = "resize-filter", default_value = "catmull_rom")]
    resize_filter: ResizeFilter,
}

impl From<ModelArgs> for config::DigitConfig {
    fn from(args: ModelArgs) -> Self {
        Self {
            model: args.model,
            device: args.device,
            ort_config: args.ort_config,
            session_pool_size: args.sessions,
            threads: args.threads,
            resize_filter: args.resize_filter,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the digit in a single image
    Predict {
        /// URL of the image to process
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        url: Option<String>,

        /// Local file path of the image to process
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,

        /// Output format (json, text, pretty)
        #[arg(long, default_value = "pretty")]
        output: String,

        #[command(flatten)]
        model: ModelArgs,
    },
    /// Start the HTTP server
    Serve {
        #[command(flatten)]
        model: ModelArgs,

        /// Port to listen on
        #[arg(long, short, default_value = "5000", env = "DIGIT_PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "DIGIT_HOST")]
        host: String,

        /// Directory of sample images served at /static/samples
        #[arg(long = "samples-dir", default_value = "static/samples", env = "DIGIT_SAMPLES_DIR")]
        samples_dir: PathBuf,

        /// Directory for grayscale display copies of uploads
        #[arg(long = "upload-dir", env = "DIGIT_UPLOAD_DIR")]
        upload_dir: Option<PathBuf>,

        /// Maximum upload size in MiB
        #[arg(long = "max-upload-mb", default_value = "16")]
        max_upload_mb: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    digit_recognizer::utils::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Predict {
            url,
            file,
            output,
            model,
        } => {
            let config = config::DigitConfig::from(model);

            if let Some(url) = url {
                info!("Processing URL: {}", url);
                cli::process_url(&url, &config, &output).await?;
            } else if let Some(file) = file {
                info!("Processing file: {}", file.display());
                cli::process_file(&file, &config, &output)?;
            }
        }
        Commands::Serve {
            model,
            port,
            host,
            samples_dir,
            upload_dir,
            max_upload_mb,
        } => {
            let config = config::ServerConfig {
                digit: config::DigitConfig::from(model),
                host,
                port,
                samples_dir,
                upload_dir,
                max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            };

            info!("Starting server on {}:{}", config.host, config.port);
            server::run_server(config).await?;
        }
    }

    Ok(())
}
