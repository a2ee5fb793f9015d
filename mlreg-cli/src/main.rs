//! register_model: publish a trained model's files and metadata to MLflow.
//!
//! Usage: `register_model <model_name> <model_directory> [config_file]`

use clap::Parser;
use mlreg_core::{ArtifactPublisher, MlflowClient, PublishReport, PublishRequest, PublisherConfig};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Upload a model directory and its metadata to an MLflow tracking server
#[derive(Parser, Debug)]
#[command(name = "register_model", version, about, long_about = None)]
struct Cli {
    /// Model name, used as run name and `model_name` tag
    model_name: String,

    /// Directory holding the model files
    model_directory: PathBuf,

    /// Optional config file logged at the run root
    config_file: Option<PathBuf>,

    /// Settings file (defaults to ./mlreg.toml when present)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Tracking server URL
    #[arg(long)]
    tracking_uri: Option<String>,

    /// Experiment name
    #[arg(short, long)]
    experiment: Option<String>,

    /// Register a model version under this name
    #[arg(long)]
    registered_model: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut PublisherConfig) {
        if let Some(uri) = &self.tracking_uri {
            config.tracking.uri = uri.clone();
        }
        if let Some(experiment) = &self.experiment {
            config.tracking.experiment = experiment.clone();
        }
        if let Some(name) = &self.registered_model {
            config.registration.registered_model_name = Some(name.clone());
        }
    }

    fn request(&self) -> PublishRequest {
        let request = PublishRequest::new(&self.model_name, &self.model_directory);
        match &self.config_file {
            Some(path) => request.with_config_file(path),
            None => request,
        }
    }
}

/// Install stderr logging plus a JSON log file, returning the file writer guard.
fn init_tracing(verbose: u8, quiet: bool) -> tracing_appender::non_blocking::WorkerGuard {
    let filter = match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "mlreg", "mlreg")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "register_model.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}

fn print_report(report: &PublishReport) {
    println!("Run ID: {}", report.run_id);
    println!("Experiment: {}", report.experiment_name);
    println!("Artifact URI: {}", report.artifact_uri);
    if let Some(version) = &report.model_version {
        println!("Registered model: {} (version {})", version.name, version.version);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and succeed; usage errors exit with 1.
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let _log_guard = init_tracing(cli.verbose, cli.quiet);

    let workspace = std::env::current_dir()?;
    let mut config = mlreg_core::load_config(Some(&workspace), cli.settings.as_deref())
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let client = MlflowClient::new(&config.tracking)?;
    tracing::debug!(tracking_uri = client.base_url(), "Using tracking server");
    let publisher = ArtifactPublisher::new(client, config);
    let report = publisher.publish(&cli.request()).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}
