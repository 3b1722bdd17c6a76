//! OtaFlow agent binary.
//!
//! Wires the library pieces together: loads configuration, starts the HTTP
//! session, and runs the update agent until interrupted.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use otaflow::agent::{Agent, AgentConfig};
use otaflow::download::HttpFetcher;
use otaflow::render::ImagePreview;
use otaflow::session::HttpSession;
use otaflow::settings::SettingsRegistry;

/// Firmware update agent: observes the service manifest and downloads
/// components block by block.
#[derive(Parser, Debug)]
#[command(name = "otaflow-agent", version, about)]
struct Args {
    /// Path to the INI configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the artifact storage root.
    #[arg(long)]
    storage_root: Option<PathBuf>,

    /// Override the service base URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Override the device identifier.
    #[arg(long)]
    device_id: Option<String>,

    /// Also write logs to daily-rotated files in this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Decode and log downloaded image artifacts.
    #[arg(long)]
    preview: bool,
}

fn init_logging(log_dir: Option<&PathBuf>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "otaflow-agent.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

fn load_config(args: &Args) -> Result<AgentConfig, otaflow::agent::AgentError> {
    let mut config = match &args.config {
        Some(path) => AgentConfig::from_ini(path)?,
        None => AgentConfig::default(),
    };

    if let Some(root) = &args.storage_root {
        config.storage_root = root.clone();
    }
    if let Some(base_url) = &args.base_url {
        config.service.base_url = base_url.clone();
    }
    if let Some(device_id) = &args.device_id {
        config.service.device_id = device_id.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let _log_guard = init_logging(args.log_dir.as_ref());

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let settings = Arc::new(SettingsRegistry::new());
    let session = HttpSession::start(config.service.clone(), Arc::clone(&settings));
    let fetcher = Arc::new(HttpFetcher::new());

    let mut agent = Agent::new(
        config,
        Arc::clone(&session) as Arc<dyn otaflow::session::Session>,
        fetcher,
        settings,
    );
    if args.preview {
        agent = agent.with_viewer(Arc::new(ImagePreview::new()));
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal_cancel.cancel();
        }
    });

    let result = agent.run(cancel).await;
    session.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "agent failed");
            ExitCode::FAILURE
        }
    }
}
