mod app;
mod commands;
mod event;
mod render;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use hpn_admin::config::Config;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hpn-admin")]
#[command(about = "Admin console for the HPN community backend")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/hpn-admin/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Backend base URL, e.g. http://localhost:4000/api
  #[arg(long)]
  api_url: Option<String>,

  /// Log in as this admin on startup (password from HPN_ADMIN_PASSWORD)
  #[arg(short, long)]
  email: Option<String>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_tracing(args.log_file.as_deref())?;

  // Load configuration; --api-url wins over HPN_API_URL and the file
  let mut config = Config::load(args.config.as_deref(), args.api_url.as_deref())?;

  // Override from command line
  let login = args.email.is_some();
  if let Some(email) = args.email {
    config.session.email = Some(email);
  }

  // Initialize and run the app
  let mut app = app::App::new(config)?;
  app.run(login).await?;

  Ok(())
}

/// Log to stderr, or through a non-blocking file writer with `--log-file`.
///
/// The returned guard flushes the file writer when dropped.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hpn_admin=info"));

  match log_file {
    Some(path) => {
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
      let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
      };
      let appender = tracing_appender::rolling::never(dir, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      Ok(None)
    }
  }
}
