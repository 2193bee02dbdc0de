mod api;
mod app;
mod auth;
mod cache;
mod config;
mod error;
mod gateway;
mod push;
mod session;
mod validate;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tales")]
#[command(about = "A terminal client for story-sharing APIs, with an offline cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/tales/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Create a new account
  Register {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
  },
  /// Log in and persist the session
  Login {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
  },
  /// Log out and drop all cached data
  Logout,
  /// List stories from the feed
  List {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = 10)]
    size: u32,
    /// Only stories that carry coordinates
    #[arg(long)]
    location: bool,
  },
  /// Show one story
  Detail {
    id: String,
    /// Also download the story's photo to this path
    #[arg(long)]
    save_photo: Option<PathBuf>,
  },
  /// Publish a new story
  Add {
    #[arg(long)]
    description: String,
    /// Path to a JPEG, PNG, or GIF photo (at most 1 MiB)
    #[arg(long)]
    photo: PathBuf,
    #[arg(long)]
    lat: Option<f64>,
    #[arg(long)]
    lon: Option<f64>,
    /// Publish anonymously
    #[arg(long)]
    guest: bool,
  },
  /// Register this device for push notifications
  Subscribe,
  /// Drop the push registration
  Unsubscribe,
  /// Render an incoming push payload (for piping from a push relay)
  Notify {
    /// JSON payload; omitted means the default notification
    payload: Option<String>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = init_tracing()?;

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;

  let app = app::App::new(config)?;
  app.run(args.command).await
}

/// Log to a file in the data directory; stdout stays reserved for command
/// output.
fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .map(|p| p.join("tales"))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::never(log_dir, "tales.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tales=info".into()),
    )
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false),
    )
    .init();

  Ok(guard)
}
