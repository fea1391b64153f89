//! pillwatchd server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `PILLWATCH_*` environment variables, opens the SQLite store, and serves
//! the API, identity hook and notification sessions over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `auth_password_hash` in config.toml:
//!
//! ```
//! cargo run -p pillwatch-server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use pillwatch_core::clock::Clock;
use pillwatch_server::{
  AppState, ServerConfig, auth::AuthConfig, notifier::ConfiguredNotifier, session::SessionRegistry,
};
use pillwatch_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Pillwatch medication reminder server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  // `PILLWATCH_SCHEDULER__GRACE_PERIOD_MINS` reaches `[scheduler]`.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("PILLWATCH")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let scheduler = server_cfg
    .scheduler
    .scheduler_config()
    .context("invalid [scheduler] settings")?;
  let notifier =
    ConfiguredNotifier::from_settings(&server_cfg.notifier).context("invalid [notifier] settings")?;
  let clock: Arc<dyn Clock> = Arc::new(server_cfg.scheduler.clock());

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  tracing::info!(
    channel = notifier_channel(&notifier),
    interval_secs = server_cfg.scheduler.check_interval_secs,
    "notification sessions ready"
  );

  let sessions = Arc::new(SessionRegistry::new(
    store.clone(),
    Arc::new(notifier),
    clock.clone(),
    scheduler,
  ));

  let state = AppState {
    store,
    auth: Arc::new(AuthConfig {
      username:      server_cfg.auth_username.clone(),
      password_hash: server_cfg.auth_password_hash.clone(),
    }),
    sessions: sessions.clone(),
    clock,
  };

  let app = pillwatch_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  sessions.stop_all();
  tracing::info!("shut down");
  Ok(())
}

fn notifier_channel(notifier: &ConfiguredNotifier) -> &str {
  use pillwatch_core::notify::Notifier as _;
  notifier.channel_name()
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!("failed to listen for ctrl-c: {e}");
  }
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
