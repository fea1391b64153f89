//! `pillwatch` — terminal client for the pillwatch server.
//!
//! # Usage
//!
//! ```
//! pillwatch --url http://localhost:5232 --user operator --password secret --id user_2ab today
//! pillwatch --config ~/.config/pillwatch/config.toml dashboard
//! pillwatch drugs lisinopril
//! ```

mod app;
mod client;
mod fda;
mod ui;

use std::{io, path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow};
use app::App;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use fda::FdaClient;
use pillwatch_core::{schedule::ClockTime, user::UserId};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pillwatch", about = "Terminal client for pillwatch medication schedules")]
struct Args {
  /// Path to a TOML config file (url, username, password, user_id).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the pillwatch server (default: http://localhost:5232).
  #[arg(long, env = "PILLWATCH_URL")]
  url: Option<String>,

  /// Operator username.
  #[arg(long, env = "PILLWATCH_USER")]
  user: Option<String>,

  /// Operator password (plaintext).
  #[arg(long, env = "PILLWATCH_PASSWORD")]
  password: Option<String>,

  /// The pillwatch user to act as.
  #[arg(long = "id", env = "PILLWATCH_USER_ID")]
  user_id: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Doses due on a day (default today).
  Today {
    #[arg(long)]
    date: Option<NaiveDate>,
  },
  /// Medications and their schedules.
  Meds,
  /// Recorded taken/missed events.
  History {
    #[arg(long)]
    date: Option<NaiveDate>,
  },
  /// Mark a scheduled dose as taken.
  Take {
    medication: String,
    /// Scheduled slot, `HH:MM`.
    time:       ClockTime,
  },
  /// Search the openFDA drug directory by brand or generic name.
  Drugs {
    #[arg(required = true)]
    query: Vec<String>,
  },
  /// Interactive dashboard (the default).
  Dashboard,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
  #[serde(default)]
  user_id:  String,
}

/// Flag (or env), then config file, then nothing.
fn pick(flag: Option<String>, file: &str) -> Option<String> {
  flag.or_else(|| (!file.is_empty()).then(|| file.to_owned()))
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let command = args.command.unwrap_or(Command::Dashboard);

  // The dashboard owns the terminal; only line commands log to stderr.
  if !matches!(command, Command::Dashboard) {
    tracing_subscriber::fmt()
      .with_writer(io::stderr)
      .with_env_filter(
        EnvFilter::builder()
          .with_default_directive(LevelFilter::INFO.into())
          .from_env_lossy(),
      )
      .init();
  }

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  let api_config = ApiConfig {
    base_url: pick(args.url, &file_cfg.url).unwrap_or_else(|| "http://localhost:5232".to_string()),
    username: pick(args.user, &file_cfg.username).unwrap_or_default(),
    password: pick(args.password, &file_cfg.password).unwrap_or_default(),
  };
  let user_id = pick(args.user_id, &file_cfg.user_id).map(UserId::from);
  tracing::debug!(url = %api_config.base_url, "using server");

  let client = ApiClient::new(api_config)?;
  let acting_user =
    || user_id.clone().ok_or_else(|| anyhow!("no user given; pass --id or set PILLWATCH_USER_ID"));

  match command {
    Command::Drugs { query } => drugs(&query.join(" ")).await,
    Command::Today { date } => today(&client, &acting_user()?, date).await,
    Command::Meds => meds(&client, &acting_user()?).await,
    Command::History { date } => history(&client, &acting_user()?, date).await,
    Command::Take { medication, time } => {
      let record = client.mark_taken(&acting_user()?, &medication, time).await?;
      println!("marked {} at {} taken ({})", record.medication_name, record.time, record.date);
      Ok(())
    }
    Command::Dashboard => dashboard(client, &acting_user()?).await,
  }
}

// ─── Line commands ────────────────────────────────────────────────────────────

async fn today(client: &ApiClient, user_id: &UserId, date: Option<NaiveDate>) -> Result<()> {
  let day = client.schedule(user_id, date).await?;
  println!("{}", day.date.format("%A %Y-%m-%d"));
  if day.doses.is_empty() {
    println!("  no doses scheduled");
  }
  for dose in day.doses {
    println!("  {}  {:<24} ×{}", dose.time, dose.medication_name, dose.pill_count);
  }
  Ok(())
}

async fn meds(client: &ApiClient, user_id: &UserId) -> Result<()> {
  for med in client.list_medications(user_id).await? {
    println!(
      "{:<24} {}",
      med.medication.name,
      ui::day::describe_schedule(&med.schedule)
    );
  }
  Ok(())
}

async fn history(client: &ApiClient, user_id: &UserId, date: Option<NaiveDate>) -> Result<()> {
  let meds = client.list_medications(user_id).await?;
  for event in client.history(user_id, date).await? {
    let name = meds
      .iter()
      .find(|m| m.medication.medication_id == event.medication_id)
      .map(|m| m.medication.name.clone())
      .unwrap_or_else(|| event.medication_id.to_string());
    let actual = event
      .actual_time
      .map(|t| format!(" at {t}"))
      .unwrap_or_default();
    println!(
      "{} {}  {:<24} {}{actual}",
      event.date,
      event.scheduled_time,
      name,
      event.status.as_str()
    );
  }
  Ok(())
}

async fn drugs(query: &str) -> Result<()> {
  let results = FdaClient::new(fda::OPENFDA_BASE_URL)?.search(query).await?;
  if results.is_empty() {
    println!("no matches (queries need at least {} characters)", fda::MIN_QUERY_LEN);
  }
  for drug in results {
    println!("{:<32} {}", drug.display_name(), drug.generic_name);
  }
  Ok(())
}

// ─── Dashboard ────────────────────────────────────────────────────────────────

async fn dashboard(client: ApiClient, user_id: &UserId) -> Result<()> {
  let mut app = App::new(client);
  app.load_people(user_id).await?;

  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  let run_result = run_event_loop(&mut terminal, &mut app).await;

  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  run_result
}

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App,
) -> Result<()> {
  loop {
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event
      && !app.handle_key(key).await?
    {
      break;
    }
  }

  Ok(())
}
