use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use roombook::api::{CachedApi, LogKind};
use roombook::app::{Alert, AlertKind, App};
use roombook::config::Config;
use roombook::form::{BookingForm, LoginForm};
use roombook::format::{format_duration, format_time, today};
use roombook::schedule::{DatePreset, MeetingFilter};

#[derive(Parser, Debug)]
#[command(name = "roombook")]
#[command(about = "Meeting room schedule and booking client")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/roombook/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Login email (password is read from ROOMBOOK_PASSWORD)
  #[arg(short, long)]
  email: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show the meeting schedule
  Schedule {
    /// Room to show: all, squats, lungles
    #[arg(long, default_value = "all")]
    room: String,
    /// YYYY-MM-DD or one of today, tomorrow, this-week, next-week
    #[arg(long, value_parser = parse_date_arg)]
    date: Option<NaiveDate>,
    /// Skip the cache
    #[arg(long)]
    refresh: bool,
  },
  /// Request a room booking
  Book {
    #[arg(long)]
    division: String,
    #[arg(long)]
    room: String,
    #[arg(long)]
    participants: String,
    #[arg(long, value_parser = parse_date_arg)]
    date: NaiveDate,
    /// HH:MM
    #[arg(long, value_parser = parse_time_arg)]
    start: NaiveTime,
    /// HH:MM
    #[arg(long, value_parser = parse_time_arg)]
    end: NaiveTime,
    #[arg(long, default_value = "")]
    purpose: String,
    #[arg(long, default_value = "")]
    pic: String,
    #[arg(long, default_value = "")]
    phone: String,
  },
  /// List rooms
  Rooms,
  /// Show a room's availability for a day
  Availability {
    #[arg(long)]
    room: String,
    #[arg(long, value_parser = parse_date_arg)]
    date: NaiveDate,
  },
  /// Load the schedule and rooms, then print the recorded API traffic
  Logs,
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
  if let Ok(preset) = s.parse::<DatePreset>() {
    return Ok(preset.resolve(today()));
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD", s))
}

fn parse_time_arg(s: &str) -> Result<NaiveTime, String> {
  NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| format!("invalid time '{}', expected HH:MM", s))
}

/// Install the tracing subscriber. With `log_file` set, output goes through a
/// non-blocking file writer; the returned guard flushes it on drop.
fn init_tracing(config: &Config) -> Result<Option<WorkerGuard>> {
  use tracing_subscriber::{fmt, prelude::*, EnvFilter};

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("roombook=info"));

  match &config.log_file {
    Some(path) => {
      let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("log_file has no file name: {}", path.display()))?;
      let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
      tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_ansi(false).with_writer(writer))
        .with(filter)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
      Ok(None)
    }
  }
}

fn print_alert(alert: &Alert) {
  let marker = match alert.kind {
    AlertKind::Success => "✓",
    AlertKind::Error => "✗",
    AlertKind::Warning => "!",
  };
  println!("{} {}: {}", marker, alert.title, alert.message);
}

async fn authenticate(app: &App, config: &Config) -> Result<()> {
  if let Some(token) = Config::get_token() {
    app.api().set_token(&token);
    info!("using token from ROOMBOOK_TOKEN");
    return Ok(());
  }

  let Some(email) = config.email.as_deref() else {
    warn!("no credentials configured, continuing without login");
    return Ok(());
  };

  let form = LoginForm::new(email, Config::get_password()?);
  let alert = match app.login(&form).await {
    Ok(alert) => alert,
    Err(errors) => {
      for (field, err) in errors.iter() {
        eprintln!("{}: {}", field, err);
      }
      return Err(eyre!(errors));
    }
  };
  print_alert(&alert);
  if !alert.is_success() {
    return Err(eyre!(alert.message));
  }
  Ok(())
}

async fn show_schedule(app: &App, filter: MeetingFilter, refresh: bool) {
  let today = today();
  let view = if refresh {
    app.refresh_schedule(&filter, today).await
  } else {
    app.load_schedule(&filter, today).await
  };

  println!("{} ({} of {})", view.summary, view.meetings.len(), view.total);
  if let Some(err) = &view.error {
    println!("✗ {}", err);
  }
  if view.is_empty() {
    println!("Tidak ada jadwal");
    return;
  }
  for meeting in &view.meetings {
    println!(
      "{} - {}  {:<14} {}",
      format_time(&meeting.start_time),
      format_time(&meeting.end_time),
      meeting.room_name,
      format_duration(&meeting.start_time, &meeting.end_time)
    );
  }
}

async fn run(app: &App, command: Command) -> Result<()> {
  match command {
    Command::Schedule { room, date, refresh } => {
      show_schedule(app, MeetingFilter::new(room, date), refresh).await;
    }
    Command::Book {
      division,
      room,
      participants,
      date,
      start,
      end,
      purpose,
      pic,
      phone,
    } => {
      let form = BookingForm {
        division,
        room,
        participant_count: participants,
        date,
        start_time: start,
        end_time: end,
        purpose,
        pic,
        phone,
      };
      match app.submit_booking(&form, today()).await {
        Ok(alert) => {
          print_alert(&alert);
          if !alert.is_success() {
            return Err(eyre!(alert.message));
          }
        }
        Err(errors) => {
          for (field, err) in errors.iter() {
            eprintln!("{}: {}", field, err);
          }
          return Err(eyre!(errors));
        }
      }
    }
    Command::Rooms => {
      let rooms = app.rooms().await?;
      println!("{}", serde_json::to_string_pretty(&rooms)?);
    }
    Command::Availability { room, date } => {
      let availability = app.room_availability(&room, date).await?;
      println!("{}", serde_json::to_string_pretty(&availability)?);
    }
    Command::Logs => {
      let api = app.api();
      tokio::join!(api.prefetch_meetings(), api.prefetch_rooms());
      for log in api.logger().logs() {
        let kind = match log.kind {
          LogKind::Request => "REQ",
          LogKind::Response => "RES",
          LogKind::Error => "ERR",
        };
        let status = log.status.map(|s| s.to_string()).unwrap_or_default();
        let took = log
          .duration
          .map(|d| format!("{}ms", d.as_millis()))
          .unwrap_or_default();
        println!(
          "{} {} {} {} {} {}",
          log.timestamp.format("%H:%M:%S%.3f"),
          kind,
          log.method,
          log.url,
          status,
          took
        );
        if let Some(err) = &log.error {
          println!("    {}", err);
        }
      }
      let s = api.logger().summary();
      println!(
        "{} requests, {} responses, {} errors ({} total)",
        s.requests, s.responses, s.errors, s.total
      );
    }
  }
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;
  if let Some(email) = args.email {
    config.email = Some(email);
  }

  let _guard = init_tracing(&config)?;

  let app = App::new(CachedApi::new(&config)?);
  authenticate(&app, &config).await?;

  let command = args.command.unwrap_or(Command::Schedule {
    room: "all".to_string(),
    date: None,
    refresh: false,
  });
  let result = run(&app, command).await;

  app.shutdown();
  result
}
