//! Clockwork CLI
//!
//! Sign in, track time and browse entries against the hosted backend.

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use clockwork_core::models::entry::format_duration;
use clockwork_core::models::{AuthSession, Config, EntryRange, TimeEntry, User};
use clockwork_core::report::{self, Report};
use clockwork_core::storage::{init_config_dir, init_data_dir, ConfigStorage, SessionStorage};
use clockwork_dashboard::{
    ConfigManager, DashboardEvent, DashboardView, EventManager, NoticeLevel, TimeEntryRepository,
    TimerEngineError, ViewDeps,
};
use clockwork_store::{AuthClient, RestStore, SignUpOutcome};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
#[command(name = "clockwork")]
#[command(about = "Clockwork - time tracking against a hosted backend", long_about = None)]
struct Args {
    /// Log level (defaults to the configured one)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Run the timer until Ctrl-C, then save the entry
    Track {
        description: String,
        /// Project id to book the time on
        #[arg(short, long)]
        project: Option<String>,
    },
    /// List time entries
    Entries {
        /// today, week, month or <n>d
        #[arg(short, long, default_value = "today")]
        range: String,
    },
    /// List projects
    Projects,
    /// Delete a time entry
    Delete { id: String },
    /// Totals per project and per day
    Report {
        #[arg(short, long, default_value = "week")]
        range: String,
        /// Also export the entries as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Show or change the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    SetStore {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        key: Option<String>,
    },
    /// Attempts and backoff step for reads
    SetRetry {
        #[arg(long)]
        attempts: Option<u32>,
        #[arg(long)]
        backoff_ms: Option<u64>,
    },
    /// How long a fetched range is served from cache
    SetCache {
        #[arg(long)]
        freshness_secs: u64,
    },
    SetLogLevel {
        level: String,
    },
    /// Restore the defaults, also when the stored config is broken
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_manager = if matches!(
        args.command,
        Command::Config {
            action: ConfigAction::Reset
        }
    ) {
        ConfigManager::reset_to_default(ConfigStorage::new(init_config_dir()?))?
    } else {
        ConfigManager::new()
            .context("Could not load the configuration; `clockwork config reset` restores the defaults")?
    };
    let config = config_manager.effective().await;
    let data_dir = init_data_dir()?;

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.log.log_level.clone());
    init_logging(&data_dir, &log_level)?;

    let sessions = SessionStorage::new(data_dir);
    let auth = AuthClient::new(&config.store);

    match args.command {
        Command::Login { email, password } => {
            let session = auth.sign_in(&email, &password).await?;
            sessions.save(&session)?;
            println!("Signed in as {}", describe_user(&session.user));
        }
        Command::Signup { email, password } => match auth.sign_up(&email, &password).await? {
            SignUpOutcome::SignedIn(session) => {
                sessions.save(&session)?;
                println!("Account created, signed in as {}", describe_user(&session.user));
            }
            SignUpOutcome::ConfirmationRequired(user) => {
                println!(
                    "Account created for {}. Confirm your email, then run `clockwork login`.",
                    describe_user(&user)
                );
            }
        },
        Command::Logout => match sessions.load()? {
            Some(session) => {
                if let Err(e) = auth.sign_out(&session.access_token).await {
                    tracing::warn!("Remote sign-out failed: {}", e);
                }
                sessions.clear()?;
                println!("Signed out");
            }
            None => println!("Not signed in"),
        },
        Command::Whoami => {
            let session = require_session(&sessions)?;
            let user = auth.current_user(&session.access_token).await?;
            println!("{} ({})", describe_user(&user), user.id);
        }
        Command::Track {
            description,
            project,
        } => {
            let session = require_session(&sessions)?;
            track(&config, session, description, project).await?;
        }
        Command::Entries { range } => {
            let session = require_session(&sessions)?;
            let repository = repository(&config, &session);
            let entries = repository
                .fetch_range(&session.user.id, EntryRange::preset(&range)?)
                .await?;
            print_entries(&entries);
        }
        Command::Projects => {
            let session = require_session(&sessions)?;
            let projects = repository(&config, &session)
                .fetch_projects(&session.user.id)
                .await?;
            if projects.is_empty() {
                println!("No projects");
            }
            for project in projects {
                println!("{:<38} {}", project.id, project.name);
            }
        }
        Command::Delete { id } => {
            let session = require_session(&sessions)?;
            repository(&config, &session).remove(&id).await?;
            println!("Deleted {}", id);
        }
        Command::Report { range, csv } => {
            let session = require_session(&sessions)?;
            let entries = repository(&config, &session)
                .fetch_range(&session.user.id, EntryRange::preset(&range)?)
                .await?;
            print_report(&Report::build(&entries));
            if let Some(path) = csv {
                export_csv(&path, &entries)?;
                println!("Exported {} entries to {}", entries.len(), path.display());
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config_manager.get().await)?);
            }
            ConfigAction::SetStore { url, key } => {
                config_manager.set_store(url, key).await?;
                println!("Store settings saved");
            }
            ConfigAction::SetRetry {
                attempts,
                backoff_ms,
            } => {
                config_manager
                    .update_retry_config(attempts, backoff_ms)
                    .await?;
                println!("Retry settings saved");
            }
            ConfigAction::SetCache { freshness_secs } => {
                config_manager.update_cache_config(freshness_secs).await?;
                println!("Cache settings saved");
            }
            ConfigAction::SetLogLevel { level } => {
                config_manager.set_log_level(level).await?;
                println!("Log level saved");
            }
            ConfigAction::Reset => println!("Configuration reset"),
        },
    }

    Ok(())
}

fn init_logging(data_dir: &Path, log_level: &str) -> Result<()> {
    let log_file_path = data_dir.join("clockwork.log");

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    // Warnings go to the terminal, everything the filter allows to the file
    use tracing_subscriber::fmt::writer::MakeWriterExt;
    let stderr_writer = std::io::stderr.with_max_level(tracing::Level::WARN);
    let file_writer = log_file.with_max_level(tracing::Level::DEBUG);

    tracing_subscriber::fmt()
        .with_writer(stderr_writer.and(file_writer))
        .with_env_filter(log_level)
        .with_ansi(false)
        .init();

    tracing::debug!("Log file: {}", log_file_path.display());
    Ok(())
}

fn require_session(sessions: &SessionStorage) -> Result<AuthSession> {
    let Some(session) = sessions.load()? else {
        bail!("Not signed in. Run `clockwork login` first.");
    };
    if session.is_expired() {
        bail!("Session expired. Run `clockwork login` again.");
    }
    Ok(session)
}

fn repository(config: &Config, session: &AuthSession) -> TimeEntryRepository {
    let store = Arc::new(RestStore::new(&config.store, session.access_token.clone()));
    TimeEntryRepository::new(store, config)
}

async fn track(
    config: &Config,
    session: AuthSession,
    description: String,
    project: Option<String>,
) -> Result<()> {
    let store = Arc::new(RestStore::new(&config.store, session.access_token.clone()));
    let events = Arc::new(EventManager::new());
    let deps = ViewDeps {
        store: store.clone(),
        channel: store,
        events: events.clone(),
        config: config.clone(),
    };

    let view = DashboardView::mount(deps, session.user.clone(), EntryRange::today()?).await;
    let printer = tokio::spawn(print_notices(events.subscribe()));

    view.timer().set_description(description.as_str()).await?;
    view.timer().set_project(project).await?;
    view.timer().start().await?;
    println!("Tracking \"{}\". Press Ctrl-C to stop and save.", description);

    loop {
        tokio::signal::ctrl_c().await?;
        match view.stop_timer().await {
            Ok(entry) => {
                println!(
                    "Saved \"{}\" ({})",
                    entry.description,
                    entry.duration_formatted()
                );
                break;
            }
            Err(TimerEngineError::Validation(message)) => {
                println!("Nothing saved: {}", message);
                break;
            }
            Err(e) => {
                println!(
                    "Could not save ({}). Time is kept; press Ctrl-C to retry.",
                    e
                );
            }
        }
    }

    printer.abort();
    view.unmount();
    Ok(())
}

async fn print_notices(mut receiver: broadcast::Receiver<DashboardEvent>) {
    loop {
        match receiver.recv().await {
            Ok(DashboardEvent::Notice(notice)) => {
                let prefix = match notice.level {
                    NoticeLevel::Info => "info",
                    NoticeLevel::Warning => "warning",
                    NoticeLevel::Error => "error",
                };
                eprintln!("{}: {}", prefix, notice.message);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn describe_user(user: &User) -> &str {
    user.email.as_deref().unwrap_or(&user.id)
}

fn print_entries(entries: &[TimeEntry]) {
    if entries.is_empty() {
        println!("No entries");
        return;
    }

    for entry in entries {
        let short_id: String = entry.id.chars().take(8).collect();
        println!(
            "{:<8}  {}  {:>8}  {:<20}  {}",
            short_id,
            entry.start_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            entry.duration_formatted(),
            entry.project_label().unwrap_or("-"),
            entry.description
        );
    }
}

fn print_report(report: &Report) {
    println!(
        "{} entries, {} total",
        report.total_entries,
        report.total_formatted()
    );

    println!();
    for project in &report.by_project {
        println!(
            "{:<24} {:>10}  ({} entries)",
            project.name,
            format_duration(project.seconds),
            project.entries
        );
    }

    println!();
    for day in &report.by_day {
        println!(
            "{}  {:>10}  ({} entries)",
            day.date.format("%a %Y-%m-%d"),
            format_duration(day.seconds),
            day.entries
        );
    }
}

fn export_csv(path: &Path, entries: &[TimeEntry]) -> Result<()> {
    let file = fs::File::create(path)?;
    report::write_csv(file, entries)?;
    Ok(())
}
