mod logger;
mod stats;
mod tui;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use messbook_core::{
    parse_entry, AppConfig, EntryKind, EntryService, FileRecordStore, FileSnapshotCache, MonthKey,
    Role, StatsAggregator, ViewState,
};

#[derive(Parser)]
#[command(name = "messbook")]
#[command(about = "Meal and expense book for a shared mess", long_about = None)]
struct Cli {
    /// Mess to operate on (default: $MESSBOOK_MESS or "home")
    #[arg(long, global = true)]
    mess: Option<String>,

    /// Data directory (default: $MESSBOOK_DATA_DIR or ~/.messbook)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the member roster
    Member {
        #[command(subcommand)]
        action: MemberAction,
    },
    /// Record an entry (usage: add meal alice b:1 l:1 | add expense rice amount:450 common:no)
    Add {
        /// meal, deposit, expense or guest (prefixes allowed)
        kind: String,
        /// Member name or note words, plus key:value fields
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print monthly statistics
    Stats {
        /// Month as YYYY-MM (default: current month)
        #[arg(long)]
        month: Option<String>,
    },
    /// Open the live dashboard
    Tui {
        #[arg(long)]
        month: Option<String>,
    },
}

#[derive(Subcommand)]
enum MemberAction {
    /// Add a member (the first member becomes the manager)
    Add {
        name: String,
        #[arg(long)]
        manager: bool,
    },
    /// List members
    List,
}

fn parse_month(month: Option<&str>) -> Result<MonthKey> {
    match month {
        Some(m) => MonthKey::parse(m),
        None => Ok(MonthKey::current()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(mess) = cli.mess {
        config.mess_id = mess;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    match cli.command {
        Some(Commands::Member { action }) => {
            logger::init_stderr_logger(&config.log_level);
            let store = FileRecordStore::new(config.data_dir.clone())?;
            let service = EntryService::new(store, config.mess_id.clone());
            match action {
                MemberAction::Add { name, manager } => {
                    let member = service.add_member(&name, manager).await?;
                    println!("Member added: {} ({:?})", member.name, member.role);
                }
                MemberAction::List => {
                    let roster = service.roster().await?;
                    if roster.is_empty() {
                        println!("No members found.");
                    }
                    for member in roster {
                        let marker = if member.role == Role::Manager { " (manager)" } else { "" };
                        println!("{}{}", member.name, marker);
                    }
                }
            }
        }
        Some(Commands::Add { kind, args }) => {
            logger::init_stderr_logger(&config.log_level);
            let store = FileRecordStore::new(config.data_dir.clone())?;
            let service = EntryService::new(store, config.mess_id.clone());
            let kind = EntryKind::parse(&kind)?;
            let roster = service.roster().await?;
            let entry = parse_entry(kind, &args, &roster, Local::now().date_naive())?;
            service.record(entry).await?;
            println!("Recorded {:?} entry.", kind);
        }
        Some(Commands::Stats { month }) => {
            logger::init_stderr_logger(&config.log_level);
            let month = parse_month(month.as_deref())?;
            show_stats(&config, month).await?;
        }
        Some(Commands::Tui { month }) => {
            let month = parse_month(month.as_deref())?;
            tui::run(config, month).await?;
        }
        None => {
            tui::run(config, MonthKey::current()).await?;
        }
    }
    Ok(())
}

async fn show_stats(config: &AppConfig, month: MonthKey) -> Result<()> {
    let store = Arc::new(FileRecordStore::new(config.data_dir.clone())?);
    let cache = Arc::new(FileSnapshotCache::new(config.data_dir.clone())?);
    let aggregator = StatsAggregator::new(store, cache).with_cache_ttl(config.cache_ttl);

    let mut state = ViewState::new(month);
    if let Some(cached) = aggregator.cached(&config.mess_id, month).await {
        state.apply_cached(cached);
    }
    match aggregator.refresh(&config.mess_id, month).await {
        Ok(snapshot) => state.apply_fresh(1, snapshot),
        Err(e) => {
            tracing::error!("Failed to calculate stats: {e}");
            state.apply_failure(e.to_string());
        }
    }

    stats::show_view(&state);
    stats_outcome(&state)
}

/// A failed refresh makes the command fail even when a cached table was shown.
fn stats_outcome(state: &ViewState) -> Result<()> {
    match &state.last_error {
        Some(err) => Err(anyhow!("Statistics for {} are not up to date: {}", state.month, err)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messbook_core::MonthlySnapshot;

    #[test]
    fn test_failed_refresh_is_an_error() {
        let month = MonthKey::new(2026, 10).unwrap();
        let mut state = ViewState::new(month);
        state.apply_fresh(1, MonthlySnapshot {
            mess_id: "home".into(),
            month,
            house: Default::default(),
            members: Vec::new(),
        });
        assert!(stats_outcome(&state).is_ok());

        state.apply_failure("Failed to fetch meals: disk error".into());
        let err = stats_outcome(&state).unwrap_err();
        assert!(err.to_string().contains("2026-10"));
        assert!(err.to_string().contains("disk error"));
    }
}
