// Jotter - local-first notes and to-do lists
// Command line entry point

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use jotter::app::{self, AppState};
use jotter::config::DEFAULT_NOTE_COLOR;
use jotter::entity::Collection;
use jotter::services::MutationOutcome;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Refresh period for `watch` when settings leave it disabled
const DEFAULT_WATCH_INTERVAL_SECS: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "jotter", version, about = "Local-first notes and to-do lists")]
struct Cli {
    /// Directory holding settings.json and the cache database
    #[arg(long, default_value = "jotter-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Work with notes
    Notes {
        #[command(subcommand)]
        action: NoteAction,
    },
    /// Work with to-dos
    Todos {
        #[command(subcommand)]
        action: TodoAction,
    },
    /// Print note and to-do counters
    Stats,
    /// Reconcile both collections with the backend
    Sync,
    /// Keep refreshing and print every change until interrupted
    Watch,
    /// Manage the on-device cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum NoteAction {
    List,
    Add {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long, default_value = DEFAULT_NOTE_COLOR)]
        color: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum TodoAction {
    List,
    Add { text: String },
    Toggle { id: String },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Forget cached records
    Clear {
        #[arg(value_enum, default_value_t = CacheTarget::All)]
        target: CacheTarget,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CacheTarget {
    Notes,
    Todos,
    All,
}

impl CacheTarget {
    fn collections(self) -> &'static [Collection] {
        match self {
            CacheTarget::Notes => &[Collection::Notes],
            CacheTarget::Todos => &[Collection::Todos],
            CacheTarget::All => &Collection::ALL,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jotter=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let state = app::setup(&cli.data_dir)
        .await
        .with_context(|| format!("failed to open data directory {:?}", cli.data_dir))?;

    run(&state, cli.command).await
}

async fn run(state: &AppState, command: Command) -> anyhow::Result<()> {
    let home = &state.home;

    match command {
        Command::Notes { action } => {
            home.load_notes().await;
            match action {
                NoteAction::List => print_json(&home.notes())?,
                NoteAction::Add {
                    title,
                    content,
                    color,
                } => report(home.add_note(&title, &content, &color).await),
                NoteAction::Delete { id } => report(home.delete_note(&id).await),
            }
        }
        Command::Todos { action } => {
            home.load_todos().await;
            match action {
                TodoAction::List => print_json(&home.todos())?,
                TodoAction::Add { text } => report(home.add_todo(&text).await),
                TodoAction::Toggle { id } => report(home.toggle_todo(&id).await),
                TodoAction::Delete { id } => report(home.delete_todo(&id).await),
            }
        }
        Command::Stats => {
            home.refresh_all().await;
            print_json(&home.stats())?;
        }
        Command::Sync => {
            let (notes, todos) = home.refresh_all().await;
            println!("notes: {:?}", notes);
            println!("todos: {:?}", todos);
        }
        Command::Watch => watch(state).await?,
        Command::Cache {
            action: CacheAction::Clear { target },
        } => {
            for collection in target.collections() {
                state.cache.clear(*collection).await;
                println!("cleared {}", collection);
            }
        }
    }

    Ok(())
}

async fn watch(state: &AppState) -> anyhow::Result<()> {
    let period = match state.settings.sync.refresh_interval_secs {
        0 => DEFAULT_WATCH_INTERVAL_SECS,
        secs => secs,
    };

    let mut notes = state.home.subscribe_notes();
    let mut todos = state.home.subscribe_todos();
    let refresher = state
        .home
        .clone()
        .start_refresher(Duration::from_secs(period));

    loop {
        tokio::select! {
            changed = notes.changed() => {
                changed?;
                let count = notes.borrow_and_update().len();
                println!("notes: {} records", count);
            }
            changed = todos.changed() => {
                changed?;
                let count = todos.borrow_and_update().len();
                println!("todos: {} records", count);
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }

    refresher.abort();
    tracing::info!("Stopped watching");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(outcome: MutationOutcome) {
    match outcome {
        MutationOutcome::Synced => println!("saved"),
        MutationOutcome::LocalOnly => println!("saved locally, backend unreachable"),
        MutationOutcome::RolledBack => println!("not saved, backend unreachable"),
        MutationOutcome::Rejected => println!("nothing to save"),
        MutationOutcome::NotFound => println!("no such record"),
    }
}
