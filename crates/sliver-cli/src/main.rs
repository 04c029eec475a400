mod config;
mod reader;
mod server;
mod tracker;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use sliver_core::{
    Clock, DAILY_GOAL_OPTIONS, DEFAULT_DAILY_GOAL, EventKind, EventSink, NavOutcome, TurnOutcome,
};
use sliver_store::Store;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, STATS_DB_FILE};
use crate::reader::{StatusReport, open_reader, surface};
use crate::tracker::Tracker;

/// How long queued tracking reports may delay exit.
const TRACKER_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "sliver", about = "Read a little every day; unlock the rest after 21 days")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a PDF as the active document
    Upload {
        /// Path to the PDF
        file: PathBuf,

        /// Number of pages in the document
        #[arg(long)]
        pages: u32,

        /// Title used for tracking (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
    },

    /// Start a new habit for the stored document
    Start {
        /// Pages per day (suggested: 3, 5, 10, 15, 20)
        #[arg(long, default_value_t = DEFAULT_DAILY_GOAL)]
        goal: u32,
    },

    /// Show today's progress, streak and countdown
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Turn to the next page (counts toward today's goal)
    Next,

    /// Go back one page
    Prev,

    /// Jump to a page without counting it as read
    Goto {
        #[arg(allow_negative_numbers = true)]
        page: i64,
    },

    /// Correct the document's page count
    Pages { total: u32 },

    /// Live countdown to midnight with gate re-evaluation
    Watch {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Delete the stored document and all progress
    Reset {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Run the stats backend
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        bind: Option<String>,

        /// Stats database path (defaults to stats.db in the data directory)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

struct App {
    data_dir: PathBuf,
    config: Config,
    clock: Box<dyn Clock>,
}

impl App {
    fn from_env() -> Result<Self> {
        let data_dir = config::data_dir();
        let config = Config::load(&data_dir)?;
        let clock = config::clock_from_env()?;
        Ok(Self {
            data_dir,
            config,
            clock,
        })
    }

    fn open_store(&self) -> Result<Store> {
        Store::open_in(&self.data_dir).context("failed to open store")
    }

    fn tracker(&self, store: &Store) -> Result<Tracker> {
        let device_id = store.device_id().context("failed to read device id")?;
        let tracker = Tracker::spawn(&self.config.tracking, &device_id);
        if !tracker.is_enabled() {
            tracing::debug!("no tracking endpoint configured");
        }
        Ok(tracker)
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let app = App::from_env()?;

    match &cli.command {
        Commands::Upload { file, pages, title } => {
            cmd_upload(&app, file, *pages, title.as_deref()).await
        }
        Commands::Start { goal } => cmd_start(&app, *goal),
        Commands::Status { json } => cmd_status(&app, *json),
        Commands::Next => cmd_next(&app).await,
        Commands::Prev => cmd_prev(&app),
        Commands::Goto { page } => cmd_goto(&app, *page),
        Commands::Pages { total } => cmd_pages(&app, *total),
        Commands::Watch { ticks } => cmd_watch(&app, *ticks).await,
        Commands::Reset { yes } => cmd_reset(&app, *yes),
        Commands::Serve { bind, db } => cmd_serve(&app, bind.as_deref(), db.as_deref()).await,
    }
}

async fn cmd_upload(app: &App, file: &Path, pages: u32, title: Option<&str>) -> Result<()> {
    let data = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let name = match title {
        Some(t) => t.to_string(),
        None => file
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled.pdf")
            .to_string(),
    };

    sliver_store::validate_pdf(&data)?;
    if pages == 0 {
        bail!("--pages must be at least 1");
    }

    let store = app.open_store()?;
    // A new document starts over; the previous habit does not carry across.
    store.clear_all().context("failed to clear previous document")?;
    let meta = store
        .save_document(&name, &data, pages)
        .context("failed to store document")?;

    let tracker = app.tracker(&store)?;
    tracker.report(&meta.name, EventKind::UploadStarted);
    tracker.shutdown(TRACKER_GRACE).await;

    println!("stored '{}' ({} pages)", meta.name, meta.total_pages);
    let options: Vec<String> = DAILY_GOAL_OPTIONS.iter().map(|g| g.to_string()).collect();
    println!("next: sliver start --goal <{}>", options.join("|"));
    Ok(())
}

fn cmd_start(app: &App, goal: u32) -> Result<()> {
    let store = app.open_store()?;
    let Some(meta) = store.document_meta()? else {
        bail!("no document uploaded; run `sliver upload <file> --pages N` first");
    };

    let sink = sliver_core::NullSink;
    let mut reader = open_reader(&store, &*app.clock, &sink)?;
    surface(reader.start(goal, meta.total_pages))?;

    let days = meta.total_pages.div_ceil(goal);
    println!(
        "started '{}': {goal} pages/day over {} pages (~{days} days)",
        meta.name, meta.total_pages
    );
    Ok(())
}

fn cmd_status(app: &App, json: bool) -> Result<()> {
    let store = app.open_store()?;
    let sink = sliver_core::NullSink;
    let reader = open_reader(&store, &*app.clock, &sink)?;

    let Some(report) = StatusReport::build(&reader) else {
        if json {
            println!("{}", serde_json::json!({ "active": false }));
        } else {
            println!("no active habit");
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let mut out = std::io::stdout().lock();
        report.render(&mut out)?;
    }
    Ok(())
}

async fn cmd_next(app: &App) -> Result<()> {
    let store = app.open_store()?;
    let tracker = app.tracker(&store)?;
    {
        let mut reader = open_reader(&store, &*app.clock, &tracker)?;
        let outcome = surface(reader.turn_forward())?;
        match outcome {
            Some(TurnOutcome::Advanced {
                page,
                pages_read_today,
                goal_reached,
                freedom_reached,
            }) => {
                let goal = reader.view().map(|v| v.daily_goal).unwrap_or_default();
                println!("page {page} ({pages_read_today}/{goal} today)");
                if freedom_reached {
                    println!("21 days done: freedom mode unlocked, read as much as you like");
                } else if goal_reached {
                    println!("daily goal reached! come back tomorrow");
                }
            }
            Some(TurnOutcome::GateClosed) => {
                println!(
                    "daily goal complete; reading reopens in {}",
                    reader.engine().countdown()
                );
            }
            Some(TurnOutcome::EndOfBook) => println!("end of book"),
            Some(TurnOutcome::NoActiveHabit) => {
                println!("no active habit; run `sliver start` first");
            }
            None => {}
        }
    }
    tracker.shutdown(TRACKER_GRACE).await;
    Ok(())
}

fn cmd_prev(app: &App) -> Result<()> {
    let store = app.open_store()?;
    let sink = sliver_core::NullSink;
    let mut reader = open_reader(&store, &*app.clock, &sink)?;
    let outcome = surface(reader.turn_back())?;
    print_nav(&reader, outcome);
    Ok(())
}

fn cmd_goto(app: &App, page: i64) -> Result<()> {
    let store = app.open_store()?;
    let sink = sliver_core::NullSink;
    let mut reader = open_reader(&store, &*app.clock, &sink)?;
    let outcome = surface(reader.jump_to(page))?;
    print_nav(&reader, outcome);
    Ok(())
}

/// `outcome` is `None` when the move happened in memory but was not saved.
fn print_nav<S: EventSink>(reader: &reader::Reader<'_, S>, outcome: Option<NavOutcome>) {
    match outcome {
        Some(NavOutcome::Moved(page)) => println!("page {page}"),
        Some(NavOutcome::GateClosed { page }) => println!(
            "daily goal complete; reading ahead reopens in {} (staying on page {page})",
            reader.engine().countdown()
        ),
        Some(NavOutcome::NoActiveHabit) => {
            println!("no active habit; run `sliver start` first");
        }
        None => {
            if let Some(state) = reader.engine().state() {
                println!("page {}", state.current_page);
            }
        }
    }
}

fn cmd_pages(app: &App, total: u32) -> Result<()> {
    let store = app.open_store()?;
    let sink = sliver_core::NullSink;
    let mut reader = open_reader(&store, &*app.clock, &sink)?;
    if !reader.engine().is_active() {
        bail!("no active habit; run `sliver start` first");
    }
    surface(reader.update_total_pages(total))?;
    if store.document_meta()?.is_some() {
        store
            .set_document_pages(total)
            .context("failed to update document metadata")?;
    }
    println!("total pages: {total}");
    Ok(())
}

async fn cmd_watch(app: &App, ticks: Option<u64>) -> Result<()> {
    let store = app.open_store()?;
    let tracker = app.tracker(&store)?;
    let cancel = CancellationToken::new();

    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    {
        let mut reader = open_reader(&store, &*app.clock, &tracker)?;
        let mut out = std::io::stdout();
        reader::watch(&mut reader, cancel.clone(), ticks, &mut out).await?;
        out.flush()?;
    }
    cancel.cancel();
    tracker.shutdown(TRACKER_GRACE).await;
    Ok(())
}

fn cmd_reset(app: &App, yes: bool) -> Result<()> {
    if !yes {
        bail!("this deletes your book and all progress; re-run with --yes to confirm");
    }
    let store = app.open_store()?;
    store.clear_all().context("failed to clear stored data")?;
    println!("reset: document and progress removed");
    Ok(())
}

async fn cmd_serve(app: &App, bind: Option<&str>, db: Option<&Path>) -> Result<()> {
    let db_path = match db {
        Some(p) => p.to_path_buf(),
        None => {
            std::fs::create_dir_all(&app.data_dir)
                .with_context(|| format!("failed to create {}", app.data_dir.display()))?;
            app.data_dir.join(STATS_DB_FILE)
        }
    };
    let store = Store::open(&db_path).context("failed to open stats database")?;
    let bind = bind.unwrap_or(&app.config.server.bind);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    println!("listening on {}", listener.local_addr()?);

    let shutdown = CancellationToken::new();
    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received Ctrl-C, shutting down");
            on_ctrl_c.cancel();
        }
    });

    server::run(listener, store, shutdown).await?;

    // Separate handle: the serving one moved into the router.
    if let Err(e) = Store::open(&db_path).and_then(|s| s.checkpoint_truncate()) {
        tracing::warn!("WAL checkpoint failed: {e}");
    }
    Ok(())
}
