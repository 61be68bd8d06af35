use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use shared::{
    CalendarDate, CreateDiaryRequest, CreateFeedingRequest, CreateToiletRequest, DayOverview,
    DiaryTimeline, ExportRequest, MarkSlotRequest, RangePreset, StorageMode, TimeOfDay,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use charly_tracker::backend::config::AppConfig;
use charly_tracker::backend::domain::{LocalZone, SystemClock};
use charly_tracker::backend::storage::LocalStore;
use charly_tracker::{create_router, initialize_backend, AppState};

#[derive(Parser, Debug)]
#[command(name = "charly-tracker", version, about = "Dog feeding, toilet and diary tracker")]
struct Cli {
    /// Configuration file (default: charly.yaml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the REST API (and the web client, if configured)
    Serve,
    /// Show the slot board and logs of a day
    Overview {
        #[arg(long)]
        date: Option<CalendarDate>,
    },
    /// Log a feeding now or at a given time
    Feed {
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        by: Option<String>,
        #[arg(long)]
        note: Option<String>,
        /// RFC 3339 timestamp, defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Confirm a past slot that has no feeding
    MarkSlot {
        #[arg(long)]
        date: CalendarDate,
        #[arg(long)]
        slot: TimeOfDay,
        /// Defaults to the suggested amount of the day
        #[arg(long)]
        amount: Option<f64>,
    },
    /// Log a toilet event (SHIT or PISS)
    Toilet {
        kind: String,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Add a diary note
    Diary {
        #[arg(long)]
        text: String,
        /// Defaults to today
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        author: Option<String>,
    },
    /// Print the diary timeline
    Timeline,
    /// Delete an entry
    Delete {
        #[arg(value_enum)]
        kind: EntryKind,
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Write a CSV export
    Export {
        #[arg(long)]
        feeding: bool,
        #[arg(long)]
        toilet: bool,
        #[arg(long)]
        diary: bool,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long, value_enum)]
        preset: Option<PresetArg>,
        /// Target directory (default: export.output_dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Consolidate legacy local feeding keys now
    Migrate,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EntryKind {
    Feeding,
    Toilet,
    Diary,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PresetArg {
    All,
    #[value(name = "last-7-days")]
    Last7Days,
    MonthToDate,
}

impl From<PresetArg> for RangePreset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::All => RangePreset::All,
            PresetArg::Last7Days => RangePreset::Last7Days,
            PresetArg::MonthToDate => RangePreset::MonthToDate,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("Loading the configuration failed")?;

    if let Command::Migrate = cli.command {
        return migrate(&config).await.context("Migration failed");
    }

    let state = initialize_backend(&config).await.context("Opening the store failed")?;

    match cli.command {
        Command::Serve => serve(state, &config).await,
        Command::Overview { date } => {
            let date = state.overview_service.resolve_date(date);
            let overview = state
                .overview_service
                .overview(date)
                .await
                .context("Loading the overview failed")?;
            println!("{}", state.storage_info.description);
            print!("{}", render_overview(&overview, &config.zone()?));
            Ok(())
        }
        Command::Feed { amount, by, note, at } => {
            let entry = state
                .feeding_service
                .record(CreateFeedingRequest {
                    amount_g: amount,
                    fed_by: by,
                    note,
                    fed_at: at,
                })
                .await
                .context("Saving the feeding failed")?;
            println!("Saved feeding {} ({} g, slot {})", entry.id, entry.amount_g, slot_label(entry.slot_time));
            Ok(())
        }
        Command::MarkSlot { date, slot, amount } => {
            let entry = state
                .feeding_service
                .mark_slot(MarkSlotRequest {
                    date,
                    slot_time: slot,
                    amount_g: amount,
                })
                .await
                .context("Marking the slot failed")?;
            println!("Marked {} on {} as fed ({} g)", slot, date, entry.amount_g);
            Ok(())
        }
        Command::Toilet { kind, at } => {
            let entry = state
                .toilet_service
                .record(CreateToiletRequest { kind, event_at: at })
                .await
                .context("Saving the toilet event failed")?;
            println!("Saved {} event {}", entry.kind.label(), entry.id);
            Ok(())
        }
        Command::Diary { text, date, author } => {
            let entry_date = date.or_else(|| Some(state.overview_service.today().to_string()));
            let entry = state
                .diary_service
                .record(CreateDiaryRequest {
                    entry_date,
                    text,
                    author,
                })
                .await
                .context("Saving the diary entry failed")?;
            println!("Saved diary entry {} for {}", entry.id, entry.entry_date);
            Ok(())
        }
        Command::Timeline => {
            let timeline = state
                .diary_service
                .timeline()
                .await
                .context("Loading the diary failed")?;
            print_timeline(&timeline);
            Ok(())
        }
        Command::Delete { kind, id, yes } => {
            if !yes && !confirm(&format!("Delete {:?} entry {}?", kind, id))? {
                return Ok(());
            }
            let result = match kind {
                EntryKind::Feeding => state.feeding_service.delete(&id).await,
                EntryKind::Toilet => state.toilet_service.delete(&id).await,
                EntryKind::Diary => state.diary_service.delete(&id).await,
            };
            result.context("Deleting failed")?;
            println!("Deleted {}", id);
            Ok(())
        }
        Command::Export {
            feeding,
            toilet,
            diary,
            from,
            to,
            preset,
            out,
        } => {
            let mut request = ExportRequest {
                feeding,
                toilet,
                diary,
                from,
                to,
            };
            if let Some(preset) = preset {
                state.export_service.apply_preset(&mut request, preset.into());
            }
            let path = state
                .export_service
                .export_to_path(&request, out.as_deref())
                .await
                .context("Export failed")?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        Command::Migrate => Ok(()),
    }
}

async fn serve(state: AppState, config: &AppConfig) -> Result<()> {
    info!("Storage: {}", state.storage_info.description);
    let app = create_router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Binding {} failed", config.server.bind))?;
    info!("Starting server on {}", config.server.bind);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn migrate(config: &AppConfig) -> Result<()> {
    if config.storage_mode() == StorageMode::Remote {
        println!("Remote storage is configured; there is nothing to migrate locally");
        return Ok(());
    }
    let store = LocalStore::open(config.storage.clone(), config.zone()?, Arc::new(SystemClock)).await?;
    match store.migrate_feedings().await? {
        Some(report) => println!(
            "Merged {} feeding entries from {} legacy key(s)",
            report.merged_entries,
            report.legacy_keys.len()
        ),
        None => println!("Feeding data was already migrated"),
    }
    Ok(())
}

/// Ask on stdin; anything but y/yes declines
fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn slot_label(slot: Option<TimeOfDay>) -> String {
    slot.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Day overview as printed by `overview`; times are shown in `zone`
fn render_overview(overview: &DayOverview, zone: &LocalZone) -> String {
    let mut out = String::new();
    let today = if overview.slot_board.is_today { " (today)" } else { "" };
    let _ = writeln!(out, "{}{}", overview.date, today);

    let _ = writeln!(out, "\nSlots");
    for card in &overview.slot_board.slots {
        let mark = if card.can_mark_manually { "  [can mark]" } else { "" };
        let _ = writeln!(
            out,
            "  {}  {:<12} {}{}",
            card.anchor, card.status.label, card.status.detail, mark
        );
    }

    let _ = writeln!(out, "\nFeedings (suggested amount {} g)", overview.suggested_amount_g);
    for entry in &overview.feedings {
        let _ = writeln!(
            out,
            "  {}  {:>4} g  slot {}  {}  {}  [{}]",
            zone.time_of(entry.fed_at),
            entry.amount_g,
            slot_label(entry.slot_time),
            entry.fed_by,
            entry.note,
            entry.id
        );
    }

    let _ = writeln!(out, "\nToilet");
    for entry in &overview.toilet_events {
        let _ = writeln!(
            out,
            "  {}  {}  [{}]",
            zone.time_of(entry.event_at),
            entry.kind.label(),
            entry.id
        );
    }

    let _ = writeln!(out, "\nDiary");
    for entry in &overview.diary_entries {
        let _ = writeln!(out, "  {}: {}  [{}]", entry.author, entry.text, entry.id);
    }
    out
}

fn print_timeline(timeline: &DiaryTimeline) {
    if timeline.days.is_empty() {
        println!("No diary entries yet");
        return;
    }
    for day in &timeline.days {
        println!("{}", day.date);
        for entry in &day.entries {
            let author = if entry.author.is_empty() { "(no name)" } else { entry.author.as_str() };
            println!("  {} | {}  [{}]", author, entry.text, entry.id);
        }
    }
}
