use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use selfie_wall::engine::{Frame, RotationEngine};
use selfie_wall::feed::SqliteFeed;
use selfie_wall::import;
use selfie_wall::runner::spawn_wall;
use selfie_wall::state::data::{Event, NewEvent, NewSelfie, SelfieId, SelfieStatus};
use selfie_wall::state::display::{DisplayConfig, Transition};
use selfie_wall::state::store::SelfieStore;

// Declare the ui module
mod ui;

#[derive(Parser)]
#[command(name = "selfie-wall")]
#[command(about = "Live selfie wall: moderate uploads and rotate them on a display", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Catalog database (defaults to the platform data directory)
    #[arg(long, global = true, env = "SELFIE_WALL_DB")]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Create, inspect and configure events
    #[command(subcommand)]
    Event(EventCommand),

    /// Add one selfie to an event. Without an image it waits for `resolve`.
    Add {
        slug: String,
        image: Option<PathBuf>,

        /// Name shown under the photo
        #[arg(long)]
        name: Option<String>,

        /// Message shown under the name
        #[arg(long)]
        message: Option<String>,
    },

    /// Add every image under a folder (recursively) to an event
    Import { slug: String, folder: PathBuf },

    /// Approve a selfie so it can reach the wall
    Approve { id: i64 },

    /// Reject a selfie and take it off the wall
    Reject { id: i64 },

    /// Delete a selfie
    Remove { id: i64 },

    /// Attach the image of a selfie added without one
    Resolve { id: i64, image: PathBuf },

    /// Set the name and message shown with a selfie; an omitted flag clears it
    Caption {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        message: Option<String>,
    },

    /// List an event's selfies, newest first
    List {
        slug: String,

        /// Only show selfies with this status (pending, approved, rejected)
        #[arg(long)]
        status: Option<SelfieStatus>,
    },

    /// Open the display wall for an event
    Display {
        slug: String,

        /// Milliseconds between catalog polls
        #[arg(long, default_value = "2000")]
        poll_ms: u64,
    },

    /// Run the wall without a window and log every frame change
    Watch {
        slug: String,

        /// Milliseconds between catalog polls
        #[arg(long, default_value = "2000")]
        poll_ms: u64,
    },
}

#[derive(Subcommand)]
enum EventCommand {
    /// Create a new event
    Create {
        /// URL-safe short name (e.g., "summer-party")
        slug: String,
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// Put new selfies on the wall without approval
        #[arg(long)]
        no_moderation: bool,
    },

    /// Show an event, its selfie counts and display settings
    Show { slug: String },

    /// Change display settings; unset flags keep their current value
    Configure {
        slug: String,

        /// Grid side length (1 to 8)
        #[arg(long)]
        columns: Option<u32>,

        /// Seconds between swaps
        #[arg(long)]
        swap_interval: Option<u64>,

        /// fade, slide or zoom
        #[arg(long)]
        transition: Option<Transition>,

        #[arg(long)]
        background: Option<String>,

        #[arg(long)]
        show_names: Option<bool>,

        #[arg(long)]
        show_messages: Option<bool>,

        /// Caption overlay opacity (0.0 to 1.0)
        #[arg(long)]
        overlay_opacity: Option<f32>,

        #[arg(long)]
        border_color: Option<String>,

        #[arg(long)]
        border_width: Option<f32>,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let db_path = match cli.db {
        Some(path) => path,
        None => SelfieStore::default_path()?,
    };
    let store = SelfieStore::open(&db_path)
        .with_context(|| format!("opening catalog at {}", db_path.display()))?;

    match cli.command {
        Command::Event(command) => run_event_command(&store, command),
        Command::Add { slug, image, name, message } => {
            let event = store.require_event(&slug)?;
            let new = match image {
                Some(image) => import::probe(&image, name, message)
                    .with_context(|| format!("reading {}", image.display()))?,
                None => NewSelfie {
                    display_name: name,
                    message,
                    ..NewSelfie::default()
                },
            };
            let id = store.create_selfie(&event, &new)?;
            let status = store.selfie(id)?.record.status;
            println!("Added selfie {} ({})", id, status);
            Ok(())
        }
        Command::Import { slug, folder } => {
            let event = store.require_event(&slug)?;
            let result = import::import_folder(&store, &event, &folder)?;
            println!(
                "Import complete! Added {} images, skipped {} duplicates, {} unreadable.",
                result.imported_count, result.skipped_count, result.failed_count
            );
            Ok(())
        }
        Command::Approve { id } => moderate(&store, SelfieId(id), SelfieStatus::Approved),
        Command::Reject { id } => moderate(&store, SelfieId(id), SelfieStatus::Rejected),
        Command::Remove { id } => {
            store.remove(SelfieId(id))?;
            println!("Removed selfie {}", id);
            Ok(())
        }
        Command::Resolve { id, image } => {
            let probed = import::probe(&image, None, None)
                .with_context(|| format!("reading {}", image.display()))?;
            if let Some(image_ref) = probed.image_ref {
                store.set_image_ref(SelfieId(id), &image_ref)?;
                println!("Selfie {} now shows {}", id, image_ref);
            }
            Ok(())
        }
        Command::Caption { id, name, message } => {
            store.set_caption(SelfieId(id), name.as_deref(), message.as_deref())?;
            println!("Updated caption of selfie {}", id);
            Ok(())
        }
        Command::List { slug, status } => {
            let event = store.require_event(&slug)?;
            for selfie in store.list_by_event(event.id, status)? {
                let record = &selfie.record;
                println!(
                    "{:>6}  {:<8}  {}  {:<16}  {}",
                    record.id,
                    record.status,
                    selfie.created_at.format("%Y-%m-%d %H:%M"),
                    record.display_name.as_deref().unwrap_or("-"),
                    record.image_ref.as_deref().unwrap_or("(no image yet)"),
                );
            }
            Ok(())
        }
        Command::Display { slug, poll_ms } => {
            let event = store.require_event(&slug)?;
            let snapshot = store.list_approved(event.id)?;
            // The wall opens its own connections from here on
            drop(store);

            ui::wall::run(ui::wall::WallOptions {
                db_path,
                event,
                snapshot,
                poll_interval: Duration::from_millis(poll_ms),
            })?;
            Ok(())
        }
        Command::Watch { slug, poll_ms } => {
            let event = store.require_event(&slug)?;
            watch(&store, &event, &db_path, Duration::from_millis(poll_ms))
        }
    }
}

/// Log to stderr, filtered by RUST_LOG (default: info for this crate)
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("selfie_wall=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_event_command(store: &SelfieStore, command: EventCommand) -> Result<()> {
    match command {
        EventCommand::Create { slug, name, description, no_moderation } => {
            let event = store.create_event(&NewEvent {
                slug,
                name,
                description,
                moderation_enabled: !no_moderation,
                display_config: DisplayConfig::default(),
            })?;
            println!("Created event {} ({})", event.slug, event.id);
            Ok(())
        }
        EventCommand::Show { slug } => {
            let event = store.require_event(&slug)?;
            println!("{} ({})", event.name, event.slug);
            if let Some(description) = &event.description {
                println!("  {}", description);
            }
            println!(
                "  moderation: {}",
                if event.moderation_enabled { "on" } else { "off" }
            );
            for status in [SelfieStatus::Pending, SelfieStatus::Approved, SelfieStatus::Rejected] {
                println!("  {:<9} {}", status, store.count_by_status(event.id, status)?);
            }
            println!("{}", serde_json::to_string_pretty(&event.display_config)?);
            Ok(())
        }
        EventCommand::Configure {
            slug,
            columns,
            swap_interval,
            transition,
            background,
            show_names,
            show_messages,
            overlay_opacity,
            border_color,
            border_width,
        } => {
            let event = store.require_event(&slug)?;
            let mut config = event.display_config;
            if let Some(columns) = columns {
                config.grid_columns = columns;
            }
            if let Some(swap_interval) = swap_interval {
                config.swap_interval = swap_interval;
            }
            if let Some(transition) = transition {
                config.transition = transition;
            }
            if let Some(background) = background {
                config.background_color = background;
            }
            if let Some(show_names) = show_names {
                config.show_names = show_names;
            }
            if let Some(show_messages) = show_messages {
                config.show_messages = show_messages;
            }
            if let Some(overlay_opacity) = overlay_opacity {
                config.overlay_opacity = overlay_opacity;
            }
            if let Some(border_color) = border_color {
                config.frame_border_color = border_color;
            }
            if let Some(border_width) = border_width {
                config.frame_border_width = border_width;
            }

            store.update_display_config(event.id, &config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn moderate(store: &SelfieStore, id: SelfieId, status: SelfieStatus) -> Result<()> {
    store.update_status(id, status)?;
    println!("Selfie {} is now {}", id, status);
    Ok(())
}

/// Headless wall: same engine and feed as the window, frames go to the log
fn watch(store: &SelfieStore, event: &Event, db_path: &Path, poll_interval: Duration) -> Result<()> {
    let config = &event.display_config;
    let mut engine = RotationEngine::new(config.grid_columns as usize);
    engine.seed(store.list_approved(event.id)?);

    let feed = SqliteFeed::new(db_path).with_poll_interval(poll_interval);
    let known: Vec<SelfieId> = engine.pool().ids().collect();
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let subscription = feed.subscribe_with_known(event.id, known);
        let wall = spawn_wall(engine, subscription, config.swap_period());
        let mut frames = wall.frames();
        info!(event = %event.slug, frame = %describe(&frames.borrow_and_update()), "watching wall");

        loop {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("received shutdown signal");
                    break;
                }
                changed = frames.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    info!(frame = %describe(&frames.borrow_and_update()), "frame changed");
                }
            }
        }

        if let Some(engine) = wall.stop().await {
            info!(pool = engine.pool().len(), "wall stopped");
        }
    });
    Ok(())
}

/// One line per frame: slot ids row by row, `-` for empty slots
fn describe(frame: &Frame) -> String {
    frame
        .ids()
        .chunks(frame.columns.max(1))
        .map(|row| {
            row.iter()
                .map(|id| id.map_or_else(|| "-".to_string(), |id| id.to_string()))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
