use iced::widget::{column, container, stack, text, Column, Row};
use iced::{time, Alignment, Background, Element, Length, Subscription, Task, Theme};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use selfie_wall::engine::RotationEngine;
use selfie_wall::feed::{FeedNotification, SqliteFeed};
use selfie_wall::state::data::{Event, EventId, SelfieId, SelfieRecord};
use selfie_wall::state::display::DisplayConfig;
use selfie_wall::state::store::SelfieStore;

use super::frame;

/// How often the wall re-reads its display settings
const CONFIG_REFRESH: Duration = Duration::from_secs(5);

/// Gap between grid cells
const GAP: f32 = 8.0;

/// Everything the wall needs at startup
pub struct WallOptions {
    pub db_path: PathBuf,
    pub event: Event,
    /// Approved selfies, newest first
    pub snapshot: Vec<SelfieRecord>,
    pub poll_interval: Duration,
}

/// Main application state
struct SelfieWall {
    db_path: PathBuf,
    event: Event,
    config: DisplayConfig,
    engine: RotationEngine,
    feed: SqliteFeed,
    /// Selfies seeded from the startup snapshot, reconciled by the first poll
    seeded: Vec<SelfieId>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// A change to the event's selfies
    Feed(FeedNotification),
    /// Scheduled swap
    SwapTick,
    /// Time to re-read the display settings
    RefreshConfig,
    /// Background config read completed
    ConfigLoaded(Result<DisplayConfig, String>),
}

impl SelfieWall {
    fn new(options: WallOptions) -> (Self, Task<Message>) {
        let config = options.event.display_config.clone();
        let mut engine = RotationEngine::new(config.grid_columns as usize);
        engine.seed(options.snapshot);
        engine.take_changes();
        let seeded = engine.pool().ids().collect();

        let feed = SqliteFeed::new(&options.db_path).with_poll_interval(options.poll_interval);

        (
            SelfieWall {
                db_path: options.db_path,
                event: options.event,
                config,
                engine,
                feed,
                seeded,
            },
            Task::none(),
        )
    }

    fn title(&self) -> String {
        format!("{} - Selfie Wall", self.event.name)
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Feed(notification) => {
                let outcome = self.engine.apply(notification);
                debug!(?outcome, "applied feed notification");
            }
            Message::SwapTick => {
                let outcome = self.engine.tick();
                debug!(?outcome, "swap tick");
            }
            Message::RefreshConfig => {
                return Task::perform(
                    load_config(self.db_path.clone(), self.event.id),
                    Message::ConfigLoaded,
                );
            }
            Message::ConfigLoaded(Ok(config)) => self.apply_config(config),
            Message::ConfigLoaded(Err(e)) => {
                warn!(error = %e, "could not refresh display config");
            }
        }

        // The view redraws the whole frame, so per-slot changes are not needed
        self.engine.take_changes();
        Task::none()
    }

    fn apply_config(&mut self, config: DisplayConfig) {
        if config == self.config {
            return;
        }
        if config.grid_columns != self.config.grid_columns {
            self.engine.resize(config.grid_columns as usize);
        }
        info!(
            columns = config.grid_columns,
            swap = config.swap_interval,
            "display config changed"
        );
        // A new swap interval re-keys the timer subscription
        self.config = config;
    }

    fn subscription(&self) -> Subscription<Message> {
        let stream = self.feed.subscribe_with_known(self.event.id, self.seeded.clone());
        let feed = Subscription::run_with_id(self.event.id, stream).map(Message::Feed);

        Subscription::batch([
            feed,
            time::every(self.config.swap_period()).map(|_| Message::SwapTick),
            time::every(CONFIG_REFRESH).map(|_| Message::RefreshConfig),
        ])
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let content: Element<Message> = if self.engine.pool().is_empty() {
            empty_state()
        } else {
            self.grid()
        };
        let wall = stack![content, self.header()]
            .width(Length::Fill)
            .height(Length::Fill);

        let background = frame::to_color(self.config.background());
        container(wall)
            .width(Length::Fill)
            .height(Length::Fill)
            .padding(GAP)
            .style(move |_theme: &Theme| container::Style {
                background: Some(Background::Color(background)),
                ..container::Style::default()
            })
            .into()
    }

    fn grid(&self) -> Element<Message> {
        let current = self.engine.frame();
        let columns = current.columns.max(1);
        let mut slots = current.slots.into_iter();

        let mut rows = Column::new().spacing(GAP).height(Length::Fill);
        for _ in 0..columns {
            let mut row = Row::new().spacing(GAP).height(Length::Fill);
            for _ in 0..columns {
                row = row.push(frame::cell(slots.next().flatten(), &self.config));
            }
            rows = rows.push(row);
        }
        rows.into()
    }

    /// Event name pinned over the top of the wall
    fn header(&self) -> Element<Message> {
        container(
            text(self.event.name.clone())
                .size(20)
                .color(frame::dimmed_white(0.8)),
        )
        .width(Length::Fill)
        .padding(16)
        .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn empty_state<'a>() -> Element<'a, Message> {
    let content: Column<Message> = column![
        text("Waiting for the first selfies...").size(28),
        text("Approved photos will appear here").size(16),
    ]
    .spacing(12)
    .align_x(Alignment::Center);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

/// Read the event's display settings on the blocking pool
/// rusqlite::Connection is not Send, so each read opens its own connection
async fn load_config(db_path: PathBuf, event: EventId) -> Result<DisplayConfig, String> {
    tokio::task::spawn_blocking(move || {
        let store = SelfieStore::open(&db_path)?;
        let config = store.display_config(event)?;
        config.validate()?;
        Ok::<_, selfie_wall::Error>(config)
    })
    .await
    .map_err(|e| e.to_string())?
    .map_err(|e| e.to_string())
}

/// Open the wall window and run until it is closed
pub fn run(options: WallOptions) -> iced::Result {
    info!(event = %options.event.slug, selfies = options.snapshot.len(), "opening display wall");

    iced::application(SelfieWall::title, SelfieWall::update, SelfieWall::view)
        .subscription(SelfieWall::subscription)
        .theme(SelfieWall::theme)
        .centered()
        .run_with(move || SelfieWall::new(options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use selfie_wall::state::data::{NewEvent, NewSelfie};

    fn wall_with(selfies: usize, config: DisplayConfig) -> SelfieWall {
        let store = SelfieStore::open_in_memory().unwrap();
        let event = store
            .create_event(&NewEvent {
                slug: "launch".into(),
                name: "Launch".into(),
                display_config: config,
                ..Default::default()
            })
            .unwrap();
        for i in 0..selfies {
            store
                .create_selfie(
                    &event,
                    &NewSelfie {
                        image_ref: Some(format!("/photos/{i}.jpg")),
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        let snapshot = store.list_approved(event.id).unwrap();
        let (wall, _) = SelfieWall::new(WallOptions {
            db_path: PathBuf::from(":memory:"),
            event,
            snapshot,
            poll_interval: Duration::from_secs(2),
        });
        wall
    }

    #[test]
    fn test_column_change_resizes_engine() {
        let mut wall = wall_with(6, DisplayConfig { grid_columns: 2, ..Default::default() });
        assert_eq!(wall.engine.slot_count(), 4);

        let _ = wall.update(Message::ConfigLoaded(Ok(DisplayConfig {
            grid_columns: 3,
            ..Default::default()
        })));
        assert_eq!(wall.engine.slot_count(), 9);
        assert_eq!(wall.engine.grid().occupied_count(), 6);
        assert!(wall.engine.check_invariants().is_ok());
    }

    #[test]
    fn test_interval_change_keeps_grid() {
        let mut wall = wall_with(6, DisplayConfig { grid_columns: 2, ..Default::default() });
        let before = wall.engine.frame();

        let _ = wall.update(Message::ConfigLoaded(Ok(DisplayConfig {
            grid_columns: 2,
            swap_interval: 12,
            ..Default::default()
        })));
        assert_eq!(wall.config.swap_period(), Duration::from_secs(12));
        assert_eq!(wall.engine.frame(), before);
    }

    #[test]
    fn test_view_builds_for_empty_and_filled_walls() {
        let empty = wall_with(0, DisplayConfig::default());
        assert!(empty.engine.pool().is_empty());
        let _ = empty.view();

        let filled = wall_with(
            5,
            DisplayConfig {
                grid_columns: 2,
                show_names: true,
                ..Default::default()
            },
        );
        assert_eq!(filled.seeded.len(), 5);
        let _ = filled.view();
    }

    #[test]
    fn test_failed_refresh_keeps_config() {
        let mut wall = wall_with(1, DisplayConfig::default());
        let _ = wall.update(Message::ConfigLoaded(Err("database is locked".into())));
        assert_eq!(wall.config, DisplayConfig::default());
    }
}
