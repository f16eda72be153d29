use futures::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChangeFeed, FeedNotification, FeedStream};
use crate::error::Result;
use crate::state::data::{EventId, SelfieId, StoredSelfie};
use crate::state::store::SelfieStore;

/// Default time between two catalog polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Change feed over the SQLite catalog.
///
/// Each poll reads the event's rows and compares their revisions with the
/// previous poll. The first poll has nothing to compare against and
/// delivers every row as an insert, which doubles as the snapshot a
/// reconnecting display needs. A display that seeded itself from its own
/// snapshot subscribes with `subscribe_with_known` instead, so rows
/// removed in between still come through as deletes. A failed poll is logged and retried on the
/// next interval; the stream itself never ends.
#[derive(Debug, Clone)]
pub struct SqliteFeed {
    db_path: PathBuf,
    poll_interval: Duration,
}

impl SqliteFeed {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Subscribe on behalf of a display that already holds `known` from a
    /// snapshot. The first poll reports a `Delete` for every known selfie
    /// that is gone by then, and refreshes the ones still there.
    pub fn subscribe_with_known(
        &self,
        event: EventId,
        known: impl IntoIterator<Item = SelfieId>,
    ) -> FeedStream {
        self.poll_stream(event, RevisionTracker::seeded(known))
    }

    fn poll_stream(&self, event: EventId, tracker: RevisionTracker) -> FeedStream {
        let state = PollState {
            db_path: self.db_path.clone(),
            event,
            poll_interval: self.poll_interval,
            tracker,
            pending: VecDeque::new(),
            first_poll: true,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(notification) = state.pending.pop_front() {
                    return Some((notification, state));
                }
                if !state.first_poll {
                    tokio::time::sleep(state.poll_interval).await;
                }
                state.first_poll = false;

                match poll_rows(state.db_path.clone(), state.event).await {
                    Ok(rows) => {
                        let changes = state.tracker.diff(rows);
                        if !changes.is_empty() {
                            debug!(event = %state.event, changes = changes.len(), "catalog changed");
                        }
                        state.pending.extend(changes);
                    }
                    Err(e) => warn!(event = %state.event, error = %e, "catalog poll failed"),
                }
            }
        })
        .boxed()
    }
}

impl ChangeFeed for SqliteFeed {
    fn subscribe(&self, event: EventId) -> FeedStream {
        self.poll_stream(event, RevisionTracker::default())
    }
}

struct PollState {
    db_path: PathBuf,
    event: EventId,
    poll_interval: Duration,
    tracker: RevisionTracker,
    pending: VecDeque<FeedNotification>,
    first_poll: bool,
}

/// Read all rows of an event on the blocking pool
async fn poll_rows(db_path: PathBuf, event: EventId) -> Result<Vec<StoredSelfie>> {
    // Open a new connection per poll: rusqlite::Connection can't be shared across threads
    tokio::task::spawn_blocking(move || {
        let store = SelfieStore::open(&db_path)?;
        store.list_by_event(event, None)
    })
    .await
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
}

/// Remembers the last seen revision of every row
#[derive(Debug, Default)]
pub struct RevisionTracker {
    known: HashMap<SelfieId, i64>,
}

/// Revision no stored row can have; forces a refresh on the first diff
const UNSEEN_REVISION: i64 = -1;

impl RevisionTracker {
    /// Tracker for rows a display already knows from a snapshot, at an
    /// unknown revision
    pub fn seeded(known: impl IntoIterator<Item = SelfieId>) -> Self {
        Self {
            known: known.into_iter().map(|id| (id, UNSEEN_REVISION)).collect(),
        }
    }

    /// Compare a full listing with the previous one. Deletes come first,
    /// then updates, then inserts in arrival order.
    pub fn diff(&mut self, rows: Vec<StoredSelfie>) -> Vec<FeedNotification> {
        let mut current: HashMap<SelfieId, i64> = HashMap::with_capacity(rows.len());
        let mut updates = Vec::new();
        let mut inserts = Vec::new();

        for row in rows {
            let id = row.record.id;
            current.insert(id, row.revision);
            match self.known.get(&id) {
                None => inserts.push(row.record),
                Some(&revision) if revision != row.revision => updates.push(row.record),
                Some(_) => {}
            }
        }

        let mut deleted: Vec<SelfieId> = self
            .known
            .keys()
            .filter(|id| !current.contains_key(id))
            .copied()
            .collect();
        deleted.sort();
        updates.sort_by_key(|r| r.arrival_order);
        inserts.sort_by_key(|r| r.arrival_order);

        self.known = current;

        deleted
            .into_iter()
            .map(|id| FeedNotification::Delete { id })
            .chain(updates.into_iter().map(FeedNotification::Update))
            .chain(inserts.into_iter().map(FeedNotification::Insert))
            .collect()
    }
}
