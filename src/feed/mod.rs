/// Change feed: insert/update/delete notifications for one event's selfies
///
/// Delivery is best-effort ordered and at-least-once; the rotation engine
/// is built to absorb replays and reordering. A subscription is a stream,
/// and dropping the stream unsubscribes.
///
/// Adapters:
/// - `memory.rs` - in-process fan-out, fed by whoever mutates the catalog
/// - `sqlite.rs` - polls the SQLite catalog and diffs row revisions
use futures::stream::BoxStream;
use serde::Serialize;

use crate::state::data::{EventId, SelfieId, SelfieRecord};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryFeed;
pub use sqlite::SqliteFeed;

/// One change to an event's selfies
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeedNotification {
    Insert(SelfieRecord),
    Update(SelfieRecord),
    Delete { id: SelfieId },
}

impl FeedNotification {
    /// The selfie this notification is about
    pub fn id(&self) -> SelfieId {
        match self {
            FeedNotification::Insert(record) | FeedNotification::Update(record) => record.id,
            FeedNotification::Delete { id } => *id,
        }
    }
}

/// A live subscription. Drop it to unsubscribe.
pub type FeedStream = BoxStream<'static, FeedNotification>;

/// Source of change notifications for an event's selfies
pub trait ChangeFeed {
    fn subscribe(&self, event: EventId) -> FeedStream;
}
