use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

use super::{ChangeFeed, FeedNotification, FeedStream};
use crate::state::data::EventId;

type Subscribers = HashMap<EventId, Vec<mpsc::UnboundedSender<FeedNotification>>>;

/// In-process change feed.
///
/// Every subscriber of an event gets its own unbounded queue; `publish`
/// fans a notification out to all of them. Clones share the subscriber
/// table, so a publisher and a display can hold separate handles.
#[derive(Clone, Default)]
pub struct MemoryFeed {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `notification` to every live subscriber of `event`.
    /// Returns how many subscribers received it.
    pub fn publish(&self, event: EventId, notification: FeedNotification) -> usize {
        let mut subscribers = self.subscribers.lock();
        let Some(senders) = subscribers.get_mut(&event) else {
            return 0;
        };

        // Dropped streams show up as closed senders; prune them here
        senders.retain(|tx| tx.send(notification.clone()).is_ok());
        let delivered = senders.len();
        if delivered == 0 {
            subscribers.remove(&event);
        }
        trace!(%event, id = %notification.id(), delivered, "published notification");
        delivered
    }

    pub fn subscriber_count(&self, event: EventId) -> usize {
        self.subscribers
            .lock()
            .get(&event)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }
}

impl ChangeFeed for MemoryFeed {
    fn subscribe(&self, event: EventId) -> FeedStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().entry(event).or_default().push(tx);

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|notification| (notification, rx))
        })
        .boxed()
    }
}
