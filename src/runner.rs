/// Headless wall loop
///
/// Drives a `RotationEngine` from a change feed and a swap timer on a
/// tokio task, and publishes each new frame on a watch channel. Both
/// inputs are handled inside one `select!`, so feed events and swap ticks
/// never interleave mid-transition.
use futures::StreamExt;
use rand::Rng;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::{Frame, RotationEngine};
use crate::feed::FeedStream;

/// Handle to a running wall
pub struct WallHandle<R> {
    frames: watch::Receiver<Frame>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<RotationEngine<R>>,
}

impl<R> WallHandle<R> {
    /// Receiver that always holds the latest frame
    pub fn frames(&self) -> watch::Receiver<Frame> {
        self.frames.clone()
    }

    /// Stop the swap timer, drop the feed subscription and hand the engine
    /// back. Nothing touches the engine after this returns.
    pub async fn stop(mut self) -> Option<RotationEngine<R>> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match (&mut self.task).await {
            Ok(engine) => Some(engine),
            Err(e) => {
                warn!(error = %e, "wall task ended abnormally");
                None
            }
        }
    }
}

/// Start driving `engine` on the current tokio runtime
pub fn spawn_wall<R>(
    engine: RotationEngine<R>,
    feed: FeedStream,
    swap_period: Duration,
) -> WallHandle<R>
where
    R: Rng + Send + 'static,
{
    let (frames_tx, frames_rx) = watch::channel(engine.frame());
    let (stop_tx, stop_rx) = oneshot::channel();
    let task = tokio::spawn(run_wall(engine, feed, swap_period, frames_tx, stop_rx));

    WallHandle {
        frames: frames_rx,
        stop: Some(stop_tx),
        task,
    }
}

async fn run_wall<R: Rng>(
    mut engine: RotationEngine<R>,
    mut feed: FeedStream,
    swap_period: Duration,
    frames: watch::Sender<Frame>,
    mut stop: oneshot::Receiver<()>,
) -> RotationEngine<R> {
    // First tick one full period from now, not immediately
    let mut ticker = time::interval_at(time::Instant::now() + swap_period, swap_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut feed_open = true;

    info!(slots = engine.slot_count(), period = ?swap_period, "wall started");

    loop {
        tokio::select! {
            biased;

            _ = &mut stop => break,

            notification = feed.next(), if feed_open => match notification {
                Some(notification) => {
                    let outcome = engine.apply(notification);
                    debug!(?outcome, "applied feed notification");
                }
                None => {
                    // Keep rotating what we have
                    warn!("change feed closed");
                    feed_open = false;
                }
            },

            _ = ticker.tick() => {
                let outcome = engine.tick();
                debug!(?outcome, "swap tick");
            }
        }

        if !engine.take_changes().is_empty() {
            frames.send_replace(engine.frame());
        }
    }

    info!("wall stopped");
    engine
}
