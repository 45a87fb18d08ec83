//! A walker driven on its own task, with pause/resume flow control.
//!
//! ```text
//!   driver task                                   consumer
//!   ┌─────────────────────────────┐   demand     ┌──────────────┐
//!   │ wait for demand             │◀─────────────┤ next_event() │
//!   │ wait until not paused       │              │              │
//!   │ walker.step() until event ──┼─────────────▶│ pause()      │
//!   │ repeat until End / Error    │   event      │ resume()     │
//!   └─────────────────────────────┘              └──────────────┘
//! ```
//!
//! The driver only works while the consumer is waiting on an event, so a
//! consumer that pauses on receipt of a match finds the walk exactly where
//! that match was produced. The pause flag is checked before every step:
//! after `pause()` returns at most the step already in flight completes.
//! Pausing is a boolean, so any number of `pause()` calls are undone by one
//! `resume()`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;

use crate::WalkerFs;
use crate::walker::{FsWalker, Match, WalkError, WalkEvent};

/// Cloneable pause/resume handle for a [`Selection`].
#[derive(Debug, Clone)]
pub struct FlowControl {
    paused: Arc<watch::Sender<bool>>,
}

impl FlowControl {
    /// Stop starting new steps. Idempotent.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Continue from where the walk stopped. Idempotent.
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }
}

/// Handle to a running walk.
///
/// Produces the walker's events in order, as a [`Stream`] or through
/// [`Selection::next_event`]. Dropping the selection stops the driver task,
/// paused or not.
pub struct Selection {
    events: mpsc::Receiver<WalkEvent>,
    demand: Arc<Notify>,
    /// An event has been asked for and not yet received.
    requested: bool,
    control: FlowControl,
    task: JoinHandle<()>,
}

impl Selection {
    /// Start driving `walker` on a new tokio task.
    ///
    /// Nothing is read until the first event is asked for, so the caller
    /// can pause before the walk touches the filesystem.
    pub fn spawn<F: WalkerFs + 'static>(walker: FsWalker<F>) -> Self {
        // One event in flight at a time; the driver never runs ahead.
        let (tx, events) = mpsc::channel(1);
        let demand = Arc::new(Notify::new());
        let (paused, paused_rx) = watch::channel(false);
        let task = tokio::spawn(drive(walker, tx, demand.clone(), paused_rx));

        Self {
            events,
            demand,
            requested: false,
            control: FlowControl {
                paused: Arc::new(paused),
            },
            task,
        }
    }

    /// Receive the next event. Returns `None` after the terminal event.
    pub async fn next_event(&mut self) -> Option<WalkEvent> {
        std::future::poll_fn(|cx| self.poll_event(cx)).await
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    /// A handle for pausing from elsewhere, e.g. another task.
    pub fn control(&self) -> FlowControl {
        self.control.clone()
    }

    /// Collect all matches, failing on the first error.
    pub async fn collect(mut self) -> Result<Vec<Match>, WalkError> {
        let mut matches = Vec::new();
        while let Some(event) = self.next_event().await {
            match event {
                WalkEvent::Match(m) => matches.push(m),
                WalkEvent::Error(err) => return Err(err),
                WalkEvent::End => break,
            }
        }
        Ok(matches)
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<WalkEvent>> {
        if !self.requested {
            self.demand.notify_one();
            self.requested = true;
        }
        let polled = self.events.poll_recv(cx);
        if polled.is_ready() {
            self.requested = false;
        }
        polled
    }
}

impl Stream for Selection {
    type Item = WalkEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.poll_event(cx)
    }
}

impl Drop for Selection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn drive<F: WalkerFs>(
    mut walker: FsWalker<F>,
    tx: mpsc::Sender<WalkEvent>,
    demand: Arc<Notify>,
    mut paused: watch::Receiver<bool>,
) {
    while !walker.is_halted() {
        demand.notified().await;
        let Some(event) = produce(&mut walker, &mut paused).await else {
            return;
        };
        if tx.send(event).await.is_err() {
            tracing::trace!("selection dropped, stopping walk");
            return;
        }
    }
}

/// Step until the walker produces an event, honouring the pause flag
/// before every step. `None` if every pause handle is gone.
async fn produce<F: WalkerFs>(
    walker: &mut FsWalker<F>,
    paused: &mut watch::Receiver<bool>,
) -> Option<WalkEvent> {
    while !walker.is_halted() {
        if paused.wait_for(|p| !*p).await.is_err() {
            return None;
        }
        if let Some(event) = walker.step().await {
            return Some(event);
        }
    }
    None
}
