//! Debounced persistence of scene changes.
//!
//! [`Autosave`] owns at most one outstanding deferred write. Every
//! [`schedule`](Autosave::schedule) supersedes the previous one, so a burst
//! of changes inside the quiet interval produces a single write carrying the
//! last state. [`flush_now`](Autosave::flush_now) skips the timer for callers
//! that need the write to have landed before they continue.
//!
//! Superseding only affects writes still waiting on the timer; a write that
//! has been handed to the store always runs to completion, and the pending
//! flag stays raised until every such write has settled.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error};

use crate::notice::NoticeBoard;

/// Quiet interval before a scheduled write runs
pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_millis(500);

/// Message shown when a write fails
pub const SAVE_FAILED: &str = "Failed to save canvas. Please try again.";

/// Debounced write controller for one document
#[derive(Debug)]
pub struct Autosave {
    quiet_interval: Duration,
    shared: Arc<Shared>,
    notices: NoticeBoard,
}

#[derive(Debug, Default)]
struct Flight {
    /// Generation of the write still waiting on its timer
    waiting: Option<u64>,
    /// Writes handed to the store and not yet settled
    in_flight: usize,
}

#[derive(Debug)]
struct Shared {
    generation: AtomicU64,
    flight: Mutex<Flight>,
    pending: watch::Sender<bool>,
}

impl Shared {
    /// Change the flight state and republish the pending flag
    fn update<R>(&self, f: impl FnOnce(&mut Flight) -> R) -> R {
        let mut flight = self.flight.lock().unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut flight);
        self.pending
            .send_replace(flight.waiting.is_some() || flight.in_flight > 0);
        result
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Take the waiting slot if `generation` still owns it
    fn claim(self: &Arc<Self>, generation: u64) -> Option<InFlight> {
        let claimed = self.update(|flight| {
            if flight.waiting != Some(generation) {
                return false;
            }
            flight.waiting = None;
            flight.in_flight += 1;
            true
        });
        claimed.then(|| InFlight(Arc::clone(self)))
    }

    fn launch(self: &Arc<Self>) -> InFlight {
        self.update(|flight| {
            flight.waiting = None;
            flight.in_flight += 1;
        });
        InFlight(Arc::clone(self))
    }
}

/// Held while a write runs; dropping it settles the write
struct InFlight(Arc<Shared>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0
            .update(|flight| flight.in_flight = flight.in_flight.saturating_sub(1));
    }
}

impl Autosave {
    pub fn new(quiet_interval: Duration, notices: NoticeBoard) -> Self {
        let (pending, _rx) = watch::channel(false);
        Self {
            quiet_interval,
            shared: Arc::new(Shared {
                generation: AtomicU64::new(0),
                flight: Mutex::new(Flight::default()),
                pending,
            }),
            notices,
        }
    }

    /// Run `write` once no other schedule call arrives for the quiet interval
    pub fn schedule<F>(&self, write: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let generation = self.shared.next_generation();
        self.shared.update(|flight| flight.waiting = Some(generation));
        debug!(generation, "save scheduled");

        let shared = Arc::clone(&self.shared);
        let notices = self.notices.clone();
        let quiet = self.quiet_interval;
        tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let Some(held) = shared.claim(generation) else {
                return;
            };
            report(write.await, &notices);
            drop(held);
        });
    }

    /// Drop the deferred write, if any. A write already handed to the store
    /// keeps the pending flag raised until it settles.
    pub fn cancel(&self) {
        self.shared.update(|flight| flight.waiting = None);
    }

    /// Supersede any deferred write and run `write` now
    pub async fn flush_now<F>(&self, write: F)
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        let generation = self.shared.next_generation();
        let held = self.shared.launch();
        debug!(generation, "save flushed");

        report(write.await, &self.notices);
        drop(held);
    }

    /// Whether a save is scheduled or in flight
    pub fn pending(&self) -> bool {
        *self.shared.pending.borrow()
    }

    pub fn subscribe_pending(&self) -> watch::Receiver<bool> {
        self.shared.pending.subscribe()
    }

    pub fn quiet_interval(&self) -> Duration {
        self.quiet_interval
    }
}

fn report(outcome: anyhow::Result<()>, notices: &NoticeBoard) {
    if let Err(e) = outcome {
        error!(error = %e, "save failed");
        notices.report(SAVE_FAILED);
    }
}
