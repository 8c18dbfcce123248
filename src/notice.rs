//! Transient user-visible messages.
//!
//! A notice replaces whatever was showing and clears itself after the
//! configured time-to-live unless a newer notice took its place. Reporting
//! never blocks the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::warn;

/// A single message shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub message: String,
}

/// Shared slot holding the current notice
#[derive(Debug, Clone)]
pub struct NoticeBoard {
    current: Arc<watch::Sender<Option<Notice>>>,
    next_id: Arc<AtomicU64>,
    ttl: Duration,
}

impl NoticeBoard {
    pub fn new(ttl: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            current: Arc::new(tx),
            next_id: Arc::new(AtomicU64::new(1)),
            ttl,
        }
    }

    /// Show `message` and schedule its removal
    pub fn report(&self, message: impl Into<String>) {
        let message = message.into();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        warn!(notice = %message, "reporting error to user");
        self.current.send_replace(Some(Notice { id, message }));

        // Without a runtime the notice simply stays until replaced.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let current = Arc::clone(&self.current);
            let ttl = self.ttl;
            handle.spawn(async move {
                tokio::time::sleep(ttl).await;
                current.send_if_modified(|slot| {
                    if slot.as_ref().is_some_and(|n| n.id == id) {
                        *slot = None;
                        true
                    } else {
                        false
                    }
                });
            });
        }
    }

    /// Message currently showing
    pub fn current(&self) -> Option<String> {
        self.current.borrow().as_ref().map(|n| n.message.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Notice>> {
        self.current.subscribe()
    }

    pub fn clear(&self) {
        self.current.send_replace(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn notice_expires_after_ttl() {
        let board = NoticeBoard::new(Duration::from_secs(3));
        board.report("Failed to save canvas. Please try again.");
        assert_eq!(
            board.current().as_deref(),
            Some("Failed to save canvas. Please try again.")
        );

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert!(board.current().is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(board.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn newer_notice_outlives_older_timer() {
        let board = NoticeBoard::new(Duration::from_secs(3));
        board.report("first");
        tokio::time::sleep(Duration::from_secs(2)).await;
        board.report("second");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(board.current().as_deref(), Some("second"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(board.current().is_none());
    }
}
