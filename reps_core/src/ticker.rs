//! Real-time tick source.
//!
//! A [`Ticker`] owns a background thread that posts [`Intent::Tick`] into a
//! controller mailbox once per period. Dropping the ticker stops the thread
//! and waits for it, whichever way the owning scope is left.

use crate::Intent;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct Ticker {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Start posting ticks to `mailbox` every `period`
    ///
    /// Deadlines are computed from the start instant, so slow wakeups do not
    /// accumulate drift.
    pub fn spawn(mailbox: Sender<Intent>, period: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            let mut deadline = Instant::now() + period;
            loop {
                let wait = deadline.saturating_duration_since(Instant::now());
                match stop_rx.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {
                        if mailbox.send(Intent::Tick).is_err() {
                            tracing::debug!("Tick mailbox closed, stopping ticker");
                            break;
                        }
                        deadline += period;
                    }
                    // Explicit stop or the ticker was dropped
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Stop ticking and wait for the thread to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender wakes the thread immediately
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Ticker thread panicked");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_posts_ticks() {
        let (tx, rx) = mpsc::channel();
        let ticker = Ticker::spawn(tx, Duration::from_millis(5));

        for _ in 0..3 {
            let intent = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(intent, Intent::Tick);
        }
        ticker.stop();
    }

    #[test]
    fn test_drop_releases_mailbox() {
        let (tx, rx) = mpsc::channel();
        {
            let _ticker = Ticker::spawn(tx, Duration::from_millis(5));
            rx.recv_timeout(Duration::from_secs(2)).unwrap();
        }

        // The ticker's sender is gone once it is dropped; draining ends
        let remaining: Vec<_> = rx.iter().collect();
        assert!(remaining.iter().all(|i| *i == Intent::Tick));
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_stops_when_mailbox_closes() {
        let (tx, rx) = mpsc::channel();
        let ticker = Ticker::spawn(tx, Duration::from_millis(1));
        drop(rx);
        // Must not hang: the thread exits on the failed send
        ticker.stop();
    }
}
