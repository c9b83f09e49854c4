//! Single-fire completion signals.
//!
//! Hardware drivers announce "stick ready" and "device attached" by calling
//! back into whoever is listening, possibly more than once. [`OneShot`] turns
//! those callbacks into a value that settles exactly once: the first
//! [`OneShot::fire`] wins, every later call is inert and returns `false`.
//! The waiting side holds the matching [`Settled`] future.
//!
//! ```
//! use antws_core::signal::OneShot;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (signal, settled) = OneShot::channel("attached");
//! let driver_copy = signal.clone();
//!
//! assert!(signal.fire(1));
//! assert!(!driver_copy.fire(2));
//! assert_eq!(settled.wait().await.unwrap(), 1);
//! # }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{Error, Result};

struct Inner<T> {
    name: &'static str,
    settled: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

/// The firing half of a single-fire signal. Cheap to clone.
pub struct OneShot<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for OneShot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for OneShot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShot")
            .field("name", &self.inner.name)
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl<T> OneShot<T> {
    /// Create a signal and the future that resolves when it first fires.
    pub fn channel(name: &'static str) -> (Self, Settled<T>) {
        let (tx, rx) = oneshot::channel();
        let signal = Self {
            inner: Arc::new(Inner {
                name,
                settled: AtomicBool::new(false),
                sender: Mutex::new(Some(tx)),
            }),
        };
        (signal, Settled { name, receiver: rx })
    }

    /// Settle the signal with `value`.
    ///
    /// Returns `true` only for the call that settled it.
    pub fn fire(&self, value: T) -> bool {
        if self.inner.settled.swap(true, Ordering::AcqRel) {
            return false;
        }
        let sender = match self.inner.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(tx) = sender {
            // The waiter may have given up already (timeout); that is fine.
            let _ = tx.send(value);
        }
        true
    }

    /// Whether the signal has already fired.
    pub fn is_settled(&self) -> bool {
        self.inner.settled.load(Ordering::Acquire)
    }

    /// The signal's name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }
}

/// The waiting half of a [`OneShot`].
#[derive(Debug)]
pub struct Settled<T> {
    name: &'static str,
    receiver: oneshot::Receiver<T>,
}

impl<T> Settled<T> {
    /// Wait for the first firing.
    ///
    /// Fails with [`Error::SignalAbandoned`] when every [`OneShot`] clone is
    /// dropped without firing.
    pub async fn wait(self) -> Result<T> {
        let name = self.name;
        self.receiver
            .await
            .map_err(|_| Error::SignalAbandoned { signal: name })
    }

    /// Wait for the first firing, giving up after `duration`.
    pub async fn wait_for(self, duration: Duration) -> Result<T> {
        let name = self.name;
        match tokio::time::timeout(duration, self.wait()).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(name, duration)),
        }
    }

    /// Wait with an optional deadline (`None` waits forever).
    pub async fn wait_optional(self, timeout: Option<Duration>) -> Result<T> {
        match timeout {
            Some(duration) => self.wait_for(duration).await,
            None => self.wait().await,
        }
    }
}
