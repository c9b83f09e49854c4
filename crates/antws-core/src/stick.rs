//! Stick lifecycle management.
//!
//! [`StickManager`] owns one [`crate::Transport`] for the whole run and drives it
//! from `Unopened` to `Ready` exactly once. [`select_present`] picks which
//! of several candidate sticks to use.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::signal::OneShot;
use crate::transport::{SharedTransport, StickState};

/// Drives a single stick through its startup.
pub struct StickManager {
    transport: SharedTransport,
    state: AtomicU8,
}

impl std::fmt::Debug for StickManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StickManager")
            .field("model", &self.transport.model())
            .field("state", &self.state())
            .finish()
    }
}

impl StickManager {
    /// Take ownership of a transport.
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            state: AtomicU8::new(StickState::Unopened.as_u8()),
        }
    }

    /// The managed transport.
    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StickState {
        StickState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: StickState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Open the stick and wait until it reports ready.
    ///
    /// Suspends only at the ready wait; other tasks keep running. The ready
    /// signal is armed before `open()` so a driver that becomes ready inside
    /// `open()` is not missed.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] if called a second time.
    /// - [`Error::TransportOpen`] if `open()` reports failure; the ready
    ///   signal is then never awaited.
    /// - [`Error::SignalAbandoned`] if the driver drops the ready signal.
    pub async fn startup(&self) -> Result<()> {
        let model = self.transport.model().to_string();
        if self
            .state
            .compare_exchange(
                StickState::Unopened.as_u8(),
                StickState::Opening.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(Error::AlreadyStarted { model });
        }

        let (ready, settled) = OneShot::channel("ready");
        self.transport.on_ready(ready);

        debug!("Opening {} stick", model);
        if !self.transport.open() {
            self.set_state(StickState::Failed);
            return Err(Error::transport_open(model));
        }

        match settled.wait().await {
            Ok(()) => {
                self.set_state(StickState::Ready);
                info!("{} stick initialized", model);
                Ok(())
            }
            Err(e) => {
                self.set_state(StickState::Failed);
                Err(e)
            }
        }
    }
}

/// Return the first candidate that reports physical presence.
///
/// Candidates are probed in order (highest priority first) and probing stops
/// at the first hit, so lower-priority sticks are never touched.
pub fn select_present(candidates: &[SharedTransport]) -> Option<SharedTransport> {
    for candidate in candidates {
        if candidate.is_present() {
            info!("Found {} ANT+ USB stick", candidate.model());
            return Some(Arc::clone(candidate));
        }
        debug!("{} stick not present", candidate.model());
    }
    warn!("No ANT+ USB stick found");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::SimulatedStick;
    use std::time::Duration;

    #[tokio::test]
    async fn test_startup_reaches_ready() {
        let stick = Arc::new(SimulatedStick::new("GarminStick3"));
        let manager = StickManager::new(stick.clone());
        assert_eq!(manager.state(), StickState::Unopened);

        manager.startup().await.unwrap();
        assert_eq!(manager.state(), StickState::Ready);
        assert_eq!(stick.open_calls(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_is_transport_open_error() {
        let stick = Arc::new(SimulatedStick::builder("GarminStick2").open_result(false).build());
        let manager = StickManager::new(stick.clone());

        let err = manager.startup().await.unwrap_err();
        assert!(matches!(err, Error::TransportOpen { ref model } if model == "GarminStick2"));
        assert_eq!(manager.state(), StickState::Failed);
    }

    #[tokio::test]
    async fn test_duplicate_ready_completes_once() {
        let stick = Arc::new(
            SimulatedStick::builder("GarminStick3")
                .ready_firings(3)
                .build(),
        );
        let manager = StickManager::new(stick.clone());
        manager.startup().await.unwrap();

        assert_eq!(stick.ready_fired(), 3);
        assert_eq!(stick.ready_accepted(), 1);
    }

    #[tokio::test]
    async fn test_second_startup_is_rejected() {
        let stick = Arc::new(SimulatedStick::new("GarminStick3"));
        let manager = StickManager::new(stick.clone());
        manager.startup().await.unwrap();

        let err = manager.startup().await.unwrap_err();
        assert!(matches!(err, Error::AlreadyStarted { .. }));
        assert_eq!(stick.open_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_waits_for_delayed_ready() {
        let stick = Arc::new(
            SimulatedStick::builder("GarminStick3")
                .ready_delay(Duration::from_millis(500))
                .build(),
        );
        let manager = Arc::new(StickManager::new(stick));
        let task = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.startup().await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.state(), StickState::Opening);

        task.await.unwrap().unwrap();
        assert_eq!(manager.state(), StickState::Ready);
    }

    #[test]
    fn test_select_present_stops_at_first_hit() {
        let a = Arc::new(SimulatedStick::new("GarminStick3"));
        let b = Arc::new(SimulatedStick::new("GarminStick2"));
        let candidates: Vec<SharedTransport> =
            vec![a.clone() as SharedTransport, b.clone() as SharedTransport];

        let chosen = select_present(&candidates).unwrap();
        assert_eq!(chosen.model(), "GarminStick3");
        assert_eq!(a.presence_checks(), 1);
        assert_eq!(b.presence_checks(), 0);
        assert_eq!(b.open_calls(), 0);
    }

    #[test]
    fn test_select_present_falls_through_to_next() {
        let a = Arc::new(SimulatedStick::builder("GarminStick3").present(false).build());
        let b = Arc::new(SimulatedStick::new("GarminStick2"));
        let candidates: Vec<SharedTransport> = vec![a as SharedTransport, b as SharedTransport];

        let chosen = select_present(&candidates).unwrap();
        assert_eq!(chosen.model(), "GarminStick2");
    }

    #[test]
    fn test_select_present_none() {
        let a = Arc::new(SimulatedStick::builder("GarminStick3").present(false).build());
        let candidates: Vec<SharedTransport> = vec![a as SharedTransport];
        assert!(select_present(&candidates).is_none());
        assert!(select_present(&[]).is_none());
    }
}
