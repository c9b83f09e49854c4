//! The radio stick abstraction.
//!
//! A [`Transport`] stands for one physical USB stick. The ANT protocol
//! handling behind it (USB framing, channel setup) lives in the driver that
//! implements this trait; the discovery pipeline only needs the three
//! capabilities below.

use std::sync::Arc;

use crate::signal::OneShot;

/// One physical radio stick.
///
/// # Contract
///
/// * `is_present` – cheap presence probe, may be called before `open`.
/// * `open` – start bringing the stick up; `false` means immediate failure.
/// * `on_ready` – register the signal to fire once the stick has finished
///   its startup handshake. Drivers may fire it more than once; only the
///   first firing counts.
pub trait Transport: Send + Sync {
    /// Model name, used in logs (`GarminStick3`).
    fn model(&self) -> &str;

    /// Whether the stick is physically attached.
    fn is_present(&self) -> bool;

    /// Begin opening the stick.
    fn open(&self) -> bool;

    /// Register the readiness signal.
    fn on_ready(&self, ready: OneShot<()>);
}

/// Shared handle to a transport.
pub type SharedTransport = Arc<dyn Transport>;

/// Lifecycle state of a stick as driven by [`crate::StickManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StickState {
    /// `startup()` has not been called.
    Unopened,
    /// `open()` succeeded, waiting for the ready signal.
    Opening,
    /// Ready signal received.
    Ready,
    /// `open()` failed or the ready signal was abandoned.
    Failed,
}

impl StickState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Self::Unopened => 0,
            Self::Opening => 1,
            Self::Ready => 2,
            Self::Failed => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Opening,
            2 => Self::Ready,
            3 => Self::Failed,
            _ => Self::Unopened,
        }
    }
}

impl std::fmt::Display for StickState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unopened => write!(f, "unopened"),
            Self::Opening => write!(f, "opening"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
