//! Keyboard side of the bridge
//!
//! - [`KeyInjector`]: press/release of a virtual key code (simulated input)
//! - [`KeyboardFeed`]: raw key-down capture from the terminal
//! - [`vk`]: virtual key code table and translations

pub mod feed;
pub mod injector;
pub mod recording;
pub mod vk;

pub use feed::{wait_for_escape, KeyInput, KeyboardFeed};
pub use injector::EnigoInjector;
pub use recording::{KeyAction, RecordingInjector};

use crate::mapping::KeyCode;

/// Error type for key injection
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("Failed to initialize key injection backend: {0}")]
    Init(String),

    #[error("Key injection backend is not running")]
    Unavailable,

    #[error("Failed to send key {key}: {reason}")]
    Send { key: KeyCode, reason: String },
}

/// Simulated keyboard output.
///
/// Implementations must be callable from any task; calls are best-effort.
pub trait KeyInjector: Send + Sync {
    /// Issue a key-down for `key` without releasing it
    fn press(&self, key: KeyCode) -> Result<(), InjectError>;

    /// Issue a key-up for `key`
    fn release(&self, key: KeyCode) -> Result<(), InjectError>;
}
