//! Injector that records instead of sending
//!
//! Used for `--dry-run` and by the engine tests.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use super::{InjectError, KeyInjector};
use crate::mapping::KeyCode;

/// One recorded injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press(KeyCode),
    Release(KeyCode),
}

/// Records every press/release, or only logs it
#[derive(Debug, Clone, Default)]
pub struct RecordingInjector {
    actions: Arc<Mutex<Vec<KeyAction>>>,
    log: bool,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs each action at info level without keeping it
    pub fn logging() -> Self {
        Self {
            actions: Arc::default(),
            log: true,
        }
    }

    /// Snapshot of everything recorded so far
    pub fn actions(&self) -> Vec<KeyAction> {
        self.actions.lock().clone()
    }

    pub fn press_count(&self, key: KeyCode) -> usize {
        self.count(KeyAction::Press(key))
    }

    pub fn release_count(&self, key: KeyCode) -> usize {
        self.count(KeyAction::Release(key))
    }

    fn count(&self, action: KeyAction) -> usize {
        self.actions.lock().iter().filter(|a| **a == action).count()
    }

    fn record(&self, action: KeyAction) {
        if self.log {
            info!("[dry-run] {:?}", action);
        } else {
            self.actions.lock().push(action);
        }
    }
}

impl KeyInjector for RecordingInjector {
    fn press(&self, key: KeyCode) -> Result<(), InjectError> {
        self.record(KeyAction::Press(key));
        Ok(())
    }

    fn release(&self, key: KeyCode) -> Result<(), InjectError> {
        self.record(KeyAction::Release(key));
        Ok(())
    }
}
