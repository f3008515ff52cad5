//! Key holder: keeps a key combination pressed until told to stop
//!
//! While the hold flag is set every key of the combo is pressed again each
//! interval, so the target application keeps seeing a key-down. Clearing the
//! flag ends the loop at the top of the next cycle; the keys are then
//! released once each, in combo order. Dropping a [`KeyHolder`] clears the
//! flag too, and a cancelled task still releases what it pressed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::keys::KeyInjector;
use crate::mapping::KeyCombo;

/// Re-press interval used when none is configured
pub const DEFAULT_HOLD_INTERVAL: Duration = Duration::from_millis(25);

/// Summary of a finished hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HoldReport {
    /// Number of press cycles issued
    pub cycles: u64,
}

/// A running hold for one key combination
#[derive(Debug)]
pub struct KeyHolder {
    hold: Arc<AtomicBool>,
    task: Option<JoinHandle<HoldReport>>,
}

/// Releases the combo when the hold loop ends or its task is dropped
struct PressedKeys {
    combo: KeyCombo,
    injector: Arc<dyn KeyInjector>,
}

impl PressedKeys {
    fn press(&self) {
        for key in self.combo.iter() {
            if let Err(e) = self.injector.press(key) {
                trace!("Press of {} failed: {}", key, e);
            }
        }
    }
}

impl Drop for PressedKeys {
    fn drop(&mut self) {
        for key in self.combo.iter() {
            if let Err(e) = self.injector.release(key) {
                trace!("Release of {} failed: {}", key, e);
            }
        }
    }
}

impl KeyHolder {
    /// Start holding `combo`.
    ///
    /// The hold flag is raised before the task exists, so the first cycle
    /// always presses the keys unless [`stop`](Self::stop) was already called.
    pub fn start(combo: KeyCombo, injector: Arc<dyn KeyInjector>, interval: Duration) -> Self {
        let hold = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(Self::run(combo, injector, interval, hold.clone()));
        Self {
            hold,
            task: Some(task),
        }
    }

    async fn run(
        combo: KeyCombo,
        injector: Arc<dyn KeyInjector>,
        interval: Duration,
        hold: Arc<AtomicBool>,
    ) -> HoldReport {
        let mut report = HoldReport::default();
        let keys = PressedKeys { combo, injector };

        while hold.load(Ordering::Acquire) {
            keys.press();
            report.cycles += 1;
            tokio::time::sleep(interval).await;
        }

        drop(keys);
        report
    }

    /// Whether the hold flag is still raised
    pub fn is_holding(&self) -> bool {
        self.hold.load(Ordering::Acquire)
    }

    /// Lower the hold flag and wait until every key has been released
    pub async fn stop(mut self) -> HoldReport {
        self.hold.store(false, Ordering::Release);
        let Some(task) = self.task.take() else {
            return HoldReport::default();
        };
        match task.await {
            Ok(report) => report,
            Err(e) => {
                warn!("Key holder task ended abnormally: {}", e);
                HoldReport::default()
            }
        }
    }
}

impl Drop for KeyHolder {
    fn drop(&mut self) {
        // The task finishes on its own and releases at its next wake-up
        self.hold.store(false, Ordering::Release);
    }
}
