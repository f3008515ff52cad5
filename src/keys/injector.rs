//! Key injection through `enigo`
//!
//! The enigo handle is not shareable across threads on every platform, so it
//! lives on a dedicated thread that drains a command channel.

use crossbeam::channel::{self, Receiver, Sender};
use enigo::{Direction, Enigo, Keyboard, Settings};
use std::thread::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::{vk, InjectError, KeyInjector};
use crate::mapping::KeyCode;

#[derive(Debug, Clone, Copy)]
enum Command {
    Press(KeyCode),
    Release(KeyCode),
}

/// Injector backed by the operating system's input simulation
pub struct EnigoInjector {
    tx: Option<Sender<Command>>,
    thread: Option<JoinHandle<()>>,
}

impl EnigoInjector {
    /// Start the injection thread and wait until the backend is ready
    pub fn spawn() -> Result<Self, InjectError> {
        let (tx, rx) = channel::unbounded::<Command>();
        let (ready_tx, ready_rx) = channel::bounded::<Result<(), String>>(1);

        let thread = std::thread::Builder::new()
            .name("key-injector".to_string())
            .spawn(move || Self::run(rx, ready_tx))
            .map_err(|e| InjectError::Init(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Key injection backend ready");
                Ok(Self {
                    tx: Some(tx),
                    thread: Some(thread),
                })
            }
            Ok(Err(reason)) => Err(InjectError::Init(reason)),
            Err(_) => Err(InjectError::Unavailable),
        }
    }

    fn run(rx: Receiver<Command>, ready_tx: Sender<Result<(), String>>) {
        let mut enigo = match Enigo::new(&Settings::default()) {
            Ok(enigo) => {
                let _ = ready_tx.send(Ok(()));
                enigo
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e.to_string()));
                return;
            }
        };

        for command in rx.iter() {
            let (code, direction) = match command {
                Command::Press(code) => (code, Direction::Press),
                Command::Release(code) => (code, Direction::Release),
            };

            if let Err(e) = enigo.key(vk::to_backend_key(code), direction) {
                trace!("Key {} {:?} not delivered: {}", code, direction, e);
            }
        }

        debug!("Key injection thread stopped");
    }

    fn send(&self, key: KeyCode, command: Command) -> Result<(), InjectError> {
        let tx = self.tx.as_ref().ok_or(InjectError::Unavailable)?;
        tx.send(command).map_err(|e| InjectError::Send {
            key,
            reason: e.to_string(),
        })
    }
}

impl KeyInjector for EnigoInjector {
    fn press(&self, key: KeyCode) -> Result<(), InjectError> {
        trace!("press {}", key);
        self.send(key, Command::Press(key))
    }

    fn release(&self, key: KeyCode) -> Result<(), InjectError> {
        trace!("release {}", key);
        self.send(key, Command::Release(key))
    }
}

impl Drop for EnigoInjector {
    fn drop(&mut self) {
        // Closing the channel ends the thread once queued keys are sent
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Key injection thread panicked");
            }
        }
    }
}
