//! Raw keyboard capture from the terminal
//!
//! A blocking reader thread puts the terminal in raw mode and forwards
//! key-down events, translated to virtual key codes, into a tokio channel.

use crossterm::event::{self, Event, KeyCode as TermKey, KeyEventKind, KeyModifiers};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::vk;
use crate::mapping::KeyCode;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Keyboard input as seen by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    /// Key-down carrying a virtual key code
    Down(KeyCode),
    /// Ctrl+C; raw mode swallows the signal so it is reported separately
    Interrupt,
    /// Reading the terminal failed; no further input will follow
    ReadFailed(String),
}

/// Owns the reader thread and the terminal's raw mode
pub struct KeyboardFeed {
    rx: mpsc::Receiver<KeyInput>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl KeyboardFeed {
    /// Enable raw mode and start reading
    pub fn start() -> std::io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;

        let (tx, rx) = mpsc::channel(64);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let thread = std::thread::Builder::new()
            .name("keyboard-feed".to_string())
            .spawn(move || Self::read_loop(tx, stop_flag));

        let thread = match thread {
            Ok(thread) => thread,
            Err(e) => {
                let _ = crossterm::terminal::disable_raw_mode();
                return Err(e);
            }
        };

        Ok(Self {
            rx,
            stop,
            thread: Some(thread),
        })
    }

    fn read_loop(tx: mpsc::Sender<KeyInput>, stop: Arc<AtomicBool>) {
        while !stop.load(Ordering::Acquire) {
            let ready = match event::poll(POLL_INTERVAL) {
                Ok(ready) => ready,
                Err(e) => {
                    let _ = tx.blocking_send(KeyInput::ReadFailed(e.to_string()));
                    return;
                }
            };
            if !ready {
                continue;
            }

            let key = match event::read() {
                Ok(Event::Key(key)) => key,
                Ok(_) => continue,
                Err(e) => {
                    let _ = tx.blocking_send(KeyInput::ReadFailed(e.to_string()));
                    return;
                }
            };

            if key.kind == KeyEventKind::Release {
                continue;
            }

            let mut inputs: Vec<KeyInput> = vk::from_key_event(&key)
                .into_iter()
                .map(KeyInput::Down)
                .collect();
            if key.code == TermKey::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                inputs.push(KeyInput::Interrupt);
            }
            if inputs.is_empty() {
                debug!("Ignoring key without virtual key code: {:?}", key.code);
            }

            for input in inputs {
                if tx.blocking_send(input).is_err() {
                    return;
                }
            }
        }
    }

    /// Channel end, for loops that select over several sources
    pub fn receiver(&mut self) -> &mut mpsc::Receiver<KeyInput> {
        &mut self.rx
    }
}

impl Drop for KeyboardFeed {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Keyboard reader thread panicked");
            }
        }
        if let Err(e) = crossterm::terminal::disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Wait until Escape (or Ctrl+C) is pressed.
///
/// Returns `Err` with the reason if keyboard input stops first.
pub async fn wait_for_escape(rx: &mut mpsc::Receiver<KeyInput>) -> Result<(), String> {
    loop {
        match rx.recv().await {
            Some(KeyInput::Down(vk::ESCAPE)) | Some(KeyInput::Interrupt) => return Ok(()),
            Some(KeyInput::Down(_)) => {}
            Some(KeyInput::ReadFailed(reason)) => return Err(reason),
            None => return Err("keyboard input closed".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_for_escape_skips_other_keys() {
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(KeyInput::Down(0x41)).await.unwrap();
        tx.send(KeyInput::Down(vk::ESCAPE)).await.unwrap();
        tx.send(KeyInput::Down(0x42)).await.unwrap();

        assert_eq!(wait_for_escape(&mut rx).await, Ok(()));
        assert_eq!(rx.recv().await, Some(KeyInput::Down(0x42)));
    }

    #[tokio::test]
    async fn test_wait_for_escape_accepts_interrupt() {
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(KeyInput::Down(vk::CONTROL)).await.unwrap();
        tx.send(KeyInput::Interrupt).await.unwrap();

        assert_eq!(wait_for_escape(&mut rx).await, Ok(()));
    }

    #[tokio::test]
    async fn test_wait_for_escape_reports_closed_input() {
        let (tx, mut rx) = mpsc::channel::<KeyInput>(8);
        drop(tx);

        assert!(wait_for_escape(&mut rx).await.is_err());
    }
}
