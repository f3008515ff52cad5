//! Event queue between the MIDI callback and the engine
//!
//! A bounded tokio channel carries the events. When it is full, note-ons are
//! dropped but note-offs go to an overflow list so a hold can always end.
//! While the overflow is non-empty every new note-off is appended to it,
//! and the receiver drains it only once the channel is empty, so events are
//! delivered in arrival order.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::midi::MidiEvent;

/// Create a queue holding up to `capacity` events plus overflowed note-offs
pub fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let overflow = Arc::new(Mutex::new(Vec::new()));
    (
        EventSender {
            tx,
            overflow: overflow.clone(),
        },
        EventReceiver {
            rx,
            overflow,
            pending: VecDeque::new(),
        },
    )
}

/// Callback side; never blocks beyond a short lock
#[derive(Debug)]
pub struct EventSender {
    tx: mpsc::Sender<MidiEvent>,
    overflow: Arc<Mutex<Vec<MidiEvent>>>,
}

impl EventSender {
    /// Queue `event`. Returns `false` if it was dropped.
    pub fn push(&self, event: MidiEvent) -> bool {
        let mut overflow = self.overflow.lock();

        let event = if overflow.is_empty() {
            match self.tx.try_send(event) {
                Ok(()) => return true,
                Err(TrySendError::Closed(_)) => return false,
                Err(TrySendError::Full(event)) => event,
            }
        } else {
            event
        };

        if matches!(event, MidiEvent::NoteOff { .. }) {
            overflow.push(event);
            true
        } else {
            false
        }
    }
}

/// Engine side
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<MidiEvent>,
    overflow: Arc<Mutex<Vec<MidiEvent>>>,
    pending: VecDeque<MidiEvent>,
}

impl EventReceiver {
    /// Next event if one is ready
    pub fn try_recv(&mut self) -> Option<MidiEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        // Holding the lock keeps the sender from touching either queue
        let mut overflow = self.overflow.lock();
        if let Ok(event) = self.rx.try_recv() {
            return Some(event);
        }
        self.pending.extend(overflow.drain(..));
        drop(overflow);

        self.pending.pop_front()
    }

    /// Wait for the next event; `None` once every sender is gone.
    ///
    /// Cancel safe.
    pub async fn recv(&mut self) -> Option<MidiEvent> {
        if let Some(event) = self.try_recv() {
            return Some(event);
        }
        // The overflow only grows while the channel is full, which wakes us
        self.rx.recv().await
    }
}
