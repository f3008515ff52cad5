//! Playback dispatcher (normal usage mode)
//!
//! Consumes MIDI events and starts/stops [`KeyHolder`]s. In
//! [`HoldMode::Single`] there is at most one hold at a time: a note-on while
//! a hold is active is dropped, and a note-off for any note stops the hold.
//! [`HoldMode::PerNote`] keeps one independent hold per sounding note.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::holder::KeyHolder;
use crate::device::EventReceiver;
use crate::keys::KeyInjector;
use crate::mapping::{MappingTable, Note};
use crate::midi::MidiEvent;

/// How overlapping notes are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum HoldMode {
    /// One hold at a time; overlapping note-ons are ignored
    #[default]
    Single,
    /// One hold per held note
    PerNote,
}

/// Drives key holds from MIDI note events
pub struct PlaybackDispatcher {
    table: Arc<MappingTable>,
    injector: Arc<dyn KeyInjector>,
    interval: Duration,
    mode: HoldMode,
    active: HashMap<Note, KeyHolder>,
}

impl PlaybackDispatcher {
    pub fn new(
        table: Arc<MappingTable>,
        injector: Arc<dyn KeyInjector>,
        interval: Duration,
        mode: HoldMode,
    ) -> Self {
        Self {
            table,
            injector,
            interval,
            mode,
            active: HashMap::new(),
        }
    }

    /// Notes that currently have a running hold
    pub fn active_notes(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self.active.keys().copied().collect();
        notes.sort_unstable();
        notes
    }

    /// Handle one MIDI event.
    ///
    /// A note-off only returns after the stopped holder released its keys.
    pub async fn handle(&mut self, event: &MidiEvent) {
        match *event {
            MidiEvent::NoteOn { note, .. } => self.note_on(note),
            MidiEvent::NoteOff { note, .. } => self.note_off(note).await,
            _ => {}
        }
    }

    fn note_on(&mut self, note: Note) {
        let busy = match self.mode {
            HoldMode::Single => !self.active.is_empty(),
            HoldMode::PerNote => self.active.contains_key(&note),
        };
        if busy {
            debug!("Note {} ignored, hold already active for {:?}", note, self.active_notes());
            return;
        }

        let combo = self.table.get(note).cloned().unwrap_or_default();
        if combo.is_empty() {
            debug!("Note {} is unmapped, holding nothing", note);
        } else {
            debug!("Note {} → holding {}", note, combo);
        }

        let holder = KeyHolder::start(combo, self.injector.clone(), self.interval);
        self.active.insert(note, holder);
    }

    async fn note_off(&mut self, note: Note) {
        let holder = match self.mode {
            HoldMode::Single => {
                let held = self.active.keys().next().copied();
                held.and_then(|held| self.active.remove(&held))
            }
            HoldMode::PerNote => self.active.remove(&note),
        };

        if let Some(holder) = holder {
            let report = holder.stop().await;
            debug!("Note {} released after {} cycles", note, report.cycles);
        }
    }

    /// Stop every running hold and wait for the releases
    pub async fn release_all(&mut self) {
        for (note, holder) in self.active.drain() {
            let report = holder.stop().await;
            debug!("Note {} released on shutdown after {} cycles", note, report.cycles);
        }
    }

    /// Process events until the channel closes or `shutdown` fires, then
    /// release whatever is still held.
    pub async fn run(mut self, mut events: EventReceiver, shutdown: oneshot::Receiver<()>) {
        info!(
            "Playback started ({} mappings, {:?} hold mode)",
            self.table.len(),
            self.mode
        );
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(&event).await,
                    None => {
                        debug!("MIDI event channel closed");
                        break;
                    }
                },
                _ = &mut shutdown => {
                    debug!("Playback shutdown requested");
                    break;
                }
            }
        }

        self.release_all().await;
        info!("Playback stopped");
    }
}
