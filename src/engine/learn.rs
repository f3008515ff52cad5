//! Interactive mapping ("learn") session
//!
//! Press a MIDI key to select it, then press one or more keyboard keys to
//! build its combination. Pressing another MIDI key moves on; there is no
//! confirm step. Escape ends the session.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::device::EventReceiver;
use crate::keys::{vk, KeyInput};
use crate::mapping::{KeyCode, KeyCombo, MappingTable, Note};
use crate::midi::MidiEvent;

/// Error that aborts a learn session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LearnError {
    #[error("Keyboard input read error: {0}")]
    InputRead(String),
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnState {
    /// No MIDI key selected yet
    WaitingForMidiKey,
    /// Keyboard keys go to `note`
    CollectingKeyboardKeys { note: Note },
    /// Escape was pressed
    Finished,
}

/// Raw input to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearnInput {
    Midi(MidiEvent),
    KeyDown(KeyCode),
}

/// What a single input did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnStep {
    /// Nothing changed
    Ignored,
    /// The visible status changed and should be redrawn
    Updated,
    /// Escape was pressed
    Finished,
}

/// Data needed to draw the learn screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnStatus {
    /// Selected MIDI key and the combo built so far
    pub current: Option<(Note, KeyCombo)>,
}

/// Builds mapping entries one note at a time
#[derive(Debug)]
pub struct LearnSession {
    state: LearnState,
    table: MappingTable,
}

impl LearnSession {
    /// Start a session on top of `table`
    pub fn new(table: MappingTable) -> Self {
        Self {
            state: LearnState::WaitingForMidiKey,
            table,
        }
    }

    pub fn state(&self) -> LearnState {
        self.state
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    pub fn status(&self) -> LearnStatus {
        let current = match self.state {
            LearnState::CollectingKeyboardKeys { note } => {
                Some((note, self.table.get(note).cloned().unwrap_or_default()))
            }
            _ => None,
        };
        LearnStatus { current }
    }

    /// Apply one input
    pub fn handle(&mut self, input: LearnInput) -> LearnStep {
        if self.state == LearnState::Finished {
            return LearnStep::Ignored;
        }

        match input {
            LearnInput::Midi(MidiEvent::NoteOn { note, .. }) => {
                self.table.reset(note);
                self.state = LearnState::CollectingKeyboardKeys { note };
                debug!("Learning note {}", note);
                LearnStep::Updated
            }
            LearnInput::Midi(_) => LearnStep::Ignored,
            LearnInput::KeyDown(vk::ESCAPE) => {
                self.state = LearnState::Finished;
                LearnStep::Finished
            }
            LearnInput::KeyDown(key) => match self.state {
                LearnState::CollectingKeyboardKeys { note } => {
                    if self.table.combo_mut(note).push_unique(key) {
                        debug!("Note {} += key {}", note, key);
                        LearnStep::Updated
                    } else {
                        LearnStep::Ignored
                    }
                }
                _ => LearnStep::Ignored,
            },
        }
    }

    /// Consume the session, returning the table without empty entries
    pub fn into_table(mut self) -> MappingTable {
        let pruned = self.table.prune_empty();
        if pruned > 0 {
            debug!("Dropped {} notes without keys", pruned);
        }
        self.table
    }

    /// Run until Escape, reading MIDI notes and keyboard keys concurrently.
    ///
    /// `redraw` is called once up front and after every visible change.
    /// A keyboard read failure aborts the session.
    pub async fn run<F>(
        &mut self,
        midi: &mut EventReceiver,
        keys: &mut mpsc::Receiver<KeyInput>,
        mut redraw: F,
    ) -> Result<(), LearnError>
    where
        F: FnMut(&LearnStatus),
    {
        info!("Learn session started");
        redraw(&self.status());

        loop {
            let input = tokio::select! {
                Some(event) = midi.recv() => LearnInput::Midi(event),
                key = keys.recv() => match key {
                    Some(KeyInput::Down(code)) => LearnInput::KeyDown(code),
                    Some(KeyInput::Interrupt) => continue,
                    Some(KeyInput::ReadFailed(reason)) => return Err(LearnError::InputRead(reason)),
                    None => return Err(LearnError::InputRead("keyboard input closed".to_string())),
                },
            };

            match self.handle(input) {
                LearnStep::Ignored => {}
                LearnStep::Updated => redraw(&self.status()),
                LearnStep::Finished => {
                    info!("Learn session finished");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::event_queue;

    fn note_on(note: Note) -> LearnInput {
        LearnInput::Midi(MidiEvent::NoteOn {
            channel: 0,
            note,
            velocity: 100,
        })
    }

    fn note_off(note: Note) -> LearnInput {
        LearnInput::Midi(MidiEvent::NoteOff { channel: 0, note })
    }

    fn combo(keys: &[KeyCode]) -> KeyCombo {
        keys.iter().copied().collect()
    }

    #[test]
    fn test_keys_before_midi_are_ignored() {
        let mut session = LearnSession::new(MappingTable::new());

        assert_eq!(session.handle(LearnInput::KeyDown(0x41)), LearnStep::Ignored);
        assert_eq!(session.state(), LearnState::WaitingForMidiKey);
        assert!(session.table().is_empty());
        assert_eq!(session.status().current, None);
    }

    #[test]
    fn test_collects_keys_for_selected_note() {
        let mut session = LearnSession::new(MappingTable::new());

        assert_eq!(session.handle(note_on(60)), LearnStep::Updated);
        assert_eq!(session.state(), LearnState::CollectingKeyboardKeys { note: 60 });
        assert_eq!(session.handle(LearnInput::KeyDown(0x11)), LearnStep::Updated);
        assert_eq!(session.handle(LearnInput::KeyDown(0x43)), LearnStep::Updated);

        assert_eq!(session.status().current, Some((60, combo(&[0x11, 0x43]))));
    }

    #[test]
    fn test_duplicate_key_recorded_once() {
        let mut session = LearnSession::new(MappingTable::new());
        session.handle(note_on(60));
        session.handle(LearnInput::KeyDown(0x41));

        assert_eq!(session.handle(LearnInput::KeyDown(0x41)), LearnStep::Ignored);
        assert_eq!(session.table().get(60), Some(&combo(&[0x41])));
    }

    #[test]
    fn test_note_off_is_ignored() {
        let mut session = LearnSession::new(MappingTable::new());
        session.handle(note_on(60));

        assert_eq!(session.handle(note_off(60)), LearnStep::Ignored);
        assert_eq!(session.state(), LearnState::CollectingKeyboardKeys { note: 60 });
    }

    #[test]
    fn test_same_note_again_resets_combo() {
        let mut session = LearnSession::new(MappingTable::new());
        session.handle(note_on(60));
        session.handle(LearnInput::KeyDown(0x58));
        session.handle(LearnInput::KeyDown(0x59));

        session.handle(note_on(60));

        assert_eq!(session.table().get(60), Some(&KeyCombo::new()));
        session.handle(LearnInput::KeyDown(0x5A));
        assert_eq!(session.table().get(60), Some(&combo(&[0x5A])));
    }

    #[test]
    fn test_next_note_keeps_previous_combo() {
        let mut session = LearnSession::new(MappingTable::new());
        session.handle(note_on(60));
        session.handle(LearnInput::KeyDown(0x41));
        session.handle(note_on(61));
        session.handle(LearnInput::KeyDown(0x42));

        assert_eq!(session.table().get(60), Some(&combo(&[0x41])));
        assert_eq!(session.table().get(61), Some(&combo(&[0x42])));
    }

    #[test]
    fn test_existing_entries_survive_unless_relearned() {
        let start: MappingTable = [(50, combo(&[0x31])), (60, combo(&[0x41]))]
            .into_iter()
            .collect();
        let mut session = LearnSession::new(start);
        session.handle(note_on(60));
        session.handle(LearnInput::KeyDown(0x42));
        session.handle(LearnInput::KeyDown(vk::ESCAPE));

        let table = session.into_table();
        assert_eq!(table.get(50), Some(&combo(&[0x31])));
        assert_eq!(table.get(60), Some(&combo(&[0x42])));
    }

    #[test]
    fn test_escape_with_empty_combo_drops_note() {
        let mut session = LearnSession::new(MappingTable::new());
        session.handle(note_on(60));
        session.handle(LearnInput::KeyDown(0x41));
        session.handle(note_on(61));

        assert_eq!(session.handle(LearnInput::KeyDown(vk::ESCAPE)), LearnStep::Finished);
        assert_eq!(session.state(), LearnState::Finished);

        let table = session.into_table();
        assert_eq!(table.len(), 1);
        assert!(table.get(61).is_none());
    }

    #[test]
    fn test_escape_before_any_midi_finishes() {
        let mut session = LearnSession::new(MappingTable::new());
        assert_eq!(session.handle(LearnInput::KeyDown(vk::ESCAPE)), LearnStep::Finished);
        assert!(session.into_table().is_empty());
    }

    #[test]
    fn test_inputs_after_finish_are_ignored() {
        let mut session = LearnSession::new(MappingTable::new());
        session.handle(LearnInput::KeyDown(vk::ESCAPE));

        assert_eq!(session.handle(note_on(60)), LearnStep::Ignored);
        assert!(session.table().is_empty());
    }

    #[tokio::test]
    async fn test_run_until_escape() {
        let (midi_tx, mut midi_rx) = event_queue(8);
        let (key_tx, mut key_rx) = mpsc::channel(8);

        let mut session = LearnSession::new(MappingTable::new());
        let mut redraws = Vec::new();

        let feeder = tokio::spawn(async move {
            assert!(midi_tx.push(MidiEvent::NoteOn {
                channel: 0,
                note: 64,
                velocity: 90,
            }));
            // Let the note reach the session before the keys
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            key_tx.send(KeyInput::Down(0x11)).await.unwrap();
            key_tx.send(KeyInput::Down(0x56)).await.unwrap();
            key_tx.send(KeyInput::Down(vk::ESCAPE)).await.unwrap();
            midi_tx
        });

        session
            .run(&mut midi_rx, &mut key_rx, |status| redraws.push(status.clone()))
            .await
            .unwrap();
        let _midi_tx = feeder.await.unwrap();

        assert_eq!(session.state(), LearnState::Finished);
        assert_eq!(session.table().get(64), Some(&combo(&[0x11, 0x56])));
        // Initial draw, note selected, two keys
        assert_eq!(redraws.len(), 4);
        assert_eq!(redraws.last().unwrap().current, Some((64, combo(&[0x11, 0x56]))));
    }

    #[tokio::test]
    async fn test_run_aborts_on_read_failure() {
        let (_midi_tx, mut midi_rx) = event_queue(8);
        let (key_tx, mut key_rx) = mpsc::channel(8);
        key_tx
            .send(KeyInput::ReadFailed("console gone".to_string()))
            .await
            .unwrap();

        let mut session = LearnSession::new(MappingTable::new());
        let result = session.run(&mut midi_rx, &mut key_rx, |_| {}).await;

        assert_eq!(result, Err(LearnError::InputRead("console gone".to_string())));
        assert_ne!(session.state(), LearnState::Finished);
    }
}
