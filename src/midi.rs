//! MIDI message parsing
//!
//! Turns raw bytes from the input device into the few event kinds the
//! engine cares about. Velocity-sensitive and controller data are not used.

use std::fmt;

use crate::mapping::Note;

/// Parsed MIDI input event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiEvent {
    /// Note On with non-zero velocity
    NoteOn { channel: u8, note: Note, velocity: u8 },

    /// Note Off, including Note On with velocity 0
    NoteOff { channel: u8, note: Note },

    /// System Exclusive chunk, raw bytes including any 0xF0/0xF7 framing
    SysEx { data: Vec<u8> },

    /// Any other message, kept only for diagnostics
    Other { status: u8 },
}

impl MidiEvent {
    /// Parse a MIDI message from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        // Running status is not produced by midir, a leading data byte is junk
        if status < 0x80 {
            return None;
        }

        let channel = status & 0x0F;
        match status & 0xF0 {
            0x80 => {
                if rest.len() < 2 {
                    return None;
                }
                Some(MidiEvent::NoteOff {
                    channel,
                    note: rest[0] & 0x7F,
                })
            }
            0x90 => {
                if rest.len() < 2 {
                    return None;
                }
                let note = rest[0] & 0x7F;
                let velocity = rest[1] & 0x7F;

                if velocity == 0 {
                    Some(MidiEvent::NoteOff { channel, note })
                } else {
                    Some(MidiEvent::NoteOn {
                        channel,
                        note,
                        velocity,
                    })
                }
            }
            0xF0 if status == 0xF0 || status == 0xF7 => Some(MidiEvent::SysEx {
                data: data.to_vec(),
            }),
            _ => Some(MidiEvent::Other { status }),
        }
    }

    /// Note number for note events
    pub fn note(&self) -> Option<Note> {
        match *self {
            MidiEvent::NoteOn { note, .. } | MidiEvent::NoteOff { note, .. } => Some(note),
            _ => None,
        }
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity),
            MidiEvent::NoteOff { channel, note } => {
                write!(f, "NoteOff ch:{} n:{}", channel + 1, note)
            }
            MidiEvent::SysEx { data } => write!(f, "SysEx {} bytes", data.len()),
            MidiEvent::Other { status } => write!(f, "Other 0x{:02X}", status),
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("0x{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reassembles SysEx chunks for diagnostic display.
///
/// Large SysEx dumps can arrive split across several callbacks; the dump is
/// complete once a chunk ends with 0xF7.
#[derive(Debug, Default)]
pub struct SysExMonitor {
    in_progress: bool,
}

impl SysExMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one chunk as display lines (16 bytes per line), with a heading
    /// on the first chunk and a footer on the last.
    pub fn render_chunk(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        if !self.in_progress {
            lines.push("*************** System Exclusive **************".to_string());
            self.in_progress = true;
        }

        for row in data.chunks(16) {
            lines.push(format_hex(row));
        }

        if data.last() == Some(&0xF7) {
            lines.push("******************************************".to_string());
            self.in_progress = false;
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_parsing() {
        let msg = MidiEvent::parse(&[0x90, 60, 100]).unwrap();
        assert_eq!(
            msg,
            MidiEvent::NoteOn {
                channel: 0,
                note: 60,
                velocity: 100,
            }
        );
    }

    #[test]
    fn test_note_on_velocity_zero() {
        let msg = MidiEvent::parse(&[0x93, 60, 0]).unwrap();
        assert_eq!(msg, MidiEvent::NoteOff { channel: 3, note: 60 });
    }

    #[test]
    fn test_note_off_parsing() {
        let msg = MidiEvent::parse(&[0x80, 61, 64]).unwrap();
        assert_eq!(msg, MidiEvent::NoteOff { channel: 0, note: 61 });
        assert_eq!(msg.note(), Some(61));
    }

    #[test]
    fn test_short_and_junk_messages() {
        assert_eq!(MidiEvent::parse(&[]), None);
        assert_eq!(MidiEvent::parse(&[0x90, 60]), None);
        assert_eq!(MidiEvent::parse(&[0x3C, 0x40]), None);
    }

    #[test]
    fn test_other_messages() {
        let msg = MidiEvent::parse(&[0xB0, 7, 100]).unwrap();
        assert_eq!(msg, MidiEvent::Other { status: 0xB0 });
        assert_eq!(msg.note(), None);

        assert_eq!(
            MidiEvent::parse(&[0xF8]).unwrap(),
            MidiEvent::Other { status: 0xF8 }
        );
    }

    #[test]
    fn test_sysex() {
        let msg = MidiEvent::parse(&[0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7]).unwrap();
        assert!(matches!(msg, MidiEvent::SysEx { ref data } if data.len() == 6));
    }

    #[test]
    fn test_sysex_monitor_chunks() {
        let mut monitor = SysExMonitor::new();

        let first: Vec<u8> = std::iter::once(0xF0).chain(0..20).collect();
        let lines = monitor.render_chunk(&first);
        assert!(lines[0].contains("System Exclusive"));
        assert_eq!(lines.len(), 3);

        let lines = monitor.render_chunk(&[0x01, 0xF7]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "0x01 0xF7");
        assert!(lines[1].starts_with("****"));

        // Next dump starts with a fresh heading
        let lines = monitor.render_chunk(&[0xF0, 0xF7]);
        assert!(lines[0].contains("System Exclusive"));
    }
}
