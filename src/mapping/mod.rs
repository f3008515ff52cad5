//! Note → key-combination mapping table
//!
//! A [`MappingTable`] associates MIDI note numbers with ordered key
//! combinations. The on-disk form is handled by [`store::MappingStore`].

pub mod store;

use std::collections::BTreeMap;
use std::fmt;

pub use store::{LineError, LoadReport, LoadStatus, MappingError, MappingStore, SaveResult};

/// MIDI key number (0-127)
pub type Note = u8;

/// Virtual key code as used by the host keyboard layer
pub type KeyCode = u16;

/// Highest valid MIDI note number
pub const MAX_NOTE: Note = 127;

/// Ordered, duplicate-free sequence of virtual key codes.
///
/// Insertion order is the press order and the release order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCombo {
    keys: Vec<KeyCode>,
}

impl KeyCombo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `key` unless it is already part of the combo.
    ///
    /// Returns `true` if the combo changed.
    pub fn push_unique(&mut self, key: KeyCode) -> bool {
        if self.keys.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    pub fn keys(&self) -> &[KeyCode] {
        &self.keys
    }

    pub fn iter(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.keys.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

impl FromIterator<KeyCode> for KeyCombo {
    fn from_iter<I: IntoIterator<Item = KeyCode>>(iter: I) -> Self {
        let mut combo = KeyCombo::new();
        for key in iter {
            combo.push_unique(key);
        }
        combo
    }
}

/// Renders as `key1 + key2 + ...`
impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

/// Mapping from note to key combination, iterated in ascending note order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: BTreeMap<Note, KeyCombo>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, note: Note) -> Option<&KeyCombo> {
        self.entries.get(&note)
    }

    pub fn insert(&mut self, note: Note, combo: KeyCombo) -> Option<KeyCombo> {
        self.entries.insert(note, combo)
    }

    /// Reset `note` to an empty combo, creating the entry if needed.
    pub fn reset(&mut self, note: Note) -> &mut KeyCombo {
        let combo = self.entries.entry(note).or_default();
        combo.clear();
        combo
    }

    /// Combo for `note`, creating an empty one if absent.
    pub fn combo_mut(&mut self, note: Note) -> &mut KeyCombo {
        self.entries.entry(note).or_default()
    }

    /// Drop every entry whose combo is empty.
    pub fn prune_empty(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, combo| !combo.is_empty());
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Note, &KeyCombo)> {
        self.entries.iter().map(|(note, combo)| (*note, combo))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Note, KeyCombo)> for MappingTable {
    fn from_iter<I: IntoIterator<Item = (Note, KeyCombo)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
