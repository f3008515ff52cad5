//! MIDI Keypad
//!
//! Turns a MIDI keyboard or pad controller into a macro keypad: each MIDI note
//! is mapped to a combination of computer keys which is held down, re-pressed
//! at a fixed interval, for as long as the note sounds.

pub mod config;
pub mod console;
pub mod device;
pub mod engine;
pub mod keys;
pub mod mapping;
pub mod midi;
pub mod paths;
