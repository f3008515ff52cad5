//! Event-driven mapping engine
//!
//! [`LearnSession`] builds the mapping table from MIDI and keyboard input;
//! [`PlaybackDispatcher`] turns MIDI notes into held key combinations through
//! [`KeyHolder`]s.

pub mod dispatcher;
pub mod holder;
pub mod learn;


pub use dispatcher::{HoldMode, PlaybackDispatcher};
pub use holder::{HoldReport, KeyHolder, DEFAULT_HOLD_INTERVAL};
pub use learn::{LearnError, LearnInput, LearnSession, LearnState, LearnStatus, LearnStep};
