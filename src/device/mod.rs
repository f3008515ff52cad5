//! MIDI input device handling
//!
//! Uses midir for cross-platform MIDI input (ALSA on Linux, CoreMIDI on macOS, WinMM on Windows).

pub mod backoff;
pub mod input;
pub mod queue;

pub use backoff::RetryPolicy;
pub use input::MidiInputDevice;
pub use queue::{event_queue, EventReceiver, EventSender};

use midir::MidiInput;
use tracing::debug;

/// Client name announced to the MIDI subsystem
pub(crate) const CLIENT_NAME: &str = "MIDI-Keypad";

/// Error type for MIDI device operations
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to initialize MIDI input: {0}")]
    Init(String),

    #[error("No MIDI input devices available")]
    NoInputPorts,

    #[error("No MIDI input device at index {index} ({count} available)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("No MIDI input device found matching pattern: {0}")]
    PortNotFound(String),

    #[error("Failed to open MIDI input device: {0}")]
    Connect(String),

    #[error("MIDI input still busy after {attempts} close attempts")]
    CloseBusy { attempts: u32 },
}

impl DeviceError {
    /// Short stage name used in user-facing error lines
    pub fn stage(&self) -> &'static str {
        match self {
            DeviceError::Init(_) | DeviceError::NoInputPorts => "init",
            DeviceError::IndexOutOfRange { .. } | DeviceError::PortNotFound(_) => "select",
            DeviceError::Connect(_) => "open",
            DeviceError::CloseBusy { .. } => "close",
        }
    }
}

/// An input port as listed to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub index: usize,
    pub name: String,
}

/// How the device is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSelector {
    /// Position in the port list
    Index(usize),
    /// Case-insensitive substring of the port name
    Pattern(String),
}

impl PortSelector {
    /// A numeric string selects by index, anything else by name
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        match value.parse::<usize>() {
            Ok(index) => PortSelector::Index(index),
            Err(_) => PortSelector::Pattern(value.to_string()),
        }
    }

    /// Pick the matching port from `ports`
    pub fn resolve<'a>(&self, ports: &'a [PortInfo]) -> Result<&'a PortInfo, DeviceError> {
        if ports.is_empty() {
            return Err(DeviceError::NoInputPorts);
        }

        match self {
            PortSelector::Index(index) => {
                ports
                    .iter()
                    .find(|port| port.index == *index)
                    .ok_or(DeviceError::IndexOutOfRange {
                        index: *index,
                        count: ports.len(),
                    })
            }
            PortSelector::Pattern(pattern) => {
                let pattern_lower = pattern.to_lowercase();
                ports
                    .iter()
                    .find(|port| port.name.to_lowercase().contains(&pattern_lower))
                    .ok_or_else(|| DeviceError::PortNotFound(pattern.clone()))
            }
        }
    }
}

/// List available MIDI input ports
pub fn list_input_ports() -> Result<Vec<PortInfo>, DeviceError> {
    let midi_in = MidiInput::new(&format!("{}-Scanner", CLIENT_NAME))
        .map_err(|e| DeviceError::Init(e.to_string()))?;

    let ports: Vec<PortInfo> = midi_in
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_in
                .port_name(port)
                .ok()
                .map(|name| PortInfo { index, name })
        })
        .collect();

    debug!("Found {} MIDI input ports", ports.len());
    Ok(ports)
}
