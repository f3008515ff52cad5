//! Open MIDI input connection
//!
//! The midir callback runs on the driver's thread. It only parses and pushes
//! events into the [`EventSender`] queue; all state changes happen on the
//! consumer side. A gate stops forwarding once teardown begins, since drivers may
//! still deliver a message while the port is being closed.

use midir::{Ignore, MidiInput, MidiInputConnection};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{DeviceError, EventSender, PortInfo, RetryPolicy, CLIENT_NAME};
use crate::midi::{format_hex, MidiEvent, SysExMonitor};

/// Shared between the callback and the owner of the connection
#[derive(Debug)]
struct DeviceGate {
    accepting: AtomicBool,
    in_flight: AtomicUsize,
}

impl DeviceGate {
    fn new() -> Self {
        Self {
            accepting: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
        }
    }

    fn enter(&self) -> GateGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        GateGuard { gate: self }
    }

    fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    fn is_idle(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) == 0
    }
}

struct GateGuard<'a> {
    gate: &'a DeviceGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Callback data passed to midir
struct CallbackState {
    tx: EventSender,
    gate: Arc<DeviceGate>,
    sysex: SysExMonitor,
    show_sysex: bool,
}

impl CallbackState {
    /// Called from the MIDI driver thread; must not block or fail.
    fn on_message(&mut self, data: &[u8]) {
        let gate = self.gate.clone();
        let _guard = gate.enter();

        if !gate.is_accepting() {
            debug!("Dropping MIDI message after teardown: {}", format_hex(data));
            return;
        }

        let Some(event) = MidiEvent::parse(data) else {
            debug!("Failed to parse MIDI: {}", format_hex(data));
            return;
        };

        match event {
            MidiEvent::SysEx { ref data } => {
                if self.show_sysex {
                    for line in self.sysex.render_chunk(data) {
                        info!("{}", line);
                    }
                }
                return;
            }
            MidiEvent::Other { .. } => return,
            _ => {}
        }

        if !self.tx.push(event.clone()) {
            debug!("MIDI event dropped, queue full: {}", event);
        }
    }
}

/// An open MIDI input device feeding a channel of [`MidiEvent`]s
pub struct MidiInputDevice {
    name: String,
    connection: Option<MidiInputConnection<CallbackState>>,
    gate: Arc<DeviceGate>,
}

impl MidiInputDevice {
    /// Open `port` and start forwarding note events to `tx`
    pub fn open(
        port: &PortInfo,
        tx: EventSender,
        show_sysex: bool,
    ) -> Result<Self, DeviceError> {
        let mut midi_in = MidiInput::new(&format!("{}-Input", CLIENT_NAME))
            .map_err(|e| DeviceError::Init(e.to_string()))?;
        midi_in.ignore(if show_sysex {
            Ignore::TimeAndActiveSense
        } else {
            Ignore::All
        });

        // The port list may have changed since it was shown; prefer the name
        let ports = midi_in.ports();
        let midi_port = ports
            .iter()
            .find(|p| midi_in.port_name(p).map(|n| n == port.name).unwrap_or(false))
            .or_else(|| ports.get(port.index))
            .cloned()
            .ok_or_else(|| DeviceError::PortNotFound(port.name.clone()))?;

        let gate = Arc::new(DeviceGate::new());
        let state = CallbackState {
            tx,
            gate: gate.clone(),
            sysex: SysExMonitor::new(),
            show_sysex,
        };

        let connection = midi_in
            .connect(
                &midi_port,
                CLIENT_NAME,
                |_timestamp, data, state| state.on_message(data),
                state,
            )
            .map_err(|e| DeviceError::Connect(e.to_string()))?;

        info!("MIDI In device opened: {}", port.name);

        Ok(Self {
            name: port.name.clone(),
            connection: Some(connection),
            gate,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop forwarding events. Messages already in the driver are dropped.
    pub fn begin_teardown(&self) {
        self.gate.close();
    }

    /// Tear down and close the connection.
    ///
    /// Waits, with backoff, for an in-progress callback to return before the
    /// port is closed. The port is closed even if the wait times out.
    pub fn close(mut self, policy: &RetryPolicy) -> Result<(), DeviceError> {
        self.begin_teardown();

        let idle = policy.wait_until(|| self.gate.is_idle());
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
        info!("MIDI In device closed: {}", self.name);

        if idle {
            Ok(())
        } else {
            Err(DeviceError::CloseBusy {
                attempts: policy.attempts,
            })
        }
    }
}

impl Drop for MidiInputDevice {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            warn!("MIDI In device dropped without close: {}", self.name);
            self.gate.close();
            let _ = connection.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{event_queue, EventReceiver};
    use std::time::Duration;

    fn make_state(capacity: usize) -> (CallbackState, EventReceiver) {
        let (tx, rx) = event_queue(capacity);
        let state = CallbackState {
            tx,
            gate: Arc::new(DeviceGate::new()),
            sysex: SysExMonitor::new(),
            show_sysex: true,
        };
        (state, rx)
    }

    #[test]
    fn test_forwards_note_events_only() {
        let (mut state, mut rx) = make_state(8);

        state.on_message(&[0x90, 60, 100]);
        state.on_message(&[0xB0, 7, 100]);
        state.on_message(&[0xF0, 0x01, 0xF7]);
        state.on_message(&[0x80, 60, 0]);

        assert_eq!(
            rx.try_recv().unwrap(),
            MidiEvent::NoteOn {
                channel: 0,
                note: 60,
                velocity: 100
            }
        );
        assert_eq!(rx.try_recv().unwrap(), MidiEvent::NoteOff { channel: 0, note: 60 });
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_full_queue_drops_note_on_but_keeps_note_off() {
        let (mut state, mut rx) = make_state(1);

        state.on_message(&[0x90, 60, 100]);
        state.on_message(&[0x90, 61, 100]);
        state.on_message(&[0x90, 60, 0]);

        assert_eq!(rx.try_recv().unwrap().note(), Some(60));
        assert_eq!(rx.try_recv(), Some(MidiEvent::NoteOff { channel: 0, note: 60 }));
        assert_eq!(rx.try_recv(), None);
        assert!(state.gate.is_idle());
    }

    #[test]
    fn test_gate_blocks_after_teardown() {
        let (mut state, mut rx) = make_state(8);

        state.gate.close();
        state.on_message(&[0x90, 60, 100]);

        assert_eq!(rx.try_recv(), None);
        assert!(state.gate.is_idle());
    }

    #[test]
    fn test_close_waits_for_in_flight_callback() {
        let gate = Arc::new(DeviceGate::new());
        let worker_gate = gate.clone();

        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let worker = std::thread::spawn(move || {
            let _guard = worker_gate.enter();
            entered_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(20));
        });
        entered_rx.recv().unwrap();

        gate.close();
        assert!(!gate.is_idle());

        let policy = RetryPolicy {
            attempts: 20,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        };
        assert!(policy.wait_until(|| gate.is_idle()));
        worker.join().unwrap();
    }
}
