//! Input boundary: raw MIDI bytes to engine events.
//!
//! A note-on with velocity 0 is a note-off. That translation happens here,
//! before anything reaches the engine.

/// Decoded channel message. Only what the engine consumes is kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MidiMessage {
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    PitchBend {
        channel: u8,
        /// -8192 (full down) to +8191 (full up), 0 = center
        value: i16,
    },
}

/// A key event as the engine sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputEvent {
    pub ctrl_key_number: i32,
    pub velocity: u8,
    pub timestamp: f64,
    pub is_note_on: bool,
}

impl InputEvent {
    pub fn note_on(ctrl_key_number: i32, velocity: u8, timestamp: f64) -> Self {
        Self {
            ctrl_key_number,
            velocity,
            timestamp,
            is_note_on: true,
        }
        .normalized()
    }

    pub fn note_off(ctrl_key_number: i32, velocity: u8, timestamp: f64) -> Self {
        Self {
            ctrl_key_number,
            velocity,
            timestamp,
            is_note_on: false,
        }
    }

    /// Key event from raw MIDI bytes; `None` for anything but note on/off.
    pub fn from_midi(data: &[u8], timestamp: f64) -> Option<Self> {
        match parse_midi_message(data)? {
            MidiMessage::NoteOn { note, velocity, .. } => {
                Some(Self::note_on(note as i32, velocity, timestamp))
            }
            MidiMessage::NoteOff { note, velocity, .. } => {
                Some(Self::note_off(note as i32, velocity, timestamp))
            }
            _ => None,
        }
    }

    /// Apply the velocity-0 note-off convention.
    pub fn normalized(self) -> Self {
        if self.is_note_on && self.velocity == 0 {
            Self {
                is_note_on: false,
                ..self
            }
        } else {
            self
        }
    }
}

/// Normalized bend amount in `[-1.0, 1.0)` for a centred 14-bit bend value.
pub fn bend_amount(value: i16) -> f64 {
    value as f64 / 8192.0
}

/// Parse a raw MIDI message. Running status is not supported.
pub fn parse_midi_message(data: &[u8]) -> Option<MidiMessage> {
    let (&status, rest) = data.split_first()?;
    let channel = status & 0x0F;

    match (status & 0xF0, rest) {
        (0x80, [note, velocity, ..]) => Some(MidiMessage::NoteOff {
            channel,
            note: *note,
            velocity: *velocity,
        }),
        (0x90, [note, velocity, ..]) => Some(MidiMessage::NoteOn {
            channel,
            note: *note,
            velocity: *velocity,
        }),
        (0xB0, [controller, value, ..]) => Some(MidiMessage::ControlChange {
            channel,
            controller: *controller,
            value: *value,
        }),
        (0xE0, [lsb, msb, ..]) => {
            let value = (((*msb as i16) << 7) | *lsb as i16) - 8192;
            Some(MidiMessage::PitchBend { channel, value })
        }
        _ => None,
    }
}
