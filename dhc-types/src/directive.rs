//! What the engine tells the outside world after each event.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tone::ToneEntry;

/// Which voice group a directive belongs to.
///
/// FT voices are monophonic: a new `VoiceOn` supersedes the sounding one.
/// HT voices are polyphonic, one per controller key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceKind {
    Ft,
    Ht,
}

impl VoiceKind {
    pub fn name(&self) -> &'static str {
        match self {
            VoiceKind::Ft => "ft",
            VoiceKind::Ht => "ht",
        }
    }
}

/// Rendered by the synth, the keyboard view and the MIDI-out retuner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToneDirective {
    VoiceOn {
        tone: ToneEntry,
        ctrl_key_number: i32,
        velocity: u8,
        kind: VoiceKind,
    },
    VoiceOff {
        ctrl_key_number: i32,
        kind: VoiceKind,
    },
    /// Global pitch bend applied to every sounding voice.
    Bend { cents: f64 },
}

impl ToneDirective {
    pub fn kind(&self) -> Option<VoiceKind> {
        match self {
            ToneDirective::VoiceOn { kind, .. } | ToneDirective::VoiceOff { kind, .. } => {
                Some(*kind)
            }
            ToneDirective::Bend { .. } => None,
        }
    }

    pub fn is_voice_on(&self) -> bool {
        matches!(self, ToneDirective::VoiceOn { .. })
    }

    pub fn is_voice_off(&self) -> bool {
        matches!(self, ToneDirective::VoiceOff { .. })
    }
}

/// Non-fatal conditions met while processing an event. The engine keeps
/// running after every one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notice {
    KeyUnmapped { ctrl_key_number: i32 },
    /// Keymap points at an FT index the current table doesn't cover.
    FtOutOfRange { ctrl_key_number: i32, ft_index: i32 },
    StateInconsistency { message: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::KeyUnmapped { ctrl_key_number } => {
                write!(f, "key {} is not assigned in the keymap", ctrl_key_number)
            }
            Notice::FtOutOfRange { ctrl_key_number, ft_index } => write!(
                f,
                "key {} maps to FT {} which is outside the FT table",
                ctrl_key_number, ft_index
            ),
            Notice::StateInconsistency { message } => write!(f, "state inconsistency: {}", message),
        }
    }
}

/// Result of one engine operation: directives in emission order plus notices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteResult {
    pub directives: Vec<ToneDirective>,
    pub notices: Vec<Notice>,
}

impl NoteResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_notice(notice: Notice) -> Self {
        Self {
            notices: vec![notice],
            ..Self::default()
        }
    }

    pub fn push_voice_on(&mut self, tone: ToneEntry, ctrl_key_number: i32, velocity: u8, kind: VoiceKind) {
        self.directives.push(ToneDirective::VoiceOn {
            tone,
            ctrl_key_number,
            velocity,
            kind,
        });
    }

    pub fn push_voice_off(&mut self, ctrl_key_number: i32, kind: VoiceKind) {
        self.directives.push(ToneDirective::VoiceOff { ctrl_key_number, kind });
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// Append another result, keeping emission order.
    pub fn merge(&mut self, other: NoteResult) {
        self.directives.extend(other.directives);
        self.notices.extend(other.notices);
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty() && self.notices.is_empty()
    }

    pub fn voice_ons(&self) -> impl Iterator<Item = &ToneDirective> {
        self.directives.iter().filter(|d| d.is_voice_on())
    }

    pub fn voice_offs(&self) -> impl Iterator<Item = &ToneDirective> {
        self.directives.iter().filter(|d| d.is_voice_off())
    }
}
