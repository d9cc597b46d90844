use serde::{Deserialize, Serialize};

use crate::tuning;

/// A single playable tone: frequency plus its fractional MIDI note number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneEntry {
    pub hz: f64,
    pub midicents: f64,
}

impl ToneEntry {
    /// Build an entry from a frequency. Callers guarantee `hz > 0`.
    pub fn from_hz(hz: f64) -> Self {
        Self {
            hz,
            midicents: tuning::freq_to_midicents(hz),
        }
    }

    /// This tone scaled by a pitch bend of `cents`.
    pub fn bent(&self, cents: f64) -> Self {
        Self {
            hz: self.hz * tuning::cents_to_ratio(cents),
            midicents: self.midicents + cents / 100.0,
        }
    }
}
