//! Tuning math: conversions between frequency, MIDI note number and midicents.
//!
//! All tuning math lives here as pure functions with no engine state. Nothing here
//! rounds; display precision is the caller's business.

/// MIDI note number of the reference pitch (A4).
pub const REFERENCE_NOTE: f64 = 69.0;
/// Frequency of the reference pitch.
pub const REFERENCE_HZ: f64 = 440.0;

/// Centre value of a 14-bit MIDI pitch bend.
pub const BEND_CENTER: u16 = 8192;
/// Largest 14-bit MIDI pitch bend value.
pub const BEND_MAX: u16 = 16383;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Frequency of `relative_step` steps in an n-tone equal division of `unit`.
///
/// `unit = 2.0, division = 12` is 12-EDO; `unit = 3.0, division = 13` is
/// Bohlen-Pierce.
pub fn equal_division_frequency(relative_step: f64, unit: f64, division: u32, master_hz: f64) -> f64 {
    unit.powf(relative_step / division as f64) * master_hz
}

/// 12-EDO frequency of a (possibly fractional) note number against a reference.
pub fn note_number_to_frequency(note_number: f64, reference_note: f64, reference_hz: f64) -> f64 {
    equal_division_frequency(note_number - reference_note, 2.0, 12, reference_hz)
}

/// Standard A4 = 440 Hz conversion.
pub fn note_to_freq(note_number: f64) -> f64 {
    note_number_to_frequency(note_number, REFERENCE_NOTE, REFERENCE_HZ)
}

/// Fractional MIDI note number of `hz` against a reference. `hz` must be positive.
pub fn frequency_to_midicents(hz: f64, reference_note: f64, reference_hz: f64) -> f64 {
    reference_note + 12.0 * (hz / reference_hz).log2()
}

/// Standard A4 = 440 Hz conversion.
pub fn freq_to_midicents(hz: f64) -> f64 {
    frequency_to_midicents(hz, REFERENCE_NOTE, REFERENCE_HZ)
}

/// Frequency ratio of an interval given in cents.
pub fn cents_to_ratio(cents: f64) -> f64 {
    2.0_f64.powf(cents / 1200.0)
}

/// Bend in cents for a normalized bend amount within `range_cents`.
pub fn bend_cents(range_cents: f64, amount_normalized: f64) -> f64 {
    range_cents * amount_normalized
}

/// A tone expressed as a MIDI note plus a 14-bit pitch-bend offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiRetune {
    pub note: u8,
    /// 0..=16383, 8192 = no bend
    pub bend: u16,
}

/// Express `midicents` for a MIDI-out device whose bend range is
/// `bend_range_semitones` (up and down).
///
/// The note is the nearest MIDI note; the residue goes into the bend. Notes
/// outside 0..=127 are clamped, and so is a residue the bend range can't reach.
pub fn midi_retune(midicents: f64, bend_range_semitones: f64) -> MidiRetune {
    let nearest = midicents.round().clamp(0.0, 127.0);
    let residue = midicents - nearest;

    let bend = if bend_range_semitones > 0.0 {
        let offset = residue / bend_range_semitones * BEND_CENTER as f64;
        (BEND_CENTER as f64 + offset).round().clamp(0.0, BEND_MAX as f64) as u16
    } else {
        BEND_CENTER
    };

    MidiRetune {
        note: nearest as u8,
        bend,
    }
}

/// Human-readable name of a midicent value, e.g. `"C4 +0.0c"`.
///
/// `middle_c_octave` is the octave number printed for MIDI note 60; setups
/// disagree whether that is C3, C4 or C5.
pub fn note_name(midicents: f64, middle_c_octave: i32) -> String {
    let nearest = midicents.round();
    let note = nearest as i64;
    let pitch_class = note.rem_euclid(12) as usize;
    let octave = note.div_euclid(12) - 5 + middle_c_octave as i64;
    // rounded to the printed precision first; + 0.0 turns -0.0 into 0.0
    let cents = ((midicents - nearest) * 1000.0).round() / 10.0 + 0.0;
    format!("{}{} {:+.1}c", NOTE_NAMES[pitch_class], octave, cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_440() {
        assert!((note_to_freq(69.0) - 440.0).abs() < 1e-10);
    }

    #[test]
    fn middle_c() {
        let freq = note_to_freq(60.0);
        assert!((freq - 261.6256).abs() < 0.001);
    }

    #[test]
    fn custom_reference() {
        let freq = note_number_to_frequency(69.0, 69.0, 432.0);
        assert!((freq - 432.0).abs() < 1e-10);
    }

    #[test]
    fn midicents_roundtrip_through_12_edo() {
        for &fundamental in &[27.5, 130.8127826502993, 440.0, 1000.0] {
            for n in -40..=40 {
                let hz = equal_division_frequency(n as f64, 2.0, 12, fundamental);
                let expected = 69.0 + n as f64 + 12.0 * (fundamental / 440.0).log2();
                let got = freq_to_midicents(hz);
                assert!(
                    ((got - expected) / expected).abs() < 1e-9,
                    "n={} F={}: got {}, expected {}",
                    n,
                    fundamental,
                    got,
                    expected
                );
            }
        }
    }

    #[test]
    fn midicents_are_not_rounded() {
        let mc = freq_to_midicents(445.0);
        assert!(mc > 69.0 && mc < 69.2);
        assert!(mc.fract() != 0.0);
    }

    #[test]
    fn equal_division_unit_is_reached_after_division_steps() {
        let hz = equal_division_frequency(13.0, 3.0, 13, 100.0);
        assert!((hz - 300.0).abs() < 1e-9);
    }

    #[test]
    fn cents_helpers_agree() {
        assert!((cents_to_ratio(1200.0) - 2.0).abs() < 1e-12);
        assert!((cents_to_ratio(-700.0) * cents_to_ratio(700.0) - 1.0).abs() < 1e-12);
        assert!((bend_cents(200.0, -1.0) + 200.0).abs() < 1e-12);
    }

    #[test]
    fn retune_exact_note_has_centered_bend() {
        let r = midi_retune(60.0, 2.0);
        assert_eq!(r, MidiRetune { note: 60, bend: BEND_CENTER });
    }

    #[test]
    fn retune_quarter_tone() {
        // 60.5 rounds up to 61, a quarter tone below is -0.5 semitone of a 2-semitone range
        let r = midi_retune(60.5, 2.0);
        assert_eq!(r.note, 61);
        assert_eq!(r.bend, BEND_CENTER - 2048);
    }

    #[test]
    fn retune_clamps_out_of_range() {
        assert_eq!(midi_retune(-3.0, 2.0).note, 0);
        assert_eq!(midi_retune(140.0, 2.0).note, 127);
        assert_eq!(midi_retune(60.25, 0.0).bend, BEND_CENTER);
    }

    #[test]
    fn note_names() {
        assert_eq!(note_name(60.0, 4), "C4 +0.0c");
        assert_eq!(note_name(60.0, 3), "C3 +0.0c");
        assert_eq!(note_name(69.25, 4), "A4 +25.0c");
        assert_eq!(note_name(70.75, 4), "B4 -25.0c");
        assert_eq!(note_name(0.0, 4), "C-1 +0.0c");
        assert_eq!(note_name(47.999999999999, 4), "C3 +0.0c");
    }
}
