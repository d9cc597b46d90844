use serde::{Deserialize, Serialize};

use crate::tuning;

/// The Fundamental Mother: base frequency every FT and HT table derives from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fundamental {
    pub hz: f64,
    pub midicents: f64,
}

impl Fundamental {
    pub fn from_hz(hz: f64) -> Self {
        Self {
            hz,
            midicents: tuning::freq_to_midicents(hz),
        }
    }

    pub fn from_midicents(midicents: f64) -> Self {
        Self {
            hz: tuning::note_to_freq(midicents),
            midicents,
        }
    }
}

impl Default for Fundamental {
    /// C3 (MIDI note 48)
    fn default() -> Self {
        Self::from_midicents(48.0)
    }
}

/// n-EDx parameters: `division` equal steps per `unit` frequency ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqualDivision {
    pub unit: f64,
    pub division: u32,
}

impl Default for EqualDivision {
    fn default() -> Self {
        Self {
            unit: 2.0,
            division: 12,
        }
    }
}

/// Octave shifts applied on top of the harmonic and subharmonic series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HtTranspose {
    pub harmonic_ratio: f64,
    pub subharmonic_ratio: f64,
}

impl Default for HtTranspose {
    fn default() -> Self {
        Self {
            harmonic_ratio: 1.0,
            subharmonic_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pitchbend {
    pub range_cents: f64,
    /// -1.0 (full down) to just under 1.0 (full up)
    pub amount_normalized: f64,
}

impl Pitchbend {
    pub fn cents(&self) -> f64 {
        tuning::bend_cents(self.range_cents, self.amount_normalized)
    }
}

impl Default for Pitchbend {
    fn default() -> Self {
        Self {
            range_cents: 200.0,
            amount_normalized: 0.0,
        }
    }
}

/// How the FT table is derived from the fundamental.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TuningMethodKind {
    #[default]
    EqualDivision,
    HarmonicSeries,
    FileImport,
}

impl TuningMethodKind {
    pub const ALL: [TuningMethodKind; 3] = [
        TuningMethodKind::EqualDivision,
        TuningMethodKind::HarmonicSeries,
        TuningMethodKind::FileImport,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TuningMethodKind::EqualDivision => "n-EDx",
            TuningMethodKind::HarmonicSeries => "Harmonic/Subharmonic",
            TuningMethodKind::FileImport => "Tuning File",
        }
    }
}

/// Largest accepted `ft_steps`.
pub const MAX_FT_STEPS: u32 = 4096;

/// Everything the tone tables are computed from. Delivered wholesale by the
/// preset layer and replaced as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub fundamental: Fundamental,
    /// Half-width of the FT index range: 32 means indices -32..=32
    pub ft_steps: u32,
    pub equal_division: EqualDivision,
    pub ht_transpose: HtTranspose,
    pub middle_c_octave: i32,
    pub pitchbend: Pitchbend,
    #[serde(default)]
    pub tuning_method: TuningMethodKind,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            fundamental: Fundamental::default(),
            ft_steps: 32,
            equal_division: EqualDivision::default(),
            ht_transpose: HtTranspose::default(),
            middle_c_octave: 4,
            pitchbend: Pitchbend::default(),
            tuning_method: TuningMethodKind::default(),
        }
    }
}

impl GlobalSettings {
    /// Check the invariants the tone tables rely on.
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        let hz = self.fundamental.hz;
        if !(hz.is_finite() && hz > 0.0) {
            return Err(format!("fundamental frequency must be positive, got {}", hz));
        }
        if self.ft_steps == 0 {
            return Err("ft_steps must be greater than zero".to_string());
        }
        if self.ft_steps > MAX_FT_STEPS {
            return Err(format!("ft_steps must be at most {}, got {}", MAX_FT_STEPS, self.ft_steps));
        }
        if self.equal_division.division == 0 {
            return Err("equal division must have at least one step".to_string());
        }
        let unit = self.equal_division.unit;
        if !(unit.is_finite() && unit > 0.0) || unit == 1.0 {
            return Err(format!("equal division unit must be positive and not 1, got {}", unit));
        }
        let t = self.ht_transpose;
        if !(t.harmonic_ratio.is_finite() && t.harmonic_ratio > 0.0) {
            return Err(format!("harmonic ratio must be positive, got {}", t.harmonic_ratio));
        }
        if !(t.subharmonic_ratio.is_finite() && t.subharmonic_ratio > 0.0) {
            return Err(format!(
                "subharmonic ratio must be positive, got {}",
                t.subharmonic_ratio
            ));
        }
        if !self.pitchbend.range_cents.is_finite() || self.pitchbend.range_cents < 0.0 {
            return Err(format!(
                "pitchbend range must be non-negative, got {}",
                self.pitchbend.range_cents
            ));
        }
        Ok(())
    }

    pub fn ft_index_range(&self) -> std::ops::RangeInclusive<i32> {
        let steps = self.ft_steps.min(MAX_FT_STEPS) as i32;
        -steps..=steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert!(GlobalSettings::default().validate().is_ok());
    }

    #[test]
    fn default_fundamental_is_c3() {
        let f = Fundamental::default();
        assert!((f.hz - 130.8127826502993).abs() < 1e-9);
        assert!((f.midicents - 48.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_zero_fundamental() {
        let mut s = GlobalSettings::default();
        s.fundamental = Fundamental { hz: 0.0, midicents: 0.0 };
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_zero_division_and_steps() {
        let mut s = GlobalSettings::default();
        s.equal_division.division = 0;
        assert!(s.validate().is_err());

        let mut s = GlobalSettings::default();
        s.ft_steps = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_unit_of_one() {
        let mut s = GlobalSettings::default();
        s.equal_division.unit = 1.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_transpose() {
        let mut s = GlobalSettings::default();
        s.ht_transpose.subharmonic_ratio = 0.0;
        assert!(s.validate().is_err());

        let mut s = GlobalSettings::default();
        s.ht_transpose.harmonic_ratio = -2.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_oversized_ft_steps() {
        for steps in [MAX_FT_STEPS + 1, 1u32 << 31, u32::MAX] {
            let s = GlobalSettings { ft_steps: steps, ..Default::default() };
            assert!(s.validate().is_err(), "{} accepted", steps);
        }
        let s = GlobalSettings { ft_steps: MAX_FT_STEPS, ..Default::default() };
        assert!(s.validate().is_ok());
    }

    #[test]
    fn ft_range_is_symmetric() {
        let s = GlobalSettings { ft_steps: 3, ..Default::default() };
        assert_eq!(s.ft_index_range().collect::<Vec<_>>(), vec![-3, -2, -1, 0, 1, 2, 3]);
    }

    #[test]
    fn pitchbend_cents() {
        let pb = Pitchbend { range_cents: 1200.0, amount_normalized: 0.5 };
        assert!((pb.cents() - 600.0).abs() < 1e-12);
    }

    #[test]
    fn settings_json_roundtrip_keeps_tuning_method_default() {
        let json = r#"{
            "fundamental": {"hz": 220.0, "midicents": 57.0},
            "ft_steps": 12,
            "equal_division": {"unit": 3.0, "division": 13},
            "ht_transpose": {"harmonic_ratio": 0.5, "subharmonic_ratio": 2.0},
            "middle_c_octave": 3,
            "pitchbend": {"range_cents": 100.0, "amount_normalized": 0.0}
        }"#;
        let s: GlobalSettings = serde_json::from_str(json).unwrap();
        assert_eq!(s.tuning_method, TuningMethodKind::EqualDivision);
        assert_eq!(s.equal_division.division, 13);
        assert!(s.validate().is_ok());
    }
}
