//! Tone tables: the FT ladder around the Fundamental Mother and the
//! harmonic/subharmonic series above and below the active FT.

use dhc_types::tuning;
use dhc_types::settings::MAX_FT_STEPS;
use dhc_types::{GlobalSettings, HtTranspose, ToneEntry, TuningMethodKind, HT_MAX, HT_MIN};

use crate::error::{DhcError, Result};

/// Checked tone constructor: rejects zero, negative and non-finite frequencies.
pub fn tone_from_hz(hz: f64) -> Result<ToneEntry> {
    if hz.is_finite() && hz > 0.0 {
        Ok(ToneEntry::from_hz(hz))
    } else {
        Err(DhcError::InvalidFrequency(hz))
    }
}

/// FT indices `-steps..=steps`, ascending.
pub fn build_ft_base_indices(steps: u32) -> Result<Vec<i32>> {
    let steps = half_width(steps)?;
    Ok((-steps..=steps).collect())
}

fn half_width(steps: u32) -> Result<i32> {
    i32::try_from(steps)
        .ok()
        .filter(|s| *s <= MAX_FT_STEPS as i32)
        .ok_or_else(|| {
            DhcError::InvalidTuningParameter(format!(
                "ft_steps must be at most {}, got {}",
                MAX_FT_STEPS, steps
            ))
        })
}

/// FT index → tone, for indices `-steps..=steps`.
#[derive(Debug, Clone, PartialEq)]
pub struct FtTable {
    /// never negative
    steps: i32,
    tones: Vec<ToneEntry>,
}

impl FtTable {
    pub fn get(&self, index: i32) -> Option<&ToneEntry> {
        let offset = index.checked_add(self.steps)?;
        if offset < 0 {
            return None;
        }
        self.tones.get(offset as usize)
    }

    pub fn contains(&self, index: i32) -> bool {
        self.get(index).is_some()
    }

    pub fn steps(&self) -> u32 {
        self.steps.unsigned_abs()
    }

    pub fn len(&self) -> usize {
        self.tones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tones.is_empty()
    }

    /// `(index, tone)` pairs in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &ToneEntry)> {
        let steps = self.steps;
        self.tones
            .iter()
            .enumerate()
            .map(move |(i, tone)| (i as i32 - steps, tone))
    }
}

/// HT index → tone. Negative indices are subharmonics, positive harmonics.
/// Index 0 has no tone: it is the Piper trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct HtTable {
    fundamental_hz: f64,
    transpose: HtTranspose,
    /// index -1 at position 0
    subharmonics: Vec<ToneEntry>,
    /// index 1 at position 0
    harmonics: Vec<ToneEntry>,
}

impl HtTable {
    pub fn get(&self, index: i32) -> Option<&ToneEntry> {
        match index {
            0 => None,
            i if i < 0 => self.subharmonics.get((-(i as i64) - 1) as usize),
            i => self.harmonics.get((i - 1) as usize),
        }
    }

    /// Frequency of the FT this table was built from.
    pub fn fundamental_hz(&self) -> f64 {
        self.fundamental_hz
    }

    pub fn transpose(&self) -> HtTranspose {
        self.transpose
    }

    /// `(index, tone)` pairs from the deepest subharmonic to the highest harmonic.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &ToneEntry)> {
        let subs = self
            .subharmonics
            .iter()
            .enumerate()
            .rev()
            .map(|(i, tone)| (-(i as i32) - 1, tone));
        let harms = self
            .harmonics
            .iter()
            .enumerate()
            .map(|(i, tone)| (i as i32 + 1, tone));
        subs.chain(harms)
    }
}

/// Harmonic series on `fundamental_hz`: `F * i * harmonic_ratio` above,
/// `F / i * subharmonic_ratio` below.
pub fn build_ht_table(fundamental_hz: f64, transpose: HtTranspose) -> HtTable {
    let subharmonics = (1..=-HT_MIN)
        .map(|i| ToneEntry::from_hz(fundamental_hz / i as f64 * transpose.subharmonic_ratio))
        .collect();
    let harmonics = (1..=HT_MAX)
        .map(|i| ToneEntry::from_hz(fundamental_hz * i as f64 * transpose.harmonic_ratio))
        .collect();

    HtTable {
        fundamental_hz,
        transpose,
        subharmonics,
        harmonics,
    }
}

/// Strategy for deriving the FT table from the global settings.
pub trait FtTuningMethod {
    fn kind(&self) -> TuningMethodKind;

    fn build(&self, settings: &GlobalSettings) -> Result<FtTable>;
}

/// n-tone equal division of an arbitrary interval around the fundamental.
pub struct EqualDivisionMethod;

impl FtTuningMethod for EqualDivisionMethod {
    fn kind(&self) -> TuningMethodKind {
        TuningMethodKind::EqualDivision
    }

    fn build(&self, settings: &GlobalSettings) -> Result<FtTable> {
        let ed = settings.equal_division;
        let tones = build_ft_base_indices(settings.ft_steps)?
            .into_iter()
            .map(|index| {
                tone_from_hz(tuning::equal_division_frequency(
                    index as f64,
                    ed.unit,
                    ed.division,
                    settings.fundamental.hz,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FtTable {
            steps: half_width(settings.ft_steps)?,
            tones,
        })
    }
}

/// FT ladder built from the harmonic/subharmonic series of the fundamental.
pub struct HarmonicSeriesMethod;

impl FtTuningMethod for HarmonicSeriesMethod {
    fn kind(&self) -> TuningMethodKind {
        TuningMethodKind::HarmonicSeries
    }

    fn build(&self, _settings: &GlobalSettings) -> Result<FtTable> {
        Err(DhcError::NotImplemented("harmonic series FT tuning"))
    }
}

/// FT ladder read from an imported scale file.
pub struct FileImportMethod;

impl FtTuningMethod for FileImportMethod {
    fn kind(&self) -> TuningMethodKind {
        TuningMethodKind::FileImport
    }

    fn build(&self, _settings: &GlobalSettings) -> Result<FtTable> {
        Err(DhcError::NotImplemented("tuning file FT import"))
    }
}

pub fn tuning_method(kind: TuningMethodKind) -> &'static dyn FtTuningMethod {
    match kind {
        TuningMethodKind::EqualDivision => &EqualDivisionMethod,
        TuningMethodKind::HarmonicSeries => &HarmonicSeriesMethod,
        TuningMethodKind::FileImport => &FileImportMethod,
    }
}

/// Validate `settings` and build the FT table with its configured method.
pub fn build_ft_table(settings: &GlobalSettings) -> Result<FtTable> {
    settings.validate().map_err(DhcError::InvalidTuningParameter)?;
    tuning_method(settings.tuning_method).build(settings)
}
