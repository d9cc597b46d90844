use std::path::PathBuf;

use serde::Deserialize;

use dhc_types::{
    EqualDivision, Fundamental, GlobalSettings, HtTranspose, Pitchbend, TuningMethodKind,
};

use crate::error::{DhcError, Result};
use crate::keymap::Keymap;
use crate::piper::DEFAULT_CAPACITY;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    defaults: DefaultsConfig,
    #[serde(default)]
    piper: PiperConfig,
    #[serde(default)]
    keymap: KeymapConfig,
}

#[derive(Deserialize, Default)]
struct DefaultsConfig {
    fundamental_hz: Option<f64>,
    ft_steps: Option<u32>,
    ed_unit: Option<f64>,
    ed_division: Option<u32>,
    harmonic_ratio: Option<f64>,
    subharmonic_ratio: Option<f64>,
    middle_c_octave: Option<i32>,
    pitchbend_range_cents: Option<f64>,
    tuning_method: Option<String>,
}

#[derive(Deserialize, Default)]
struct PiperConfig {
    capacity: Option<usize>,
}

#[derive(Deserialize, Default)]
struct KeymapConfig {
    path: Option<PathBuf>,
}

pub struct Config {
    defaults: DefaultsConfig,
    piper: PiperConfig,
    keymap: KeymapConfig,
}

impl Config {
    /// Embedded defaults overridden by `<config dir>/dhc/config.toml` if present.
    /// A malformed user file is logged and ignored.
    pub fn load() -> Self {
        let mut base = embedded();

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => merge(&mut base, user),
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        base.into()
    }

    /// Embedded defaults overridden by `text`. Unlike [`Config::load`], a
    /// malformed override is an error.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let user = toml::from_str::<ConfigFile>(text).map_err(|e| DhcError::Config(e.to_string()))?;
        let mut base = embedded();
        merge(&mut base, user);
        Ok(base.into())
    }

    pub fn settings(&self) -> GlobalSettings {
        let fallback = GlobalSettings::default();
        let d = &self.defaults;
        GlobalSettings {
            fundamental: d
                .fundamental_hz
                .map(Fundamental::from_hz)
                .unwrap_or(fallback.fundamental),
            ft_steps: d.ft_steps.unwrap_or(fallback.ft_steps),
            equal_division: EqualDivision {
                unit: d.ed_unit.unwrap_or(fallback.equal_division.unit),
                division: d.ed_division.unwrap_or(fallback.equal_division.division),
            },
            ht_transpose: HtTranspose {
                harmonic_ratio: d.harmonic_ratio.unwrap_or(fallback.ht_transpose.harmonic_ratio),
                subharmonic_ratio: d
                    .subharmonic_ratio
                    .unwrap_or(fallback.ht_transpose.subharmonic_ratio),
            },
            middle_c_octave: d.middle_c_octave.unwrap_or(fallback.middle_c_octave),
            pitchbend: Pitchbend {
                range_cents: d.pitchbend_range_cents.unwrap_or(fallback.pitchbend.range_cents),
                amount_normalized: 0.0,
            },
            tuning_method: d
                .tuning_method
                .as_deref()
                .and_then(parse_tuning_method)
                .unwrap_or(fallback.tuning_method),
        }
    }

    pub fn piper_capacity(&self) -> usize {
        self.piper.capacity.unwrap_or(DEFAULT_CAPACITY).max(1)
    }

    pub fn keymap_path(&self) -> Option<&PathBuf> {
        self.keymap.path.as_ref()
    }

    /// The configured keymap file, or the built-in layout if none is set or
    /// it fails to load.
    pub fn keymap(&self) -> Keymap {
        let Some(path) = self.keymap_path() else {
            return Keymap::builtin();
        };
        match Keymap::load(path) {
            Ok(keymap) => keymap,
            Err(e) => {
                log::warn!(target: "config", "using built-in keymap, {} failed: {}", path.display(), e);
                Keymap::builtin()
            }
        }
    }
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        Config {
            defaults: file.defaults,
            piper: file.piper,
            keymap: file.keymap,
        }
    }
}

fn embedded() -> ConfigFile {
    toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
        log::error!(target: "config", "embedded config.toml is malformed: {}", e);
        ConfigFile::default()
    })
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dhc").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    let (b, u) = (&mut base.defaults, user.defaults);
    if u.fundamental_hz.is_some() {
        b.fundamental_hz = u.fundamental_hz;
    }
    if u.ft_steps.is_some() {
        b.ft_steps = u.ft_steps;
    }
    if u.ed_unit.is_some() {
        b.ed_unit = u.ed_unit;
    }
    if u.ed_division.is_some() {
        b.ed_division = u.ed_division;
    }
    if u.harmonic_ratio.is_some() {
        b.harmonic_ratio = u.harmonic_ratio;
    }
    if u.subharmonic_ratio.is_some() {
        b.subharmonic_ratio = u.subharmonic_ratio;
    }
    if u.middle_c_octave.is_some() {
        b.middle_c_octave = u.middle_c_octave;
    }
    if u.pitchbend_range_cents.is_some() {
        b.pitchbend_range_cents = u.pitchbend_range_cents;
    }
    if u.tuning_method.is_some() {
        b.tuning_method = u.tuning_method;
    }
    if user.piper.capacity.is_some() {
        base.piper.capacity = user.piper.capacity;
    }
    if user.keymap.path.is_some() {
        base.keymap.path = user.keymap.path;
    }
}

/// Accepts the variant name or its display name.
fn parse_tuning_method(s: &str) -> Option<TuningMethodKind> {
    let kind = TuningMethodKind::ALL
        .into_iter()
        .find(|k| format!("{:?}", k) == s || k.name() == s);
    if kind.is_none() {
        log::warn!(target: "config", "unknown tuning_method {:?}", s);
    }
    kind
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults() {
        let config = Config::from_toml_str("").unwrap();
        let settings = config.settings();
        assert!((settings.fundamental.hz - 130.8127826502993).abs() < 1e-9);
        assert_eq!(settings.ft_steps, 32);
        assert_eq!(settings.equal_division, EqualDivision { unit: 2.0, division: 12 });
        assert_eq!(settings.middle_c_octave, 4);
        assert_eq!(settings.tuning_method, TuningMethodKind::EqualDivision);
        assert!(settings.validate().is_ok());
        assert_eq!(config.piper_capacity(), 8);
        assert!(config.keymap_path().is_none());
        assert_eq!(config.keymap(), Keymap::builtin());
    }

    #[test]
    fn test_override_fields() {
        let config = Config::from_toml_str(
            "[defaults]\nfundamental_hz = 220.0\ned_unit = 3.0\ned_division = 13\n[piper]\ncapacity = 3\n",
        )
        .unwrap();
        let settings = config.settings();
        assert!((settings.fundamental.hz - 220.0).abs() < 1e-12);
        assert!((settings.fundamental.midicents - 57.0).abs() < 1e-9);
        assert_eq!(settings.equal_division, EqualDivision { unit: 3.0, division: 13 });
        // untouched fields keep the embedded values
        assert_eq!(settings.ft_steps, 32);
        assert_eq!(config.piper_capacity(), 3);
    }

    #[test]
    fn test_malformed_override_is_error() {
        assert!(matches!(
            Config::from_toml_str("[defaults]\nft_steps = \"many\"\n"),
            Err(DhcError::Config(_))
        ));
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let config = Config::from_toml_str("[piper]\ncapacity = 0\n").unwrap();
        assert_eq!(config.piper_capacity(), 1);
    }

    #[test]
    fn test_keymap_path_loads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("km.txt");
        std::fs::write(&path, "10 0 129\n11 129 0\n").unwrap();

        let text = format!("[keymap]\npath = {:?}\n", path.display().to_string());
        let config = Config::from_toml_str(&text).unwrap();
        assert_eq!(config.keymap().len(), 2);
    }

    #[test]
    fn test_bad_keymap_path_falls_back() {
        let config = Config::from_toml_str("[keymap]\npath = \"/nonexistent/dhc/km.txt\"\n").unwrap();
        assert_eq!(config.keymap(), Keymap::builtin());
    }

    #[test]
    fn test_parse_tuning_methods() {
        assert_eq!(parse_tuning_method("EqualDivision"), Some(TuningMethodKind::EqualDivision));
        assert_eq!(parse_tuning_method("n-EDx"), Some(TuningMethodKind::EqualDivision));
        assert_eq!(parse_tuning_method("HarmonicSeries"), Some(TuningMethodKind::HarmonicSeries));
        assert_eq!(parse_tuning_method("Tuning File"), Some(TuningMethodKind::FileImport));
        assert_eq!(parse_tuning_method("meantone"), None);
    }
}
