//! Presets: settings, keymap and Piper capacity saved together as JSON.
//!
//! Where presets are stored is up to the caller; this only owns the format.

use std::path::Path;

use serde::{Deserialize, Serialize};

use dhc_types::{GlobalSettings, NoteResult};

use crate::engine::DhcEngine;
use crate::error::Result;
use crate::keymap::Keymap;
use crate::piper::DEFAULT_CAPACITY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub settings: GlobalSettings,
    pub keymap: Keymap,
    #[serde(default = "default_capacity")]
    pub piper_capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Preset {
    /// Snapshot an engine's current configuration.
    pub fn capture(name: impl Into<String>, engine: &DhcEngine) -> Self {
        Self {
            name: name.into(),
            settings: engine.settings().clone(),
            keymap: engine.keymap().clone(),
            piper_capacity: engine.piper().capacity(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Install this preset. Settings are validated first; if they are
    /// rejected the engine is left untouched. Returns the retune of any
    /// sounding FT.
    pub fn apply(&self, engine: &mut DhcEngine) -> Result<NoteResult> {
        let retune = engine.apply_settings(self.settings.clone())?;
        engine.set_keymap(self.keymap.clone());
        engine.set_piper_capacity(self.piper_capacity);
        log::info!(target: "preset", "applied preset {:?}", self.name);
        Ok(retune)
    }
}
