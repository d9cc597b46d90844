//! # dhc-core
//!
//! The Dynamic Harmonics Calculator: turns key events into tones of the
//! harmonic and subharmonic series above a movable fundamental.
//!
//! ## Quick Start
//!
//! ```rust
//! use dhc_core::DhcEngine;
//!
//! let mut engine = DhcEngine::with_defaults().unwrap();
//!
//! // key 59 selects FT 0 in the built-in keymap, key 63 plays harmonic 3 above it
//! let ft = engine.note_on(59, 100, 0.0);
//! let ht = engine.note_on(63, 100, 0.1);
//! assert_eq!(ft.directives.len(), 1);
//! assert_eq!(ht.directives.len(), 1);
//! ```
//!
//! ## Module Overview
//!
//! - [`tables`]: FT ladder and HT series, the `FtTuningMethod` capability
//! - [`keymap`]: controller key → FT/HT mapping and its text format
//! - [`engine`]: `DhcEngine`: note on/off arbitration and settings changes
//! - [`piper`]: bounded replay of recent HT notes
//! - [`input`]: raw MIDI decoding at the input boundary
//! - [`config`]: TOML configuration (embedded defaults + user override)
//! - [`preset`]: JSON presets of settings, keymap and Piper capacity

pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod keymap;
pub mod piper;
pub mod preset;
pub mod tables;

pub use engine::{DhcEngine, EngineState, EventSource, FtKeyQueueEntry};
pub use error::{DhcError, Result};
pub use input::InputEvent;
pub use keymap::{HtSlot, Keymap, KeymapEntry};
pub use piper::{PendingEvent, Piper, TriggerState};
pub use preset::Preset;

pub use dhc_types::{GlobalSettings, NoteResult, Notice, ToneDirective, ToneEntry, VoiceKind};
