//! # dhc-types
//!
//! Shared type definitions for the Dynamic Harmonics Calculator.
//! Settings, tone entries, directives and notices live here, along with the
//! pure tuning math. Nothing in this crate holds engine state.

pub mod directive;
pub mod settings;
pub mod tone;
pub mod tuning;

pub use directive::{NoteResult, Notice, ToneDirective, VoiceKind};
pub use settings::{
    EqualDivision, Fundamental, GlobalSettings, HtTranspose, Pitchbend, TuningMethodKind,
};
pub use tone::ToneEntry;

/// Lowest harmonic table index (deepest subharmonic).
pub const HT_MIN: i32 = -128;
/// Highest harmonic table index.
pub const HT_MAX: i32 = 128;
