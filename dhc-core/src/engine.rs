//! The Dynamic Harmonics Calculator engine.
//!
//! One `DhcEngine` per instrument. It owns the tone tables, the keymap, the
//! monophonic FT key queue and the Piper, and turns key events into
//! [`ToneDirective`]s. Every method runs to completion; callers with more
//! than one input source serialize events before they get here.
//!
//! FT voices follow last-note priority: releasing the newest held FT key
//! retriggers the previous one still held. HT voices are polyphonic, one per
//! controller key, pitched relative to the active FT.

use std::collections::BTreeSet;

use dhc_types::{
    EqualDivision, Fundamental, GlobalSettings, HtTranspose, NoteResult, Notice, ToneEntry,
    TuningMethodKind, VoiceKind,
};

use crate::error::{DhcError, Result};
use crate::input::InputEvent;
use crate::keymap::{HtSlot, Keymap};
use crate::piper::{PendingEvent, Piper, TriggerState, NOTE_ON};
use crate::tables::{build_ft_table, build_ht_table, FtTable, HtTable};

/// One held FT key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FtKeyQueueEntry {
    pub ft_index: i32,
    pub ctrl_key_number: i32,
    pub velocity: u8,
    pub hz: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineState {
    pub current_ft_index: i32,
    pub last_ht_index: Option<i32>,
    /// Held FT keys, oldest first. The tail is the sounding FT.
    pub ft_key_queue: Vec<FtKeyQueueEntry>,
}

/// Where a note event came from. Piper replays are never recorded again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Performer,
    Piper,
}

pub struct DhcEngine {
    settings: GlobalSettings,
    ft_table: FtTable,
    ht_table: HtTable,
    keymap: Keymap,
    state: EngineState,
    piper: Piper,
    /// Controller keys with a sounding HT voice
    sounding_ht: BTreeSet<i32>,
    /// Held FT keys a settings change pushed out of the table
    dropped_ft_keys: BTreeSet<i32>,
}

impl DhcEngine {
    pub fn new(settings: GlobalSettings, keymap: Keymap, piper_capacity: usize) -> Result<Self> {
        let settings = normalize(settings);
        let ft_table = build_ft_table(&settings)?;
        let active_hz = ft_table.get(0).map(|t| t.hz).unwrap_or(settings.fundamental.hz);
        let ht_table = build_ht_table(active_hz, settings.ht_transpose);

        log::info!(
            target: "engine",
            "engine ready: fundamental {:.3} Hz, {} FT tones, {} keys mapped",
            settings.fundamental.hz,
            ft_table.len(),
            keymap.len()
        );

        Ok(Self {
            settings,
            ft_table,
            ht_table,
            keymap,
            state: EngineState::default(),
            piper: Piper::new(piper_capacity),
            sounding_ht: BTreeSet::new(),
            dropped_ft_keys: BTreeSet::new(),
        })
    }

    /// Default settings, built-in keymap, default Piper capacity.
    pub fn with_defaults() -> Result<Self> {
        Self::new(GlobalSettings::default(), Keymap::builtin(), crate::piper::DEFAULT_CAPACITY)
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    pub fn ft_table(&self) -> &FtTable {
        &self.ft_table
    }

    pub fn ht_table(&self) -> &HtTable {
        &self.ht_table
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn piper(&self) -> &Piper {
        &self.piper
    }

    pub fn set_piper_capacity(&mut self, capacity: usize) {
        self.piper.set_capacity(capacity);
    }

    pub fn current_ft_tone(&self) -> Option<&ToneEntry> {
        self.ft_table.get(self.state.current_ft_index)
    }

    pub fn last_ht_tone(&self) -> Option<&ToneEntry> {
        self.ht_table.get(self.state.last_ht_index?)
    }

    /// Dispatch an input event to `note_on` or `note_off`.
    pub fn handle(&mut self, event: InputEvent) -> NoteResult {
        let event = event.normalized();
        if event.is_note_on {
            self.note_on(event.ctrl_key_number, event.velocity, event.timestamp)
        } else {
            self.note_off(event.ctrl_key_number, event.velocity, event.timestamp)
        }
    }

    pub fn note_on(&mut self, ctrl_key_number: i32, velocity: u8, timestamp: f64) -> NoteResult {
        self.note_on_from(EventSource::Performer, ctrl_key_number, velocity, timestamp)
    }

    pub fn note_off(&mut self, ctrl_key_number: i32, velocity: u8, timestamp: f64) -> NoteResult {
        self.note_off_from(EventSource::Performer, ctrl_key_number, velocity, timestamp)
    }

    pub fn note_on_from(
        &mut self,
        source: EventSource,
        ctrl_key_number: i32,
        velocity: u8,
        timestamp: f64,
    ) -> NoteResult {
        log::debug!(target: "engine", "note on key {} vel {} at {:.3} ({:?})", ctrl_key_number, velocity, timestamp, source);

        let Some(entry) = self.keymap.lookup(ctrl_key_number).copied() else {
            return unmapped(ctrl_key_number);
        };

        let mut result = NoteResult::none();
        if let Some(ft) = entry.ft {
            self.ft_on(ft, ctrl_key_number, velocity, &mut result);
        }
        match entry.ht {
            Some(HtSlot::Tone(ht)) => self.ht_on(ht, ctrl_key_number, velocity, source, &mut result),
            Some(HtSlot::PiperTrigger) => {
                self.trigger_piper(TriggerState::On, source, timestamp, &mut result)
            }
            None => {}
        }
        result
    }

    pub fn note_off_from(
        &mut self,
        source: EventSource,
        ctrl_key_number: i32,
        velocity: u8,
        timestamp: f64,
    ) -> NoteResult {
        log::debug!(target: "engine", "note off key {} vel {} at {:.3} ({:?})", ctrl_key_number, velocity, timestamp, source);

        let Some(entry) = self.keymap.lookup(ctrl_key_number).copied() else {
            return unmapped(ctrl_key_number);
        };

        let mut result = NoteResult::none();
        if let Some(ft) = entry.ft {
            self.ft_off(ft, ctrl_key_number, &mut result);
        }
        match entry.ht {
            Some(HtSlot::Tone(_)) => {
                self.sounding_ht.remove(&ctrl_key_number);
                result.push_voice_off(ctrl_key_number, VoiceKind::Ht);
            }
            Some(HtSlot::PiperTrigger) => {
                self.trigger_piper(TriggerState::Off, source, timestamp, &mut result)
            }
            None => {}
        }
        result
    }

    fn ft_on(&mut self, ft: i32, ctrl_key_number: i32, velocity: u8, result: &mut NoteResult) {
        let Some(tone) = self.ft_table.get(ft).copied() else {
            let notice = Notice::FtOutOfRange { ctrl_key_number, ft_index: ft };
            log::warn!(target: "engine", "{}", notice);
            result.push_notice(notice);
            return;
        };

        self.rebuild_ht_table(tone.hz);
        self.state.current_ft_index = ft;
        self.dropped_ft_keys.remove(&ctrl_key_number);

        // a re-press of a held FT replaces its stale queue entry
        let queue = &mut self.state.ft_key_queue;
        for stale in queue.iter().filter(|e| e.ft_index == ft) {
            result.push_voice_off(stale.ctrl_key_number, VoiceKind::Ft);
        }
        queue.retain(|e| e.ft_index != ft);

        result.push_voice_on(tone, ctrl_key_number, velocity, VoiceKind::Ft);
        queue.push(FtKeyQueueEntry {
            ft_index: ft,
            ctrl_key_number,
            velocity,
            hz: tone.hz,
        });
    }

    fn ft_off(&mut self, ft: i32, ctrl_key_number: i32, result: &mut NoteResult) {
        let was_dropped = self.dropped_ft_keys.remove(&ctrl_key_number);
        if !was_dropped && !self.ft_table.contains(ft) {
            // note on already reported it; nothing was started
            return;
        }

        let queue = &mut self.state.ft_key_queue;
        match queue.iter().position(|e| e.ft_index == ft) {
            Some(pos) => {
                queue.remove(pos);
            }
            None if was_dropped => {}
            None => {
                let notice = Notice::StateInconsistency {
                    message: format!("FT {} released by key {} was not held", ft, ctrl_key_number),
                };
                log::warn!(target: "engine", "{}", notice);
                result.push_notice(notice);
            }
        }

        match queue.last().copied() {
            None => result.push_voice_off(ctrl_key_number, VoiceKind::Ft),
            Some(previous) if previous.ft_index != self.state.current_ft_index => {
                result.push_voice_off(ctrl_key_number, VoiceKind::Ft);
                self.rebuild_ht_table(previous.hz);
                self.state.current_ft_index = previous.ft_index;
                push_ft_retrigger(result, &previous);
            }
            Some(_) => {}
        }
    }

    fn ht_on(
        &mut self,
        ht: i32,
        ctrl_key_number: i32,
        velocity: u8,
        source: EventSource,
        result: &mut NoteResult,
    ) {
        let Some(tone) = self.ht_table.get(ht).copied() else {
            let notice = Notice::StateInconsistency {
                message: format!("HT {} on key {} has no tone", ht, ctrl_key_number),
            };
            log::warn!(target: "engine", "{}", notice);
            result.push_notice(notice);
            return;
        };

        self.state.last_ht_index = Some(ht);
        if !self.sounding_ht.insert(ctrl_key_number) {
            result.push_voice_off(ctrl_key_number, VoiceKind::Ht);
        }
        result.push_voice_on(tone, ctrl_key_number, velocity, VoiceKind::Ht);

        if source == EventSource::Performer {
            self.piper.record(NOTE_ON, ctrl_key_number, velocity);
        }
    }

    fn trigger_piper(
        &mut self,
        state: TriggerState,
        source: EventSource,
        timestamp: f64,
        result: &mut NoteResult,
    ) {
        if source == EventSource::Piper {
            // only possible if the keymap changed under a recorded key
            let notice = Notice::StateInconsistency {
                message: "Piper replayed a trigger key".to_string(),
            };
            log::warn!(target: "engine", "{}", notice);
            result.push_notice(notice);
            return;
        }

        let mut replays: Vec<PendingEvent> = Vec::new();
        self.piper.advance(state, |event| replays.push(event));

        for event in replays {
            let replayed = if event.is_note_on() {
                self.note_on_from(EventSource::Piper, event.ctrl_key_number, event.velocity, timestamp)
            } else {
                self.note_off_from(EventSource::Piper, event.ctrl_key_number, event.velocity, timestamp)
            };
            result.merge(replayed);
        }
    }

    fn rebuild_ht_table(&mut self, fundamental_hz: f64) {
        if self.ht_table.fundamental_hz() != fundamental_hz
            || self.ht_table.transpose() != self.settings.ht_transpose
        {
            self.ht_table = build_ht_table(fundamental_hz, self.settings.ht_transpose);
        }
    }

    /// Replace the settings and rebuild both tables.
    ///
    /// Invalid settings are rejected and everything stays as it was. Held FT
    /// keys keep their queue position with refreshed frequencies; keys whose
    /// FT index no longer exists are dropped from the queue. The result
    /// retunes the sounding FT: a `VoiceOn` at its new frequency, or, if it
    /// was dropped, a `VoiceOff` followed by a `VoiceOn` for the held key that
    /// takes over.
    pub fn apply_settings(&mut self, settings: GlobalSettings) -> Result<NoteResult> {
        let settings = normalize(settings);
        let ft_table = build_ft_table(&settings)?;

        let sounding = self.state.ft_key_queue.last().copied();
        let dropped = &mut self.dropped_ft_keys;
        self.state.ft_key_queue.retain_mut(|entry| match ft_table.get(entry.ft_index) {
            Some(tone) => {
                entry.hz = tone.hz;
                true
            }
            None => {
                log::warn!(
                    target: "engine",
                    "dropping held key {}: FT {} outside the new table",
                    entry.ctrl_key_number,
                    entry.ft_index
                );
                dropped.insert(entry.ctrl_key_number);
                false
            }
        });

        let mut result = NoteResult::none();
        let tail = self.state.ft_key_queue.last().copied();
        match (sounding, tail) {
            (Some(old), Some(new)) if old.ctrl_key_number == new.ctrl_key_number => {
                if old.hz != new.hz {
                    push_ft_retrigger(&mut result, &new);
                }
            }
            (Some(old), tail) => {
                result.push_voice_off(old.ctrl_key_number, VoiceKind::Ft);
                if let Some(new) = tail {
                    push_ft_retrigger(&mut result, &new);
                }
            }
            (None, _) => {}
        }

        if let Some(new) = tail {
            self.state.current_ft_index = new.ft_index;
        } else if !ft_table.contains(self.state.current_ft_index) {
            self.state.current_ft_index = 0;
        }

        let active_hz = ft_table
            .get(self.state.current_ft_index)
            .map(|t| t.hz)
            .unwrap_or(settings.fundamental.hz);
        self.ht_table = build_ht_table(active_hz, settings.ht_transpose);
        self.ft_table = ft_table;

        log::info!(
            target: "engine",
            "settings applied: {} tuning, fundamental {:.3} Hz, {}-ED{}, {} FT steps",
            settings.tuning_method.name(),
            settings.fundamental.hz,
            settings.equal_division.division,
            settings.equal_division.unit,
            settings.ft_steps
        );
        self.settings = settings;
        Ok(result)
    }

    /// Move the Fundamental Mother.
    pub fn set_fundamental_hz(&mut self, hz: f64) -> Result<NoteResult> {
        let settings = GlobalSettings {
            fundamental: Fundamental::from_hz(hz),
            ..self.settings.clone()
        };
        self.apply_settings(settings)
    }

    pub fn set_equal_division(&mut self, equal_division: EqualDivision) -> Result<NoteResult> {
        let settings = GlobalSettings {
            equal_division,
            ..self.settings.clone()
        };
        self.apply_settings(settings)
    }

    pub fn set_ht_transpose(&mut self, ht_transpose: HtTranspose) -> Result<NoteResult> {
        let settings = GlobalSettings {
            ht_transpose,
            ..self.settings.clone()
        };
        self.apply_settings(settings)
    }

    pub fn set_tuning_method(&mut self, tuning_method: TuningMethodKind) -> Result<NoteResult> {
        let settings = GlobalSettings {
            tuning_method,
            ..self.settings.clone()
        };
        self.apply_settings(settings)
    }

    /// Set the global bend, clamped to `[-1.0, 1.0]`.
    pub fn pitch_bend(&mut self, amount_normalized: f64) -> NoteResult {
        let amount = if amount_normalized.is_nan() {
            0.0
        } else {
            amount_normalized.clamp(-1.0, 1.0)
        };
        self.settings.pitchbend.amount_normalized = amount;

        let mut result = NoteResult::none();
        result.directives.push(dhc_types::ToneDirective::Bend {
            cents: self.settings.pitchbend.cents(),
        });
        result
    }

    /// Swap in a new keymap wholesale.
    pub fn set_keymap(&mut self, keymap: Keymap) {
        log::info!(target: "engine", "keymap replaced ({} keys)", keymap.len());
        self.keymap = keymap;
    }

    /// Parse and install a keymap. On error the current keymap is kept.
    pub fn load_keymap(&mut self, text: &str) -> Result<()> {
        let keymap = Keymap::parse(text)?;
        self.set_keymap(keymap);
        Ok(())
    }

    /// Stop every sounding voice and forget held keys.
    pub fn all_notes_off(&mut self) -> NoteResult {
        let mut result = NoteResult::none();
        if let Some(sounding) = self.state.ft_key_queue.last() {
            result.push_voice_off(sounding.ctrl_key_number, VoiceKind::Ft);
        }
        self.state.ft_key_queue.clear();
        self.dropped_ft_keys.clear();

        for key in std::mem::take(&mut self.sounding_ht) {
            result.push_voice_off(key, VoiceKind::Ht);
        }
        result
    }
}

impl TryFrom<&crate::config::Config> for DhcEngine {
    type Error = DhcError;

    fn try_from(config: &crate::config::Config) -> Result<Self> {
        Self::new(config.settings(), config.keymap(), config.piper_capacity())
    }
}

/// The frequency is authoritative; midicents follow it.
fn normalize(mut settings: GlobalSettings) -> GlobalSettings {
    if settings.fundamental.hz.is_finite() && settings.fundamental.hz > 0.0 {
        settings.fundamental = Fundamental::from_hz(settings.fundamental.hz);
    }
    settings
}

fn push_ft_retrigger(result: &mut NoteResult, entry: &FtKeyQueueEntry) {
    result.push_voice_on(
        ToneEntry::from_hz(entry.hz),
        entry.ctrl_key_number,
        entry.velocity,
        VoiceKind::Ft,
    );
}

fn unmapped(ctrl_key_number: i32) -> NoteResult {
    let notice = Notice::KeyUnmapped { ctrl_key_number };
    log::info!(target: "engine", "{}", notice);
    NoteResult::with_notice(notice)
}
