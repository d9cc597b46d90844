//! Line-oriented event script: one MIDI message or control command per line.
//!
//! ```text
//! # timestamp  status data...   (hex bytes)
//! 0.000 90 3b 64
//! 0.250 80 3b 00
//! 0.300 e0 00 60
//! :fundamental 220
//! :all-off
//! ```

use dhc_core::input::{bend_amount, parse_midi_message, MidiMessage};
use dhc_core::{DhcEngine, InputEvent, NoteResult, Preset, ToneDirective};
use dhc_types::tuning::{midi_retune, note_name};
use dhc_types::{EqualDivision, GlobalSettings};
use serde_json::{json, Value};

/// Controller 123: All Notes Off.
const CC_ALL_NOTES_OFF: u8 = 123;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptLine {
    Midi { timestamp: f64, bytes: Vec<u8> },
    Command(Command),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Fundamental(f64),
    EqualDivision { unit: f64, division: u32 },
    PiperCapacity(usize),
    Keymap(String),
    SavePreset(String),
    AllOff,
}

/// `Ok(None)` for blank lines and comments.
pub fn parse_line(line: &str) -> Result<Option<ScriptLine>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    if let Some(command) = line.strip_prefix(':') {
        return parse_command(command).map(|c| Some(ScriptLine::Command(c)));
    }

    let mut fields = line.split_whitespace();
    let timestamp = fields
        .next()
        .and_then(|t| t.parse::<f64>().ok())
        .ok_or_else(|| format!("bad timestamp in {:?}", line))?;
    let bytes = fields
        .map(|b| u8::from_str_radix(b, 16).map_err(|_| format!("bad hex byte {:?}", b)))
        .collect::<Result<Vec<u8>, String>>()?;
    if bytes.is_empty() {
        return Err(format!("no MIDI bytes in {:?}", line));
    }
    Ok(Some(ScriptLine::Midi { timestamp, bytes }))
}

fn parse_command(text: &str) -> Result<Command, String> {
    let mut parts = text.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    let number = |i: usize| -> Result<f64, String> {
        args.get(i)
            .and_then(|a| a.parse::<f64>().ok())
            .ok_or_else(|| format!(":{} needs a number", name))
    };

    match name {
        "fundamental" => Ok(Command::Fundamental(number(0)?)),
        "ed" => Ok(Command::EqualDivision {
            unit: number(0)?,
            division: number(1)? as u32,
        }),
        "capacity" => Ok(Command::PiperCapacity(number(0)? as usize)),
        "keymap" => args
            .first()
            .map(|p| Command::Keymap(p.to_string()))
            .ok_or_else(|| ":keymap needs a path".to_string()),
        "save" => args
            .first()
            .map(|p| Command::SavePreset(p.to_string()))
            .ok_or_else(|| ":save needs a path".to_string()),
        "all-off" => Ok(Command::AllOff),
        other => Err(format!("unknown command :{}", other)),
    }
}

/// Feed one parsed line to the engine.
pub fn apply(engine: &mut DhcEngine, line: ScriptLine) -> Result<NoteResult, String> {
    match line {
        ScriptLine::Midi { timestamp, bytes } => Ok(apply_midi(engine, timestamp, &bytes)),
        ScriptLine::Command(command) => apply_command(engine, command),
    }
}

fn apply_midi(engine: &mut DhcEngine, timestamp: f64, bytes: &[u8]) -> NoteResult {
    match parse_midi_message(bytes) {
        Some(MidiMessage::PitchBend { value, .. }) => engine.pitch_bend(bend_amount(value)),
        Some(MidiMessage::ControlChange { controller: CC_ALL_NOTES_OFF, .. }) => {
            engine.all_notes_off()
        }
        Some(MidiMessage::ControlChange { controller, .. }) => {
            log::debug!(target: "play", "ignoring CC {}", controller);
            NoteResult::none()
        }
        Some(_) => match InputEvent::from_midi(bytes, timestamp) {
            Some(event) => engine.handle(event),
            None => NoteResult::none(),
        },
        None => {
            log::warn!(target: "play", "undecodable MIDI bytes {:02x?}", bytes);
            NoteResult::none()
        }
    }
}

fn apply_command(engine: &mut DhcEngine, command: Command) -> Result<NoteResult, String> {
    match command {
        Command::Fundamental(hz) => {
            return engine.set_fundamental_hz(hz).map_err(|e| e.to_string());
        }
        Command::EqualDivision { unit, division } => {
            return engine
                .set_equal_division(EqualDivision { unit, division })
                .map_err(|e| e.to_string());
        }
        Command::PiperCapacity(capacity) => engine.set_piper_capacity(capacity),
        Command::Keymap(path) => {
            let text = std::fs::read_to_string(&path).map_err(|e| format!("{}: {}", path, e))?;
            engine.load_keymap(&text).map_err(|e| e.to_string())?;
        }
        Command::SavePreset(path) => {
            let name = std::path::Path::new(&path)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "preset".to_string());
            Preset::capture(name, engine)
                .save(std::path::Path::new(&path))
                .map_err(|e| e.to_string())?;
        }
        Command::AllOff => return Ok(engine.all_notes_off()),
    }
    Ok(NoteResult::none())
}

/// One output record. Voice-ons also carry the bent pitch, its note name
/// and a MIDI note + 14-bit bend for a retuning MIDI-out device whose bend
/// range matches the engine's.
pub fn describe(directive: &ToneDirective, settings: &GlobalSettings) -> Value {
    match directive {
        ToneDirective::VoiceOn { tone, kind, .. } => {
            let bent = tone.bent(settings.pitchbend.cents());
            let midi = midi_retune(bent.midicents, settings.pitchbend.range_cents / 100.0);
            json!({
                "voice": kind.name(),
                "directive": directive,
                "bent_hz": bent.hz,
                "note": note_name(bent.midicents, settings.middle_c_octave),
                "midi": { "note": midi.note, "bend": midi.bend },
            })
        }
        ToneDirective::VoiceOff { kind, .. } => json!({
            "voice": kind.name(),
            "directive": directive,
        }),
        ToneDirective::Bend { .. } => json!({ "directive": directive }),
    }
}
