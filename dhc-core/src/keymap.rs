//! Controller keymap: which FT and/or HT a controller key plays.
//!
//! Text format, one record per line:
//!
//! ```text
//! <controller key> <ft index | 129> <ht index | 129>
//! ```
//!
//! `129` marks an axis as not assigned; HT index 0 is the Piper trigger.
//! Blank lines and lines starting with `#` are ignored. Any other line that
//! isn't exactly three integers aborts the whole load.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use dhc_types::{HT_MAX, HT_MIN};

use crate::error::{DhcError, Result};

/// Sentinel used by the text format for "not assigned".
pub const NOT_ASSIGNED: i32 = 129;

/// HT side of a keymap entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HtSlot {
    /// A pitched HT index, never 0.
    Tone(i32),
    /// Index 0: advances the Piper instead of sounding.
    PiperTrigger,
}

impl HtSlot {
    pub fn from_index(index: i32) -> Self {
        if index == 0 {
            HtSlot::PiperTrigger
        } else {
            HtSlot::Tone(index)
        }
    }

    pub fn index(&self) -> i32 {
        match self {
            HtSlot::Tone(i) => *i,
            HtSlot::PiperTrigger => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeymapEntry {
    pub ft: Option<i32>,
    pub ht: Option<HtSlot>,
}

impl KeymapEntry {
    pub fn ft(index: i32) -> Self {
        Self { ft: Some(index), ht: None }
    }

    pub fn ht(index: i32) -> Self {
        Self { ft: None, ht: Some(HtSlot::from_index(index)) }
    }

    pub fn both(ft: i32, ht: i32) -> Self {
        Self { ft: Some(ft), ht: Some(HtSlot::from_index(ht)) }
    }
}

/// Serialized form of one keymap record. `ht: Some(0)` is the Piper trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeymapRow {
    pub key: i32,
    pub ft: Option<i32>,
    pub ht: Option<i32>,
}

/// Controller key number → [`KeymapEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<KeymapRow>", into = "Vec<KeymapRow>")]
pub struct Keymap {
    entries: HashMap<i32, KeymapEntry>,
}

impl Keymap {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Built-in first-run layout: keys 48..=59 select FT -11..=0, keys
    /// 60..=76 play HT 0..=16 (key 60 is the Piper trigger).
    pub fn builtin() -> Self {
        let mut keymap = Self::new();
        for key in 48..=59 {
            keymap.insert(key, KeymapEntry::ft(key - 59));
        }
        for key in 60..=76 {
            keymap.insert(key, KeymapEntry::ht(key - 60));
        }
        keymap
    }

    /// Parse the text format. Nothing is returned unless every line parses.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = HashMap::new();

        for (n, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, entry) = parse_line(n + 1, line)?;
            if entries.insert(key, entry).is_some() {
                log::debug!(target: "keymap", "line {}: key {} redefined", n + 1, key);
            }
        }

        log::debug!(target: "keymap", "parsed {} keymap entries", entries.len());
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    /// Render back to the text format, ordered by controller key.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (key, entry) in self.sorted() {
            let ft = entry.ft.unwrap_or(NOT_ASSIGNED);
            let ht = entry.ht.map(|slot| slot.index()).unwrap_or(NOT_ASSIGNED);
            out.push_str(&format!("{} {} {}\n", key, ft, ht));
        }
        out
    }

    pub fn lookup(&self, ctrl_key_number: i32) -> Option<&KeymapEntry> {
        self.entries.get(&ctrl_key_number)
    }

    pub fn insert(&mut self, ctrl_key_number: i32, entry: KeymapEntry) {
        self.entries.insert(ctrl_key_number, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by controller key.
    pub fn sorted(&self) -> BTreeMap<i32, KeymapEntry> {
        self.entries.iter().map(|(k, v)| (*k, *v)).collect()
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::builtin()
    }
}

impl From<Vec<KeymapRow>> for Keymap {
    fn from(rows: Vec<KeymapRow>) -> Self {
        let entries = rows
            .into_iter()
            .map(|row| {
                let entry = KeymapEntry {
                    ft: row.ft,
                    ht: row.ht.map(HtSlot::from_index),
                };
                (row.key, entry)
            })
            .collect();
        Self { entries }
    }
}

impl From<Keymap> for Vec<KeymapRow> {
    fn from(keymap: Keymap) -> Self {
        keymap
            .sorted()
            .into_iter()
            .map(|(key, entry)| KeymapRow {
                key,
                ft: entry.ft,
                ht: entry.ht.map(|slot| slot.index()),
            })
            .collect()
    }
}

fn parse_line(line_no: usize, line: &str) -> Result<(i32, KeymapEntry)> {
    let malformed = |reason: String| DhcError::MalformedKeymapLine {
        line: line_no,
        content: line.to_string(),
        reason,
    };

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(malformed(format!("expected 3 fields, found {}", fields.len())));
    }

    let mut values = [0i32; 3];
    for (slot, field) in values.iter_mut().zip(&fields) {
        *slot = field
            .parse()
            .map_err(|_| malformed(format!("`{}` is not an integer", field)))?;
    }
    let [key, ft, ht] = values;

    let ft = (ft != NOT_ASSIGNED).then_some(ft);
    let ht = if ht == NOT_ASSIGNED {
        None
    } else if (HT_MIN..=HT_MAX).contains(&ht) {
        Some(HtSlot::from_index(ht))
    } else {
        return Err(malformed(format!("HT index {} outside {}..={}", ht, HT_MIN, HT_MAX)));
    };

    Ok((key, KeymapEntry { ft, ht }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_columns() {
        let km = Keymap::parse("60 0 129\n61 129 3\n62 -5 -2\n").unwrap();
        assert_eq!(km.len(), 3);
        assert_eq!(km.lookup(60), Some(&KeymapEntry::ft(0)));
        assert_eq!(km.lookup(61), Some(&KeymapEntry::ht(3)));
        assert_eq!(km.lookup(62), Some(&KeymapEntry::both(-5, -2)));
        assert_eq!(km.lookup(63), None);
    }

    #[test]
    fn ht_zero_is_piper_trigger() {
        let km = Keymap::parse("72 129 0").unwrap();
        assert_eq!(km.lookup(72).unwrap().ht, Some(HtSlot::PiperTrigger));
    }

    #[test]
    fn tolerates_crlf_and_whitespace_runs() {
        let km = Keymap::parse("60\t 1   2\r\n61 3 4\r\n\r\n").unwrap();
        assert_eq!(km.lookup(60), Some(&KeymapEntry::both(1, 2)));
        assert_eq!(km.lookup(61), Some(&KeymapEntry::both(3, 4)));
    }

    #[test]
    fn skips_comments() {
        let km = Keymap::parse("# lower octave\n48 -11 129\n").unwrap();
        assert_eq!(km.len(), 1);
    }

    #[test]
    fn non_integer_field_is_malformed() {
        let err = Keymap::parse("60 abc 1\n").unwrap_err();
        match err {
            DhcError::MalformedKeymapLine { line, content, .. } => {
                assert_eq!(line, 1);
                assert_eq!(content, "60 abc 1");
            }
            other => panic!("expected MalformedKeymapLine, got {:?}", other),
        }
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        assert!(Keymap::parse("60 1\n").is_err());
        assert!(Keymap::parse("60 1 2 3\n").is_err());
    }

    #[test]
    fn error_reports_the_offending_line() {
        let err = Keymap::parse("60 0 129\n61 0 129\n62 x 129\n").unwrap_err();
        assert!(matches!(err, DhcError::MalformedKeymapLine { line: 3, .. }));
    }

    #[test]
    fn ht_outside_series_is_malformed() {
        assert!(Keymap::parse("60 129 200\n").is_err());
        assert!(Keymap::parse("60 129 -129\n").is_err());
    }

    #[test]
    fn later_line_wins() {
        let km = Keymap::parse("60 1 129\n60 2 129\n").unwrap();
        assert_eq!(km.lookup(60), Some(&KeymapEntry::ft(2)));
    }

    #[test]
    fn builtin_layout() {
        let km = Keymap::builtin();
        assert_eq!(km.len(), 29);
        assert_eq!(km.lookup(48), Some(&KeymapEntry::ft(-11)));
        assert_eq!(km.lookup(59), Some(&KeymapEntry::ft(0)));
        assert_eq!(km.lookup(60).unwrap().ht, Some(HtSlot::PiperTrigger));
        assert_eq!(km.lookup(76), Some(&KeymapEntry::ht(16)));
        assert_eq!(km.lookup(47), None);
        assert_eq!(km.lookup(77), None);
    }

    #[test]
    fn text_export_reparses() {
        let km = Keymap::builtin();
        let text = km.to_text();
        assert!(text.starts_with("48 -11 129\n"));
        assert_eq!(Keymap::parse(&text).unwrap(), km);
    }

    #[test]
    fn json_rows_are_sorted() {
        let km = Keymap::parse("61 129 2\n60 0 129\n").unwrap();
        let json = serde_json::to_string(&km).unwrap();
        assert_eq!(
            json,
            r#"[{"key":60,"ft":0,"ht":null},{"key":61,"ft":null,"ht":2}]"#
        );
        let back: Keymap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, km);
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keymap.txt");
        Keymap::builtin().save(&path).unwrap();
        assert_eq!(Keymap::load(&path).unwrap(), Keymap::builtin());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Keymap::load(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, DhcError::Io(_)));
    }
}
