//! Chord tables: chord symbol → three pitches.
//!
//! Every chord the melody generator arpeggiates is a fixed triad. Tables are
//! built at configuration time, either from explicit pitch lists or by voicing
//! a chord symbol with [`triad_for_symbol`].

use crate::error::KaraokeError;
use crate::pitch::{Accidental, NoteName, Pitch};
use std::collections::HashMap;

/// Three pitches in arpeggio index order (0 = root voice)
pub type Triad = [Pitch; 3];

/// Named chords available to a progression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChordTable {
    chords: HashMap<String, Triad>,
    derive_missing: bool,
}

impl ChordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, [`ChordTable::lookup`] voices symbols that have no explicit
    /// entry with [`triad_for_symbol`] instead of failing.
    pub fn with_derived_voicings(mut self, derive: bool) -> Self {
        self.derive_missing = derive;
        self
    }

    pub fn insert(&mut self, symbol: impl Into<String>, triad: Triad) {
        self.chords.insert(symbol.into(), triad);
    }

    /// Insert a chord from three pitch strings such as `["C5", "E5", "G5"]`.
    pub fn insert_named(&mut self, symbol: &str, pitches: &[String]) -> Result<(), KaraokeError> {
        if pitches.len() != 3 {
            return Err(KaraokeError::ConfigError(format!(
                "chord '{}' needs exactly 3 pitches, got {}",
                symbol,
                pitches.len()
            )));
        }
        let triad = [
            pitches[0].parse()?,
            pitches[1].parse()?,
            pitches[2].parse()?,
        ];
        self.insert(symbol, triad);
        Ok(())
    }

    pub fn get(&self, symbol: &str) -> Option<&Triad> {
        self.chords.get(symbol)
    }

    /// Resolve a symbol, voicing it on the fly if derived voicings are enabled.
    ///
    /// Returns `None` when the symbol is neither in the table nor derivable;
    /// callers turn that into [`KaraokeError::UnknownChord`] with a position.
    pub fn lookup(&self, symbol: &str) -> Option<Triad> {
        if let Some(triad) = self.chords.get(symbol) {
            return Some(*triad);
        }
        if self.derive_missing {
            return triad_for_symbol(symbol, DERIVED_OCTAVE);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    /// The C - Am - Em - G voicings used by the bundled songs.
    pub fn pop_progression() -> Self {
        let mut table = ChordTable::new();
        for (name, pitches) in [
            ("C", [(NoteName::C, 5), (NoteName::E, 5), (NoteName::G, 5)]),
            ("Am", [(NoteName::A, 4), (NoteName::C, 5), (NoteName::E, 5)]),
            ("Em", [(NoteName::E, 4), (NoteName::G, 4), (NoteName::B, 4)]),
            ("G", [(NoteName::G, 4), (NoteName::B, 4), (NoteName::D, 5)]),
        ] {
            let triad = pitches.map(|(note, octave)| Pitch {
                name: note,
                accidental: Accidental::Natural,
                octave,
            });
            table.insert(name, triad);
        }
        table
    }
}

/// Octave for the root of derived voicings
pub const DERIVED_OCTAVE: u8 = 4;

/// Voice a chord symbol as a root-position triad.
///
/// # Supported Chord Types
/// - **Major**: `C`, `maj`, `M` → root, major 3rd, perfect 5th
/// - **Minor**: `m`, `min`, `-` → root, minor 3rd, perfect 5th
/// - **Diminished**: `dim`, `°` → root, minor 3rd, diminished 5th
/// - **Augmented**: `aug`, `+` → root, major 3rd, augmented 5th
/// - **Sus4** / **Sus2**: `sus4`, `sus2`
///
/// Sevenths and extensions do not fit a three-note arpeggio and return `None`.
///
/// # Examples
/// ```
/// use karaoke::chord::triad_for_symbol;
///
/// let am = triad_for_symbol("Am", 4).unwrap();
/// assert_eq!(am.map(|p| p.to_string()), ["A4", "C5", "E5"]);
///
/// let bb = triad_for_symbol("Bb", 3).unwrap();
/// assert_eq!(bb.map(|p| p.to_string()), ["Bb3", "D4", "F4"]);
///
/// assert!(triad_for_symbol("G7", 4).is_none());
/// ```
pub fn triad_for_symbol(symbol: &str, octave: u8) -> Option<Triad> {
    let mut chars = symbol.chars();
    let root_name = chars.next()?;
    if !('A'..='G').contains(&root_name) {
        return None;
    }

    let rest = chars.as_str();
    let (accidental, quality) = if let Some(q) = rest.strip_prefix('#') {
        (Accidental::Sharp, q)
    } else if let Some(q) = rest.strip_prefix('b') {
        (Accidental::Flat, q)
    } else {
        (Accidental::Natural, rest)
    };

    let root: Pitch = format!(
        "{}{}{}",
        root_name,
        match accidental {
            Accidental::Sharp => "#",
            Accidental::Flat => "b",
            Accidental::Natural => "",
        },
        octave
    )
    .parse()
    .ok()?;

    let intervals: [i16; 3] = match quality {
        "" | "maj" | "M" => [0, 4, 7],
        "m" | "min" | "-" => [0, 3, 7],
        "dim" | "°" => [0, 3, 6],
        "aug" | "+" => [0, 4, 8],
        "sus4" => [0, 5, 7],
        "sus2" => [0, 2, 7],
        _ => return None,
    };

    // Minor thirds over C, F and G land on black keys that read as flats
    let minor_third = intervals[1] == 3;
    let prefer_flat = accidental == Accidental::Flat
        || (accidental == Accidental::Natural && minor_third && matches!(root_name, 'C' | 'F' | 'G'));
    let base = root.midi_note();
    let mut triad = [root; 3];
    for (slot, interval) in triad.iter_mut().zip(intervals).skip(1) {
        *slot = Pitch::from_midi(base + interval, prefer_flat).ok()?;
    }
    Some(triad)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(triad: Triad) -> [String; 3] {
        triad.map(|p| p.to_string())
    }

    #[test]
    fn test_pop_progression_table() {
        let table = ChordTable::pop_progression();
        assert_eq!(table.len(), 4);
        assert_eq!(names(*table.get("C").unwrap()), ["C5", "E5", "G5"]);
        assert_eq!(names(*table.get("Am").unwrap()), ["A4", "C5", "E5"]);
        assert_eq!(names(*table.get("Em").unwrap()), ["E4", "G4", "B4"]);
        assert_eq!(names(*table.get("G").unwrap()), ["G4", "B4", "D5"]);
    }

    #[test]
    fn test_lookup_without_derivation_fails_for_unknown() {
        let table = ChordTable::pop_progression();
        assert!(table.lookup("Dm").is_none());
        assert!(table.lookup("").is_none());
    }

    #[test]
    fn test_lookup_with_derivation() {
        let table = ChordTable::pop_progression().with_derived_voicings(true);
        // explicit entry wins
        assert_eq!(names(table.lookup("C").unwrap()), ["C5", "E5", "G5"]);
        assert_eq!(names(table.lookup("Dm").unwrap()), ["D4", "F4", "A4"]);
        assert!(table.lookup("Cmaj7").is_none());
    }

    #[test]
    fn test_insert_named_validates() {
        let mut table = ChordTable::new();
        let ok: Vec<String> = ["E4", "G#4", "B4"].iter().map(|s| s.to_string()).collect();
        table.insert_named("E", &ok).unwrap();
        assert_eq!(names(*table.get("E").unwrap()), ["E4", "G#4", "B4"]);

        let short: Vec<String> = vec!["E4".to_string()];
        assert!(matches!(
            table.insert_named("X", &short),
            Err(KaraokeError::ConfigError(_))
        ));
        let bad: Vec<String> = ["E4", "Q4", "B4"].iter().map(|s| s.to_string()).collect();
        assert!(matches!(
            table.insert_named("Y", &bad),
            Err(KaraokeError::InvalidPitch(_))
        ));
    }

    #[test]
    fn test_triad_qualities() {
        assert_eq!(names(triad_for_symbol("C", 4).unwrap()), ["C4", "E4", "G4"]);
        assert_eq!(names(triad_for_symbol("F#m", 4).unwrap()), ["F#4", "A4", "C#5"]);
        assert_eq!(names(triad_for_symbol("Bdim", 3).unwrap()), ["B3", "D4", "F4"]);
        assert_eq!(names(triad_for_symbol("Caug", 4).unwrap()), ["C4", "E4", "G#4"]);
        assert_eq!(names(triad_for_symbol("Dsus4", 4).unwrap()), ["D4", "G4", "A4"]);
        assert_eq!(names(triad_for_symbol("Dsus2", 4).unwrap()), ["D4", "E4", "A4"]);
        assert!(triad_for_symbol("H", 4).is_none());
        assert!(triad_for_symbol("Cm9", 4).is_none());
    }
}
