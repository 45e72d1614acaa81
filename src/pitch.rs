//! Pitch names, octave transposition, and piezo frequencies.
//!
//! A pitch is written the way the chord tables write it: a letter A-G, an
//! optional `#` or `b`, and one octave digit (`C5`, `F#4`, `Bb3`). Rests are
//! `None` wherever an `Option<Pitch>` appears.

use crate::error::KaraokeError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Note names A through G
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteName {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteName {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'C' => Some(NoteName::C),
            'D' => Some(NoteName::D),
            'E' => Some(NoteName::E),
            'F' => Some(NoteName::F),
            'G' => Some(NoteName::G),
            'A' => Some(NoteName::A),
            'B' => Some(NoteName::B),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            NoteName::C => 'C',
            NoteName::D => 'D',
            NoteName::E => 'E',
            NoteName::F => 'F',
            NoteName::G => 'G',
            NoteName::A => 'A',
            NoteName::B => 'B',
        }
    }

    /// Semitone offset from C
    fn semitone(self) -> i16 {
        match self {
            NoteName::C => 0,
            NoteName::D => 2,
            NoteName::E => 4,
            NoteName::F => 5,
            NoteName::G => 7,
            NoteName::A => 9,
            NoteName::B => 11,
        }
    }
}

/// Accidentals: sharp, flat, or none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Accidental {
    #[default]
    Natural,
    Sharp, // #
    Flat,  // b
}

impl Accidental {
    fn offset(self) -> i16 {
        match self {
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
        }
    }
}

/// A named pitch with octave, e.g. `C5`.
///
/// Octaves follow scientific pitch notation (C4 = middle C = MIDI 60) and are
/// limited to a single digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pitch {
    pub name: NoteName,
    pub accidental: Accidental,
    pub octave: u8,
}

impl Pitch {
    pub const MAX_OCTAVE: u8 = 9;

    pub fn new(name: NoteName, accidental: Accidental, octave: u8) -> Result<Self, KaraokeError> {
        let pitch = Pitch {
            name,
            accidental,
            octave,
        };
        if octave > Self::MAX_OCTAVE {
            return Err(KaraokeError::InvalidPitch(pitch.to_string()));
        }
        Ok(pitch)
    }

    /// Shift by whole octaves, keeping letter and accidental.
    ///
    /// # Examples
    /// ```
    /// use karaoke::Pitch;
    ///
    /// let c5: Pitch = "C5".parse().unwrap();
    /// assert_eq!(c5.transpose_octaves(-1).unwrap().to_string(), "C4");
    /// assert!(c5.transpose_octaves(5).is_err());
    /// ```
    pub fn transpose_octaves(self, shift: i8) -> Result<Self, KaraokeError> {
        let octave = self.octave as i16 + shift as i16;
        if !(0..=Self::MAX_OCTAVE as i16).contains(&octave) {
            return Err(KaraokeError::InvalidPitch(format!(
                "{} shifted by {} octaves",
                self, shift
            )));
        }
        Ok(Pitch {
            octave: octave as u8,
            ..self
        })
    }

    /// MIDI note number (C4 = 60). `Cb` and `B#` cross the octave boundary.
    pub fn midi_note(self) -> i16 {
        12 * (self.octave as i16 + 1) + self.name.semitone() + self.accidental.offset()
    }

    /// Equal-tempered frequency with A4 = 440 Hz
    pub fn frequency_hz(self) -> f64 {
        440.0 * 2f64.powf((self.midi_note() - 69) as f64 / 12.0)
    }

    /// Spell a MIDI note number, preferring flats or sharps for black keys.
    pub fn from_midi(midi: i16, prefer_flat: bool) -> Result<Self, KaraokeError> {
        let octave = midi.div_euclid(12) - 1;
        // 0=C, 1=C#/Db, 2=D, 3=D#/Eb, 4=E, 5=F, 6=F#/Gb, 7=G, 8=G#/Ab, 9=A, 10=A#/Bb, 11=B
        let (name, accidental) = match midi.rem_euclid(12) {
            0 => (NoteName::C, Accidental::Natural),
            1 if prefer_flat => (NoteName::D, Accidental::Flat),
            1 => (NoteName::C, Accidental::Sharp),
            2 => (NoteName::D, Accidental::Natural),
            3 if prefer_flat => (NoteName::E, Accidental::Flat),
            3 => (NoteName::D, Accidental::Sharp),
            4 => (NoteName::E, Accidental::Natural),
            5 => (NoteName::F, Accidental::Natural),
            6 if prefer_flat => (NoteName::G, Accidental::Flat),
            6 => (NoteName::F, Accidental::Sharp),
            7 => (NoteName::G, Accidental::Natural),
            8 if prefer_flat => (NoteName::A, Accidental::Flat),
            8 => (NoteName::G, Accidental::Sharp),
            9 => (NoteName::A, Accidental::Natural),
            10 if prefer_flat => (NoteName::B, Accidental::Flat),
            10 => (NoteName::A, Accidental::Sharp),
            _ => (NoteName::B, Accidental::Natural),
        };
        if !(0..=Self::MAX_OCTAVE as i16).contains(&octave) {
            return Err(KaraokeError::InvalidPitch(format!("MIDI note {}", midi)));
        }
        Pitch::new(name, accidental, octave as u8)
    }
}

impl FromStr for Pitch {
    type Err = KaraokeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || KaraokeError::InvalidPitch(s.to_string());
        let mut chars = s.trim().chars();

        let name = chars.next().and_then(NoteName::from_char).ok_or_else(invalid)?;
        let mut next = chars.next();
        let accidental = match next {
            Some('#') => {
                next = chars.next();
                Accidental::Sharp
            }
            Some('b') => {
                next = chars.next();
                Accidental::Flat
            }
            _ => Accidental::Natural,
        };
        let octave = next
            .and_then(|c| c.to_digit(10))
            .ok_or_else(invalid)? as u8;
        if chars.next().is_some() {
            return Err(invalid());
        }

        Pitch::new(name, accidental, octave)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accidental = match self.accidental {
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::Flat => "b",
        };
        write!(f, "{}{}{}", self.name.as_char(), accidental, self.octave)
    }
}

impl Serialize for Pitch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
