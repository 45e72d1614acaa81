//! # Melody Module
//!
//! Expand a chord progression into the flat note sequence the piezo plays.
//!
//! ## Purpose
//! A song is written as bars of chord slots (`C Am Em G`). Each slot becomes
//! one arpeggio of eighth notes over the chord's three pitches, and a rest slot
//! becomes the same number of silent eighths. The result is a [`Melody`]:
//! playback order, durations in milliseconds.
//!
//! ## Sub-modules
//! - `types` - NoteEvent, Melody, Bar
//! - `patterns` - arpeggio/rhythm/dynamic tables and [`MelodyConfig`]
//! - `generator` - the expansion itself
//!
//! ## Variation
//! Each table can hold several weighted patterns. Every chord slot picks one
//! pattern per table, pattern *i* with probability `weight_i / Σ weights`.
//! With `avoid_repeats`, a step that would repeat the previous pitch plays a
//! different chord tone instead. All choices come from the caller's RNG, so
//! a seed fully determines the melody.
//!
//! ## Example
//! ```rust
//! use karaoke::chord::ChordTable;
//! use karaoke::melody::{generate_melody_seeded, MelodyConfig};
//!
//! let bars = vec![vec![Some("C".to_string())]];
//! let config = MelodyConfig { tempo_bpm: 148.0, ..MelodyConfig::default() };
//! let melody = generate_melody_seeded(&bars, &ChordTable::pop_progression(), &config, 0).unwrap();
//!
//! assert_eq!(melody.len(), 8);
//! assert_eq!(melody.events()[0].pitch.unwrap().to_string(), "C5");
//! ```

mod generator;
mod patterns;
mod types;

pub use generator::{generate_melody, generate_melody_seeded};
pub use patterns::{
    probabilities, ArpeggioPattern, DynamicPattern, MelodyConfig, RhythmPattern, Weighted,
    DEFAULT_ARPEGGIO,
};
pub use types::{eighth_note_ms, Bar, Melody, NoteEvent};
