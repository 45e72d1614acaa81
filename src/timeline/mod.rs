//! # Timeline Module
//!
//! Plan a whole karaoke run as one sorted list of timed output events.
//!
//! ## Purpose
//! The piezo and the character display are driven by the same clock. Rather
//! than chaining callbacks, the melody and its lyrics are merged up front into
//! a [`Timeline`]: every tone, every display row write, every glitch frame and
//! scroll, each with a due time in milliseconds from the start of playback.
//! The scheduler only has to apply events in order when they come due.
//!
//! ## Sub-modules
//! - `types` - Timeline, TimelineEvent, LyricSegment, layout and mode types
//! - `builder` - [`build_timeline()`] and [`TimelineConfig`]
//! - `wrap` - word wrap, syllable split and line packing
//!
//! ## Slots
//! Lyric segment *i* is tied to chord slot *i*: the note at index
//! `i * notes_per_slot`. When there are more segments than slots (or the other
//! way round) the extra ones are dropped.
//!
//! ## Lyric Modes
//!
//! ### Phrase
//! The phrase is word-wrapped across the lyric rows and written all at once.
//! Rows the phrase does not need are blanked.
//!
//! ### Syllable / Word
//! The phrase is sung unit by unit, `unit_ms` apart. Units are packed into
//! lines as wide as the display; each line is written when its last unit has
//! been sung. Lines fill the lyric area top to bottom and then scroll it.
//! In syllable mode a line also ends at a word end once it is within five
//! columns of the edge.
//!
//! ## Glitch
//! A lyric containing the glitch keyword in any case (`"demony"` by default)
//! is preceded by frames of random characters over the lyric area. The lyric
//! itself appears `recovery_ms` after the slot's nominal time.

mod builder;
mod types;
mod wrap;

#[cfg(test)]
mod tests;

pub use builder::{build_timeline, build_timeline_seeded, TimelineConfig};
pub use types::{
    LyricLayout, LyricMode, LyricSegment, Timeline, TimelineEvent, TimelineEventKind,
};
pub use wrap::{pack_syllables, pack_units, phrase_units, split_syllables, wrap_words, PackedLine};
