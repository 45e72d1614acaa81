//! Timeline construction
//!
//! Merges a melody and its lyric segments into one time-ordered event list.

use super::types::{
    LyricLayout, LyricMode, LyricSegment, Timeline, TimelineEvent, TimelineEventKind,
};
use super::wrap::{pack_syllables, pack_units, phrase_units, wrap_words};
use crate::error::KaraokeError;
use crate::melody::Melody;
use crate::translit::transliterate;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Printable ASCII range used for glitch frames (space through `_`)
const GLITCH_CHARS: std::ops::Range<u8> = 32..96;

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineConfig {
    /// Melody notes per lyric slot
    pub notes_per_slot: usize,
    /// Lyrics containing this word (any case) glitch before they appear
    pub glitch_keyword: Option<String>,
    /// Delay from a glitching slot's nominal time to its lyric
    pub recovery_ms: f64,
    pub glitch_frames: usize,
    /// Quiet time after the last event before `End`
    pub trailing_margin_ms: f64,
    pub layout: LyricLayout,
    pub mode: LyricMode,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            notes_per_slot: 8,
            glitch_keyword: Some("demony".to_string()),
            recovery_ms: 300.0,
            glitch_frames: 3,
            trailing_margin_ms: 300.0,
            layout: LyricLayout::default(),
            mode: LyricMode::Phrase,
        }
    }
}

impl TimelineConfig {
    pub fn validate(&self) -> Result<(), KaraokeError> {
        let bad = |msg: &str| Err(KaraokeError::ConfigError(msg.to_string()));
        if self.notes_per_slot == 0 {
            return bad("notes per slot must be at least 1");
        }
        if self.layout.rows == 0 || self.layout.cols == 0 {
            return bad("lyric area needs at least one row and one column");
        }
        if !(self.recovery_ms.is_finite() && self.recovery_ms >= 0.0) {
            return bad("recovery offset must be a non-negative number");
        }
        if !(self.trailing_margin_ms.is_finite() && self.trailing_margin_ms >= 0.0) {
            return bad("trailing margin must be a non-negative number");
        }
        if let Some(keyword) = &self.glitch_keyword {
            if keyword.trim().is_empty() {
                return bad("glitch keyword must not be blank");
            }
            if self.glitch_frames > 0 && self.recovery_ms <= 0.0 {
                return bad("glitch frames need a positive recovery offset");
            }
        }
        match self.mode {
            LyricMode::Phrase => {}
            LyricMode::Syllable { unit_ms } | LyricMode::Word { unit_ms } => {
                if !(unit_ms.is_finite() && unit_ms > 0.0) {
                    return bad("unit duration must be positive");
                }
            }
        }
        Ok(())
    }

    fn is_glitch(&self, text: &str) -> bool {
        if self.glitch_frames == 0 {
            return false;
        }
        match &self.glitch_keyword {
            Some(keyword) => text
                .to_lowercase()
                .contains(&transliterate(keyword).to_lowercase()),
            None => false,
        }
    }
}

/// Event list under construction plus the scrolling row cursor.
struct Plan<'a, R: ?Sized> {
    config: &'a TimelineConfig,
    rng: &'a mut R,
    events: Vec<TimelineEvent>,
    /// Next free row inside the lyric area (wrap modes)
    cursor: usize,
    /// Time of the last line written by the previous phrase
    floor_ms: f64,
}

impl<'a, R: Rng + ?Sized> Plan<'a, R> {
    fn push(&mut self, due_ms: f64, kind: TimelineEventKind) {
        self.events.push(TimelineEvent::new(due_ms, kind));
    }

    fn glitch_frames(&mut self, start_ms: f64) {
        let layout = self.config.layout;
        let frames = self.config.glitch_frames;
        let spacing = self.config.recovery_ms / frames as f64;
        for frame in 0..frames {
            let lines = (0..layout.rows)
                .map(|_| {
                    (0..layout.cols)
                        .map(|_| self.rng.gen_range(GLITCH_CHARS) as char)
                        .collect()
                })
                .collect();
            self.push(
                start_ms + frame as f64 * spacing,
                TimelineEventKind::Glitch {
                    first_row: layout.first_row,
                    lines,
                },
            );
        }
    }

    fn blank_area(&mut self, due_ms: f64) {
        let layout = self.config.layout;
        for row in layout.first_row..layout.end_row() {
            self.push(
                due_ms,
                TimelineEventKind::Lyric {
                    row,
                    text: String::new(),
                },
            );
        }
        self.cursor = 0;
    }

    fn place(&mut self, slot_start_ms: f64, segment: &LyricSegment) {
        // blank segment: previous lyric stays up
        if segment.text.trim().is_empty() {
            return;
        }
        let text = transliterate(&segment.text);
        let mut nominal = (slot_start_ms + segment.offset_ms).max(0.0);
        if nominal < self.floor_ms {
            debug!(
                nominal,
                floor = self.floor_ms,
                "previous phrase overruns its slot, delaying lyric"
            );
            nominal = self.floor_ms;
        }

        let glitch = self.config.is_glitch(&text);
        let lyric_ms = if glitch {
            self.glitch_frames(nominal);
            nominal + self.config.recovery_ms
        } else {
            nominal
        };

        match self.config.mode {
            LyricMode::Phrase => self.place_phrase(lyric_ms, &text),
            LyricMode::Syllable { unit_ms } => {
                if glitch {
                    self.blank_area(lyric_ms);
                }
                self.place_units(lyric_ms, &text, true, unit_ms);
            }
            LyricMode::Word { unit_ms } => {
                if glitch {
                    self.blank_area(lyric_ms);
                }
                self.place_units(lyric_ms, &text, false, unit_ms);
            }
        }
    }

    fn place_phrase(&mut self, due_ms: f64, text: &str) {
        let layout = self.config.layout;
        let lines = wrap_words(text, layout.cols);
        if lines.len() > layout.rows {
            debug!(
                lines = lines.len(),
                rows = layout.rows,
                "phrase does not fit the lyric area, dropping overflow"
            );
        }
        for offset in 0..layout.rows {
            self.push(
                due_ms,
                TimelineEventKind::Lyric {
                    row: layout.first_row + offset,
                    text: lines.get(offset).cloned().unwrap_or_default(),
                },
            );
        }
        self.floor_ms = due_ms;
    }

    fn place_units(&mut self, start_ms: f64, text: &str, by_syllable: bool, unit_ms: f64) {
        let layout = self.config.layout;
        let units = phrase_units(text, by_syllable);
        let mut last_ms = start_ms;
        let lines = if by_syllable {
            pack_syllables(&units, layout.cols)
        } else {
            pack_units(&units, layout.cols)
        };
        for line in lines {
            let due_ms = start_ms + line.units_through as f64 * unit_ms;
            if self.cursor >= layout.rows {
                self.push(
                    due_ms,
                    TimelineEventKind::Scroll {
                        first_row: layout.first_row,
                        rows: layout.rows,
                    },
                );
                self.cursor = layout.rows - 1;
            }
            self.push(
                due_ms,
                TimelineEventKind::Lyric {
                    row: layout.first_row + self.cursor,
                    text: line.text,
                },
            );
            self.cursor += 1;
            last_ms = due_ms;
        }
        self.floor_ms = last_ms;
    }
}

/// Build the playback timeline for a melody and its lyrics.
///
/// # Timing
/// - Every note gets a `Tone` event at its start; rests silence the piezo.
/// - Lyric segment *i* belongs to slot *i*, which starts at note
///   `i * notes_per_slot`. Extra segments or slots are ignored.
/// - A blank segment writes nothing, so the previous lyric stays up.
/// - A glitching lyric gets `glitch_frames` evenly spaced frames from its
///   nominal time and appears `recovery_ms` later.
/// - A lyric never lands before the previous one: when a delayed glitch
///   lyric or a unit sequence runs into the next slot, that slot's lyric
///   follows it at the same time.
/// - `End` follows the later of the melody end and the last event by
///   `trailing_margin_ms`.
///
/// Events due at the same time are ordered tone, scroll, then display writes
/// in the order they were planned.
///
/// # Example
/// ```rust
/// use karaoke::melody::{Melody, NoteEvent};
/// use karaoke::timeline::{build_timeline_seeded, LyricSegment, TimelineConfig, TimelineEventKind};
///
/// let melody: Melody = (0..8).map(|_| NoteEvent::rest(250.0)).collect();
/// let lyrics = vec![LyricSegment::new("hello")];
/// let timeline = build_timeline_seeded(&melody, &lyrics, &TimelineConfig::default(), 0).unwrap();
///
/// assert!(timeline.events().last().unwrap().is_end());
/// assert_eq!(timeline.end_ms(), 2300.0);
/// assert!(timeline.iter().any(|e| matches!(&e.kind,
///     TimelineEventKind::Lyric { row: 0, text } if text == "hello")));
/// ```
pub fn build_timeline<R: Rng + ?Sized>(
    melody: &Melody,
    lyrics: &[LyricSegment],
    config: &TimelineConfig,
    rng: &mut R,
) -> Result<Timeline, KaraokeError> {
    config.validate()?;

    let slots = melody.len().div_ceil(config.notes_per_slot);
    let lyric_slots = slots.min(lyrics.len());
    if slots != lyrics.len() {
        debug!(
            slots,
            lyrics = lyrics.len(),
            "slot and lyric counts differ, truncating to {}",
            lyric_slots
        );
    }

    let mut plan = Plan {
        config,
        rng,
        events: Vec::with_capacity(melody.len() + lyric_slots * (config.layout.rows + 1) + 1),
        cursor: 0,
        floor_ms: 0.0,
    };

    let starts = melody.start_times();
    for (index, (note, start_ms)) in melody.iter().zip(starts).enumerate() {
        plan.push(
            start_ms,
            TimelineEventKind::Tone {
                pitch: note.pitch,
                duration_ms: note.duration_ms,
                dynamic: note.dynamic,
            },
        );
        if index % config.notes_per_slot == 0 {
            let slot = index / config.notes_per_slot;
            if slot < lyric_slots {
                plan.place(start_ms, &lyrics[slot]);
            }
        }
    }

    let mut events = plan.events;
    // stable: equal (due, rank) keeps planning order
    events.sort_by(|a, b| {
        a.due_ms
            .total_cmp(&b.due_ms)
            .then(a.kind.rank().cmp(&b.kind.rank()))
    });

    let melody_ms = melody.total_duration_ms();
    let last_ms = events.last().map_or(0.0, |e| e.due_ms);
    let end_ms = melody_ms.max(last_ms) + config.trailing_margin_ms;
    events.push(TimelineEvent::new(end_ms, TimelineEventKind::End));

    debug!(events = events.len(), end_ms, "timeline built");

    Ok(Timeline {
        events,
        melody_ms,
        slots,
        lyric_slots,
    })
}

/// [`build_timeline`] with glitch frames drawn from a ChaCha8 generator.
pub fn build_timeline_seeded(
    melody: &Melody,
    lyrics: &[LyricSegment],
    config: &TimelineConfig,
    seed: u64,
) -> Result<Timeline, KaraokeError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    build_timeline(melody, lyrics, config, &mut rng)
}
