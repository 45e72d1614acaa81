//! Timeline type definitions

use crate::error::KaraokeError;
use crate::pitch::Pitch;
use serde::Serialize;

/// Lyric text for one chord slot.
///
/// `offset_ms` shifts the lyric relative to the slot start. A positive offset
/// lets the display write land after the slot's first tone has started.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricSegment {
    pub text: String,
    pub offset_ms: f64,
}

impl LyricSegment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            offset_ms: 0.0,
        }
    }

    pub fn with_offset(mut self, offset_ms: f64) -> Self {
        self.offset_ms = offset_ms;
        self
    }
}

/// Display rows reserved for lyrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricLayout {
    pub first_row: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Default for LyricLayout {
    /// Both rows of a 16x2 LCD
    fn default() -> Self {
        Self {
            first_row: 0,
            rows: 2,
            cols: 16,
        }
    }
}

impl LyricLayout {
    /// Row index one past the lyric area
    pub fn end_row(&self) -> usize {
        self.first_row.saturating_add(self.rows)
    }
}

/// How a phrase is laid out over time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum LyricMode {
    /// Whole phrase at once, word-wrapped over the lyric rows
    #[default]
    Phrase,
    /// Syllable by syllable, `unit_ms` per syllable, scrolling when full
    #[serde(rename_all = "camelCase")]
    Syllable { unit_ms: f64 },
    /// Word by word, `unit_ms` per word, scrolling when full
    #[serde(rename_all = "camelCase")]
    Word { unit_ms: f64 },
}

/// What happens when a timeline event comes due.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimelineEventKind {
    /// Start a tone, or silence the piezo when `pitch` is `None`
    #[serde(rename_all = "camelCase")]
    Tone {
        pitch: Option<Pitch>,
        duration_ms: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        dynamic: Option<f32>,
    },
    /// Replace one display row
    Lyric { row: usize, text: String },
    /// One frame of garbage over consecutive rows
    #[serde(rename_all = "camelCase")]
    Glitch { first_row: usize, lines: Vec<String> },
    /// Shift `rows` rows starting at `first_row` up by one
    #[serde(rename_all = "camelCase")]
    Scroll { first_row: usize, rows: usize },
    End,
}

impl TimelineEventKind {
    /// Tie-break for events due at the same instant
    pub(crate) fn rank(&self) -> u8 {
        match self {
            TimelineEventKind::Tone { .. } => 0,
            TimelineEventKind::Scroll { .. } => 1,
            TimelineEventKind::Lyric { .. } | TimelineEventKind::Glitch { .. } => 2,
            TimelineEventKind::End => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub due_ms: f64,
    #[serde(flatten)]
    pub kind: TimelineEventKind,
}

impl TimelineEvent {
    pub fn new(due_ms: f64, kind: TimelineEventKind) -> Self {
        Self { due_ms, kind }
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, TimelineEventKind::End)
    }
}

/// A fully planned playback: every tone and display change with its due
/// time, sorted, terminated by a single `End`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub(crate) events: Vec<TimelineEvent>,
    pub(crate) melody_ms: f64,
    pub(crate) slots: usize,
    pub(crate) lyric_slots: usize,
}

impl Timeline {
    /// Wrap a hand-made event list.
    ///
    /// Events must be non-decreasing in `due_ms` and end with the only `End`.
    pub fn new(events: Vec<TimelineEvent>) -> Result<Self, KaraokeError> {
        let bad = |msg: &str| Err(KaraokeError::ConfigError(format!("timeline {}", msg)));
        if events.iter().any(|e| !e.due_ms.is_finite() || e.due_ms < 0.0) {
            return bad("due times must be finite and non-negative");
        }
        if events.windows(2).any(|w| w[1].due_ms < w[0].due_ms) {
            return bad("events are out of order");
        }
        match events.last() {
            Some(last) if last.is_end() => {}
            _ => return bad("must end with an End event"),
        }
        if events.iter().filter(|e| e.is_end()).count() != 1 {
            return bad("must contain exactly one End event");
        }

        let melody_ms = events
            .iter()
            .filter_map(|e| match e.kind {
                TimelineEventKind::Tone { duration_ms, .. } => Some(e.due_ms + duration_ms),
                _ => None,
            })
            .fold(0.0, f64::max);
        Ok(Self {
            events,
            melody_ms,
            slots: 0,
            lyric_slots: 0,
        })
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// A timeline always holds at least its `End` event.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.events.iter()
    }

    /// Due time of the `End` event
    pub fn end_ms(&self) -> f64 {
        self.events.last().map_or(0.0, |e| e.due_ms)
    }

    /// Sum of all note durations
    pub fn melody_ms(&self) -> f64 {
        self.melody_ms
    }

    /// Chord slots in the melody
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Slots that received a lyric after truncation
    pub fn lyric_slots(&self) -> usize {
        self.lyric_slots
    }

    pub fn tone_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TimelineEventKind::Tone { .. }))
            .count()
    }
}
