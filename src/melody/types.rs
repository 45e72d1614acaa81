//! Melody type definitions

use crate::pitch::Pitch;
use serde::Serialize;

/// One chord slot per entry; `None` is a rest slot.
pub type Bar = Vec<Option<String>>;

/// Duration of an eighth note in milliseconds at `bpm` quarter notes per minute
pub fn eighth_note_ms(bpm: f64) -> f64 {
    60_000.0 / bpm / 2.0
}

/// A single step of the melody.
///
/// # Fields
/// - `pitch`: what to play, `None` for silence
/// - `duration_ms`: how long the step lasts
/// - `dynamic`: optional level in `0.0..=1.0` from the dynamic pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub pitch: Option<Pitch>,
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<f32>,
}

impl NoteEvent {
    pub fn note(pitch: Pitch, duration_ms: f64) -> Self {
        Self {
            pitch: Some(pitch),
            duration_ms,
            dynamic: None,
        }
    }

    pub fn rest(duration_ms: f64) -> Self {
        Self {
            pitch: None,
            duration_ms,
            dynamic: None,
        }
    }

    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }
}

/// Notes in playback order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Melody {
    events: Vec<NoteEvent>,
}

impl Melody {
    pub fn new(events: Vec<NoteEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteEvent> {
        self.events.iter()
    }

    pub fn total_duration_ms(&self) -> f64 {
        self.events.iter().map(|e| e.duration_ms).sum()
    }

    /// Start offset of every note, in milliseconds from the first note
    pub fn start_times(&self) -> Vec<f64> {
        let mut elapsed = 0.0;
        self.events
            .iter()
            .map(|e| {
                let start = elapsed;
                elapsed += e.duration_ms;
                start
            })
            .collect()
    }
}

impl FromIterator<NoteEvent> for Melody {
    fn from_iter<I: IntoIterator<Item = NoteEvent>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
