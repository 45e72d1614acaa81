//! # Song Module
//!
//! Load a song file into everything playback needs.
//!
//! ## Purpose
//! A song file is plain text: optional YAML frontmatter between `---` lines,
//! then one bar per line.
//!
//! ```text
//! ---
//! title: Demony
//! tempo: 148
//! octave-shift: -1
//! ---
//! # verse
//! C Am | Ya vernus / domoy
//! Em _ | na rassvete
//! ```
//!
//! Chord symbols come before the `|`, lyric phrases after it, separated by
//! `/`. Phrases fill the bar's chord slots in order; a slot without a phrase
//! keeps the previous lyric on screen. `_` or `-` marks a rest slot and `#`
//! starts a comment line.
//!
//! ## Sub-modules
//! - `metadata` - frontmatter keys and their typed settings
//! - `body` - bar lines
//!
//! ## Example
//! ```rust
//! use karaoke::parse_song;
//!
//! let song = parse_song("---\ntempo: 120\n---\nC Am | one / two\n").unwrap();
//! assert_eq!(song.bars.len(), 1);
//! assert_eq!(song.lyrics[1].text, "two");
//!
//! let timeline = song.build_timeline().unwrap();
//! assert_eq!(timeline.slots(), 2);
//! ```

mod body;
mod metadata;

pub use metadata::{
    DisplaySettings, RawDisplay, RawPattern, RawSongMetadata, DEFAULT_TICK_MS, DEFAULT_UNIT_MS,
};

use crate::chord::ChordTable;
use crate::clock::Clock;
use crate::display::DisplayBuffer;
use crate::error::KaraokeError;
use crate::input::{InputController, PressMode};
use crate::melody::{generate_melody, Bar, Melody, MelodyConfig};
use crate::scheduler::{PlaybackConfig, PlaybackScheduler, TimelineSource};
use crate::sink::{DisplaySink, ToneSink};
use crate::timeline::{build_timeline, LyricSegment, Timeline, TimelineConfig};
use body::parse_body;
use metadata::{parse_metadata, split_frontmatter, SongSettings};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Songs shipped with the crate.
pub mod bundled {
    /// 16x2 LCD, phrase mode, glitching chorus
    pub const DEMONY: &str = include_str!("../../songs/demony.song");
    /// 21x8 OLED, syllable mode, scrolling lyric area
    pub const DEMONY_OLED: &str = include_str!("../../songs/demony_oled.song");
}

/// A parsed, validated song.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Seed for the first session; replays continue the same stream
    pub seed: u64,
    pub bars: Vec<Bar>,
    /// One segment per chord slot, in playback order
    pub lyrics: Vec<LyricSegment>,
    pub chords: ChordTable,
    pub melody: MelodyConfig,
    pub timeline: TimelineConfig,
    pub display: DisplaySettings,
    pub playback: PlaybackConfig,
    pub press_mode: PressMode,
}

/// Parse and validate a song file.
///
/// Fails with [`KaraokeError::ParseError`] for body syntax,
/// [`KaraokeError::MetadataError`] for frontmatter,
/// [`KaraokeError::UnknownChord`] for a symbol the chord table cannot voice
/// and [`KaraokeError::ConfigError`] for inconsistent pattern tables.
pub fn parse_song(source: &str) -> Result<Song, KaraokeError> {
    let (frontmatter, body_lines) = split_frontmatter(source)?;
    let settings = match frontmatter {
        Some(content) => parse_metadata(&content)?,
        None => SongSettings::default(),
    };
    let body = parse_body(body_lines)?;

    for (bar_idx, bar) in body.bars.iter().enumerate() {
        for (slot_idx, slot) in bar.iter().enumerate() {
            if let Some(symbol) = slot {
                if settings.chords.lookup(symbol).is_none() {
                    return Err(KaraokeError::UnknownChord {
                        symbol: symbol.clone(),
                        bar: bar_idx + 1,
                        slot: slot_idx + 1,
                    });
                }
            }
        }
    }

    settings.melody.validate()?;
    settings.timeline.validate()?;

    let lyrics = body
        .phrases
        .into_iter()
        .map(|text| LyricSegment::new(text).with_offset(settings.lyric_offset_ms))
        .collect();

    let song = Song {
        title: settings.title,
        artist: settings.artist,
        seed: settings.seed,
        bars: body.bars,
        lyrics,
        chords: settings.chords,
        melody: settings.melody,
        timeline: settings.timeline,
        display: settings.display,
        playback: settings.playback,
        press_mode: settings.press_mode,
    };
    debug!(
        title = song.title.as_deref().unwrap_or("untitled"),
        bars = song.bars.len(),
        slots = song.slot_count(),
        "song parsed"
    );
    Ok(song)
}

impl Song {
    /// Chord and rest slots across all bars
    pub fn slot_count(&self) -> usize {
        self.bars.iter().map(Vec::len).sum()
    }

    pub fn generate_melody_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Melody, KaraokeError> {
        generate_melody(&self.bars, &self.chords, &self.melody, rng)
    }

    /// Melody and timeline from one RNG stream: pattern choices first, then
    /// glitch frames.
    pub fn build_timeline_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Timeline, KaraokeError> {
        let melody = self.generate_melody_with(rng)?;
        build_timeline(&melody, &self.lyrics, &self.timeline, rng)
    }

    /// The timeline for [`Song::seed`]
    pub fn build_timeline(&self) -> Result<Timeline, KaraokeError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.build_timeline_with(&mut rng)
    }

    /// Wrap a display sink in a buffer sized for this song.
    pub fn display_buffer<D: DisplaySink>(&self, sink: D) -> DisplayBuffer<D> {
        DisplayBuffer::new(sink, self.display.geometry).with_coalesce_ms(self.display.coalesce_ms)
    }

    /// An idle scheduler that rebuilds this song on every start.
    pub fn scheduler<C: Clock, T: ToneSink, D: DisplaySink>(
        &self,
        clock: C,
        tone: T,
        display: D,
    ) -> PlaybackScheduler<C, T, D> {
        PlaybackScheduler::new(
            clock,
            tone,
            self.display_buffer(display),
            Box::new(SongSource::new(self.clone())),
            self.playback.clone(),
        )
    }

    pub fn input_controller(&self) -> InputController {
        InputController::new(self.press_mode)
    }
}

/// Rebuilds a song's timeline for each session.
///
/// All sessions draw from one seeded stream, so the first play matches
/// [`Song::build_timeline`] and each replay varies deterministically.
#[derive(Debug, Clone)]
pub struct SongSource {
    song: Song,
    rng: ChaCha8Rng,
}

impl SongSource {
    pub fn new(song: Song) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(song.seed);
        Self { song, rng }
    }

    pub fn song(&self) -> &Song {
        &self.song
    }
}

impl TimelineSource for SongSource {
    fn build(&mut self) -> Result<Timeline, KaraokeError> {
        self.song.build_timeline_with(&mut self.rng)
    }
}
