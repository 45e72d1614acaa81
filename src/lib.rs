pub mod chord;
pub mod clock;
pub mod display;
pub mod error;
pub mod input;
pub mod melody;
pub mod pitch;
pub mod scheduler;
pub mod sink;
pub mod song;
pub mod timeline;
pub mod translit;

pub use error::*;
pub use input::{ButtonEvent, InputController, PressMode};
pub use pitch::Pitch;
pub use scheduler::{PlaybackScheduler, PlaybackStatus};
pub use song::{parse_song, Song};
pub use timeline::{Timeline, TimelineEvent, TimelineEventKind};
pub use translit::transliterate;

/// Parse a song file and build its timeline with the song's own seed.
/// This is the main entry point for the library.
pub fn build_song_timeline(source: &str) -> Result<Timeline, KaraokeError> {
    let song = parse_song(source)?;
    song.build_timeline()
}

/// Same as [`build_song_timeline`] with the seed overridden
pub fn build_song_timeline_seeded(source: &str, seed: u64) -> Result<Timeline, KaraokeError> {
    let mut song = parse_song(source)?;
    song.seed = seed;
    song.build_timeline()
}
