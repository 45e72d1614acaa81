//! YAML frontmatter: raw deserialization and conversion into typed settings.

use crate::chord::ChordTable;
use crate::display::{DisplayGeometry, DEFAULT_COALESCE_MS};
use crate::error::KaraokeError;
use crate::input::PressMode;
use crate::melody::{ArpeggioPattern, DynamicPattern, MelodyConfig, RhythmPattern, Weighted};
use crate::scheduler::{PlaybackConfig, Strategy};
use crate::timeline::{LyricLayout, LyricMode, TimelineConfig};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Default per-unit time for syllable and word modes
pub const DEFAULT_UNIT_MS: f64 = 180.0;
/// Default tick for the polling strategy
pub const DEFAULT_TICK_MS: u64 = 10;

const COLS_RANGE: std::ops::RangeInclusive<usize> = 8..=25;
const ROWS_RANGE: std::ops::RangeInclusive<usize> = 1..=8;

/// Raw metadata for YAML deserialization
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
pub struct RawSongMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub tempo: Option<f64>,
    pub octave_shift: Option<i8>,
    pub seed: Option<u64>,
    /// Extra or replacement chords: symbol → three pitch names
    pub chords: Option<BTreeMap<String, Vec<String>>>,
    pub derive_chords: Option<bool>,
    pub arpeggios: Option<Vec<RawPattern<usize>>>,
    pub rhythms: Option<Vec<RawPattern<f64>>>,
    pub dynamics: Option<Vec<RawPattern<f32>>>,
    pub avoid_repeats: Option<bool>,
    pub notes_per_slot: Option<usize>,
    /// An empty string turns the glitch off
    pub glitch_keyword: Option<String>,
    pub recovery_ms: Option<f64>,
    pub glitch_frames: Option<usize>,
    pub trailing_margin_ms: Option<f64>,
    pub display: Option<RawDisplay>,
    pub lyric_mode: Option<String>, // phrase | syllable | word
    pub unit_ms: Option<f64>,
    pub lyric_offset_ms: Option<f64>,
    pub idle_text: Option<Vec<String>>,
    pub playing_text: Option<Vec<String>>,
    pub strategy: Option<String>, // prebuilt | polling
    pub tick_ms: Option<u64>,
    pub press_mode: Option<String>, // start-only | toggle-pause
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
pub struct RawDisplay {
    pub cols: Option<usize>,
    pub rows: Option<usize>,
    pub lyric_row: Option<usize>,
    pub lyric_rows: Option<usize>,
    pub coalesce_ms: Option<u64>,
}

/// A pattern table entry: either a bare list (weight 1) or a weighted map.
///
/// ```yaml
/// arpeggios:
///   - [0, 1, 2, 1, 0, 1, 2, 1]
///   - pattern: [0, 2, 1, 2, 0, 2, 1, 2]
///     weight: 3
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RawPattern<T> {
    Bare(Vec<T>),
    Weighted {
        pattern: Vec<T>,
        #[serde(default = "default_weight")]
        weight: u32,
    },
}

fn default_weight() -> u32 {
    1
}

impl<T> RawPattern<T> {
    fn into_weighted<P>(self, wrap: impl Fn(Vec<T>) -> P) -> Weighted<P> {
        match self {
            RawPattern::Bare(steps) => Weighted::new(wrap(steps), 1),
            RawPattern::Weighted { pattern, weight } => Weighted::new(wrap(pattern), weight),
        }
    }
}

/// Output device geometry and write coalescing for a song.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySettings {
    pub geometry: DisplayGeometry,
    pub coalesce_ms: u64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            geometry: DisplayGeometry::LCD_16X2,
            coalesce_ms: DEFAULT_COALESCE_MS,
        }
    }
}

/// Typed frontmatter
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SongSettings {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub seed: u64,
    pub chords: ChordTable,
    pub melody: MelodyConfig,
    pub timeline: TimelineConfig,
    pub display: DisplaySettings,
    pub playback: PlaybackConfig,
    pub press_mode: PressMode,
    pub lyric_offset_ms: f64,
}

impl Default for SongSettings {
    fn default() -> Self {
        let melody = MelodyConfig::default();
        let timeline = TimelineConfig {
            notes_per_slot: melody.steps_per_slot(),
            ..TimelineConfig::default()
        };
        Self {
            title: None,
            artist: None,
            seed: 0,
            chords: ChordTable::pop_progression(),
            melody,
            timeline,
            display: DisplaySettings::default(),
            playback: PlaybackConfig::default(),
            press_mode: PressMode::default(),
            lyric_offset_ms: 0.0,
        }
    }
}

/// Split a leading `---` block from the body.
///
/// Returns the frontmatter text and the remaining lines paired with their
/// 1-indexed line numbers. Frontmatter only counts when `---` is the first
/// non-blank line.
pub(crate) fn split_frontmatter(
    source: &str,
) -> Result<(Option<String>, Vec<(usize, &str)>), KaraokeError> {
    let lines: Vec<(usize, &str)> = source
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .collect();

    let start = match lines.iter().position(|(_, line)| !line.trim().is_empty()) {
        Some(idx) if lines[idx].1.trim() == "---" => idx,
        _ => return Ok((None, lines)),
    };
    let end = lines[start + 1..]
        .iter()
        .position(|(_, line)| line.trim() == "---")
        .map(|offset| start + 1 + offset)
        .ok_or_else(|| {
            KaraokeError::MetadataError(format!(
                "frontmatter opened on line {} is never closed",
                lines[start].0
            ))
        })?;

    let content = lines[start + 1..end]
        .iter()
        .map(|(_, line)| *line)
        .collect::<Vec<_>>()
        .join("\n");
    Ok((Some(content), lines[end + 1..].to_vec()))
}

pub(crate) fn parse_metadata(content: &str) -> Result<SongSettings, KaraokeError> {
    let raw: Option<RawSongMetadata> = serde_yaml::from_str(content)
        .map_err(|e| KaraokeError::MetadataError(e.to_string()))?;
    // an empty block deserializes to None
    raw.unwrap_or_default().into_settings()
}

fn bad(message: String) -> KaraokeError {
    KaraokeError::MetadataError(message)
}

fn non_negative(key: &str, value: f64) -> Result<f64, KaraokeError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(bad(format!("{} must be a non-negative number, got {}", key, value)))
    }
}

impl RawSongMetadata {
    pub(crate) fn into_settings(self) -> Result<SongSettings, KaraokeError> {
        let defaults = SongSettings::default();

        let mut chords = ChordTable::pop_progression()
            .with_derived_voicings(self.derive_chords.unwrap_or(false));
        for (symbol, pitches) in self.chords.unwrap_or_default() {
            chords
                .insert_named(&symbol, &pitches)
                .map_err(|e| bad(format!("chord '{}': {}", symbol, e)))?;
        }

        let mut melody = defaults.melody;
        if let Some(tempo) = self.tempo {
            melody.tempo_bpm = tempo;
        }
        if let Some(shift) = self.octave_shift {
            melody.octave_shift = shift;
        }
        if let Some(arpeggios) = self.arpeggios {
            melody.arpeggios = arpeggios
                .into_iter()
                .map(|p| p.into_weighted(ArpeggioPattern))
                .collect();
        }
        if let Some(rhythms) = self.rhythms {
            melody.rhythms = rhythms
                .into_iter()
                .map(|p| p.into_weighted(RhythmPattern))
                .collect();
        }
        if let Some(dynamics) = self.dynamics {
            melody.dynamics = dynamics
                .into_iter()
                .map(|p| p.into_weighted(DynamicPattern))
                .collect();
        }
        melody.avoid_repeats = self.avoid_repeats.unwrap_or(false);

        let (display, layout) = parse_display(self.display.unwrap_or_default())?;

        let unit_ms = self.unit_ms.unwrap_or(DEFAULT_UNIT_MS);
        let mode = match self.lyric_mode.as_deref() {
            None | Some("phrase") => LyricMode::Phrase,
            Some("syllable") => LyricMode::Syllable { unit_ms },
            Some("word") => LyricMode::Word { unit_ms },
            Some(other) => {
                return Err(bad(format!(
                    "Invalid lyric mode: {} (expected phrase, syllable or word)",
                    other
                )))
            }
        };

        let mut timeline = defaults.timeline;
        timeline.notes_per_slot = self
            .notes_per_slot
            .unwrap_or_else(|| melody.steps_per_slot());
        if let Some(keyword) = self.glitch_keyword {
            timeline.glitch_keyword = if keyword.trim().is_empty() {
                None
            } else {
                Some(keyword)
            };
        }
        if let Some(recovery) = self.recovery_ms {
            timeline.recovery_ms = non_negative("recovery-ms", recovery)?;
        }
        if let Some(frames) = self.glitch_frames {
            timeline.glitch_frames = frames;
        }
        if let Some(margin) = self.trailing_margin_ms {
            timeline.trailing_margin_ms = non_negative("trailing-margin-ms", margin)?;
        }
        timeline.layout = layout;
        timeline.mode = mode;

        let lyric_offset_ms = self.lyric_offset_ms.unwrap_or(0.0);
        if !lyric_offset_ms.is_finite() {
            return Err(bad("lyric-offset-ms must be a number".to_string()));
        }

        let strategy = match self.strategy.as_deref() {
            None | Some("prebuilt") => Strategy::Prebuilt,
            Some("polling") => {
                let tick_ms = self.tick_ms.unwrap_or(DEFAULT_TICK_MS);
                if tick_ms == 0 {
                    return Err(bad("tick-ms must be at least 1".to_string()));
                }
                Strategy::Polling { tick_ms }
            }
            Some(other) => {
                return Err(bad(format!(
                    "Invalid strategy: {} (expected prebuilt or polling)",
                    other
                )))
            }
        };

        let press_mode = match self.press_mode.as_deref() {
            None | Some("start-only") => PressMode::StartOnly,
            Some("toggle-pause") => PressMode::TogglePause,
            Some(other) => {
                return Err(bad(format!(
                    "Invalid press mode: {} (expected start-only or toggle-pause)",
                    other
                )))
            }
        };

        let mut playback = defaults.playback;
        playback.strategy = strategy;
        if let Some(idle) = self.idle_text {
            playback.idle_screen = idle;
        }
        if let Some(playing) = self.playing_text {
            playback.playing_screen = playing;
        }
        for (key, screen) in [
            ("idle-text", &playback.idle_screen),
            ("playing-text", &playback.playing_screen),
        ] {
            if screen.len() > display.geometry.rows {
                return Err(bad(format!(
                    "{} has {} lines but the display has {} rows",
                    key,
                    screen.len(),
                    display.geometry.rows
                )));
            }
        }

        Ok(SongSettings {
            title: self.title,
            artist: self.artist,
            seed: self.seed.unwrap_or(0),
            chords,
            melody,
            timeline,
            display,
            playback,
            press_mode,
            lyric_offset_ms,
        })
    }
}

fn parse_display(raw: RawDisplay) -> Result<(DisplaySettings, LyricLayout), KaraokeError> {
    let defaults = DisplaySettings::default();
    let cols = raw.cols.unwrap_or(defaults.geometry.cols);
    let rows = raw.rows.unwrap_or(defaults.geometry.rows);
    if !COLS_RANGE.contains(&cols) {
        return Err(bad(format!(
            "display cols must be within {}..={}, got {}",
            COLS_RANGE.start(),
            COLS_RANGE.end(),
            cols
        )));
    }
    if !ROWS_RANGE.contains(&rows) {
        return Err(bad(format!(
            "display rows must be within {}..={}, got {}",
            ROWS_RANGE.start(),
            ROWS_RANGE.end(),
            rows
        )));
    }

    let lyric_row = raw.lyric_row.unwrap_or(0);
    if lyric_row >= rows {
        return Err(bad(format!(
            "lyric-row {} is outside a {}-row display",
            lyric_row, rows
        )));
    }
    let lyric_rows = raw.lyric_rows.unwrap_or(rows - lyric_row);
    if lyric_rows == 0 || lyric_row + lyric_rows > rows {
        return Err(bad(format!(
            "lyric-rows {} from row {} does not fit a {}-row display",
            lyric_rows, lyric_row, rows
        )));
    }

    Ok((
        DisplaySettings {
            geometry: DisplayGeometry { rows, cols },
            coalesce_ms: raw.coalesce_ms.unwrap_or(defaults.coalesce_ms),
        },
        LyricLayout {
            first_row: lyric_row,
            rows: lyric_rows,
            cols,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_frontmatter_keeps_line_numbers() {
        let source = "\n---\ntitle: x\n---\nC | a\n\nG | b";
        let (meta, body) = split_frontmatter(source).unwrap();
        assert_eq!(meta.as_deref(), Some("title: x"));
        assert_eq!(body, vec![(5, "C | a"), (6, ""), (7, "G | b")]);
    }

    #[test]
    fn test_no_frontmatter() {
        let (meta, body) = split_frontmatter("C | a\n---\n").unwrap();
        assert!(meta.is_none());
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_unclosed_frontmatter() {
        let err = split_frontmatter("---\ntitle: x\nC | a").unwrap_err();
        assert!(matches!(err, KaraokeError::MetadataError(_)));
    }

    #[test]
    fn test_empty_metadata_uses_defaults() {
        let settings = parse_metadata("").unwrap();
        assert_eq!(settings, SongSettings::default());
        assert_eq!(settings.timeline.notes_per_slot, 8);
        assert_eq!(settings.timeline.layout, LyricLayout::default());
    }

    #[test]
    fn test_full_metadata() {
        let yaml = r#"
title: Demony
artist: Tri Dnya Dozhdya
tempo: 148
octave-shift: -1
seed: 7
derive-chords: true
chords:
  F: [F4, A4, C5]
arpeggios:
  - [0, 1, 2, 1]
  - pattern: [0, 2, 1, 2]
    weight: 3
rhythms:
  - [1, 1, 0.5, 1.5]
dynamics:
  - pattern: [1.0, 0.5, 0.5, 0]
avoid-repeats: true
glitch-keyword: ""
display:
  cols: 21
  rows: 8
  lyric-row: 3
  lyric-rows: 5
  coalesce-ms: 4
lyric-mode: syllable
unit-ms: 200
lyric-offset-ms: 50
idle-text: [Demony - Karaoke, "", Press button]
playing-text: [Demony - Karaoke]
strategy: polling
tick-ms: 5
press-mode: toggle-pause
"#;
        let s = parse_metadata(yaml).unwrap();
        assert_eq!(s.title.as_deref(), Some("Demony"));
        assert_eq!(s.seed, 7);
        assert_eq!(s.melody.tempo_bpm, 148.0);
        assert_eq!(s.melody.octave_shift, -1);
        assert_eq!(s.melody.arpeggios.len(), 2);
        assert_eq!(s.melody.arpeggios[1].weight, 3);
        assert_eq!(s.melody.rhythms[0].pattern.0, vec![1.0, 1.0, 0.5, 1.5]);
        assert_eq!(s.melody.dynamics[0].weight, 1);
        assert!(s.melody.avoid_repeats);
        assert!(s.chords.get("F").is_some());
        assert!(s.chords.lookup("Dm").is_some());
        assert_eq!(s.timeline.notes_per_slot, 4);
        assert_eq!(s.timeline.glitch_keyword, None);
        assert_eq!(s.timeline.mode, LyricMode::Syllable { unit_ms: 200.0 });
        assert_eq!(
            s.timeline.layout,
            LyricLayout {
                first_row: 3,
                rows: 5,
                cols: 21
            }
        );
        assert_eq!(s.display.geometry, DisplayGeometry::OLED_21X8);
        assert_eq!(s.display.coalesce_ms, 4);
        assert_eq!(s.lyric_offset_ms, 50.0);
        assert_eq!(s.playback.idle_screen[1], "");
        assert_eq!(s.playback.strategy, Strategy::Polling { tick_ms: 5 });
        assert_eq!(s.press_mode, PressMode::TogglePause);
    }

    #[test]
    fn test_lyric_rows_default_to_rest_of_display() {
        let s = parse_metadata("display:\n  rows: 4\n  lyric-row: 1").unwrap();
        assert_eq!(s.timeline.layout.rows, 3);
        assert_eq!(s.timeline.layout.cols, 16);
    }

    #[test]
    fn test_invalid_values() {
        for yaml in [
            "tempo: fast",
            "lyric-mode: karaoke",
            "strategy: eager",
            "press-mode: double",
            "strategy: polling\ntick-ms: 0",
            "display:\n  cols: 4",
            "display:\n  rows: 9",
            "display:\n  rows: 2\n  lyric-row: 2",
            "display:\n  rows: 2\n  lyric-row: 1\n  lyric-rows: 2",
            "recovery-ms: -1",
            "idle-text: [a, b, c]",
            "chords:\n  X: [C4, E4]",
            "chords:\n  X: [C4, E4, H4]",
        ] {
            let result = parse_metadata(yaml);
            assert!(
                matches!(result, Err(KaraokeError::MetadataError(_))),
                "{:?} should be rejected, got {:?}",
                yaml,
                result
            );
        }
    }
}
