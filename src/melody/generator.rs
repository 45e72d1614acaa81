//! Chord progression → note sequence

use super::patterns::{choose, MelodyConfig};
use super::types::{eighth_note_ms, Bar, Melody, NoteEvent};
use crate::chord::{ChordTable, Triad};
use crate::error::KaraokeError;
use crate::pitch::Pitch;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A slot after chord lookup and octave shift.
enum ResolvedSlot {
    Rest,
    Chord(Triad),
}

/// Expand bars of chord slots into a melody.
///
/// Every chord symbol is resolved before anything is emitted, so an unknown
/// symbol fails the whole call with [`KaraokeError::UnknownChord`] (bar and
/// slot are 1-indexed). Shifting a chord out of the octave range fails with
/// [`KaraokeError::InvalidPitch`].
///
/// Each slot contributes exactly `config.steps_per_slot()` events; rest slots
/// contribute that many eighth-note rests.
pub fn generate_melody<R: Rng + ?Sized>(
    bars: &[Bar],
    chords: &ChordTable,
    config: &MelodyConfig,
    rng: &mut R,
) -> Result<Melody, KaraokeError> {
    config.validate()?;
    let resolved = resolve_slots(bars, chords, config.octave_shift)?;

    let eighth = eighth_note_ms(config.tempo_bpm);
    let steps = config.steps_per_slot();
    let mut events = Vec::with_capacity(resolved.len() * steps);
    let mut previous: Option<Pitch> = None;

    for slot in resolved {
        let triad = match slot {
            ResolvedSlot::Rest => {
                events.extend((0..steps).map(|_| NoteEvent::rest(eighth)));
                previous = None;
                continue;
            }
            ResolvedSlot::Chord(triad) => triad,
        };

        let arpeggio = match choose(&config.arpeggios, rng) {
            Some(pattern) => pattern,
            None => {
                return Err(KaraokeError::ConfigError(
                    "no arpeggio pattern could be selected".to_string(),
                ))
            }
        };
        let rhythm = choose(&config.rhythms, rng);
        let dynamics = choose(&config.dynamics, rng);

        for (step, &index) in arpeggio.0.iter().enumerate() {
            let mut pitch = triad[index];
            if config.avoid_repeats && previous == Some(pitch) {
                pitch = different_tone(&triad, pitch, rng);
            }
            let factor = rhythm.map_or(1.0, |r| r.0[step]);
            events.push(NoteEvent {
                pitch: Some(pitch),
                duration_ms: eighth * factor,
                dynamic: dynamics.map(|d| d.0[step]),
            });
            previous = Some(pitch);
        }
    }

    Ok(Melody::new(events))
}

/// [`generate_melody`] with a ChaCha8 generator seeded from `seed`.
///
/// The same bars, table, config and seed always give the same melody.
pub fn generate_melody_seeded(
    bars: &[Bar],
    chords: &ChordTable,
    config: &MelodyConfig,
    seed: u64,
) -> Result<Melody, KaraokeError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    generate_melody(bars, chords, config, &mut rng)
}

fn resolve_slots(
    bars: &[Bar],
    chords: &ChordTable,
    octave_shift: i8,
) -> Result<Vec<ResolvedSlot>, KaraokeError> {
    let mut resolved = Vec::new();
    for (bar_idx, bar) in bars.iter().enumerate() {
        for (slot_idx, slot) in bar.iter().enumerate() {
            let symbol = match slot {
                None => {
                    resolved.push(ResolvedSlot::Rest);
                    continue;
                }
                Some(symbol) => symbol,
            };
            let triad = chords
                .lookup(symbol)
                .ok_or_else(|| KaraokeError::UnknownChord {
                    symbol: symbol.clone(),
                    bar: bar_idx + 1,
                    slot: slot_idx + 1,
                })?;
            let shifted = [
                triad[0].transpose_octaves(octave_shift)?,
                triad[1].transpose_octaves(octave_shift)?,
                triad[2].transpose_octaves(octave_shift)?,
            ];
            resolved.push(ResolvedSlot::Chord(shifted));
        }
    }
    Ok(resolved)
}

/// Pick a chord tone other than `avoid`. Falls back to `avoid` when every
/// voice of the triad is the same pitch.
fn different_tone<R: Rng + ?Sized>(triad: &Triad, avoid: Pitch, rng: &mut R) -> Pitch {
    let others: Vec<Pitch> = triad.iter().copied().filter(|p| *p != avoid).collect();
    if others.is_empty() {
        return avoid;
    }
    others[rng.gen_range(0..others.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melody::{ArpeggioPattern, DynamicPattern, RhythmPattern, Weighted};

    fn bar(symbols: &[&str]) -> Bar {
        symbols
            .iter()
            .map(|s| match *s {
                "_" => None,
                other => Some(other.to_string()),
            })
            .collect()
    }

    fn pitches(melody: &Melody) -> Vec<String> {
        melody
            .iter()
            .map(|e| e.pitch.map_or("-".to_string(), |p| p.to_string()))
            .collect()
    }

    fn config_at(bpm: f64) -> MelodyConfig {
        MelodyConfig {
            tempo_bpm: bpm,
            ..MelodyConfig::default()
        }
    }

    #[test]
    fn test_single_c_bar_at_148_bpm() {
        let melody = generate_melody_seeded(
            &[bar(&["C"])],
            &ChordTable::pop_progression(),
            &config_at(148.0),
            1,
        )
        .unwrap();

        assert_eq!(
            pitches(&melody),
            vec!["C5", "E5", "G5", "E5", "C5", "E5", "G5", "E5"]
        );
        for event in melody.iter() {
            assert!((event.duration_ms - 202.7).abs() < 0.05);
            assert!(event.dynamic.is_none());
        }
        assert!((melody.total_duration_ms() - 8.0 * 60_000.0 / 296.0).abs() < 1e-6);
    }

    #[test]
    fn test_length_counts_rest_slots() {
        let bars = vec![bar(&["C", "Am"]), bar(&["_", "G"]), bar(&["Em"])];
        let melody =
            generate_melody_seeded(&bars, &ChordTable::pop_progression(), &config_at(120.0), 7)
                .unwrap();

        assert_eq!(melody.len(), 5 * 8);
        let rest_block = &melody.events()[16..24];
        assert!(rest_block.iter().all(|e| e.is_rest()));
        assert!(rest_block.iter().all(|e| e.duration_ms == 250.0));
        assert!(!melody.events()[24].is_rest());
    }

    #[test]
    fn test_empty_progression() {
        let melody =
            generate_melody_seeded(&[], &ChordTable::pop_progression(), &config_at(120.0), 0)
                .unwrap();
        assert!(melody.is_empty());
        assert_eq!(melody.total_duration_ms(), 0.0);
    }

    #[test]
    fn test_unknown_chord_fails_fast() {
        let bars = vec![bar(&["C", "Am"]), bar(&["Em", "Dm"])];
        let result =
            generate_melody_seeded(&bars, &ChordTable::pop_progression(), &config_at(120.0), 0);
        assert_eq!(
            result,
            Err(KaraokeError::UnknownChord {
                symbol: "Dm".to_string(),
                bar: 2,
                slot: 2,
            })
        );
    }

    #[test]
    fn test_derived_voicings_resolve_missing_chords() {
        let table = ChordTable::pop_progression().with_derived_voicings(true);
        let melody = generate_melody_seeded(&[bar(&["Dm"])], &table, &config_at(120.0), 0).unwrap();
        assert_eq!(&pitches(&melody)[..3], &["D4", "F4", "A4"]);
    }

    #[test]
    fn test_octave_shift_lowers_every_note() {
        let config = MelodyConfig {
            octave_shift: -1,
            ..config_at(148.0)
        };
        let melody =
            generate_melody_seeded(&[bar(&["C"])], &ChordTable::pop_progression(), &config, 0)
                .unwrap();
        assert_eq!(
            pitches(&melody),
            vec!["C4", "E4", "G4", "E4", "C4", "E4", "G4", "E4"]
        );
    }

    #[test]
    fn test_octave_shift_out_of_range() {
        let config = MelodyConfig {
            octave_shift: 5,
            ..config_at(120.0)
        };
        let result =
            generate_melody_seeded(&[bar(&["C"])], &ChordTable::pop_progression(), &config, 0);
        assert!(matches!(result, Err(KaraokeError::InvalidPitch(_))));
    }

    #[test]
    fn test_same_seed_same_melody() {
        let config = MelodyConfig {
            arpeggios: vec![
                Weighted::new(ArpeggioPattern(vec![0, 1, 2, 1, 0, 1, 2, 1]), 2),
                Weighted::new(ArpeggioPattern(vec![2, 1, 0, 1, 2, 1, 0, 1]), 1),
                Weighted::new(ArpeggioPattern(vec![0, 0, 1, 1, 2, 2, 1, 1]), 1),
            ],
            avoid_repeats: true,
            ..config_at(148.0)
        };
        let bars = vec![bar(&["C", "Am", "Em", "G"]); 4];
        let table = ChordTable::pop_progression();

        let a = generate_melody_seeded(&bars, &table, &config, 42).unwrap();
        let b = generate_melody_seeded(&bars, &table, &config, 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16 * 8);
    }

    #[test]
    fn test_avoid_repeats_never_repeats_within_chord() {
        let config = MelodyConfig {
            arpeggios: Weighted::only(ArpeggioPattern(vec![0, 0, 0, 0, 1, 1, 2, 2])),
            avoid_repeats: true,
            ..config_at(120.0)
        };
        let table = ChordTable::pop_progression();
        let bars = vec![bar(&["C", "Am", "G"])];
        for seed in 0..20 {
            let melody = generate_melody_seeded(&bars, &table, &config, seed).unwrap();
            for pair in melody.events().windows(2) {
                assert_ne!(pair[0].pitch, pair[1].pitch, "seed {seed}");
            }
        }
    }

    #[test]
    fn test_repeats_allowed_by_default() {
        let config = MelodyConfig {
            arpeggios: Weighted::only(ArpeggioPattern(vec![0, 0])),
            ..config_at(120.0)
        };
        let melody =
            generate_melody_seeded(&[bar(&["C"])], &ChordTable::pop_progression(), &config, 0)
                .unwrap();
        assert_eq!(pitches(&melody), vec!["C5", "C5"]);
    }

    #[test]
    fn test_rhythm_and_dynamics_apply_per_step() {
        let config = MelodyConfig {
            arpeggios: Weighted::only(ArpeggioPattern(vec![0, 1, 2, 1])),
            rhythms: Weighted::only(RhythmPattern(vec![2.0, 1.0, 0.5, 0.5])),
            dynamics: Weighted::only(DynamicPattern(vec![1.0, 0.5, 0.5, 0.25])),
            ..config_at(120.0)
        };
        let melody =
            generate_melody_seeded(&[bar(&["Am"])], &ChordTable::pop_progression(), &config, 0)
                .unwrap();

        let durations: Vec<f64> = melody.iter().map(|e| e.duration_ms).collect();
        assert_eq!(durations, vec![500.0, 250.0, 125.0, 125.0]);
        let dynamics: Vec<Option<f32>> = melody.iter().map(|e| e.dynamic).collect();
        assert_eq!(dynamics, vec![Some(1.0), Some(0.5), Some(0.5), Some(0.25)]);
        assert_eq!(melody.start_times(), vec![0.0, 500.0, 750.0, 875.0]);
    }

    #[test]
    fn test_weighted_choice_respects_zero_weight() {
        let config = MelodyConfig {
            arpeggios: vec![
                Weighted::new(ArpeggioPattern(vec![0, 0]), 0),
                Weighted::new(ArpeggioPattern(vec![2, 2]), 5),
            ],
            ..config_at(120.0)
        };
        let bars = vec![bar(&["C"]); 10];
        let melody =
            generate_melody_seeded(&bars, &ChordTable::pop_progression(), &config, 3).unwrap();
        assert!(melody.iter().all(|e| e.pitch.unwrap().to_string() == "G5"));
    }

    #[test]
    fn test_invalid_configs() {
        let table = ChordTable::pop_progression();
        let bars = vec![bar(&["C"])];
        let cases = vec![
            config_at(0.0),
            MelodyConfig {
                arpeggios: Vec::new(),
                ..config_at(120.0)
            },
            MelodyConfig {
                arpeggios: Weighted::only(ArpeggioPattern(vec![0, 3])),
                ..config_at(120.0)
            },
            MelodyConfig {
                rhythms: Weighted::only(RhythmPattern(vec![1.0; 3])),
                ..config_at(120.0)
            },
            MelodyConfig {
                rhythms: Weighted::only(RhythmPattern(vec![0.0; 8])),
                ..config_at(120.0)
            },
            MelodyConfig {
                dynamics: Weighted::only(DynamicPattern(vec![1.5; 8])),
                ..config_at(120.0)
            },
            MelodyConfig {
                arpeggios: vec![Weighted::new(ArpeggioPattern::default(), 0)],
                ..config_at(120.0)
            },
        ];
        for config in cases {
            assert!(
                matches!(
                    generate_melody_seeded(&bars, &table, &config, 0),
                    Err(KaraokeError::ConfigError(_))
                ),
                "{config:?} should be rejected"
            );
        }
    }
}
