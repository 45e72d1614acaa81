use super::*;
use crate::chord::ChordTable;
use crate::error::KaraokeError;
use crate::melody::{generate_melody_seeded, Melody, MelodyConfig, NoteEvent};

/// One C bar per slot at 120 BPM: eighths of 250 ms, slots of 2000 ms
fn melody(slots: usize) -> Melody {
    let bars = vec![vec![Some("C".to_string())]; slots];
    let config = MelodyConfig {
        tempo_bpm: 120.0,
        ..MelodyConfig::default()
    };
    generate_melody_seeded(&bars, &ChordTable::pop_progression(), &config, 0).unwrap()
}

fn lyrics(texts: &[&str]) -> Vec<LyricSegment> {
    texts.iter().map(|t| LyricSegment::new(*t)).collect()
}

fn no_glitch() -> TimelineConfig {
    TimelineConfig {
        glitch_keyword: None,
        ..TimelineConfig::default()
    }
}

fn word_mode(first_row: usize, rows: usize, cols: usize, unit_ms: f64) -> TimelineConfig {
    TimelineConfig {
        layout: LyricLayout {
            first_row,
            rows,
            cols,
        },
        mode: LyricMode::Word { unit_ms },
        ..no_glitch()
    }
}

/// Every non-tone event except `End`, as (due, kind)
fn display_events(timeline: &Timeline) -> Vec<(f64, TimelineEventKind)> {
    timeline
        .iter()
        .filter(|e| !matches!(e.kind, TimelineEventKind::Tone { .. }) && !e.is_end())
        .map(|e| (e.due_ms, e.kind.clone()))
        .collect()
}

fn lyric(row: usize, text: &str) -> TimelineEventKind {
    TimelineEventKind::Lyric {
        row,
        text: text.to_string(),
    }
}

fn assert_well_formed(timeline: &Timeline) {
    let events = timeline.events();
    assert!(events.windows(2).all(|w| w[0].due_ms <= w[1].due_ms));
    assert!(events.last().unwrap().is_end());
    assert_eq!(events.iter().filter(|e| e.is_end()).count(), 1);
}

#[test]
fn test_tones_at_note_starts() {
    let timeline = build_timeline_seeded(&melody(1), &[], &no_glitch(), 0).unwrap();

    assert_eq!(timeline.len(), 9);
    assert_eq!(timeline.tone_count(), 8);
    let dues: Vec<f64> = timeline.iter().map(|e| e.due_ms).collect();
    assert_eq!(
        dues,
        vec![0.0, 250.0, 500.0, 750.0, 1000.0, 1250.0, 1500.0, 1750.0, 2300.0]
    );
    match &timeline.events()[1].kind {
        TimelineEventKind::Tone {
            pitch, duration_ms, ..
        } => {
            assert_eq!(pitch.unwrap().to_string(), "E5");
            assert_eq!(*duration_ms, 250.0);
        }
        other => panic!("expected tone, got {:?}", other),
    }
    assert_eq!(timeline.slots(), 1);
    assert_eq!(timeline.lyric_slots(), 0);
    assert_eq!(timeline.melody_ms(), 2000.0);
}

#[test]
fn test_rest_slots_emit_silence() {
    let config = MelodyConfig {
        tempo_bpm: 120.0,
        ..MelodyConfig::default()
    };
    let melody =
        generate_melody_seeded(&[vec![None]], &ChordTable::pop_progression(), &config, 0).unwrap();
    let timeline = build_timeline_seeded(&melody, &[], &no_glitch(), 0).unwrap();
    assert!(timeline.iter().filter(|e| !e.is_end()).all(|e| matches!(
        e.kind,
        TimelineEventKind::Tone { pitch: None, .. }
    )));
}

#[test]
fn test_empty_melody_still_ends() {
    let timeline = build_timeline_seeded(&Melody::default(), &lyrics(&["x"]), &no_glitch(), 0)
        .unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline.end_ms(), 300.0);
    assert_eq!(timeline.lyric_slots(), 0);
}

#[test]
fn test_phrase_lyric_at_slot_start() {
    let timeline = build_timeline_seeded(
        &melody(2),
        &lyrics(&["hello", "world wide web"]),
        &no_glitch(),
        0,
    )
    .unwrap();

    assert_well_formed(&timeline);
    assert_eq!(
        display_events(&timeline),
        vec![
            (0.0, lyric(0, "hello")),
            (0.0, lyric(1, "")),
            (2000.0, lyric(0, "world wide web")),
            (2000.0, lyric(1, "")),
        ]
    );

    // tone first at the shared instant
    let at_slot: Vec<u8> = timeline
        .iter()
        .filter(|e| e.due_ms == 2000.0)
        .map(|e| e.kind.rank())
        .collect();
    assert_eq!(at_slot, vec![0, 2, 2]);
}

#[test]
fn test_phrase_wraps_and_transliterates() {
    let timeline = build_timeline_seeded(
        &melody(1),
        &lyrics(&["Я отправлюсь в дальний путь"]),
        &no_glitch(),
        0,
    )
    .unwrap();
    assert_eq!(
        display_events(&timeline),
        vec![
            (0.0, lyric(0, "Ya otpravlyus v")),
            (0.0, lyric(1, "dalniy put")),
        ]
    );
}

#[test]
fn test_phrase_overflow_is_dropped() {
    let config = TimelineConfig {
        layout: LyricLayout {
            first_row: 1,
            rows: 1,
            cols: 8,
        },
        ..no_glitch()
    };
    let timeline =
        build_timeline_seeded(&melody(1), &lyrics(&["one two three four"]), &config, 0).unwrap();
    assert_eq!(display_events(&timeline), vec![(0.0, lyric(1, "one two"))]);
}

#[test]
fn test_glitch_precedes_delayed_lyric() {
    let timeline = build_timeline_seeded(
        &melody(2),
        &lyrics(&["plain", "Demony menya"]),
        &TimelineConfig::default(),
        9,
    )
    .unwrap();
    assert_well_formed(&timeline);

    let events = display_events(&timeline);
    let glitch_times: Vec<f64> = events
        .iter()
        .filter(|(_, k)| matches!(k, TimelineEventKind::Glitch { .. }))
        .map(|(t, _)| *t)
        .collect();
    assert_eq!(glitch_times, vec![2000.0, 2100.0, 2200.0]);

    let lyric_time = events
        .iter()
        .find(|(_, k)| *k == lyric(0, "Demony menya"))
        .map(|(t, _)| *t)
        .unwrap();
    assert_eq!(lyric_time, 2300.0);
    assert!(glitch_times.iter().all(|t| *t < lyric_time));

    for (_, kind) in &events {
        if let TimelineEventKind::Glitch { first_row, lines } = kind {
            assert_eq!(*first_row, 0);
            assert_eq!(lines.len(), 2);
            for line in lines {
                assert_eq!(line.chars().count(), 16);
                assert!(line.bytes().all(|b| (32..96).contains(&b)));
            }
        }
    }
}

#[test]
fn test_glitch_keyword_any_case_and_script() {
    for text in ["DEMONY!", "eti demony", "Демоны, демоны"] {
        let timeline =
            build_timeline_seeded(&melody(1), &lyrics(&[text]), &TimelineConfig::default(), 1)
                .unwrap();
        let glitches = timeline
            .iter()
            .filter(|e| matches!(e.kind, TimelineEventKind::Glitch { .. }))
            .count();
        assert_eq!(glitches, 3, "{text:?} should glitch");
    }

    let timeline =
        build_timeline_seeded(&melody(1), &lyrics(&["demons"]), &TimelineConfig::default(), 1)
            .unwrap();
    assert_eq!(display_events(&timeline)[0], (0.0, lyric(0, "demons")));
}

#[test]
fn test_glitch_disabled_without_frames() {
    let config = TimelineConfig {
        glitch_frames: 0,
        ..TimelineConfig::default()
    };
    let timeline = build_timeline_seeded(&melody(1), &lyrics(&["demony"]), &config, 0).unwrap();
    assert_eq!(display_events(&timeline)[0], (0.0, lyric(0, "demony")));
}

#[test]
fn test_glitch_frames_follow_seed() {
    let m = melody(2);
    let l = lyrics(&["demony", "demony"]);
    let config = TimelineConfig::default();
    let a = build_timeline_seeded(&m, &l, &config, 5).unwrap();
    let b = build_timeline_seeded(&m, &l, &config, 5).unwrap();
    let c = build_timeline_seeded(&m, &l, &config, 6).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_segment_offset_shifts_lyric() {
    let segments = vec![
        LyricSegment::new("first"),
        LyricSegment::new("second").with_offset(300.0),
    ];
    let timeline = build_timeline_seeded(&melody(2), &segments, &no_glitch(), 0).unwrap();
    assert!(display_events(&timeline).contains(&(2300.0, lyric(0, "second"))));
}

#[test]
fn test_blank_segment_holds_previous_lyric() {
    let timeline =
        build_timeline_seeded(&melody(3), &lyrics(&["hold me", "  ", "next"]), &no_glitch(), 0)
            .unwrap();
    let dues: Vec<f64> = display_events(&timeline).iter().map(|(due, _)| *due).collect();
    assert_eq!(dues, vec![0.0, 0.0, 4000.0, 4000.0]);
    assert_eq!(timeline.lyric_slots(), 3);
}

#[test]
fn test_end_follows_last_event() {
    let segments = vec![LyricSegment::new("late").with_offset(5000.0)];
    let timeline = build_timeline_seeded(&melody(1), &segments, &no_glitch(), 0).unwrap();
    assert_well_formed(&timeline);
    assert_eq!(timeline.end_ms(), 5300.0);
}

#[test]
fn test_slot_lyric_mismatch_truncates() {
    let more_lyrics =
        build_timeline_seeded(&melody(2), &lyrics(&["a", "b", "c"]), &no_glitch(), 0).unwrap();
    assert_eq!(more_lyrics.lyric_slots(), 2);
    assert!(!display_events(&more_lyrics).contains(&(4000.0, lyric(0, "c"))));

    let more_slots = build_timeline_seeded(&melody(3), &lyrics(&["a"]), &no_glitch(), 0).unwrap();
    assert_eq!(more_slots.slots(), 3);
    assert_eq!(more_slots.lyric_slots(), 1);
    assert_eq!(display_events(&more_slots).len(), 2);
}

#[test]
fn test_word_mode_packs_and_scrolls() {
    let config = word_mode(3, 2, 10, 100.0);
    let timeline = build_timeline_seeded(
        &melody(1),
        &lyrics(&["one two three four five six"]),
        &config,
        0,
    )
    .unwrap();
    assert_well_formed(&timeline);
    assert_eq!(
        display_events(&timeline),
        vec![
            (200.0, lyric(3, "one two")),
            (400.0, lyric(4, "three four")),
            (
                600.0,
                TimelineEventKind::Scroll {
                    first_row: 3,
                    rows: 2,
                }
            ),
            (600.0, lyric(4, "five six")),
        ]
    );
}

#[test]
fn test_syllable_mode_times_each_syllable() {
    let config = TimelineConfig {
        mode: LyricMode::Syllable { unit_ms: 180.0 },
        layout: LyricLayout {
            first_row: 3,
            rows: 5,
            cols: 21,
        },
        ..no_glitch()
    };
    // de-mo-ny me-nya: five syllables on one line
    let timeline =
        build_timeline_seeded(&melody(1), &lyrics(&["demony menya"]), &config, 0).unwrap();
    assert_eq!(display_events(&timeline), vec![(900.0, lyric(3, "demony menya"))]);
}

#[test]
fn test_syllable_lines_end_early_at_word_end() {
    let config = TimelineConfig {
        mode: LyricMode::Syllable { unit_ms: 100.0 },
        layout: LyricLayout {
            first_row: 3,
            rows: 5,
            cols: 16,
        },
        ..no_glitch()
    };
    let timeline = build_timeline_seeded(
        &melody(1),
        &lyrics(&["demony demony demony menya"]),
        &config,
        0,
    )
    .unwrap();
    assert_eq!(
        display_events(&timeline),
        vec![
            (600.0, lyric(3, "demony demony")),
            (1100.0, lyric(4, "demony menya")),
        ]
    );
}

#[test]
fn test_row_cursor_persists_across_slots() {
    let config = word_mode(0, 2, 16, 100.0);
    let timeline = build_timeline_seeded(
        &melody(3),
        &lyrics(&["alpha", "beta", "gamma"]),
        &config,
        0,
    )
    .unwrap();
    assert_eq!(
        display_events(&timeline),
        vec![
            (100.0, lyric(0, "alpha")),
            (2100.0, lyric(1, "beta")),
            (
                4100.0,
                TimelineEventKind::Scroll {
                    first_row: 0,
                    rows: 2,
                }
            ),
            (4100.0, lyric(1, "gamma")),
        ]
    );
}

#[test]
fn test_wrap_mode_glitch_blanks_lyric_area() {
    let config = TimelineConfig {
        glitch_keyword: Some("demony".to_string()),
        ..word_mode(0, 2, 16, 100.0)
    };
    let timeline =
        build_timeline_seeded(&melody(2), &lyrics(&["first", "demony"]), &config, 3).unwrap();
    let events: Vec<(f64, TimelineEventKind)> = display_events(&timeline)
        .into_iter()
        .filter(|(_, k)| !matches!(k, TimelineEventKind::Glitch { .. }))
        .collect();
    assert_eq!(
        events,
        vec![
            (100.0, lyric(0, "first")),
            (2300.0, lyric(0, "")),
            (2300.0, lyric(1, "")),
            (2400.0, lyric(0, "demony")),
        ]
    );
}

#[test]
fn test_overrunning_phrase_delays_next_slot() {
    let config = word_mode(0, 4, 16, 1500.0);
    let timeline =
        build_timeline_seeded(&melody(2), &lyrics(&["a b", "c"]), &config, 0).unwrap();
    assert_eq!(
        display_events(&timeline),
        vec![(3000.0, lyric(0, "a b")), (4500.0, lyric(1, "c"))]
    );
    assert_eq!(timeline.end_ms(), 4800.0);
}

#[test]
fn test_glitch_recovery_past_short_slot_delays_next_phrase() {
    let short_slots: Melody = (0..2).map(|_| NoteEvent::rest(200.0)).collect();
    let config = TimelineConfig {
        notes_per_slot: 1,
        ..TimelineConfig::default()
    };
    let timeline =
        build_timeline_seeded(&short_slots, &lyrics(&["demony", "next"]), &config, 0).unwrap();
    assert_well_formed(&timeline);

    let top_row: Vec<(f64, String)> = display_events(&timeline)
        .into_iter()
        .filter_map(|(due, kind)| match kind {
            TimelineEventKind::Lyric { row: 0, text } => Some((due, text)),
            _ => None,
        })
        .collect();
    assert_eq!(
        top_row,
        vec![(300.0, "demony".to_string()), (300.0, "next".to_string())]
    );
}

#[test]
fn test_invalid_configs_rejected() {
    let configs = vec![
        TimelineConfig {
            notes_per_slot: 0,
            ..TimelineConfig::default()
        },
        TimelineConfig {
            layout: LyricLayout {
                first_row: 0,
                rows: 0,
                cols: 16,
            },
            ..TimelineConfig::default()
        },
        TimelineConfig {
            recovery_ms: 0.0,
            ..TimelineConfig::default()
        },
        TimelineConfig {
            glitch_keyword: Some("  ".to_string()),
            ..TimelineConfig::default()
        },
        word_mode(0, 2, 16, 0.0),
    ];
    for config in configs {
        assert!(matches!(
            build_timeline_seeded(&melody(1), &[], &config, 0),
            Err(KaraokeError::ConfigError(_))
        ));
    }
}

#[test]
fn test_manual_timeline_validation() {
    let tone = |due| {
        TimelineEvent::new(
            due,
            TimelineEventKind::Tone {
                pitch: None,
                duration_ms: 10.0,
                dynamic: None,
            },
        )
    };
    let end = |due| TimelineEvent::new(due, TimelineEventKind::End);

    let ok = Timeline::new(vec![tone(0.0), tone(10.0), end(20.0)]).unwrap();
    assert_eq!(ok.melody_ms(), 20.0);
    assert_eq!(ok.end_ms(), 20.0);

    assert!(Timeline::new(vec![]).is_err());
    assert!(Timeline::new(vec![tone(0.0)]).is_err());
    assert!(Timeline::new(vec![tone(10.0), tone(0.0), end(20.0)]).is_err());
    assert!(Timeline::new(vec![end(0.0), end(1.0)]).is_err());
    assert!(Timeline::new(vec![tone(-1.0), end(1.0)]).is_err());
}

#[test]
fn test_timeline_serializes_camel_case() {
    let timeline =
        build_timeline_seeded(&melody(1), &lyrics(&["hi"]), &no_glitch(), 0).unwrap();
    let json = serde_json::to_string(&timeline).unwrap();
    assert!(json.contains(r#""dueMs":0.0"#));
    assert!(json.contains(r#""type":"tone""#));
    assert!(json.contains(r#""pitch":"C5""#));
    assert!(json.contains(r#""durationMs":250.0"#));
    assert!(json.contains(r#""type":"lyric","row":0,"text":"hi""#));
    assert!(json.contains(r#""type":"end""#));
    assert!(json.contains(r#""lyricSlots":1"#));
}
