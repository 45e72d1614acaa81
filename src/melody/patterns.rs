//! Arpeggio, rhythm and dynamic pattern tables

use crate::error::KaraokeError;
use rand::Rng;

/// Root, third, fifth, third, twice over: one bar of eighths per chord
pub const DEFAULT_ARPEGGIO: [usize; 8] = [0, 1, 2, 1, 0, 1, 2, 1];

/// Indices into a chord's three pitches, one per step.
#[derive(Debug, Clone, PartialEq)]
pub struct ArpeggioPattern(pub Vec<usize>);

/// Per-step duration multipliers, in eighth notes.
#[derive(Debug, Clone, PartialEq)]
pub struct RhythmPattern(pub Vec<f64>);

/// Per-step dynamic levels in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicPattern(pub Vec<f32>);

impl Default for ArpeggioPattern {
    fn default() -> Self {
        Self(DEFAULT_ARPEGGIO.to_vec())
    }
}

/// A pattern with a selection weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Weighted<T> {
    pub pattern: T,
    pub weight: u32,
}

impl<T> Weighted<T> {
    pub fn new(pattern: T, weight: u32) -> Self {
        Self { pattern, weight }
    }

    /// A table with a single entry always picks it.
    pub fn only(pattern: T) -> Vec<Self> {
        vec![Self::new(pattern, 1)]
    }
}

/// Selection probability of each entry: `weight / Σ weights`.
///
/// # Examples
/// ```
/// use karaoke::melody::{probabilities, RhythmPattern, Weighted};
///
/// let table = vec![
///     Weighted::new(RhythmPattern(vec![1.0; 8]), 3),
///     Weighted::new(RhythmPattern(vec![2.0; 8]), 1),
/// ];
/// assert_eq!(probabilities(&table), vec![0.75, 0.25]);
/// ```
pub fn probabilities<T>(table: &[Weighted<T>]) -> Vec<f64> {
    let total: u64 = table.iter().map(|w| w.weight as u64).sum();
    if total == 0 {
        return vec![0.0; table.len()];
    }
    table
        .iter()
        .map(|w| w.weight as f64 / total as f64)
        .collect()
}

/// Weighted roll. Single-entry tables do not consume randomness.
pub(crate) fn choose<'a, T, R: Rng + ?Sized>(table: &'a [Weighted<T>], rng: &mut R) -> Option<&'a T> {
    match table {
        [] => None,
        [only] => Some(&only.pattern),
        _ => {
            let total: u32 = table.iter().map(|w| w.weight).sum();
            if total == 0 {
                return None;
            }
            let mut roll = rng.gen_range(0..total);
            for entry in table {
                if roll < entry.weight {
                    return Some(&entry.pattern);
                }
                roll -= entry.weight;
            }
            None
        }
    }
}

/// Everything the melody generator needs besides the progression itself.
///
/// The arpeggio table must not be empty. Rhythm and dynamic tables may be
/// empty, meaning plain eighths and no dynamics. Every pattern in every table
/// has the same length, which is the number of notes per chord slot.
#[derive(Debug, Clone, PartialEq)]
pub struct MelodyConfig {
    pub tempo_bpm: f64,
    pub octave_shift: i8,
    pub arpeggios: Vec<Weighted<ArpeggioPattern>>,
    pub rhythms: Vec<Weighted<RhythmPattern>>,
    pub dynamics: Vec<Weighted<DynamicPattern>>,
    pub avoid_repeats: bool,
}

impl Default for MelodyConfig {
    fn default() -> Self {
        Self {
            tempo_bpm: 120.0,
            octave_shift: 0,
            arpeggios: Weighted::only(ArpeggioPattern::default()),
            rhythms: Vec::new(),
            dynamics: Vec::new(),
            avoid_repeats: false,
        }
    }
}

impl MelodyConfig {
    /// Notes emitted for each chord or rest slot
    pub fn steps_per_slot(&self) -> usize {
        self.arpeggios.first().map_or(0, |a| a.pattern.0.len())
    }

    pub fn validate(&self) -> Result<(), KaraokeError> {
        let bad = |msg: String| Err(KaraokeError::ConfigError(msg));

        if !(self.tempo_bpm.is_finite() && self.tempo_bpm > 0.0) {
            return bad(format!("tempo must be a positive number, got {}", self.tempo_bpm));
        }
        let steps = self.steps_per_slot();
        if steps == 0 {
            return bad("at least one non-empty arpeggio pattern is required".to_string());
        }

        for entry in &self.arpeggios {
            if entry.pattern.0.len() != steps {
                return bad(format!(
                    "arpeggio patterns must all have {} steps, found one with {}",
                    steps,
                    entry.pattern.0.len()
                ));
            }
            if let Some(idx) = entry.pattern.0.iter().find(|&&i| i > 2) {
                return bad(format!("arpeggio index {} is outside the triad (0-2)", idx));
            }
        }
        for entry in &self.rhythms {
            if entry.pattern.0.len() != steps {
                return bad(format!(
                    "rhythm patterns must have {} steps, found one with {}",
                    steps,
                    entry.pattern.0.len()
                ));
            }
            if entry.pattern.0.iter().any(|m| !(m.is_finite() && *m > 0.0)) {
                return bad("rhythm multipliers must be positive".to_string());
            }
        }
        for entry in &self.dynamics {
            if entry.pattern.0.len() != steps {
                return bad(format!(
                    "dynamic patterns must have {} steps, found one with {}",
                    steps,
                    entry.pattern.0.len()
                ));
            }
            if entry.pattern.0.iter().any(|l| !(0.0..=1.0).contains(l)) {
                return bad("dynamic levels must be within 0..1".to_string());
            }
        }

        check_weights("arpeggio", &self.arpeggios)?;
        check_weights("rhythm", &self.rhythms)?;
        check_weights("dynamic", &self.dynamics)?;

        Ok(())
    }
}

fn check_weights<T>(table_name: &str, table: &[Weighted<T>]) -> Result<(), KaraokeError> {
    let total: u64 = table.iter().map(|w| w.weight as u64).sum();
    if !table.is_empty() && total == 0 {
        return Err(KaraokeError::ConfigError(format!(
            "{} weights must sum to more than zero",
            table_name
        )));
    }
    if total > u32::MAX as u64 {
        return Err(KaraokeError::ConfigError(format!(
            "{} weights are too large",
            table_name
        )));
    }
    Ok(())
}
