//! Fitting lyric text into fixed-width rows.
//!
//! All functions count `char`s and expect transliterated (ASCII) input.

const VOWELS: &str = "aeiouyAEIOUY";

fn is_vowel(c: char) -> bool {
    VOWELS.contains(c)
}

/// Split `text` into chunks of at most `cols` chars.
fn hard_split(text: &str, cols: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(cols.max(1)).map(|c| c.iter().collect()).collect()
}

/// Greedy word wrap. Words longer than a row are split across rows.
///
/// # Examples
/// ```
/// use karaoke::timeline::wrap_words;
///
/// assert_eq!(
///     wrap_words("Ya otpravlyus v dalniy put", 16),
///     vec!["Ya otpravlyus v", "dalniy put"]
/// );
/// ```
pub fn wrap_words(text: &str, cols: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut len = 0;

    for word in text.split_whitespace() {
        for piece in hard_split(word, cols) {
            let piece_len = piece.chars().count();
            let needed = if len == 0 { piece_len } else { len + 1 + piece_len };
            if needed <= cols {
                if len > 0 {
                    line.push(' ');
                }
                line.push_str(&piece);
                len = needed;
            } else {
                lines.push(std::mem::take(&mut line));
                line = piece;
                len = piece_len;
            }
        }
    }
    if len > 0 {
        lines.push(line);
    }
    lines
}

/// Break a Latin word into sung syllables.
///
/// A syllable ends on a vowel that is followed by consonant-vowel, or by two
/// consonants. A vowel followed by a single final consonant keeps it.
///
/// # Examples
/// ```
/// use karaoke::timeline::split_syllables;
///
/// assert_eq!(split_syllables("demony"), vec!["de", "mo", "ny"]);
/// assert_eq!(split_syllables("put"), vec!["put"]);
/// ```
pub fn split_syllables(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let mut out = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        current.push(c);
        if !is_vowel(c) {
            continue;
        }
        let next_is_consonant = chars.get(i + 1).is_some_and(|&n| !is_vowel(n));
        if !next_is_consonant {
            continue;
        }
        let after_is_consonant = chars.get(i + 2).is_some_and(|&n| !is_vowel(n));
        let next_is_last = i + 1 == chars.len() - 1;
        if after_is_consonant || !next_is_last {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    if out.is_empty() && !word.is_empty() {
        out.push(word.to_string());
    }
    out
}

/// Timed units of a phrase: syllables or whole words.
///
/// The last unit of every word except the final one carries a trailing space.
pub fn phrase_units(text: &str, by_syllable: bool) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut units = Vec::new();
    for (w, word) in words.iter().enumerate() {
        let mut parts = if by_syllable {
            split_syllables(word)
        } else {
            vec![word.to_string()]
        };
        if w + 1 < words.len() {
            if let Some(last) = parts.last_mut() {
                last.push(' ');
            }
        }
        units.extend(parts);
    }
    units
}

/// One packed display line and how many units have been sung once it is full.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedLine {
    pub text: String,
    pub units_through: usize,
}

/// Columns left free at the end of a syllable line before breaking early
pub const SYLLABLE_LINE_SLACK: usize = 5;

/// Pack units into lines of at most `cols` chars.
///
/// Units wider than a row are split first; each piece counts as a unit of
/// its own. Trailing spaces are trimmed from the packed lines.
pub fn pack_units(units: &[String], cols: usize) -> Vec<PackedLine> {
    pack(units, cols, None)
}

/// Like [`pack_units`], but a line also ends at the first word end once it
/// is within [`SYLLABLE_LINE_SLACK`] columns of the edge.
pub fn pack_syllables(units: &[String], cols: usize) -> Vec<PackedLine> {
    pack(units, cols, Some(cols.saturating_sub(SYLLABLE_LINE_SLACK)))
}

fn pack(units: &[String], cols: usize, break_at: Option<usize>) -> Vec<PackedLine> {
    let mut expanded = Vec::with_capacity(units.len());
    for unit in units {
        if unit.trim_end().chars().count() > cols {
            expanded.extend(hard_split(unit.trim_end(), cols));
        } else {
            expanded.push(unit.clone());
        }
    }

    let mut lines = Vec::new();
    let mut line = String::new();
    for (i, unit) in expanded.iter().enumerate() {
        let fits = line.chars().count() + unit.trim_end().chars().count() <= cols;
        if !fits && !line.trim().is_empty() {
            lines.push(PackedLine {
                text: line.trim_end().to_string(),
                units_through: i,
            });
            line.clear();
        }
        line.push_str(unit);

        let word_end = unit.ends_with(' ');
        if let Some(limit) = break_at {
            if word_end && line.chars().count() >= limit {
                lines.push(PackedLine {
                    text: line.trim_end().to_string(),
                    units_through: i + 1,
                });
                line.clear();
            }
        }
    }
    if !line.trim().is_empty() {
        lines.push(PackedLine {
            text: line.trim_end().to_string(),
            units_through: expanded.len(),
        });
    }
    lines
}
