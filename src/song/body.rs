//! Song body: one bar per line, chords then lyrics.

use crate::error::KaraokeError;
use crate::melody::Bar;

/// Bars and their lyric phrases, one phrase per chord slot.
///
/// Slots without a phrase get an empty string, which holds the previous
/// lyric on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Body {
    pub bars: Vec<Bar>,
    pub phrases: Vec<String>,
}

/// Whitespace-separated tokens with their byte offsets
fn tokens(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                out.push((s, &text[s..idx]));
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        out.push((s, &text[s..]));
    }
    out
}

/// 1-indexed character column of a byte offset
fn column(line: &str, byte_offset: usize) -> usize {
    line[..byte_offset].chars().count() + 1
}

fn parse_slot(token: &str, line_num: usize, col: usize) -> Result<Option<String>, KaraokeError> {
    if token == "_" || token == "-" {
        return Ok(None);
    }
    match token.chars().next() {
        Some('A'..='G') => Ok(Some(token.to_string())),
        _ => Err(KaraokeError::ParseError {
            line: line_num,
            column: col,
            message: format!("Expected a chord symbol or rest, found '{}'", token),
        }),
    }
}

/// Parse body lines given as `(line_number, text)` pairs, 1-indexed.
pub(crate) fn parse_body<'a, I>(lines: I) -> Result<Body, KaraokeError>
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    let mut body = Body::default();

    for (line_num, line) in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (chord_part, lyric_part) = match line.find('|') {
            Some(bar_pos) => (&line[..bar_pos], Some((bar_pos, &line[bar_pos + 1..]))),
            None => (line, None),
        };

        let mut bar: Bar = Vec::new();
        for (offset, token) in tokens(chord_part) {
            bar.push(parse_slot(token, line_num, column(line, offset))?);
        }
        if bar.is_empty() {
            return Err(KaraokeError::ParseError {
                line: line_num,
                column: column(line, line.len() - line.trim_start().len()),
                message: "Expected at least one chord slot before '|'".to_string(),
            });
        }

        let mut phrases: Vec<String> = match lyric_part {
            Some((_, text)) if !text.trim().is_empty() => {
                text.split('/').map(|p| p.trim().to_string()).collect()
            }
            _ => Vec::new(),
        };
        if phrases.len() > bar.len() {
            let bar_pos = lyric_part.map_or(0, |(pos, _)| pos);
            return Err(KaraokeError::ParseError {
                line: line_num,
                column: column(line, bar_pos) + 1,
                message: format!(
                    "{} lyric phrases for {} chord slots",
                    phrases.len(),
                    bar.len()
                ),
            });
        }
        phrases.resize(bar.len(), String::new());

        body.bars.push(bar);
        body.phrases.extend(phrases);
    }

    Ok(body)
}
