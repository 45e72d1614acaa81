//! # Error Types
//!
//! This module defines all error types for the karaoke player.
//!
//! Configuration problems are fatal and surface before any tone or display
//! output happens: a song either builds completely or not at all. Display bus
//! faults are the only runtime errors, and they never leave the display
//! buffer (it logs them and repaints after a reset).
//!
//! ## Error Types
//! - `ParseError` - Song body syntax errors with line and column information
//! - `MetadataError` - Invalid YAML frontmatter
//! - `InvalidPitch` - A pitch string that is not `[A-G][#b]?[0-9]`
//! - `UnknownChord` - A progression slot names a chord that is not in the table
//! - `ConfigError` - Inconsistent tables or geometry
//! - `DisplayIo` - A display sink failed to write (recovered locally)
//!
//! ## Usage
//! ```rust
//! use karaoke::{parse_song, KaraokeError};
//!
//! match parse_song("C Am | hello / world") {
//!     Ok(song) => println!("{} bars", song.bars.len()),
//!     Err(KaraokeError::ParseError { line, column, message }) => {
//!         eprintln!("Parse error at {}:{}: {}", line, column, message);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KaraokeError {
    /// Parse error with location information.
    ///
    /// # Example
    /// ```
    /// # use karaoke::KaraokeError;
    /// let err = KaraokeError::ParseError {
    ///     line: 5,
    ///     column: 3,
    ///     message: "Expected a chord symbol".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Parse error at line 5, column 3: Expected a chord symbol");
    /// ```
    #[error("Parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Invalid metadata error.
    ///
    /// Occurs when the YAML frontmatter is malformed or holds unsupported values.
    #[error("Invalid metadata: {0}")]
    MetadataError(String),

    /// A pitch string that does not match letter + optional accidental + octave digit,
    /// or a transposition that leaves the octave range 0..=9.
    ///
    /// # Example
    /// ```
    /// # use karaoke::KaraokeError;
    /// let err = KaraokeError::InvalidPitch("H4".to_string());
    /// assert_eq!(err.to_string(), "Invalid pitch: H4");
    /// ```
    #[error("Invalid pitch: {0}")]
    InvalidPitch(String),

    /// A chord symbol with no entry in the chord table.
    ///
    /// `bar` and `slot` are 1-indexed positions in the progression.
    #[error("Unknown chord '{symbol}' at bar {bar}, slot {slot}")]
    UnknownChord {
        symbol: String,
        bar: usize,
        slot: usize,
    },

    /// Inconsistent configuration (pattern lengths, geometry, weights).
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A display write failed. Sinks return this; the display buffer absorbs it.
    #[error("Display write failed: {0}")]
    DisplayIo(String),
}

impl KaraokeError {
    /// True for the errors that must stop a song from being built.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, KaraokeError::DisplayIo(_))
    }
}
