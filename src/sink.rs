//! Output device seams: the piezo and the character display.
//!
//! The library never talks to hardware directly. A board binding implements
//! [`ToneSink`] and [`DisplaySink`]; the recording sinks here back the tests
//! and the terminal player.

use crate::error::KaraokeError;

/// A single-voice tone generator.
pub trait ToneSink {
    /// Start `frequency_hz`; the tone stops by itself after `duration_ms`.
    fn set_tone(&mut self, frequency_hz: f64, duration_ms: u64);
    fn silence(&mut self);
}

/// A character display addressed by row.
///
/// `write_line` receives a full-width, printable ASCII row. Nothing is
/// guaranteed visible until `present` returns.
pub trait DisplaySink {
    fn write_line(&mut self, row: usize, text: &str) -> Result<(), KaraokeError>;
    fn present(&mut self) -> Result<(), KaraokeError>;

    /// Bring the device back to a known state after a failed write.
    fn reset(&mut self) -> Result<(), KaraokeError> {
        Ok(())
    }
}

/// What a [`RecordingTone`] was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum ToneCall {
    Tone { frequency_hz: f64, duration_ms: u64 },
    Silence,
}

/// Keeps every tone call for inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingTone {
    pub calls: Vec<ToneCall>,
}

impl RecordingTone {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the `set_tone` calls
    pub fn tones(&self) -> Vec<(f64, u64)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ToneCall::Tone {
                    frequency_hz,
                    duration_ms,
                } => Some((*frequency_hz, *duration_ms)),
                ToneCall::Silence => None,
            })
            .collect()
    }
}

impl ToneSink for RecordingTone {
    fn set_tone(&mut self, frequency_hz: f64, duration_ms: u64) {
        self.calls.push(ToneCall::Tone {
            frequency_hz,
            duration_ms,
        });
    }

    fn silence(&mut self) {
        self.calls.push(ToneCall::Silence);
    }
}

/// An in-memory display that remembers what reached the device.
///
/// `fail_writes` makes the next N `write_line` calls fail, to exercise fault
/// recovery.
#[derive(Debug, Clone)]
pub struct MemoryDisplay {
    pub rows: Vec<String>,
    pub writes: Vec<(usize, String)>,
    pub presents: usize,
    pub resets: usize,
    pub fail_writes: usize,
}

impl MemoryDisplay {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows: vec![" ".repeat(cols); rows],
            writes: Vec::new(),
            presents: 0,
            resets: 0,
            fail_writes: 0,
        }
    }

    pub fn row(&self, row: usize) -> &str {
        self.rows.get(row).map_or("", |r| r.as_str())
    }
}

impl DisplaySink for MemoryDisplay {
    fn write_line(&mut self, row: usize, text: &str) -> Result<(), KaraokeError> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(KaraokeError::DisplayIo(format!("row {} write refused", row)));
        }
        let slot = self
            .rows
            .get_mut(row)
            .ok_or_else(|| KaraokeError::DisplayIo(format!("no row {}", row)))?;
        *slot = text.to_string();
        self.writes.push((row, text.to_string()));
        Ok(())
    }

    fn present(&mut self) -> Result<(), KaraokeError> {
        self.presents += 1;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), KaraokeError> {
        self.resets += 1;
        let cols = self.rows.first().map_or(0, |r| r.len());
        for row in &mut self.rows {
            *row = " ".repeat(cols);
        }
        Ok(())
    }
}
