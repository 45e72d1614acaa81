//! Batched character-display writes.
//!
//! The display bus is slow and shares time with the piezo, so row writes are
//! never sent immediately. [`DisplayBuffer`] keeps the intended grid, tracks
//! which rows changed, and sends only those rows when the owner calls
//! [`DisplayBuffer::flush`]. The owner arms a single flush timer
//! `coalesce_ms` after the first change; writes made before it fires join the
//! same batch.
//!
//! Sink failures stay inside the buffer. They are logged, every row is marked
//! dirty, and the next flush resets the device before repainting.

use crate::error::KaraokeError;
use crate::sink::DisplaySink;
use crate::translit::transliterate;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Default delay between the first dirty write and the flush
pub const DEFAULT_COALESCE_MS: u64 = 8;

/// Rows and columns of a character display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayGeometry {
    pub rows: usize,
    pub cols: usize,
}

impl DisplayGeometry {
    /// HD44780 character LCD
    pub const LCD_16X2: DisplayGeometry = DisplayGeometry { rows: 2, cols: 16 };
    /// 128x64 SSD1306 with a 6x8 font cell
    pub const OLED_21X8: DisplayGeometry = DisplayGeometry { rows: 8, cols: 21 };
}

/// Result of a [`DisplayBuffer::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was dirty
    Clean,
    /// This many rows were sent and presented
    Flushed(usize),
    /// The sink failed; everything will be repainted on the next flush, which
    /// the owner has to arm
    Failed,
}

pub struct DisplayBuffer<D> {
    sink: D,
    geometry: DisplayGeometry,
    grid: Vec<String>,
    dirty: BTreeSet<usize>,
    flush_pending: bool,
    needs_reset: bool,
    coalesce_ms: u64,
}

impl<D: DisplaySink> DisplayBuffer<D> {
    /// Buffer for a blank display. Nothing is sent until the first flush.
    pub fn new(sink: D, geometry: DisplayGeometry) -> Self {
        Self {
            sink,
            geometry,
            grid: vec![" ".repeat(geometry.cols); geometry.rows],
            dirty: BTreeSet::new(),
            flush_pending: false,
            needs_reset: false,
            coalesce_ms: DEFAULT_COALESCE_MS,
        }
    }

    pub fn with_coalesce_ms(mut self, coalesce_ms: u64) -> Self {
        self.coalesce_ms = coalesce_ms;
        self
    }

    pub fn geometry(&self) -> DisplayGeometry {
        self.geometry
    }

    pub fn coalesce_ms(&self) -> u64 {
        self.coalesce_ms
    }

    /// A flush timer is armed and has not fired yet
    pub fn is_flush_pending(&self) -> bool {
        self.flush_pending
    }

    pub fn dirty_rows(&self) -> usize {
        self.dirty.len()
    }

    /// Intended content of `row`, always exactly `cols` chars
    pub fn row(&self, row: usize) -> Option<&str> {
        self.grid.get(row).map(|r| r.as_str())
    }

    pub fn rows(&self) -> &[String] {
        &self.grid
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut D {
        &mut self.sink
    }

    pub fn into_sink(self) -> D {
        self.sink
    }

    /// Fit text to one display row: transliterated, printable, padded or
    /// clipped to the column count.
    pub fn normalize(&self, text: &str) -> String {
        let mut line: String = transliterate(text)
            .chars()
            .map(|c| if c.is_ascii_graphic() { c } else { ' ' })
            .take(self.geometry.cols)
            .collect();
        let len = line.chars().count();
        line.extend(std::iter::repeat(' ').take(self.geometry.cols - len));
        line
    }

    /// Set the content of one row.
    ///
    /// Returns `true` when the caller must arm a flush timer, which is only
    /// for the first change while no flush is pending. Unchanged content and
    /// rows outside the display are no-ops.
    pub fn write_row(&mut self, row: usize, text: &str) -> bool {
        if row >= self.geometry.rows {
            debug!(row, rows = self.geometry.rows, "ignoring write outside the display");
            return false;
        }
        let line = self.normalize(text);
        if self.grid[row] == line {
            return false;
        }
        self.grid[row] = line;
        self.dirty.insert(row);
        self.request_flush()
    }

    /// Blank every row from `from_row` to the bottom.
    pub fn clear(&mut self, from_row: usize) -> bool {
        let mut arm = false;
        for row in from_row..self.geometry.rows {
            arm |= self.write_row(row, "");
        }
        arm
    }

    /// Shift `rows` rows starting at `first_row` up by one and blank the
    /// bottom row of the region. The region is clipped to the display.
    pub fn scroll_up(&mut self, first_row: usize, rows: usize) -> bool {
        let end = first_row.saturating_add(rows).min(self.geometry.rows);
        if first_row >= end {
            return false;
        }
        let mut arm = false;
        for row in first_row..end - 1 {
            let below = self.grid[row + 1].clone();
            arm |= self.write_row(row, &below);
        }
        arm |= self.write_row(end - 1, "");
        arm
    }

    /// Mark every row dirty so the next flush repaints the whole display.
    pub fn force_repaint(&mut self) -> bool {
        self.dirty.extend(0..self.geometry.rows);
        self.request_flush()
    }

    fn request_flush(&mut self) -> bool {
        if self.flush_pending {
            return false;
        }
        self.flush_pending = true;
        true
    }

    /// Send all dirty rows, then present.
    ///
    /// Called when the flush timer fires. After a failure the device is reset
    /// before anything else is written.
    pub fn flush(&mut self) -> FlushOutcome {
        self.flush_pending = false;

        if self.needs_reset {
            if let Err(err) = self.sink.reset() {
                self.fault(err);
                return FlushOutcome::Failed;
            }
            self.needs_reset = false;
        }

        if self.dirty.is_empty() {
            return FlushOutcome::Clean;
        }

        let rows: Vec<usize> = self.dirty.iter().copied().collect();
        for row in rows {
            if let Err(err) = self.sink.write_line(row, &self.grid[row]) {
                self.fault(err);
                return FlushOutcome::Failed;
            }
        }
        if let Err(err) = self.sink.present() {
            self.fault(err);
            return FlushOutcome::Failed;
        }

        let sent = self.dirty.len();
        self.dirty.clear();
        FlushOutcome::Flushed(sent)
    }

    fn fault(&mut self, err: KaraokeError) {
        warn!(error = %err, "display flush failed, repainting after reset");
        self.needs_reset = true;
        self.dirty.extend(0..self.geometry.rows);
    }
}
