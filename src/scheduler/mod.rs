//! # Scheduler Module
//!
//! Execute a [`Timeline`] against the piezo and the display in real time.
//!
//! ## Purpose
//! The scheduler owns the output devices, one timer queue and at most one
//! playback session. It is driven from a single cooperative loop: the owner
//! asks for [`PlaybackScheduler::next_wake`], waits until then (or until a
//! button event arrives), and calls [`PlaybackScheduler::poll`]. Nothing in
//! here blocks.
//!
//! ## States
//! ```text
//!  Idle --start--> Playing --pause--> Paused
//!   ^               |   ^               |
//!   |               |   +----resume-----+
//!   +----stop-------+-------------------+
//!   +----End: Finished -> Idle
//! ```
//! Commands issued in any other state do nothing and return `false`.
//!
//! ## Strategies
//! - [`Strategy::Prebuilt`] registers one timer per remaining event.
//! - [`Strategy::Polling`] registers a single periodic tick that applies
//!   every event already due.
//!
//! ## Sessions
//! Every start, pause, stop and finish bumps the session generation. Timer
//! payloads carry the generation they were armed under, and a payload from
//! an older generation is dropped when it fires. Pausing keeps the cursor and
//! the position in the song; resuming shifts the time origin by the length of
//! the pause so nothing is replayed.
//!
//! Display flushes are not tied to a session: a write made just before a stop
//! still reaches the device. A failed flush is retried with a doubling delay,
//! at most [`MAX_FLUSH_RETRIES`] times, so the idle prompt comes back after a
//! bus fault even when nothing else is left to write.

use crate::clock::{Clock, TimerHandle, TimerQueue};
use crate::display::{DisplayBuffer, FlushOutcome};
use crate::error::KaraokeError;
use crate::sink::{DisplaySink, ToneSink};
use crate::timeline::{Timeline, TimelineEventKind};
use tracing::{debug, info, warn};


/// Consecutive failed flushes retried before waiting for the next write
pub const MAX_FLUSH_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Playing,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    Prebuilt,
    Polling { tick_ms: u64 },
}

/// Produces the timeline for each new session.
pub trait TimelineSource {
    fn build(&mut self) -> Result<Timeline, KaraokeError>;
}

/// A prepared timeline replays unchanged on every start.
impl TimelineSource for Timeline {
    fn build(&mut self) -> Result<Timeline, KaraokeError> {
        Ok(self.clone())
    }
}

/// Text shown outside of playback and at the start of playback.
///
/// Line *i* goes to row *i*; rows without a line are blanked.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    pub strategy: Strategy,
    pub idle_screen: Vec<String>,
    pub playing_screen: Vec<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Prebuilt,
            idle_screen: vec!["Karaoke:".to_string(), "press btn".to_string()],
            playing_screen: vec!["Karaoke:".to_string(), "playing...".to_string()],
        }
    }
}

/// Timer payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Event { generation: u64, index: usize },
    Tick { generation: u64 },
    Flush,
}

/// The run in progress
#[derive(Debug)]
struct Session {
    timeline: Timeline,
    cursor: usize,
    origin_ms: u64,
    paused_at: Option<u64>,
    handles: Vec<TimerHandle>,
}

impl Session {
    fn due_at(&self, index: usize) -> u64 {
        let offset = self.timeline.events()[index].due_ms.max(0.0).round() as u64;
        self.origin_ms.saturating_add(offset)
    }
}

pub struct PlaybackScheduler<C, T, D> {
    clock: C,
    tone: T,
    display: DisplayBuffer<D>,
    source: Box<dyn TimelineSource>,
    config: PlaybackConfig,
    timers: TimerQueue<Wake>,
    generation: u64,
    status: PlaybackStatus,
    session: Option<Session>,
    completed_plays: u64,
    flush_retries: u32,
}

impl<C: Clock, T: ToneSink, D: DisplaySink> PlaybackScheduler<C, T, D> {
    /// Create an idle scheduler and put the idle screen up.
    pub fn new(
        clock: C,
        tone: T,
        display: DisplayBuffer<D>,
        source: Box<dyn TimelineSource>,
        config: PlaybackConfig,
    ) -> Self {
        let mut scheduler = Self {
            clock,
            tone,
            display,
            source,
            config,
            timers: TimerQueue::new(),
            generation: 0,
            status: PlaybackStatus::Idle,
            session: None,
            completed_plays: 0,
            flush_retries: 0,
        };
        let idle = scheduler.config.idle_screen.clone();
        scheduler.show_screen(&idle);
        scheduler
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Runs that reached their `End` event
    pub fn completed_plays(&self) -> u64 {
        self.completed_plays
    }

    /// Index of the next timeline event to apply
    pub fn cursor(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.cursor)
    }

    pub fn timeline(&self) -> Option<&Timeline> {
        self.session.as_ref().map(|s| &s.timeline)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn tone(&self) -> &T {
        &self.tone
    }

    pub fn display(&self) -> &DisplayBuffer<D> {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut DisplayBuffer<D> {
        &mut self.display
    }

    /// Earliest registered timer, if any
    pub fn next_wake(&self) -> Option<u64> {
        self.timers.next_due()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Begin a new run from the start of a freshly built timeline.
    ///
    /// Only valid while idle; returns `Ok(false)` otherwise. A timeline build
    /// error is returned before anything is written or played.
    pub fn start(&mut self) -> Result<bool, KaraokeError> {
        if self.status != PlaybackStatus::Idle {
            debug!(status = ?self.status, "start ignored");
            return Ok(false);
        }
        let timeline = self.source.build()?;
        let now = self.clock.now_ms();

        self.generation += 1;
        info!(
            generation = self.generation,
            events = timeline.len(),
            end_ms = timeline.end_ms(),
            "playback started"
        );
        self.session = Some(Session {
            timeline,
            cursor: 0,
            origin_ms: now,
            paused_at: None,
            handles: Vec::new(),
        });
        self.status = PlaybackStatus::Playing;

        let playing = self.config.playing_screen.clone();
        self.show_screen(&playing);
        self.arm_session(now);
        Ok(true)
    }

    /// Freeze the run in place. Only valid while playing.
    pub fn pause(&mut self) -> bool {
        if self.status != PlaybackStatus::Playing {
            debug!(status = ?self.status, "pause ignored");
            return false;
        }
        let now = self.clock.now_ms();
        self.disarm_session();
        self.generation += 1;
        if let Some(session) = self.session.as_mut() {
            session.paused_at = Some(now);
            info!(cursor = session.cursor, "playback paused");
        }
        self.tone.silence();
        self.status = PlaybackStatus::Paused;
        true
    }

    /// Continue a paused run where it stopped. Only valid while paused.
    pub fn resume(&mut self) -> bool {
        if self.status != PlaybackStatus::Paused {
            debug!(status = ?self.status, "resume ignored");
            return false;
        }
        let now = self.clock.now_ms();
        if let Some(session) = self.session.as_mut() {
            if let Some(paused_at) = session.paused_at.take() {
                session.origin_ms += now.saturating_sub(paused_at);
            }
            info!(cursor = session.cursor, "playback resumed");
        }
        self.status = PlaybackStatus::Playing;
        self.arm_session(now);
        true
    }

    /// Abandon the run and return to the idle screen. Valid while playing or
    /// paused.
    pub fn stop(&mut self) -> bool {
        if !matches!(self.status, PlaybackStatus::Playing | PlaybackStatus::Paused) {
            debug!(status = ?self.status, "stop ignored");
            return false;
        }
        self.disarm_session();
        self.generation += 1;
        self.session = None;
        self.tone.silence();
        let idle = self.config.idle_screen.clone();
        self.show_screen(&idle);
        self.status = PlaybackStatus::Idle;
        info!("playback stopped");
        true
    }

    /// Handle every timer due by now. Returns the number of timeline events
    /// applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let now = self.clock.now_ms();
            let Some((_, wake)) = self.timers.pop_due(now) else {
                break;
            };
            match wake {
                Wake::Flush => match self.display.flush() {
                    FlushOutcome::Flushed(rows) => {
                        self.flush_retries = 0;
                        debug!(rows, "display flushed");
                    }
                    FlushOutcome::Clean => self.flush_retries = 0,
                    FlushOutcome::Failed => self.retry_flush(),
                },
                Wake::Event { generation, index } => {
                    if !self.is_current(generation) {
                        debug!(generation, index, "stale event timer dropped");
                        continue;
                    }
                    applied += self.apply_through(index);
                }
                Wake::Tick { generation } => {
                    if !self.is_current(generation) {
                        debug!(generation, "stale tick dropped");
                        continue;
                    }
                    applied += self.apply_due(now);
                    if let Strategy::Polling { tick_ms } = self.config.strategy {
                        if self.status == PlaybackStatus::Playing {
                            self.rearm_tick(now, tick_ms, generation);
                        }
                    }
                }
            }
        }
        applied
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation && self.status == PlaybackStatus::Playing
    }

    fn arm_session(&mut self, now: u64) {
        let generation = self.generation;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match self.config.strategy {
            Strategy::Prebuilt => {
                for index in session.cursor..session.timeline.len() {
                    let due = session.due_at(index);
                    let handle = self.timers.at(due, Wake::Event { generation, index });
                    session.handles.push(handle);
                }
            }
            Strategy::Polling { .. } => {
                let handle = self.timers.at(now, Wake::Tick { generation });
                session.handles.push(handle);
            }
        }
        debug!(timers = session.handles.len(), "session timers armed");
    }

    fn rearm_tick(&mut self, now: u64, tick_ms: u64, generation: u64) {
        let handle = self
            .timers
            .after(now, tick_ms.max(1), Wake::Tick { generation });
        if let Some(session) = self.session.as_mut() {
            session.handles.clear();
            session.handles.push(handle);
        }
    }

    fn disarm_session(&mut self) {
        if let Some(session) = self.session.as_mut() {
            for handle in session.handles.drain(..) {
                self.timers.cancel(handle);
            }
        }
    }

    /// Apply events from the cursor up to and including `index`.
    fn apply_through(&mut self, index: usize) -> usize {
        let mut applied = 0;
        while self.status == PlaybackStatus::Playing {
            match self.session.as_ref() {
                Some(session) if session.cursor <= index => {}
                _ => break,
            }
            self.apply_next();
            applied += 1;
        }
        applied
    }

    /// Apply every event whose due time has passed.
    fn apply_due(&mut self, now: u64) -> usize {
        let mut applied = 0;
        while self.status == PlaybackStatus::Playing {
            match self.session.as_ref() {
                Some(session)
                    if session.cursor < session.timeline.len()
                        && session.due_at(session.cursor) <= now => {}
                _ => break,
            }
            self.apply_next();
            applied += 1;
        }
        applied
    }

    fn apply_next(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(event) = session.timeline.events().get(session.cursor) else {
            return;
        };
        let kind = event.kind.clone();
        session.cursor += 1;

        match kind {
            TimelineEventKind::Tone {
                pitch,
                duration_ms,
                dynamic,
            } => match pitch {
                // a zero dynamic is a ghost note
                Some(pitch) if dynamic != Some(0.0) => self
                    .tone
                    .set_tone(pitch.frequency_hz(), duration_ms.max(0.0).round() as u64),
                _ => self.tone.silence(),
            },
            TimelineEventKind::Lyric { row, text } => {
                let arm = self.display.write_row(row, &text);
                self.arm_flush(arm);
            }
            TimelineEventKind::Glitch { first_row, lines } => {
                let mut arm = false;
                for (offset, line) in lines.iter().enumerate() {
                    arm |= self.display.write_row(first_row.saturating_add(offset), line);
                }
                self.arm_flush(arm);
            }
            TimelineEventKind::Scroll { first_row, rows } => {
                let arm = self.display.scroll_up(first_row, rows);
                self.arm_flush(arm);
            }
            TimelineEventKind::End => self.finish(),
        }
    }

    fn finish(&mut self) {
        self.disarm_session();
        self.generation += 1;
        self.session = None;
        self.tone.silence();
        self.status = PlaybackStatus::Finished;
        self.completed_plays += 1;
        info!(completed = self.completed_plays, "playback finished");

        let idle = self.config.idle_screen.clone();
        self.show_screen(&idle);
        self.status = PlaybackStatus::Idle;
    }

    fn show_screen(&mut self, lines: &[String]) {
        let mut arm = false;
        for row in 0..self.display.geometry().rows {
            let text = lines.get(row).map_or("", |l| l.as_str());
            arm |= self.display.write_row(row, text);
        }
        self.arm_flush(arm);
    }

    fn arm_flush(&mut self, arm: bool) {
        if !arm {
            return;
        }
        let now = self.clock.now_ms();
        let delay = self.display.coalesce_ms();
        self.timers.after(now, delay, Wake::Flush);
    }

    /// Re-arm a flush after a fault, doubling the delay each attempt.
    fn retry_flush(&mut self) {
        if self.flush_retries >= MAX_FLUSH_RETRIES {
            warn!(
                attempts = self.flush_retries,
                "display still failing, waiting for the next write"
            );
            self.flush_retries = 0;
            return;
        }
        self.flush_retries += 1;
        if !self.display.force_repaint() {
            return;
        }
        let delay = self.display.coalesce_ms().max(1) << self.flush_retries;
        let now = self.clock.now_ms();
        debug!(attempt = self.flush_retries, delay, "display flush retry armed");
        self.timers.after(now, delay, Wake::Flush);
    }
}
