//! Button events → playback commands.
//!
//! Debouncing and press/hold detection happen in the board binding. This
//! module only decides what a [`ButtonEvent`] means in the current state.

use crate::clock::Clock;
use crate::error::KaraokeError;
use crate::scheduler::{PlaybackScheduler, PlaybackStatus};
use crate::sink::{DisplaySink, ToneSink};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    /// Short press
    Press,
    /// Button held down past the hold threshold
    Hold,
}

/// What a short press does while a song is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PressMode {
    /// Presses while busy are ignored; only hold stops
    #[default]
    StartOnly,
    /// Press pauses a playing song and resumes a paused one
    TogglePause,
}

/// Transition commands the input controller may issue.
pub trait PlaybackControl {
    fn status(&self) -> PlaybackStatus;
    fn start(&mut self) -> Result<bool, KaraokeError>;
    fn pause(&mut self) -> bool;
    fn resume(&mut self) -> bool;
    fn stop(&mut self) -> bool;
}

impl<C: Clock, T: ToneSink, D: DisplaySink> PlaybackControl for PlaybackScheduler<C, T, D> {
    fn status(&self) -> PlaybackStatus {
        PlaybackScheduler::status(self)
    }

    fn start(&mut self) -> Result<bool, KaraokeError> {
        PlaybackScheduler::start(self)
    }

    fn pause(&mut self) -> bool {
        PlaybackScheduler::pause(self)
    }

    fn resume(&mut self) -> bool {
        PlaybackScheduler::resume(self)
    }

    fn stop(&mut self) -> bool {
        PlaybackScheduler::stop(self)
    }
}

/// Maps button events onto a [`PlaybackControl`].
///
/// | Event | Idle  | Playing                  | Paused |
/// |-------|-------|--------------------------|--------|
/// | Press | start | ignored / pause (toggle) | resume |
/// | Hold  | -     | stop                     | stop   |
#[derive(Debug, Clone, Copy, Default)]
pub struct InputController {
    mode: PressMode,
}

impl InputController {
    pub fn new(mode: PressMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> PressMode {
        self.mode
    }

    /// Apply one button event. Returns whether a transition happened.
    pub fn handle<P: PlaybackControl + ?Sized>(
        &self,
        event: ButtonEvent,
        playback: &mut P,
    ) -> Result<bool, KaraokeError> {
        let status = playback.status();
        let changed = match (event, status) {
            (ButtonEvent::Press, PlaybackStatus::Idle) => playback.start()?,
            (ButtonEvent::Press, PlaybackStatus::Playing) => match self.mode {
                PressMode::StartOnly => false,
                PressMode::TogglePause => playback.pause(),
            },
            (ButtonEvent::Press, PlaybackStatus::Paused) => playback.resume(),
            (ButtonEvent::Hold, PlaybackStatus::Playing | PlaybackStatus::Paused) => {
                playback.stop()
            }
            _ => false,
        };
        if !changed {
            debug!(?event, ?status, "button event ignored");
        }
        Ok(changed)
    }
}
