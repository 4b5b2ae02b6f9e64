use gesture_realtime_types::{validate, Instruction};

use crate::error::PlaybackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Playing,
    Paused,
    Complete,
}

/// Snapshot a renderer pulls once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub step_index: usize,
    /// Progress through the current step, 0..=1
    pub fraction: f64,
    /// Progress through the whole sequence, 0..=1
    pub overall_fraction: f64,
    pub status: PlaybackStatus,
}

/// What a single `tick` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub steps_advanced: usize,
    /// True only on the tick that finished the sequence.
    pub completed: bool,
}

struct PlaybackState {
    sequence: Vec<Instruction>,
    /// Offset of each step on the overall timeline.
    starts: Vec<f64>,
    total: f64,
    current_index: usize,
    /// Playback time on the overall timeline, 0..=total. Completion compares
    /// this running sum against `total` directly.
    position: f64,
    status: PlaybackStatus,
}

impl PlaybackState {
    fn new(sequence: Vec<Instruction>) -> Self {
        let mut starts = Vec::with_capacity(sequence.len());
        let mut total = 0.0;
        for instruction in &sequence {
            starts.push(total);
            total += instruction.duration_seconds();
        }
        Self {
            sequence,
            starts,
            total,
            current_index: 0,
            position: 0.0,
            status: PlaybackStatus::Idle,
        }
    }

    fn current_duration(&self) -> f64 {
        self.sequence[self.current_index].duration_seconds()
    }

    fn last_index(&self) -> usize {
        self.sequence.len() - 1
    }

    /// Seconds into the current step, never more than its duration.
    fn elapsed_in_step(&self) -> f64 {
        (self.position - self.starts[self.current_index]).clamp(0.0, self.current_duration())
    }

    fn rewind(&mut self) {
        self.current_index = 0;
        self.position = 0.0;
    }

    fn pin_end(&mut self) {
        self.current_index = self.last_index();
        self.position = self.total;
        self.status = PlaybackStatus::Complete;
    }

    // A single advance can cross any number of steps.
    fn advance(&mut self, seconds: f64) -> TickReport {
        let mut report = TickReport::default();
        let from = self.current_index;
        self.position += seconds;
        if self.position >= self.total {
            self.pin_end();
            report.steps_advanced = self.current_index - from;
            report.completed = true;
            return report;
        }
        while self.current_index < self.last_index()
            && self.position >= self.starts[self.current_index + 1]
        {
            self.current_index += 1;
        }
        report.steps_advanced = self.current_index - from;
        report
    }

    /// Moves to `position` seconds on the overall timeline. Returns true if
    /// that is at or past the end.
    fn place(&mut self, position: f64) -> bool {
        if position >= self.total {
            self.pin_end();
            return true;
        }
        self.current_index = self.starts.partition_point(|start| *start <= position) - 1;
        self.position = position;
        false
    }

    fn progress(&self) -> Progress {
        if self.status == PlaybackStatus::Complete {
            return Progress {
                step_index: self.current_index,
                fraction: 1.0,
                overall_fraction: 1.0,
                status: self.status,
            };
        }
        Progress {
            step_index: self.current_index,
            fraction: self.elapsed_in_step() / self.current_duration(),
            overall_fraction: (self.position / self.total).min(1.0),
            status: self.status,
        }
    }
}

/// Drives one "now" through a list of timed instructions.
///
/// Time only moves through [`tick`](Self::tick), which the frame loop calls
/// once per frame with a delta from its [`PlaybackClock`]. Everything else
/// is a state change with no notion of wall-clock time, so a sequence of
/// calls always produces the same result.
///
/// [`PlaybackClock`]: super::PlaybackClock
pub struct Sequencer {
    state: Option<PlaybackState>,
    speed: f64,
    on_complete: Option<Box<dyn FnMut() + Send>>,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            state: None,
            speed: 1.0,
            on_complete: None,
        }
    }

    /// Registers the listener called when a play-through finishes. It runs
    /// once per play-through, from inside the `tick` or `seek` that reached
    /// the end. Replaces any previous listener.
    pub fn on_complete<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
    }

    /// Validates and loads a sequence, leaving the sequencer `Idle` at the
    /// first step. The playback speed carries over. On error the previously
    /// loaded sequence, if any, is kept.
    pub fn load(&mut self, sequence: Vec<Instruction>) -> Result<(), PlaybackError> {
        let sequence = validate(sequence)?;
        tracing::debug!("loaded {} instructions", sequence.len());
        self.state = Some(PlaybackState::new(sequence));
        Ok(())
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        let state = self.state_mut()?;
        if state.sequence.is_empty() {
            return Err(PlaybackError::EmptySequence);
        }
        match state.status {
            PlaybackStatus::Idle | PlaybackStatus::Paused => {
                state.status = PlaybackStatus::Playing;
            }
            PlaybackStatus::Playing => {}
            PlaybackStatus::Complete => {
                tracing::debug!("play ignored: sequence is complete, use replay");
            }
        }
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        let state = self.state_mut()?;
        if state.status == PlaybackStatus::Playing {
            state.status = PlaybackStatus::Paused;
        }
        Ok(())
    }

    /// Advances playback by `delta_seconds` of wall time scaled by the
    /// current speed. Does nothing unless playing; negative or non-finite
    /// deltas advance nothing.
    pub fn tick(&mut self, delta_seconds: f64) -> Result<TickReport, PlaybackError> {
        let speed = self.speed;
        let state = self.state_mut()?;
        if state.status != PlaybackStatus::Playing
            || delta_seconds <= 0.0
            || !delta_seconds.is_finite()
        {
            return Ok(TickReport::default());
        }

        let report = state.advance(delta_seconds * speed);
        if report.steps_advanced > 0 {
            tracing::trace!(
                "advanced {} steps, now at step {}",
                report.steps_advanced,
                state.current_index
            );
        }
        if report.completed {
            self.notify_complete();
        }
        Ok(report)
    }

    pub fn progress(&self) -> Result<Progress, PlaybackError> {
        Ok(self.state()?.progress())
    }

    /// Restarts from the first step and plays, whatever the current state.
    pub fn replay(&mut self) -> Result<(), PlaybackError> {
        let state = self.state_mut()?;
        state.rewind();
        state.status = PlaybackStatus::Playing;
        Ok(())
    }

    /// Returns to the first step and stops.
    pub fn reset(&mut self) -> Result<(), PlaybackError> {
        let state = self.state_mut()?;
        state.rewind();
        state.status = PlaybackStatus::Idle;
        Ok(())
    }

    /// Takes effect on the next `tick`.
    pub fn set_speed(&mut self, factor: f64) -> Result<(), PlaybackError> {
        self.state()?;
        if factor <= 0.0 || !factor.is_finite() {
            return Err(PlaybackError::InvalidSpeed(factor));
        }
        self.speed = factor;
        Ok(())
    }

    /// Jumps to `seconds` on the overall timeline, keeping the play/pause
    /// status. Seeking at or past the end completes the sequence. A complete
    /// sequence stays put until `replay` or `reset`.
    pub fn seek(&mut self, seconds: f64) -> Result<(), PlaybackError> {
        let state = self.state_mut()?;
        if seconds < 0.0 || !seconds.is_finite() {
            return Err(PlaybackError::InvalidSeek(seconds));
        }
        if state.status == PlaybackStatus::Complete {
            tracing::debug!("seek ignored: sequence is complete");
            return Ok(());
        }
        if state.place(seconds) {
            self.notify_complete();
        }
        Ok(())
    }

    pub fn status(&self) -> Result<PlaybackStatus, PlaybackError> {
        Ok(self.state()?.status)
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn sequence(&self) -> Result<&[Instruction], PlaybackError> {
        Ok(&self.state()?.sequence)
    }

    pub fn current_instruction(&self) -> Result<&Instruction, PlaybackError> {
        let state = self.state()?;
        Ok(&state.sequence[state.current_index])
    }

    pub fn total_duration(&self) -> Result<f64, PlaybackError> {
        Ok(self.state()?.total)
    }

    fn state(&self) -> Result<&PlaybackState, PlaybackError> {
        self.state.as_ref().ok_or(PlaybackError::NotLoaded)
    }

    fn state_mut(&mut self) -> Result<&mut PlaybackState, PlaybackError> {
        self.state.as_mut().ok_or(PlaybackError::NotLoaded)
    }

    fn notify_complete(&mut self) {
        tracing::debug!("playback complete");
        if let Some(callback) = self.on_complete.as_mut() {
            callback();
        }
    }
}
