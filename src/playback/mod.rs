//! Timed instruction playback.
//!
//! A [`Sequencer`] owns the playback state of one instruction list and only
//! moves forward when `tick` is called. The frame loop that drives it owns a
//! [`PlaybackClock`], which turns frame timestamps into bounded deltas.

mod clock;
mod sequencer;

pub use clock::{PlaybackClock, DEFAULT_MAX_FRAME_DELTA};
pub use sequencer::{PlaybackStatus, Progress, Sequencer, TickReport};
