//! Mission time: integer millisecond timestamps and the frame-stepped clock.
//!
//! Everything in this crate that expires, throttles, or schedules works on
//! [`Timestamp`] values read from a single [`MissionClock`]. The clock only
//! moves when the frame loop advances it, so simulation is deterministic for
//! a given sequence of frame times.
//!
//! # Example
//!
//! ```ignore
//! use trailfx::time::MissionClock;
//!
//! let mut clock = MissionClock::new();
//!
//! // In your frame loop:
//! clock.advance(1.0 / 60.0);
//!
//! let expires = clock.stamp(250); // 250 ms from now
//! assert!(!clock.elapsed(expires));
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Point in mission time, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Mission start.
    pub const ZERO: Self = Self(0);
    /// A timestamp that was never set.
    pub const INVALID: Self = Self(-1);

    /// Timestamp at `ms` milliseconds of mission time.
    #[inline]
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    /// Raw milliseconds.
    #[inline]
    pub const fn millis(self) -> i64 {
        self.0
    }

    /// Whether this timestamp was ever set.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// Whether `now` has reached this timestamp. Invalid stamps never elapse.
    #[inline]
    pub const fn elapsed_at(self, now: Timestamp) -> bool {
        self.is_valid() && now.0 >= self.0
    }
}

impl Add<i64> for Timestamp {
    type Output = Timestamp;

    fn add(self, ms: i64) -> Timestamp {
        Timestamp(self.0 + ms)
    }
}

impl Sub for Timestamp {
    type Output = i64;

    fn sub(self, rhs: Timestamp) -> i64 {
        self.0 - rhs.0
    }
}

/// Frame-stepped mission clock.
///
/// Accumulates fractional milliseconds across frames so that many short
/// frames land on the same timestamp as one long frame of equal total length.
#[derive(Debug)]
pub struct MissionClock {
    /// Current mission time.
    now: Timestamp,
    /// Sub-millisecond remainder carried to the next frame.
    carry_ms: f64,
    /// Time advanced by the last frame, in seconds.
    frametime: f32,
    /// Total frames since start.
    frame_count: u64,
    /// Whether time is paused.
    paused: bool,
    /// Fixed frame time for deterministic stepping (optional).
    fixed_delta: Option<f32>,
    /// Time scale multiplier (1.0 = normal speed).
    time_scale: f32,
}

impl MissionClock {
    /// Create a clock at mission start.
    pub fn new() -> Self {
        Self {
            now: Timestamp::ZERO,
            carry_ms: 0.0,
            frametime: 0.0,
            frame_count: 0,
            paused: false,
            fixed_delta: None,
            time_scale: 1.0,
        }
    }

    /// Advance by one frame of `frametime` seconds.
    ///
    /// Returns the effective frame time after pause, fixed delta and time
    /// scale were applied. Call once per frame before processing sources.
    pub fn advance(&mut self, frametime: f32) -> f32 {
        if self.paused {
            self.frametime = 0.0;
            return 0.0;
        }

        let delta = self.fixed_delta.unwrap_or(frametime).max(0.0) * self.time_scale;
        self.frametime = delta;

        let total_ms = self.carry_ms + f64::from(delta) * 1000.0;
        let whole = total_ms.floor();
        self.carry_ms = total_ms - whole;
        self.now = self.now + whole as i64;

        self.frame_count += 1;
        delta
    }

    /// Current mission time.
    #[inline]
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Timestamp `delta_ms` milliseconds from now.
    #[inline]
    pub fn stamp(&self, delta_ms: i64) -> Timestamp {
        self.now + delta_ms
    }

    /// Whether `stamp` has been reached.
    #[inline]
    pub fn elapsed(&self, stamp: Timestamp) -> bool {
        stamp.elapsed_at(self.now)
    }

    /// Frame time of the last advance, in seconds.
    #[inline]
    pub fn frametime(&self) -> f32 {
        self.frametime
    }

    /// Total frames since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Whether time is currently paused.
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current time scale multiplier.
    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Pause time progression. While paused `advance` is a no-op.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume time progression.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Use a fixed frame time regardless of what `advance` is given.
    ///
    /// Pass `None` to go back to caller-supplied frame times.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }

    /// Set time scale multiplier. Negative values clamp to 0.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// Jump back to mission start. Called at mission load.
    pub fn reset(&mut self) {
        self.now = Timestamp::ZERO;
        self.carry_ms = 0.0;
        self.frametime = 0.0;
        self.frame_count = 0;
        self.paused = false;
    }
}

impl Default for MissionClock {
    fn default() -> Self {
        Self::new()
    }
}
