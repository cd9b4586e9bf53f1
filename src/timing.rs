//! Lifetime window and emission clock of a source.
//!
//! Two independent clocks live here:
//!
//! - the **active window** `[begin, end)` drives the
//!   `Pending → Active → Finished` state machine, and
//! - the **next-creation** stamp is a fixed-step accumulator the effect uses
//!   to decide how many emissions are due this frame.
//!
//! The accumulator is what makes emission frame-rate independent:
//!
//! ```ignore
//! while timing.next_creation_time_expired(now) {
//!     emit();
//!     timing.increment_next_creation_time(interval_ms);
//! }
//! ```

use crate::time::Timestamp;

/// Where a source is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingState {
    /// Window not yet open.
    Pending,
    /// Inside `[begin, end)`.
    Active,
    /// Window closed, or never valid. Terminal.
    Finished,
}

/// Creation time, emission clock and active window of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceTiming {
    creation: Timestamp,
    next_creation: Timestamp,
    begin: Timestamp,
    end: Timestamp,
}

impl SourceTiming {
    /// Timing created at `now`, with the first emission due immediately.
    ///
    /// The active window starts out unset, which reads as `Finished` until
    /// [`set_lifetime`](Self::set_lifetime) opens one.
    pub fn new(now: Timestamp) -> Self {
        Self {
            creation: now,
            next_creation: now,
            begin: Timestamp::INVALID,
            end: Timestamp::INVALID,
        }
    }

    /// When the owning source was created.
    #[inline]
    pub fn creation_time(&self) -> Timestamp {
        self.creation
    }

    /// Set the active window.
    pub fn set_lifetime(&mut self, begin: Timestamp, end: Timestamp) {
        self.begin = begin;
        self.end = end;
    }

    /// Active window bounds.
    #[inline]
    pub fn lifetime(&self) -> (Timestamp, Timestamp) {
        (self.begin, self.end)
    }

    /// State at `now`.
    pub fn state(&self, now: Timestamp) -> TimingState {
        let window_valid = self.begin.is_valid() && self.end.is_valid() && self.end >= self.begin;
        if !window_valid || now >= self.end {
            TimingState::Finished
        } else if now < self.begin {
            TimingState::Pending
        } else {
            TimingState::Active
        }
    }

    /// Whether `now` is inside the active window.
    #[inline]
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.state(now) == TimingState::Active
    }

    /// Whether the window has closed. Once true, stays true.
    #[inline]
    pub fn is_finished(&self, now: Timestamp) -> bool {
        self.state(now) == TimingState::Finished
    }

    /// Fraction of the active window that has passed, in `[0, 1)`.
    ///
    /// `None` outside the active window.
    pub fn life_progress(&self, now: Timestamp) -> Option<f32> {
        if !self.is_active(now) {
            return None;
        }
        let total = self.end - self.begin;
        Some((now - self.begin) as f32 / total as f32)
    }

    /// When the next emission is due.
    #[inline]
    pub fn next_creation_time(&self) -> Timestamp {
        self.next_creation
    }

    /// Whether an emission is due at `now`.
    #[inline]
    pub fn next_creation_time_expired(&self, now: Timestamp) -> bool {
        self.next_creation.elapsed_at(now)
    }

    /// Push the next emission back by exactly `step_ms`.
    #[inline]
    pub fn increment_next_creation_time(&mut self, step_ms: i64) {
        self.next_creation = self.next_creation + step_ms;
    }

    /// Run the check/advance pair until caught up with `now`.
    ///
    /// Returns how many emissions were due. A non-positive step would never
    /// catch up, so it counts a single emission and stops.
    pub fn consume_due_creations(&mut self, now: Timestamp, step_ms: i64) -> u32 {
        if step_ms <= 0 {
            if self.next_creation_time_expired(now) {
                self.next_creation = now + 1;
                return 1;
            }
            return 0;
        }
        let mut count = 0;
        while self.next_creation_time_expired(now) {
            self.increment_next_creation_time(step_ms);
            count += 1;
        }
        count
    }
}
