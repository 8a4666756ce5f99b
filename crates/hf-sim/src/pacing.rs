//! Wall-clock pacing policies.
//!
//! A pacer only ever sleeps. It never changes event order or numbers, so a
//! paced run and an unpaced run produce the same trajectory.

use std::time::{Duration, Instant};

/// What one pacing call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaceOutcome {
    /// Number of (bounded) sleeps performed.
    pub sleeps: u32,
    /// Wall clock was already past the target when called.
    pub behind: bool,
}

pub trait Pacer: Send {
    /// Anchor the pacer: `sim_time` corresponds to now.
    fn reset(&mut self, sim_time: f64);

    /// Wait until wall time catches up with `sim_time`.
    fn pace(&mut self, sim_time: f64) -> PaceOutcome;
}

/// Run as fast as possible.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

impl Pacer for NoPacing {
    fn reset(&mut self, _sim_time: f64) {}

    fn pace(&mut self, _sim_time: f64) -> PaceOutcome {
        PaceOutcome::default()
    }
}

/// Keeps sim time / wall time close to `rate`.
///
/// Each sleep lasts at most `max_sleep`. When the simulation falls behind the
/// pacer does not try to catch up by skipping work; it just stops sleeping.
#[derive(Debug, Clone)]
pub struct RealtimePacer {
    rate: f64,
    max_sleep: Duration,
    anchor: Option<(Instant, f64)>,
}

impl RealtimePacer {
    /// `rate` must be positive and finite; 1.0 is real time.
    pub fn new(rate: f64, max_sleep: Duration) -> Self {
        Self {
            rate,
            max_sleep,
            anchor: None,
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn target(&self, sim_time: f64) -> Option<Instant> {
        let (wall0, sim0) = self.anchor?;
        let seconds = ((sim_time - sim0) / self.rate).max(0.0);
        Duration::try_from_secs_f64(seconds)
            .ok()
            .and_then(|d| wall0.checked_add(d))
    }
}

impl Pacer for RealtimePacer {
    fn reset(&mut self, sim_time: f64) {
        self.anchor = Some((Instant::now(), sim_time));
    }

    fn pace(&mut self, sim_time: f64) -> PaceOutcome {
        if self.anchor.is_none() {
            self.reset(sim_time);
        }
        let Some(target) = self.target(sim_time) else {
            return PaceOutcome::default();
        };
        let mut outcome = PaceOutcome {
            sleeps: 0,
            behind: Instant::now() > target,
        };
        loop {
            let now = Instant::now();
            if now >= target {
                break;
            }
            spin_sleep::sleep((target - now).min(self.max_sleep));
            outcome.sleeps += 1;
        }
        outcome
    }
}
