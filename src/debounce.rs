//! Explicit debounce state, checked once per tick.
//!
//! Replaces hidden delayed-callback timers with a value the control loop
//! owns: a [`Debounce`] either fires and re-arms itself, or reports that
//! its period has not elapsed. The same type paces the recording cadence.

use std::time::{Duration, Instant};

/// A per-tick gate that fires at most once per period.
#[derive(Debug, Clone)]
pub struct Debounce {
    period: Duration,
    ready_at: Instant,
}

impl Debounce {
    /// A gate that is ready immediately and then every `period` after a
    /// fire.
    pub fn new(period: Duration) -> Self {
        Debounce {
            period,
            ready_at: Instant::now(),
        }
    }

    /// True once per period: fires and re-arms, or declines.
    pub fn fire(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.ready_at {
            self.ready_at = now + self.period;
            true
        } else {
            false
        }
    }

    /// Whether a call to [`fire`](Debounce::fire) would succeed now.
    pub fn is_ready(&self) -> bool {
        Instant::now() >= self.ready_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn fires_immediately_then_waits() {
        let mut gate = Debounce::new(Duration::from_millis(30));
        assert!(gate.fire());
        assert!(!gate.fire());
        assert!(!gate.is_ready());
    }

    #[test]
    fn rearms_after_the_period() {
        let mut gate = Debounce::new(Duration::from_millis(10));
        assert!(gate.fire());
        sleep(Duration::from_millis(15));
        assert!(gate.is_ready());
        assert!(gate.fire());
        assert!(!gate.fire());
    }
}
