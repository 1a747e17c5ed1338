//! The outside world as seen by a walk: movement, position and time.

use std::time::{Duration, Instant};

use tilewalk_core::Tile;

/// Issues movement commands. Best-effort: the agent may end up somewhere
/// else, which is what stuck detection is for.
pub trait Actuator {
    fn move_toward(&mut self, target: Tile);
}

/// Reports where the agent currently stands, or `None` when the reading is
/// unavailable.
pub trait PositionSensor {
    fn current_position(&mut self) -> Option<Tile>;
}

/// Monotonic time source. `now` is measured from an arbitrary fixed origin.
pub trait Clock {
    fn now(&self) -> Duration;
    fn sleep(&self, d: Duration);
}

impl<A: Actuator + ?Sized> Actuator for &mut A {
    fn move_toward(&mut self, target: Tile) {
        (**self).move_toward(target);
    }
}

impl<S: PositionSensor + ?Sized> PositionSensor for &mut S {
    fn current_position(&mut self) -> Option<Tile> {
        (**self).current_position()
    }
}

/// Wall-clock time with real sleeps.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}
