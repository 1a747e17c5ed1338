use std::time::Duration;

use tilewalk_paths::{DEFAULT_LOOKAHEAD, UnknownPolicy, VarianceLevel};

/// Construction-time settings of a [`NavigationManager`](crate::NavigationManager).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NavConfig {
    pub variance: VarianceLevel,
    /// Chance of rerouting on every waypoint advance, in `[0, 1]`.
    pub repath_probability: f64,
    pub path_cache_capacity: usize,
    pub region_cache_capacity: usize,
    pub unknown: UnknownPolicy,
    /// Chebyshev distance, in tiles, that counts as having reached a tile.
    pub arrival_tolerance: i32,
    /// How long the position may stay unchanged before the agent is stuck.
    pub stuck_timeout: Duration,
    /// Ceiling on the whole walk.
    pub walk_timeout: Duration,
    /// Nominal wait after each movement command.
    pub move_interval: Duration,
    /// The wait is scaled by `U(1 - jitter, 1 + jitter)`.
    pub move_jitter: f64,
    /// Position reads per poll before the poll counts as unavailable.
    pub sensor_attempts: u32,
    /// Wait before read `n + 1` is `sensor_backoff * n`.
    pub sensor_backoff: Duration,
    /// Farthest path tile, counted from the current one, a move may target.
    pub lookahead: usize,
    /// Replans allowed per walk, stuck and opportunistic together.
    pub max_replans: u32,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            variance: VarianceLevel::Moderate,
            repath_probability: 0.2,
            path_cache_capacity: 100,
            region_cache_capacity: 50,
            unknown: UnknownPolicy::default(),
            arrival_tolerance: 2,
            stuck_timeout: Duration::from_secs(3),
            walk_timeout: Duration::from_secs(120),
            move_interval: Duration::from_secs(1),
            move_jitter: 0.2,
            sensor_attempts: 3,
            sensor_backoff: Duration::from_millis(250),
            lookahead: DEFAULT_LOOKAHEAD,
            max_replans: 32,
        }
    }
}

impl NavConfig {
    pub fn with_variance(mut self, variance: VarianceLevel) -> Self {
        self.variance = variance;
        self
    }

    pub fn with_repath_probability(mut self, p: f64) -> Self {
        self.repath_probability = p.clamp(0.0, 1.0);
        self
    }

    pub fn with_path_cache_capacity(mut self, capacity: usize) -> Self {
        self.path_cache_capacity = capacity;
        self
    }

    pub fn with_region_cache_capacity(mut self, capacity: usize) -> Self {
        self.region_cache_capacity = capacity;
        self
    }

    pub fn with_unknown(mut self, unknown: UnknownPolicy) -> Self {
        self.unknown = unknown;
        self
    }

    pub fn with_arrival_tolerance(mut self, tiles: i32) -> Self {
        self.arrival_tolerance = tiles.max(0);
        self
    }

    pub fn with_stuck_timeout(mut self, timeout: Duration) -> Self {
        self.stuck_timeout = timeout;
        self
    }

    pub fn with_walk_timeout(mut self, timeout: Duration) -> Self {
        self.walk_timeout = timeout;
        self
    }

    pub fn with_move_interval(mut self, interval: Duration, jitter: f64) -> Self {
        self.move_interval = interval;
        self.move_jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn with_sensor_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.sensor_attempts = attempts.max(1);
        self.sensor_backoff = backoff;
        self
    }

    pub fn with_lookahead(mut self, tiles: usize) -> Self {
        self.lookahead = tiles.max(1);
        self
    }

    pub fn with_max_replans(mut self, n: u32) -> Self {
        self.max_replans = n;
        self
    }
}
