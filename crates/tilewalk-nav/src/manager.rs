use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use rand::{Rng, RngExt};
use tilewalk_collision::{CollisionStore, RegionSource, StoreConfig};
use tilewalk_core::Tile;
use tilewalk_paths::{Path, PathRequest, PathfinderConfig, Unreachable, VariancePathfinder};

use crate::cancel::CancelToken;
use crate::config::NavConfig;
use crate::io::{Actuator, Clock, PositionSensor};
use crate::session::NavigationSession;
use crate::state::{FailureReason, NavEvent, NavState, Outcome, ReplanReason, SessionFailed};

/// Drives live walks from the agent's position to a destination.
///
/// Holds an optional [`VariancePathfinder`]. Without one, walks follow the
/// straight line to the destination and rely on stuck detection alone.
pub struct NavigationManager {
    config: NavConfig,
    pathfinder: Option<VariancePathfinder>,
}

impl NavigationManager {
    /// Manager routing over a shared store.
    pub fn new(store: Arc<CollisionStore>, config: NavConfig) -> Self {
        let pf_config = PathfinderConfig::default()
            .with_unknown(config.unknown)
            .with_cache_capacity(config.path_cache_capacity);
        let pathfinder = VariancePathfinder::with_config(store, pf_config);
        Self::with_pathfinder(pathfinder, config)
    }

    /// Manager with its own store over `source`, sized by
    /// `region_cache_capacity`.
    pub fn from_source(source: impl RegionSource + 'static, config: NavConfig) -> Self {
        let store_config = StoreConfig::default().with_capacity(config.region_cache_capacity);
        let store = CollisionStore::with_config(source, store_config);
        Self::new(Arc::new(store), config)
    }

    pub fn with_pathfinder(pathfinder: VariancePathfinder, config: NavConfig) -> Self {
        Self {
            config,
            pathfinder: Some(pathfinder),
        }
    }

    /// Manager without collision data; every route is a straight line.
    pub fn without_pathfinder(config: NavConfig) -> Self {
        warn!("navigation without a pathfinder: routes ignore collision");
        Self {
            config,
            pathfinder: None,
        }
    }

    pub fn has_pathfinder(&self) -> bool {
        self.pathfinder.is_some()
    }

    pub fn pathfinder(&self) -> Option<&VariancePathfinder> {
        self.pathfinder.as_ref()
    }

    pub fn pathfinder_mut(&mut self) -> Option<&mut VariancePathfinder> {
        self.pathfinder.as_mut()
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Walk to `destination`, blocking until the walk ends.
    ///
    /// `cancel` is checked before every loop iteration and every movement
    /// command; once it is observed no further command is issued.
    pub fn walk_to<A, S, C>(
        &mut self,
        destination: Tile,
        actuator: &mut A,
        sensor: &mut S,
        clock: &C,
        cancel: &CancelToken,
    ) -> Outcome
    where
        A: Actuator + ?Sized,
        S: PositionSensor + ?Sized,
        C: Clock + ?Sized,
    {
        self.walk_to_with_rng(destination, actuator, sensor, clock, cancel, &mut rand::rng())
    }

    /// [`walk_to`](Self::walk_to) with a caller-supplied random source for
    /// timing jitter, replan trials and route weights.
    pub fn walk_to_with_rng<A, S, C, R>(
        &mut self,
        destination: Tile,
        actuator: &mut A,
        sensor: &mut S,
        clock: &C,
        cancel: &CancelToken,
        rng: &mut R,
    ) -> Outcome
    where
        A: Actuator + ?Sized,
        S: PositionSensor + ?Sized,
        C: Clock + ?Sized,
        R: Rng + ?Sized,
    {
        let session = NavigationSession::new(destination, clock.now());
        Walk {
            config: &self.config,
            pathfinder: self.pathfinder.as_mut(),
            actuator,
            sensor,
            clock,
            cancel,
            rng,
            session,
        }
        .run()
    }
}

/// One `walk_to` call: the session plus everything it talks to.
struct Walk<'w, A: ?Sized, S: ?Sized, C: ?Sized, R: ?Sized> {
    config: &'w NavConfig,
    pathfinder: Option<&'w mut VariancePathfinder>,
    actuator: &'w mut A,
    sensor: &'w mut S,
    clock: &'w C,
    cancel: &'w CancelToken,
    rng: &'w mut R,
    session: NavigationSession,
}

impl<A, S, C, R> Walk<'_, A, S, C, R>
where
    A: Actuator + ?Sized,
    S: PositionSensor + ?Sized,
    C: Clock + ?Sized,
    R: Rng + ?Sized,
{
    fn run(mut self) -> Outcome {
        let destination = self.session.destination();
        if self.cancel.is_cancelled() {
            return self.cancelled();
        }
        self.session.transition(NavState::Planning, self.clock.now());
        let Some(start) = self.poll() else {
            if self.cancel.is_cancelled() {
                return self.cancelled();
            }
            return self.fail(FailureReason::SensorUnavailable);
        };
        self.session.observe(start, self.clock.now());
        if self.within_tolerance(start) {
            return self.arrived();
        }
        match self.plan(start, None) {
            Ok(path) => {
                info!(
                    "walking {start} -> {destination}: {} tiles, {} waypoint(s)",
                    path.len(),
                    path.waypoints().len()
                );
                self.session.adopt_path(path, None);
            }
            Err(u) => return self.fail(FailureReason::Unreachable(u)),
        }
        self.session.transition(NavState::Traveling, self.clock.now());

        let store = self.pathfinder.as_ref().map(|pf| Arc::clone(pf.store()));
        loop {
            if self.cancel.is_cancelled() {
                return self.cancelled();
            }
            let elapsed = self.session.elapsed(self.clock.now());
            if elapsed > self.config.walk_timeout {
                let timeout = self.config.walk_timeout;
                return self.fail(FailureReason::TimedOut(timeout));
            }

            let Some(target) = self.next_target(store.as_deref()) else {
                return self.fail(FailureReason::SensorUnavailable);
            };
            if self.cancel.is_cancelled() {
                return self.cancelled();
            }
            trace!("move toward {target}");
            self.actuator.move_toward(target);
            let wait = self.jittered_interval();
            self.clock.sleep(wait);

            if let Some(pos) = self.poll() {
                self.session.observe(pos, self.clock.now());
            }
            let Some(pos) = self.session.last_known_position() else {
                return self.fail(FailureReason::SensorUnavailable);
            };
            if self.within_tolerance(pos) {
                return self.arrived();
            }

            let now = self.clock.now();
            if let Some(index) = self.session.advance(pos, self.config.arrival_tolerance) {
                trace!("reached path tile {index} at {pos}");
                let p = self.config.repath_probability;
                if p > 0.0 && self.rng.random_bool(p.min(1.0)) {
                    if let Err(reason) = self.replan(ReplanReason::Opportunistic, pos) {
                        return self.fail(reason);
                    }
                }
            } else if self.session.is_stuck(now, self.config.stuck_timeout) {
                self.session.record_stuck(now);
                warn!(
                    "no movement at {pos} for {:?} (stuck #{})",
                    self.config.stuck_timeout,
                    self.session.stuck_count()
                );
                if let Err(reason) = self.replan(ReplanReason::Stuck, pos) {
                    return self.fail(reason);
                }
            }
        }
    }

    /// Farthest tile of the active path the next move may aim at.
    fn next_target(&self, store: Option<&CollisionStore>) -> Option<Tile> {
        let path = self.session.active_path()?;
        let view = store.map(CollisionStore::view);
        let index = path.lookahead_target(
            self.session.waypoint_index(),
            self.config.lookahead,
            view.as_ref(),
        );
        Some(path.tiles()[index])
    }

    fn within_tolerance(&self, pos: Tile) -> bool {
        let dest = self.session.destination();
        pos.plane == dest.plane && pos.chebyshev(dest) <= self.config.arrival_tolerance
    }

    fn jittered_interval(&mut self) -> Duration {
        let j = self.config.move_jitter.clamp(0.0, 1.0);
        if j == 0.0 {
            return self.config.move_interval;
        }
        let scale = self.rng.random_range(1.0 - j..=1.0 + j);
        self.config.move_interval.mul_f64(scale)
    }

    /// Read the position, retrying with linear backoff.
    fn poll(&mut self) -> Option<Tile> {
        let attempts = self.config.sensor_attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(pos) = self.sensor.current_position() {
                return Some(pos);
            }
            if attempt < attempts && !self.cancel.is_cancelled() {
                self.clock.sleep(self.config.sensor_backoff * attempt);
            }
        }
        warn!("position unavailable after {attempts} read(s)");
        self.session.push_event(NavEvent::SensorUnavailable { attempts });
        None
    }

    fn plan(&mut self, from: Tile, reason: Option<ReplanReason>) -> Result<Path, Unreachable> {
        let to = self.session.destination();
        let Some(pf) = self.pathfinder.as_deref_mut() else {
            if from.plane != to.plane {
                return Err(Unreachable {
                    start: from,
                    end: to,
                });
            }
            return Ok(Path::direct_line(from, to));
        };
        let req = PathRequest::new(from, to, self.config.variance);
        match reason {
            // Replans never reuse a cached route: the cached one may be the
            // route the agent just failed to follow.
            Some(_) => pf.find_path_uncached_with_rng(req, &mut *self.rng),
            None => pf.find_path_with_rng(req, &mut *self.rng),
        }
    }

    /// Recompute the route from the actual position `pos`.
    ///
    /// A stuck replan that finds no route fails the walk. An opportunistic
    /// one keeps the current route, as does one over the replan budget.
    fn replan(&mut self, reason: ReplanReason, pos: Tile) -> Result<(), FailureReason> {
        let budget = self.config.max_replans;
        if self.session.replans() >= budget {
            if reason == ReplanReason::Stuck {
                return Err(FailureReason::TooManyReplans(budget));
            }
            trace!("replan budget spent, keeping route");
            return Ok(());
        }
        self.session.transition(NavState::Replanning, self.clock.now());
        match self.plan(pos, Some(reason)) {
            Ok(path) => {
                debug!(
                    "{reason:?} replan from {pos}: {} tiles, {} waypoint(s)",
                    path.len(),
                    path.waypoints().len()
                );
                self.session.adopt_path(path, Some(reason));
            }
            Err(u) if reason == ReplanReason::Stuck => {
                return Err(FailureReason::StuckUnreachable(u));
            }
            Err(u) => {
                debug!("opportunistic replan failed ({u}), keeping route");
                self.session.push_event(NavEvent::ReplanSkipped { position: pos });
            }
        }
        self.session.transition(NavState::Traveling, self.clock.now());
        Ok(())
    }

    fn arrived(mut self) -> Outcome {
        let now = self.clock.now();
        self.session.transition(NavState::Arrived, now);
        Outcome::Arrived(self.session.into_report(now))
    }

    fn cancelled(mut self) -> Outcome {
        let now = self.clock.now();
        self.session.transition(NavState::Cancelled, now);
        Outcome::Cancelled(self.session.into_report(now))
    }

    fn fail(mut self, reason: FailureReason) -> Outcome {
        let now = self.clock.now();
        let last_position = self.session.last_known_position();
        warn!("walk to {} failed: {reason}", self.session.destination());
        self.session.transition(NavState::Failed, now);
        let error = SessionFailed {
            reason,
            last_position,
        };
        Outcome::Failed(error, self.session.into_report(now))
    }
}
