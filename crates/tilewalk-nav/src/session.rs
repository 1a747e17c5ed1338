use std::time::Duration;

use log::{debug, info};
use tilewalk_core::Tile;
use tilewalk_paths::Path;

use crate::state::{NavEvent, NavState, ReplanReason, WalkReport};

/// Bookkeeping of one in-flight walk.
///
/// Created per `walk_to` call and consumed into a [`WalkReport`] once a
/// terminal state is reached.
#[derive(Debug)]
pub struct NavigationSession {
    destination: Tile,
    state: NavState,
    active_path: Option<Path>,
    waypoint_index: usize,
    last_known_position: Option<Tile>,
    last_progress: Duration,
    started: Duration,
    stuck_count: u32,
    replans: u32,
    events: Vec<NavEvent>,
}

impl NavigationSession {
    pub fn new(destination: Tile, now: Duration) -> Self {
        Self {
            destination,
            state: NavState::Idle,
            active_path: None,
            waypoint_index: 0,
            last_known_position: None,
            last_progress: now,
            started: now,
            stuck_count: 0,
            replans: 0,
            events: Vec::new(),
        }
    }

    pub fn destination(&self) -> Tile {
        self.destination
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active_path.as_ref()
    }

    pub fn waypoint_index(&self) -> usize {
        self.waypoint_index
    }

    pub fn last_known_position(&self) -> Option<Tile> {
        self.last_known_position
    }

    pub fn stuck_count(&self) -> u32 {
        self.stuck_count
    }

    pub fn replans(&self) -> u32 {
        self.replans
    }

    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started)
    }

    pub fn transition(&mut self, to: NavState, now: Duration) {
        let from = self.state;
        debug_assert!(!from.is_terminal(), "walk already ended in {from}");
        if from == to {
            return;
        }
        if to.is_terminal() {
            info!("walk to {}: {from} -> {to}", self.destination);
        } else {
            debug!("walk to {}: {from} -> {to}", self.destination);
        }
        self.state = to;
        self.events.push(NavEvent::StateChanged { from, to, at: now });
    }

    /// Start following `path` from its first tile.
    pub fn adopt_path(&mut self, path: Path, reason: Option<ReplanReason>) {
        if reason.is_some() {
            self.replans += 1;
        }
        self.events.push(NavEvent::PathPlanned {
            start: path.start(),
            end: path.end(),
            tiles: path.len(),
            waypoints: path.waypoints().len(),
            reason,
        });
        self.active_path = Some(path);
        self.waypoint_index = 0;
    }

    /// Record a position reading. Returns whether it differs from the last one.
    pub fn observe(&mut self, pos: Tile, now: Duration) -> bool {
        if self.last_known_position == Some(pos) {
            return false;
        }
        self.last_known_position = Some(pos);
        self.last_progress = now;
        true
    }

    /// Whether the position has been unchanged for longer than `timeout`.
    pub fn is_stuck(&self, now: Duration, timeout: Duration) -> bool {
        now.saturating_sub(self.last_progress) > timeout
    }

    /// Count a stuck detection and restart the stuck timer.
    pub fn record_stuck(&mut self, now: Duration) {
        self.stuck_count += 1;
        self.last_progress = now;
        if let Some(position) = self.last_known_position {
            self.events.push(NavEvent::StuckDetected {
                position,
                count: self.stuck_count,
            });
        }
    }

    /// Move the waypoint index forward if `pos` is within `tolerance` of a
    /// later tile of the active path. Returns the new index.
    pub fn advance(&mut self, pos: Tile, tolerance: i32) -> Option<usize> {
        let path = self.active_path.as_ref()?;
        let (index, dist) = path.nearest_index(pos, self.waypoint_index);
        if dist > tolerance || index <= self.waypoint_index {
            return None;
        }
        self.waypoint_index = index;
        self.events.push(NavEvent::WaypointAdvanced {
            index,
            position: pos,
        });
        Some(index)
    }

    pub fn push_event(&mut self, event: NavEvent) {
        self.events.push(event);
    }

    pub fn into_report(self, now: Duration) -> WalkReport {
        WalkReport {
            destination: self.destination,
            final_position: self.last_known_position,
            elapsed: now.saturating_sub(self.started),
            replans: self.replans,
            stuck_count: self.stuck_count,
            events: self.events,
        }
    }
}
