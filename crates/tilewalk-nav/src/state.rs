//! Walk states, telemetry events and outcomes.

use std::fmt;
use std::time::Duration;

use tilewalk_core::Tile;
use tilewalk_paths::Unreachable;

/// Navigation state machine.
///
/// `Idle -> Planning -> Traveling -> (Replanning -> Traveling)* -> Arrived | Failed | Cancelled`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NavState {
    Idle,
    Planning,
    Traveling,
    Replanning,
    Arrived,
    Failed,
    Cancelled,
}

impl NavState {
    /// Is this a terminal state?
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Arrived | Self::Failed | Self::Cancelled)
    }

    /// State name for logging
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Planning => "PLANNING",
            Self::Traveling => "TRAVELING",
            Self::Replanning => "REPLANNING",
            Self::Arrived => "ARRIVED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a route was recomputed mid-walk.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReplanReason {
    /// The position stopped changing.
    Stuck,
    /// Random reroute while progressing normally.
    Opportunistic,
}

/// Telemetry recorded during a walk, in order.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NavEvent {
    StateChanged {
        from: NavState,
        to: NavState,
        at: Duration,
    },
    /// A route was adopted. `reason` is `None` for the initial plan.
    PathPlanned {
        start: Tile,
        end: Tile,
        tiles: usize,
        waypoints: usize,
        reason: Option<ReplanReason>,
    },
    /// The agent was seen at or near path tile `index`.
    WaypointAdvanced { index: usize, position: Tile },
    StuckDetected { position: Tile, count: u32 },
    /// An opportunistic replan found no route; the old one is kept.
    ReplanSkipped { position: Tile },
    /// Every read of a position poll failed.
    SensorUnavailable { attempts: u32 },
}

/// What ended a failed walk.
#[derive(Clone, Debug, PartialEq)]
pub enum FailureReason {
    /// No route from the starting position.
    Unreachable(Unreachable),
    /// The agent got stuck and no route exists from where it stands.
    StuckUnreachable(Unreachable),
    /// The position could not be read when a plan needed it.
    SensorUnavailable,
    TimedOut(Duration),
    TooManyReplans(u32),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable(u) => write!(f, "{u}"),
            Self::StuckUnreachable(u) => write!(f, "stuck, and {u}"),
            Self::SensorUnavailable => f.write_str("position unavailable"),
            Self::TimedOut(d) => write!(f, "walk exceeded {d:?}"),
            Self::TooManyReplans(n) => write!(f, "gave up after {n} replans"),
        }
    }
}

/// Terminal walk failure, with the last position the agent was seen at.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionFailed {
    pub reason: FailureReason,
    pub last_position: Option<Tile>,
}

impl fmt::Display for SessionFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last_position {
            Some(p) => write!(f, "navigation failed at {p}: {}", self.reason),
            None => write!(f, "navigation failed: {}", self.reason),
        }
    }
}

impl std::error::Error for SessionFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.reason {
            FailureReason::Unreachable(u) | FailureReason::StuckUnreachable(u) => Some(u),
            _ => None,
        }
    }
}

/// Summary of a finished walk.
#[derive(Clone, Debug, PartialEq)]
pub struct WalkReport {
    pub destination: Tile,
    pub final_position: Option<Tile>,
    pub elapsed: Duration,
    pub replans: u32,
    pub stuck_count: u32,
    pub events: Vec<NavEvent>,
}

impl WalkReport {
    /// Every state the walk went through, starting with `Idle`.
    pub fn states(&self) -> Vec<NavState> {
        let mut out = vec![NavState::Idle];
        out.extend(self.events.iter().filter_map(|e| match e {
            NavEvent::StateChanged { to, .. } => Some(*to),
            _ => None,
        }));
        out
    }

    /// Routes adopted during the walk, in order.
    pub fn planned(&self) -> impl Iterator<Item = &NavEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, NavEvent::PathPlanned { .. }))
    }
}

/// How a walk ended.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Arrived(WalkReport),
    Cancelled(WalkReport),
    Failed(SessionFailed, WalkReport),
}

impl Outcome {
    /// The terminal state this outcome corresponds to.
    pub fn state(&self) -> NavState {
        match self {
            Self::Arrived(_) => NavState::Arrived,
            Self::Cancelled(_) => NavState::Cancelled,
            Self::Failed(..) => NavState::Failed,
        }
    }

    pub fn is_arrived(&self) -> bool {
        matches!(self, Self::Arrived(_))
    }

    pub fn report(&self) -> &WalkReport {
        match self {
            Self::Arrived(r) | Self::Cancelled(r) | Self::Failed(_, r) => r,
        }
    }

    pub fn failure(&self) -> Option<&SessionFailed> {
        match self {
            Self::Failed(e, _) => Some(e),
            _ => None,
        }
    }
}
