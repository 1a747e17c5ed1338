//! Live navigation for an agent in a tile world.
//!
//! [`NavigationManager::walk_to`] drives one walk through the state machine
//!
//! ```text
//! IDLE -> PLANNING -> TRAVELING -> (REPLANNING -> TRAVELING)* -> ARRIVED | FAILED | CANCELLED
//! ```
//!
//! issuing movement commands through an [`Actuator`], polling a
//! [`PositionSensor`] and waiting on a [`Clock`]. A walk replans from the
//! agent's actual position when it stops moving, and at random on waypoint
//! advances so repeated walks to one destination do not settle on a single
//! visible route.

mod cancel;
mod config;
mod io;
mod manager;
mod session;
mod state;

pub use cancel::CancelToken;
pub use config::NavConfig;
pub use io::{Actuator, Clock, PositionSensor, SystemClock};
pub use manager::NavigationManager;
pub use session::NavigationSession;
pub use state::{
    FailureReason, NavEvent, NavState, Outcome, ReplanReason, SessionFailed, WalkReport,
};
