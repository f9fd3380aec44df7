//! Dakiya navigator - host side of the table-delivery robot
//!
//! Plans routes on a grid floor plan, converts them into turn/move
//! primitives and drives the firmware over a line-oriented serial link.
//! Motion is open loop: the host waits out each primitive's calibrated
//! duration plus a safety buffer before issuing the next, while the
//! firmware handles obstacle pauses on its own.
//!
//! ```text
//!  DeliverySession ──► GridPathfinder ──► Route (cells + table stops)
//!        │
//!        ▼  worker thread
//!  MotionPlanner ──► RobotContext (pose, calibration) ──► LinkTransport
//!        │                                                     │
//!      Pacer                                     serial / simulated / mock
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod link;
pub mod motion;
pub mod planning;
pub mod pose;
pub mod session;

pub use config::DakiyaConfig;
pub use context::{RobotContext, SharedContext};
pub use error::{NavError, PlanError, Result, TransportError};
pub use link::{Endpoint, LinkEvent, LinkTransport};
pub use motion::{MotionPlanner, MotionPrimitive};
pub use planning::{Cell, FloorPlan, GridPathfinder, Route};
pub use pose::{Heading, Pose, turn_angle};
pub use session::{DeliverySession, DeliveryStart, SessionEvent, SessionSettings};
