//! Operator side of the control group.
//!
//! [`Controller`] squawks Start, Update and Finish frames. [`Watcher`]
//! listens for heartbeats and metrics and keeps an [`AgentBoard`] of every
//! agent it has heard from.
mod board;
mod issue;
mod watch;


pub use board::{AgentBoard, AgentRecord, AgentState, FleetTotals, STALE_AFTER, watch_line};
pub use issue::Controller;
pub use watch::{LineWriter, Watcher};
