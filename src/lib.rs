//! Terminal ground station for the line-following car.
//!
//! Wires the [`link_core`] engine to an operator console: stdin commands
//! drive the shared control state, link events are rendered through `log`,
//! and station arrivals are appended to a durable log file.

pub mod app;
pub mod cli;
pub mod commands;
pub mod console;
pub mod gamepad;
pub mod station_log;

pub use app::{App, Outcome};
pub use cli::{Cli, Cmd, LinkArgs};
pub use commands::{Command, CommandError};
pub use console::{Console, DistanceHistory, Proximity};
pub use station_log::{StationLog, DEFAULT_STATION_LOG};
