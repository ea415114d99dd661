//! Background serial link engine for the car ground station.
//!
//! The link owns the serial port on a dedicated worker thread and runs a
//! fixed 50 ms tick: it streams drive commands, forwards one-shot settings
//! frames, reassembles telemetry and reports station arrivals. Everything the
//! operator side needs crosses a thread boundary through one of two seams:
//!
//! - [`ControlState`]: shared, lock-guarded command the operator writes and
//!   the link reads every tick
//! - [`TelemetrySink`]: callbacks fired by the link; [`ChannelSink`] turns
//!   them into [`LinkEvent`]s on a bounded drop-oldest queue, with arrivals
//!   and errors on a lane that is never evicted
//!
//! # Modules
//!
//! - [`serial`]: port settings and the [`Transport`] trait
//! - [`gamepad`]: dead-zone filtered controller polling ([`GamepadPoller`])
//! - [`station`]: station arrival de-duplication
//! - [`link`]: the tick loop and the [`Link`] connect/disconnect machine
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use link_core::{event_channel, ControlState, GamepadPoller, Link, SerialSettings};
//!
//! let mut link = Link::new(Arc::new(ControlState::new()));
//! let (sink, events) = event_channel(link_core::EVENT_QUEUE_CAPACITY);
//! link.connect(&SerialSettings::new("/dev/ttyUSB0"), sink, GamepadPoller::detached)?;
//!
//! while let Ok(event) = events.recv_timeout(std::time::Duration::from_secs(1)) {
//!     println!("{:?}", event);
//! }
//! link.disconnect();
//! # Ok::<(), link_core::LinkError>(())
//! ```

pub mod control;
pub mod error;
pub mod gamepad;
pub mod link;
pub mod serial;
pub mod sink;
pub mod station;

pub use control::ControlState;
pub use error::LinkError;
pub use gamepad::{apply_dead_zone, scale_axis, AxisSource, GamepadPoller, NoController, DEAD_ZONE};
pub use link::{
    should_transmit, Link, LinkCommand, LinkHandle, LinkLoop, LinkState, LinkStats,
    ERROR_REPORT_THRESHOLD, TICK_INTERVAL, TX_PERIOD_MS, TX_WINDOW_MS,
};
pub use serial::{BaudRate, DataBits, Parity, SerialSettings, StopBits, Transport, READ_TIMEOUT};
pub use sink::{
    event_channel, ChannelSink, EventReceiver, LinkEvent, StationArrival, TelemetrySink,
    EVENT_QUEUE_CAPACITY,
};
pub use station::StationTracker;
