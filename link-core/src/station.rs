//! Station arrival de-duplication.
//!
//! The vehicle keeps reporting the docked state for the whole dwell time, so
//! the same station shows up in many consecutive frames. An arrival is the
//! first docked frame carrying a station count not seen yet on this
//! connection.

use car_proto::Telemetry;

#[derive(Debug, Default)]
pub struct StationTracker {
    last_reported: Option<u8>,
}

impl StationTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_reported: None,
        }
    }

    /// Feed one frame. Returns the station index if this frame is a new arrival.
    pub fn observe(&mut self, telemetry: &Telemetry) -> Option<u8> {
        if !telemetry.state.is_docked() {
            return None;
        }
        let station = telemetry.station_count;
        if self.last_reported == Some(station) {
            return None;
        }
        self.last_reported = Some(station);
        Some(station)
    }

    /// Forget the last reported station.
    pub fn reset(&mut self) {
        self.last_reported = None;
    }

    #[must_use]
    pub fn last_reported(&self) -> Option<u8> {
        self.last_reported
    }
}
