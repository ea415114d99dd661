//! Terminal rendering of link events.
//!
//! [`Console`] is the operator-side [`TelemetrySink`]: the main thread drains
//! the link's event queue into it. Status lines go through `log`, station
//! arrivals also go to the [`StationLog`] file.

use std::collections::VecDeque;

use car_proto::{Direction, SpeedFlag, Telemetry, VehicleState};
use link_core::{StationArrival, TelemetrySink};
use log::{error, info, trace, warn};

use crate::station_log::StationLog;

/// Number of distance readings kept for the history summary.
pub const HISTORY_LEN: usize = 100;

#[must_use]
pub fn state_label(state: VehicleState) -> &'static str {
    match state {
        VehicleState::Idle => "idle",
        VehicleState::Cruising => "cruising",
        VehicleState::EmergencyBrake => "emergency brake (AEB)",
        VehicleState::Docked => "docked",
        VehicleState::Unknown(_) => "unknown state",
    }
}

#[must_use]
pub fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Stop => "stop",
        Direction::Forward => "forward",
        Direction::Reverse => "reverse",
        Direction::RotateLeft => "rotate left",
        Direction::RotateRight => "rotate right",
        Direction::Unknown(_) => "--",
    }
}

/// Speed text; a stopped, idle or docked vehicle is always stationary.
#[must_use]
pub fn speed_label(telemetry: &Telemetry) -> &'static str {
    let stationary = telemetry.direction == Direction::Stop
        || matches!(telemetry.state, VehicleState::Idle | VehicleState::Docked);
    if stationary {
        return "stationary";
    }
    match telemetry.speed {
        SpeedFlag::Fast => "fast",
        SpeedFlag::Slow | SpeedFlag::Unknown(_) => "slow",
    }
}

/// Obstacle proximity band derived from one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proximity {
    /// No echo, or nothing within 60 cm.
    Clear,
    /// Below 60 cm.
    Caution,
    /// Below 40 cm.
    Approaching,
    /// Below 20 cm.
    Collision,
    /// Vehicle reports emergency braking, whatever the distance.
    EmergencyBrake,
    /// Docked; the payload is a countdown, not a distance.
    AtStation,
}

impl Proximity {
    #[must_use]
    pub fn classify(telemetry: &Telemetry) -> Self {
        let Some(cm) = telemetry.distance_cm() else {
            return Self::AtStation;
        };
        if telemetry.state == VehicleState::EmergencyBrake {
            return Self::EmergencyBrake;
        }
        match cm {
            0 => Self::Clear,
            1..=19 => Self::Collision,
            20..=39 => Self::Approaching,
            40..=59 => Self::Caution,
            _ => Self::Clear,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Clear => "path clear",
            Self::Caution => "caution",
            Self::Approaching => "approaching obstacle",
            Self::Collision => "collision warning",
            Self::EmergencyBrake => "AEB engaged",
            Self::AtStation => "station work in progress",
        }
    }

    /// Whether the operator should be alerted.
    #[must_use]
    pub fn is_alert(self) -> bool {
        matches!(self, Self::Collision | Self::EmergencyBrake)
    }
}

/// One-line status text for a frame.
#[must_use]
pub fn render_status(telemetry: &Telemetry) -> String {
    let state = match telemetry.countdown_s() {
        Some(seconds) => format!("docked {}s", seconds),
        None => state_label(telemetry.state).to_owned(),
    };
    let reading = match telemetry.distance_cm() {
        Some(cm) => format!("{} cm", cm),
        None => "---".to_owned(),
    };
    format!(
        "{} | {} ({}) | station {} | {} | {}",
        state,
        direction_label(telemetry.direction),
        speed_label(telemetry),
        telemetry.station_count,
        reading,
        Proximity::classify(telemetry).label()
    )
}

/// Summary of the recent distance readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySummary {
    pub samples: usize,
    pub min_cm: u8,
    pub max_cm: u8,
    pub mean_cm: f32,
    pub latest_cm: u8,
}

/// Rolling window of the last [`HISTORY_LEN`] distance readings.
#[derive(Debug, Default)]
pub struct DistanceHistory {
    readings: VecDeque<u8>,
}

impl DistanceHistory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            readings: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    pub fn push(&mut self, cm: u8) {
        if self.readings.len() == HISTORY_LEN {
            self.readings.pop_front();
        }
        self.readings.push_back(cm);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    #[must_use]
    pub fn summary(&self) -> Option<HistorySummary> {
        let latest_cm = *self.readings.back()?;
        let sum: u32 = self.readings.iter().map(|&cm| u32::from(cm)).sum();
        Some(HistorySummary {
            samples: self.readings.len(),
            min_cm: self.readings.iter().copied().min().unwrap_or_default(),
            max_cm: self.readings.iter().copied().max().unwrap_or_default(),
            mean_cm: sum as f32 / self.readings.len() as f32,
            latest_cm,
        })
    }
}

/// Operator-side sink.
pub struct Console {
    history: DistanceHistory,
    station_log: Option<StationLog>,
    last_status: Option<String>,
    last_proximity: Option<Proximity>,
    frames: u64,
}

impl Console {
    #[must_use]
    pub fn new(station_log: Option<StationLog>) -> Self {
        Self {
            history: DistanceHistory::new(),
            station_log,
            last_status: None,
            last_proximity: None,
            frames: 0,
        }
    }

    #[must_use]
    pub fn history(&self) -> &DistanceHistory {
        &self.history
    }

    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Print the history summary.
    pub fn print_history(&self) {
        match self.history.summary() {
            Some(s) => info!(
                "distance over last {} readings: min {} cm, avg {:.1} cm, max {} cm, latest {} cm",
                s.samples, s.min_cm, s.mean_cm, s.max_cm, s.latest_cm
            ),
            None => info!("no distance readings yet"),
        }
    }

    /// Forget per-connection display state.
    pub fn reset(&mut self) {
        self.last_status = None;
        self.last_proximity = None;
    }
}

impl TelemetrySink for Console {
    fn on_telemetry(&mut self, telemetry: &Telemetry) {
        self.frames += 1;
        // The countdown is not a distance; keep it out of the history.
        if let Some(cm) = telemetry.distance_cm() {
            self.history.push(cm);
        }

        let status = render_status(telemetry);
        if self.last_status.as_deref() == Some(status.as_str()) {
            trace!("{}", status);
        } else {
            info!("{}", status);
            self.last_status = Some(status);
        }

        let proximity = Proximity::classify(telemetry);
        if proximity.is_alert() && self.last_proximity != Some(proximity) {
            warn!("{}", proximity.label());
        }
        self.last_proximity = Some(proximity);
    }

    fn on_station_arrival(&mut self, arrival: &StationArrival) {
        info!(
            "arrived at station {} at {}, docking",
            arrival.station_index,
            arrival.timestamp.format("%H:%M:%S")
        );
        if let Some(log) = self.station_log.as_mut() {
            if let Err(e) = log.record(arrival) {
                error!("failed to write {}: {}", log.path().display(), e);
            }
        }
    }

    fn on_link_error(&mut self, message: &str) {
        warn!("link: {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::fs;

    fn frame(state: u8, dir: u8, speed: u8, payload: u8) -> Telemetry {
        Telemetry::from_fields(state, dir, speed, 1, payload)
    }

    #[test]
    fn test_speed_label() {
        assert_eq!(speed_label(&frame(1, 1, 1, 80)), "fast");
        assert_eq!(speed_label(&frame(1, 1, 0, 80)), "slow");
        assert_eq!(speed_label(&frame(1, 0, 1, 80)), "stationary");
        assert_eq!(speed_label(&frame(0, 1, 1, 80)), "stationary");
        assert_eq!(speed_label(&frame(3, 1, 1, 5)), "stationary");
        assert_eq!(speed_label(&frame(2, 1, 1, 10)), "fast");
    }

    #[test]
    fn test_proximity_bands() {
        let band = |cm| Proximity::classify(&frame(1, 1, 0, cm));
        assert_eq!(band(0), Proximity::Clear);
        assert_eq!(band(5), Proximity::Collision);
        assert_eq!(band(19), Proximity::Collision);
        assert_eq!(band(20), Proximity::Approaching);
        assert_eq!(band(39), Proximity::Approaching);
        assert_eq!(band(40), Proximity::Caution);
        assert_eq!(band(59), Proximity::Caution);
        assert_eq!(band(60), Proximity::Clear);
        assert_eq!(band(250), Proximity::Clear);
    }

    #[test]
    fn test_emergency_brake_overrides_band() {
        assert_eq!(
            Proximity::classify(&frame(2, 0, 0, 90)),
            Proximity::EmergencyBrake
        );
        assert_eq!(
            Proximity::classify(&frame(3, 0, 0, 10)),
            Proximity::AtStation
        );
    }

    #[test]
    fn test_render_status() {
        assert_eq!(
            render_status(&frame(1, 1, 1, 44)),
            "cruising | forward (fast) | station 1 | 44 cm | path clear"
        );
        assert_eq!(
            render_status(&frame(3, 0, 0, 7)),
            "docked 7s | stop (stationary) | station 1 | --- | station work in progress"
        );
    }

    #[test]
    fn test_history_window() {
        let mut history = DistanceHistory::new();
        assert!(history.summary().is_none());

        for cm in 0..150u8 {
            history.push(cm);
        }
        let s = history.summary().unwrap();
        assert_eq!(history.len(), HISTORY_LEN);
        assert_eq!(s.min_cm, 50);
        assert_eq!(s.max_cm, 149);
        assert_eq!(s.latest_cm, 149);
        assert!((s.mean_cm - 99.5).abs() < 1e-3);
    }

    #[test]
    fn test_countdown_not_recorded_as_distance() {
        let mut console = Console::new(None);
        console.on_telemetry(&frame(1, 1, 0, 120));
        console.on_telemetry(&frame(3, 0, 0, 9));
        console.on_telemetry(&frame(3, 0, 0, 8));

        assert_eq!(console.frames(), 3);
        assert_eq!(console.history().len(), 1);
        assert_eq!(console.history().summary().unwrap().latest_cm, 120);
    }

    #[test]
    fn test_arrival_written_to_station_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stations.txt");
        let mut console = Console::new(Some(StationLog::open(&path).unwrap()));

        console.on_station_arrival(&StationArrival {
            station_index: 4,
            timestamp: Local::now(),
        });
        console.on_link_error("serial I/O failing");

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("抵达站点: 第4站 | 执行停靠程序"));
    }
}
