//! Wire-level value types: drive commands, vehicle settings, and decoded telemetry.

/// Largest axis magnitude carried on the wire.
pub const AXIS_MAX: i8 = 127;

/// Highest cruise speed the vehicle accepts, in percent.
pub const MAX_CRUISE_SPEED_PCT: u8 = 100;

/// Driving mode carried in every outgoing command.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DriveMode {
    /// Vehicle follows the line on its own; axes are ignored.
    #[default]
    Autonomous = 0,
    /// Vehicle is driven by the ground station's axes.
    Manual = 1,
}

impl DriveMode {
    /// Raw mode byte as sent on the wire.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[inline]
    #[must_use]
    pub const fn is_manual(self) -> bool {
        matches!(self, Self::Manual)
    }

    /// The other mode.
    #[inline]
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Autonomous => Self::Manual,
            Self::Manual => Self::Autonomous,
        }
    }
}

/// Clamp an arbitrary integer to the symmetric axis range [-127, 127].
#[inline]
#[must_use]
pub fn clamp_axis(value: i32) -> i8 {
    value.clamp(-(AXIS_MAX as i32), AXIS_MAX as i32) as i8
}

/// Outgoing drive command snapshot.
///
/// `axis_x` is lateral intent (positive = right), `axis_y` is forward intent
/// (positive = forward). Both stay within [-127, 127].
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutgoingCommand {
    pub axis_x: i8,
    pub axis_y: i8,
    pub mode: DriveMode,
}

impl OutgoingCommand {
    /// Create a command, clamping `-128` to the symmetric range.
    #[must_use]
    pub fn new(axis_x: i8, axis_y: i8, mode: DriveMode) -> Self {
        Self {
            axis_x: clamp_axis(axis_x as i32),
            axis_y: clamp_axis(axis_y as i32),
            mode,
        }
    }

    /// Centered axes in the given mode.
    #[must_use]
    pub const fn neutral(mode: DriveMode) -> Self {
        Self {
            axis_x: 0,
            axis_y: 0,
            mode,
        }
    }
}

/// Error returned when vehicle settings are out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    /// Cruise speed above [`MAX_CRUISE_SPEED_PCT`].
    SpeedOutOfRange(u8),
}

impl core::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SpeedOutOfRange(pct) => write!(
                f,
                "cruise speed {pct}% is above the {MAX_CRUISE_SPEED_PCT}% limit"
            ),
        }
    }
}

/// Cruise parameters pushed to the vehicle on explicit user action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    cruise_speed_pct: u8,
    dwell_seconds: u8,
}

impl Settings {
    /// Validate and build a settings value.
    pub fn new(cruise_speed_pct: u8, dwell_seconds: u8) -> Result<Self, SettingsError> {
        if cruise_speed_pct > MAX_CRUISE_SPEED_PCT {
            return Err(SettingsError::SpeedOutOfRange(cruise_speed_pct));
        }
        Ok(Self {
            cruise_speed_pct,
            dwell_seconds,
        })
    }

    #[inline]
    #[must_use]
    pub const fn cruise_speed_pct(&self) -> u8 {
        self.cruise_speed_pct
    }

    /// Seconds the vehicle waits at each station.
    #[inline]
    #[must_use]
    pub const fn dwell_seconds(&self) -> u8 {
        self.dwell_seconds
    }
}

/// High-level vehicle state reported in telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VehicleState {
    Idle,
    Cruising,
    /// Automatic emergency braking engaged by the obstacle sensor.
    EmergencyBrake,
    /// Stopped at a station; the payload is a countdown.
    Docked,
    /// Code not known to this ground station.
    Unknown(u8),
}

impl VehicleState {
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Idle,
            1 => Self::Cruising,
            2 => Self::EmergencyBrake,
            3 => Self::Docked,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Cruising => 1,
            Self::EmergencyBrake => 2,
            Self::Docked => 3,
            Self::Unknown(code) => code,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_docked(self) -> bool {
        matches!(self, Self::Docked)
    }
}

/// Motion direction reported in telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Stop,
    Forward,
    Reverse,
    RotateLeft,
    RotateRight,
    Unknown(u8),
}

impl Direction {
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Stop,
            1 => Self::Forward,
            2 => Self::Reverse,
            3 => Self::RotateLeft,
            4 => Self::RotateRight,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Stop => 0,
            Self::Forward => 1,
            Self::Reverse => 2,
            Self::RotateLeft => 3,
            Self::RotateRight => 4,
            Self::Unknown(code) => code,
        }
    }
}

/// Speed gear flag reported in telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpeedFlag {
    Slow,
    Fast,
    Unknown(u8),
}

impl SpeedFlag {
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Slow,
            1 => Self::Fast,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Slow => 0,
            Self::Fast => 1,
            Self::Unknown(code) => code,
        }
    }
}

/// Payload byte, interpreted according to the vehicle state.
///
/// While docked the vehicle reports the seconds left before departure;
/// in every other state it reports the ultrasonic distance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reading {
    Distance { cm: u8 },
    Countdown { seconds: u8 },
}

impl Reading {
    /// Interpret a raw payload byte for the given state.
    #[must_use]
    pub const fn for_state(state: VehicleState, payload: u8) -> Self {
        if state.is_docked() {
            Self::Countdown { seconds: payload }
        } else {
            Self::Distance { cm: payload }
        }
    }

    /// Raw payload byte.
    #[must_use]
    pub const fn raw(self) -> u8 {
        match self {
            Self::Distance { cm } => cm,
            Self::Countdown { seconds } => seconds,
        }
    }
}

/// One decoded telemetry frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Telemetry {
    pub state: VehicleState,
    pub direction: Direction,
    pub speed: SpeedFlag,
    /// Number of stations reached; only advances while docked.
    pub station_count: u8,
    pub reading: Reading,
}

impl Telemetry {
    /// Build telemetry from the five interior frame bytes.
    #[must_use]
    pub const fn from_fields(
        state: u8,
        direction: u8,
        speed_flag: u8,
        station_count: u8,
        payload: u8,
    ) -> Self {
        let state = VehicleState::from_code(state);
        Self {
            state,
            direction: Direction::from_code(direction),
            speed: SpeedFlag::from_code(speed_flag),
            station_count,
            reading: Reading::for_state(state, payload),
        }
    }

    /// The five interior bytes in wire order.
    #[must_use]
    pub const fn fields(&self) -> [u8; 5] {
        [
            self.state.code(),
            self.direction.code(),
            self.speed.code(),
            self.station_count,
            self.reading.raw(),
        ]
    }

    /// Distance in centimetres, if this frame carries one.
    #[must_use]
    pub const fn distance_cm(&self) -> Option<u8> {
        match self.reading {
            Reading::Distance { cm } => Some(cm),
            Reading::Countdown { .. } => None,
        }
    }

    /// Seconds until departure, if docked.
    #[must_use]
    pub const fn countdown_s(&self) -> Option<u8> {
        match self.reading {
            Reading::Countdown { seconds } => Some(seconds),
            Reading::Distance { .. } => None,
        }
    }
}
