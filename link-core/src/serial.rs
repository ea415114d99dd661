//! Serial port configuration and the byte transport the link loop drives.

use core::fmt;
use core::str::FromStr;
use std::io::{self, Read, Write};
use std::time::Duration;

use log::debug;
use serialport::SerialPort;

use crate::error::LinkError;

/// Read timeout applied to every opened port.
pub const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Supported line rates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BaudRate {
    #[default]
    B9600,
    B115200,
}

impl BaudRate {
    #[must_use]
    pub const fn bits_per_second(self) -> u32 {
        match self {
            Self::B9600 => 9_600,
            Self::B115200 => 115_200,
        }
    }
}

impl FromStr for BaudRate {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "9600" => Ok(Self::B9600),
            "115200" => Ok(Self::B115200),
            other => Err(LinkError::InvalidSetting(format!(
                "baud rate {other} (expected 9600 or 115200)"
            ))),
        }
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits_per_second())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl DataBits {
    #[must_use]
    pub const fn count(self) -> u8 {
        match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

impl FromStr for DataBits {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "5" => Ok(Self::Five),
            "6" => Ok(Self::Six),
            "7" => Ok(Self::Seven),
            "8" => Ok(Self::Eight),
            other => Err(LinkError::InvalidSetting(format!(
                "data bits {other} (expected 5, 6, 7 or 8)"
            ))),
        }
    }
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    /// Map onto the serial backend. Mark and space parity have no
    /// portable equivalent there.
    pub fn to_backend(self) -> Result<serialport::Parity, LinkError> {
        match self {
            Self::None => Ok(serialport::Parity::None),
            Self::Odd => Ok(serialport::Parity::Odd),
            Self::Even => Ok(serialport::Parity::Even),
            Self::Mark => Err(LinkError::Unsupported("mark parity")),
            Self::Space => Err(LinkError::Unsupported("space parity")),
        }
    }
}

impl FromStr for Parity {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Self::None),
            "odd" | "o" => Ok(Self::Odd),
            "even" | "e" => Ok(Self::Even),
            "mark" | "m" => Ok(Self::Mark),
            "space" | "s" => Ok(Self::Space),
            other => Err(LinkError::InvalidSetting(format!(
                "parity {other} (expected none, odd, even, mark or space)"
            ))),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Odd => "odd",
            Self::Even => "even",
            Self::Mark => "mark",
            Self::Space => "space",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    /// Map onto the serial backend, which has no 1.5 stop bit setting.
    pub fn to_backend(self) -> Result<serialport::StopBits, LinkError> {
        match self {
            Self::One => Ok(serialport::StopBits::One),
            Self::OnePointFive => Err(LinkError::Unsupported("1.5 stop bits")),
            Self::Two => Ok(serialport::StopBits::Two),
        }
    }
}

impl FromStr for StopBits {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Self::One),
            "1.5" => Ok(Self::OnePointFive),
            "2" => Ok(Self::Two),
            other => Err(LinkError::InvalidSetting(format!(
                "stop bits {other} (expected 1, 1.5 or 2)"
            ))),
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::One => "1",
            Self::OnePointFive => "1.5",
            Self::Two => "2",
        };
        f.write_str(name)
    }
}

/// Everything needed to open the vehicle's serial port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud: BaudRate,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl SerialSettings {
    /// 9600 baud, 8 data bits, no parity, 1 stop bit.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud: BaudRate::default(),
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
        }
    }

    /// Open the port with these settings and the fixed [`READ_TIMEOUT`].
    pub fn open(&self) -> Result<Box<dyn SerialPort>, LinkError> {
        let parity = self.parity.to_backend()?;
        let stop_bits = self.stop_bits.to_backend()?;

        debug!("opening {}", self);
        serialport::new(self.port.as_str(), self.baud.bits_per_second())
            .data_bits(self.data_bits.into())
            .parity(parity)
            .stop_bits(stop_bits)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| LinkError::DeviceOpen {
                port: self.port.clone(),
                source,
            })
    }
}

impl fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}bps, {} data bits, parity {}, {} stop bits",
            self.port, self.baud, self.data_bits, self.parity, self.stop_bits
        )
    }
}

/// Byte transport exclusively owned by the link loop.
///
/// Implemented for real serial ports; tests substitute an in-memory wire.
pub trait Transport: Send {
    /// Write one complete frame.
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Read whatever is already buffered, up to `buf.len()` bytes.
    ///
    /// Returns `Ok(0)` when nothing is waiting. Must not wait longer than
    /// the port's read timeout.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl Transport for Box<dyn SerialPort> {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.write_all(frame)?;
        self.flush()
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let waiting = self.bytes_to_read().map_err(io::Error::from)? as usize;
        if waiting == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = waiting.min(buf.len());
        match self.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }
}
