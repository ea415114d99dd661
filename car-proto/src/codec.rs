//! Fixed-length frame encoding and decoding.
//!
//! # Frame Layouts
//!
//! Drive command (ground to vehicle, 6 bytes):
//!
//! ```text
//! [0xA5][axis_x: i8][axis_y: i8][mode: u8][checksum][0x5A]
//! ```
//!
//! Settings (ground to vehicle, 6 bytes):
//!
//! ```text
//! [0xB5][cruise_speed_pct][dwell_seconds][0x00][checksum][0x5B]
//! ```
//!
//! Telemetry (vehicle to ground, 8 bytes):
//!
//! ```text
//! [0x55][state][direction][speed_flag][station_count][payload][checksum][0xAA]
//! ```
//!
//! Each checksum is the wrapping 8-bit sum of the bytes between the header and
//! the checksum byte.
//!
//! # Resynchronization
//!
//! [`try_decode_frame`] never discards more than one byte on a bad frame. A
//! misaligned or corrupted stream is walked forward one byte at a time until a
//! valid header/tail/checksum window lines up, so a single corrupt byte never
//! costs the frames that follow it.

use crate::checksum::{sum8, Sum8Digest};
use crate::types::{OutgoingCommand, Settings, Telemetry};

/// Drive command header byte.
pub const TX_HEADER: u8 = 0xA5;
/// Drive command tail byte.
pub const TX_TAIL: u8 = 0x5A;
/// Settings frame header byte.
pub const SETTINGS_HEADER: u8 = 0xB5;
/// Settings frame tail byte.
pub const SETTINGS_TAIL: u8 = 0x5B;
/// Telemetry frame header byte.
pub const RX_HEADER: u8 = 0x55;
/// Telemetry frame tail byte.
pub const RX_TAIL: u8 = 0xAA;

/// Length of a drive command frame.
pub const COMMAND_FRAME_LEN: usize = 6;
/// Length of a settings frame.
pub const SETTINGS_FRAME_LEN: usize = 6;
/// Length of a telemetry frame.
pub const TELEMETRY_FRAME_LEN: usize = 8;

/// Offset of the checksum byte in a telemetry frame.
const RX_CHECKSUM_OFFSET: usize = 6;

/// Outcome of one decode attempt at the head of a byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[must_use]
pub enum DecodeResult {
    /// Fewer than [`TELEMETRY_FRAME_LEN`] bytes buffered. Wait for more input.
    Incomplete,
    /// A valid frame starts at offset 0. Advance the buffer by `consumed`.
    Frame { telemetry: Telemetry, consumed: usize },
    /// Offset 0 does not start a valid frame. Drop `drop` leading bytes and retry.
    Resync { drop: usize },
}

/// Encode a drive command frame.
#[must_use]
pub fn encode_command(cmd: &OutgoingCommand) -> [u8; COMMAND_FRAME_LEN] {
    let x = cmd.axis_x as u8;
    let y = cmd.axis_y as u8;
    let mode = cmd.mode.code();
    [TX_HEADER, x, y, mode, sum8(&[x, y, mode]), TX_TAIL]
}

/// Encode a settings frame.
#[must_use]
pub fn encode_settings(settings: &Settings) -> [u8; SETTINGS_FRAME_LEN] {
    let speed = settings.cruise_speed_pct();
    let dwell = settings.dwell_seconds();
    [
        SETTINGS_HEADER,
        speed,
        dwell,
        0x00,
        sum8(&[speed, dwell, 0x00]),
        SETTINGS_TAIL,
    ]
}

/// Encode a telemetry frame, as the vehicle would send it.
#[must_use]
pub fn encode_telemetry(telemetry: &Telemetry) -> [u8; TELEMETRY_FRAME_LEN] {
    let fields = telemetry.fields();
    let mut frame = [0u8; TELEMETRY_FRAME_LEN];
    let mut digest = Sum8Digest::new();

    frame[0] = RX_HEADER;
    for (slot, &b) in frame[1..RX_CHECKSUM_OFFSET].iter_mut().zip(fields.iter()) {
        *slot = b;
        digest.update(b);
    }
    frame[RX_CHECKSUM_OFFSET] = digest.finalize();
    frame[TELEMETRY_FRAME_LEN - 1] = RX_TAIL;
    frame
}

/// Try to decode one telemetry frame from the head of `buf`.
///
/// Only the first [`TELEMETRY_FRAME_LEN`] bytes are inspected. The buffer
/// itself is never modified; the caller applies the returned advance.
pub fn try_decode_frame(buf: &[u8]) -> DecodeResult {
    if buf.len() < TELEMETRY_FRAME_LEN {
        return DecodeResult::Incomplete;
    }

    let frame = &buf[..TELEMETRY_FRAME_LEN];
    if frame[0] != RX_HEADER || frame[TELEMETRY_FRAME_LEN - 1] != RX_TAIL {
        return DecodeResult::Resync { drop: 1 };
    }

    let interior = &frame[1..RX_CHECKSUM_OFFSET];
    if sum8(interior) != frame[RX_CHECKSUM_OFFSET] {
        return DecodeResult::Resync { drop: 1 };
    }

    DecodeResult::Frame {
        telemetry: Telemetry::from_fields(
            interior[0],
            interior[1],
            interior[2],
            interior[3],
            interior[4],
        ),
        consumed: TELEMETRY_FRAME_LEN,
    }
}
