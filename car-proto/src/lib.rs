//! Serial frame codec for the line-following car link.
//!
//! This crate holds everything needed to speak the car's wire protocol,
//! without any I/O:
//!
//! - **Types**: [`OutgoingCommand`], [`DriveMode`], [`Settings`], and the
//!   decoded [`Telemetry`] with its tagged [`Reading`]
//! - **Encoding**: [`encode_command`], [`encode_settings`], [`encode_telemetry`]
//! - **Decoding**: [`try_decode_frame`] with one-byte resynchronization, and
//!   [`FrameAccumulator`] which drains a byte stream frame by frame
//! - **Checksum**: [`sum8`] and [`Sum8Digest`]
//!
//! # Protocol Format
//!
//! All frames are fixed-length, delimited by a header and a tail byte, and
//! protected by an additive 8-bit checksum of the interior bytes. There are no
//! sequence numbers or acknowledgements; the link is best-effort.
//!
//! ```text
//! command   : A5 | x:i8 | y:i8 | mode | sum | 5A
//! settings  : B5 | speed% | dwell_s | 00 | sum | 5B
//! telemetry : 55 | state | dir | speed | station | payload | sum | AA
//! ```
//!
//! # Example
//!
//! ```
//! use car_proto::{try_decode_frame, DecodeResult, Reading, VehicleState};
//!
//! let bytes = [0x55, 0x01, 0x00, 0x01, 0x03, 0x2C, 0x31, 0xAA];
//! if let DecodeResult::Frame { telemetry, consumed } = try_decode_frame(&bytes) {
//!     assert_eq!(consumed, 8);
//!     assert_eq!(telemetry.state, VehicleState::Cruising);
//!     assert_eq!(telemetry.reading, Reading::Distance { cm: 44 });
//! }
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host builds)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod accumulator;
pub mod checksum;
pub mod codec;
pub mod types;

// Re-export at crate root for convenience
pub use accumulator::{FrameAccumulator, DEFAULT_CAPACITY};
pub use checksum::{sum8, Sum8Digest};
pub use codec::{
    encode_command, encode_settings, encode_telemetry, try_decode_frame, DecodeResult,
    COMMAND_FRAME_LEN, RX_HEADER, RX_TAIL, SETTINGS_FRAME_LEN, SETTINGS_HEADER, SETTINGS_TAIL,
    TELEMETRY_FRAME_LEN, TX_HEADER, TX_TAIL,
};
pub use types::{
    clamp_axis, Direction, DriveMode, OutgoingCommand, Reading, Settings, SettingsError,
    SpeedFlag, Telemetry, VehicleState, AXIS_MAX, MAX_CRUISE_SPEED_PCT,
};
