//! Additive 8-bit checksum shared by every frame type.
//!
//! The checksum is the wrapping sum of the interior bytes (everything between
//! the header and the checksum byte), truncated to 8 bits.

/// Wrapping 8-bit sum of a byte slice.
#[inline]
#[must_use]
pub fn sum8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Incremental 8-bit sum, for building a frame byte-by-byte.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sum8Digest {
    acc: u8,
}

impl Sum8Digest {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { acc: 0 }
    }

    /// Add a single byte.
    #[inline]
    pub fn update(&mut self, byte: u8) {
        self.acc = self.acc.wrapping_add(byte);
    }

    /// Add a byte slice.
    #[inline]
    pub fn update_slice(&mut self, data: &[u8]) {
        self.acc = self.acc.wrapping_add(sum8(data));
    }

    /// Return the checksum value.
    #[inline]
    #[must_use]
    pub const fn finalize(self) -> u8 {
        self.acc
    }
}
