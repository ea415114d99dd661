//! Fixed-capacity receive buffer with frame-by-frame draining.

use heapless::Vec;

use crate::codec::{try_decode_frame, DecodeResult};
use crate::types::Telemetry;

/// Default receive buffer capacity (64 telemetry frames).
pub const DEFAULT_CAPACITY: usize = 512;

/// Append-only byte accumulator for the telemetry stream.
///
/// Bytes are appended as they arrive and drained from the front, either a
/// whole frame at a time or one byte at a time while resynchronizing.
///
/// # Overflow
///
/// If appending would exceed the capacity, the oldest bytes are discarded
/// first. A frame boundary lost this way is recovered by the normal resync
/// path.
pub struct FrameAccumulator<const N: usize = DEFAULT_CAPACITY> {
    buf: Vec<u8, N>,
    resynced: usize,
    overflowed: usize,
}

impl<const N: usize> FrameAccumulator<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            resynced: 0,
            overflowed: 0,
        }
    }

    /// Append received bytes.
    ///
    /// Returns the number of old bytes discarded to make room.
    pub fn extend(&mut self, bytes: &[u8]) -> usize {
        if bytes.len() > N {
            let skipped = bytes.len() - N;
            let discarded = skipped + self.buf.len();
            self.overflowed += discarded;
            self.buf.clear();
            let _ = self.buf.extend_from_slice(&bytes[skipped..]);
            return discarded;
        }

        let free = N - self.buf.len();
        let discarded = bytes.len().saturating_sub(free);
        if discarded > 0 {
            self.drop_front(discarded);
            self.overflowed += discarded;
        }
        // Room was made above.
        let _ = self.buf.extend_from_slice(bytes);
        discarded
    }

    /// Decode the next valid frame, resynchronizing past garbage.
    ///
    /// Returns `None` once fewer than a full frame's worth of bytes remain.
    pub fn next_frame(&mut self) -> Option<Telemetry> {
        loop {
            match try_decode_frame(&self.buf) {
                DecodeResult::Incomplete => return None,
                DecodeResult::Frame {
                    telemetry,
                    consumed,
                } => {
                    self.drop_front(consumed);
                    return Some(telemetry);
                }
                DecodeResult::Resync { drop } => {
                    self.drop_front(drop);
                    self.resynced += drop;
                }
            }
        }
    }

    /// Discard all buffered bytes and reset counters.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.resynced = 0;
        self.overflowed = 0;
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Buffered bytes not yet consumed.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Total bytes skipped while resynchronizing.
    #[inline]
    #[must_use]
    pub fn resynced_bytes(&self) -> usize {
        self.resynced
    }

    /// Total bytes discarded because the buffer was full.
    #[inline]
    #[must_use]
    pub fn overflowed_bytes(&self) -> usize {
        self.overflowed
    }

    fn drop_front(&mut self, n: usize) {
        let len = self.buf.len();
        let n = n.min(len);
        self.buf.copy_within(n.., 0);
        self.buf.truncate(len - n);
    }
}

impl<const N: usize> Default for FrameAccumulator<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::codec::encode_telemetry;

    fn frame(station: u8, payload: u8) -> [u8; 8] {
        encode_telemetry(&Telemetry::from_fields(1, 1, 0, station, payload))
    }

    #[test]
    fn test_drains_back_to_back_frames() {
        let mut acc: FrameAccumulator = FrameAccumulator::new();
        acc.extend(&frame(1, 10));
        acc.extend(&frame(2, 20));

        assert_eq!(acc.next_frame().map(|t| t.station_count), Some(1));
        assert_eq!(acc.next_frame().map(|t| t.station_count), Some(2));
        assert_eq!(acc.next_frame(), None);
        assert!(acc.is_empty());
    }

    #[test]
    fn test_frame_split_across_reads() {
        let f = frame(4, 99);
        let mut acc: FrameAccumulator = FrameAccumulator::new();
        acc.extend(&f[..3]);
        assert_eq!(acc.next_frame(), None);
        assert_eq!(acc.len(), 3);
        acc.extend(&f[3..]);
        assert_eq!(acc.next_frame().map(|t| t.distance_cm()), Some(Some(99)));
    }

    #[test]
    fn test_garbage_is_skipped_one_byte_at_a_time() {
        let mut acc: FrameAccumulator = FrameAccumulator::new();
        acc.extend(&[0x00, 0xAA, 0x55]);
        acc.extend(&frame(7, 1));
        assert_eq!(acc.next_frame().map(|t| t.station_count), Some(7));
        assert_eq!(acc.resynced_bytes(), 3);
    }

    #[test]
    fn test_partial_tail_kept_after_drain() {
        let mut acc: FrameAccumulator = FrameAccumulator::new();
        let f = frame(1, 1);
        acc.extend(&f);
        acc.extend(&f[..5]);
        assert!(acc.next_frame().is_some());
        assert_eq!(acc.next_frame(), None);
        assert_eq!(acc.as_slice(), &f[..5]);
    }

    #[test]
    fn test_overflow_discards_oldest() {
        let mut acc: FrameAccumulator<16> = FrameAccumulator::new();
        acc.extend(&[0u8; 12]);
        let discarded = acc.extend(&frame(3, 3));
        assert_eq!(discarded, 4);
        assert_eq!(acc.len(), 16);
        assert_eq!(acc.overflowed_bytes(), 4);
        assert_eq!(acc.next_frame().map(|t| t.station_count), Some(3));
    }

    #[test]
    fn test_oversized_chunk_keeps_newest_bytes() {
        let mut acc: FrameAccumulator<8> = FrameAccumulator::new();
        let mut chunk = [0u8; 12];
        chunk[4..].copy_from_slice(&frame(9, 9));
        acc.extend(&[1, 2]);
        let discarded = acc.extend(&chunk);
        assert_eq!(discarded, 6);
        assert_eq!(acc.next_frame().map(|t| t.station_count), Some(9));
    }

    #[test]
    fn test_clear_resets() {
        let mut acc: FrameAccumulator = FrameAccumulator::new();
        acc.extend(&[0x01, 0x02]);
        acc.clear();
        assert!(acc.is_empty());
        assert_eq!(acc.resynced_bytes(), 0);
    }
}
