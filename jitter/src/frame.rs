/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

use std::fmt;
use std::sync::Arc;

use crate::sample::Sample;
use crate::Result;

/// Signed distance from `reference` to `timestamp` in media clock ticks.
///
/// The 32-bit difference is computed with wrapping subtraction and then
/// interpreted as a signed 16-bit value. Ordering stays correct across the
/// `u32` rollover as long as every live offset is within ±32767 ticks, which
/// is why window sizes are validated against [`MAX_WINDOW_SAMPLES`].
pub fn timestamp_offset(timestamp: u32, reference: u32) -> i32 {
    timestamp.wrapping_sub(reference) as u16 as i16 as i32
}

/// Largest window (in samples) that keeps [`timestamp_offset`] unambiguous.
pub const MAX_WINDOW_SAMPLES: u32 = i16::MAX as u32;

/// Turns a frame payload into PCM samples.
///
/// One decoder is usually shared by every frame of a stream, so it is held
/// behind an `Arc` and must not rely on per-call mutable state.
pub trait FrameDecoder<S: Sample>: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Result<Vec<S>>;
}

impl<S, F> FrameDecoder<S> for F
where
    S: Sample,
    F: Fn(&[u8]) -> Result<Vec<S>> + Send + Sync,
{
    fn decode(&self, payload: &[u8]) -> Result<Vec<S>> {
        self(payload)
    }
}

/// One timestamped unit of audio travelling from producer to consumer.
pub struct Frame<S: Sample> {
    sequence: u16,
    timestamp: u32,
    marker: bool,
    ssrc: u32,
    payload: Vec<u8>,
    decoder: Option<Arc<dyn FrameDecoder<S>>>,
}

impl<S: Sample> Frame<S> {
    /// Create a frame whose payload is raw little-endian samples.
    pub fn new(sequence: u16, timestamp: u32, marker: bool, ssrc: u32, payload: Vec<u8>) -> Self {
        Self {
            sequence,
            timestamp,
            marker,
            ssrc,
            payload,
            decoder: None,
        }
    }

    /// Create a frame directly from PCM samples.
    pub fn from_samples(sequence: u16, timestamp: u32, ssrc: u32, samples: &[S]) -> Self {
        Self::new(sequence, timestamp, false, ssrc, S::encode_le(samples))
    }

    /// Attach the decoder used to turn the payload into samples.
    pub fn with_decoder(mut self, decoder: Arc<dyn FrameDecoder<S>>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn marker(&self) -> bool {
        self.marker
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn has_decoder(&self) -> bool {
        self.decoder.is_some()
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Consume the frame and produce its samples.
    pub fn decode(self) -> Result<Vec<S>> {
        match &self.decoder {
            Some(decoder) => decoder.decode(&self.payload),
            None => Ok(S::decode_le(&self.payload)),
        }
    }
}

impl<S: Sample> fmt::Debug for Frame<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("timestamp", &self.timestamp)
            .field("marker", &self.marker)
            .field("ssrc", &self.ssrc)
            .field("payload_len", &self.payload.len())
            .field("has_decoder", &self.decoder.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JitterError;

    #[test]
    fn test_timestamp_offset_forward_and_backward() {
        assert_eq!(timestamp_offset(1160, 1000), 160);
        assert_eq!(timestamp_offset(1000, 1160), -160);
        assert_eq!(timestamp_offset(42, 42), 0);
    }

    #[test]
    fn test_timestamp_offset_wraparound() {
        // 0x0000_0010 is 0x20 ticks after 0xFFFF_FFF0
        assert_eq!(timestamp_offset(0x0000_0010, 0xFFFF_FFF0), 0x20);
        assert_eq!(timestamp_offset(0xFFFF_FFF0, 0x0000_0010), -0x20);
    }

    #[test]
    fn test_timestamp_offset_is_16_bit() {
        // Offsets outside the 16-bit range alias; callers keep windows small.
        assert_eq!(timestamp_offset(0x1_0000, 0), 0);
        assert_eq!(timestamp_offset(0x8000, 0), -0x8000);
    }

    #[test]
    fn test_frame_accessors() {
        let frame: Frame<i16> = Frame::new(7, 320, true, 0xdead_beef, vec![1, 0, 2, 0]);
        assert_eq!(frame.sequence(), 7);
        assert_eq!(frame.timestamp(), 320);
        assert!(frame.marker());
        assert_eq!(frame.ssrc(), 0xdead_beef);
        assert_eq!(frame.payload(), &[1, 0, 2, 0]);
        assert_eq!(frame.len(), 4);
        assert!(!frame.has_decoder());
        assert_eq!(frame.decode().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_frame_from_samples_round_trips_raw_payload() {
        let frame = Frame::from_samples(1, 0, 1, &[0.25f32, -0.5]);
        assert_eq!(frame.len(), 8);
        assert_eq!(frame.decode().unwrap(), vec![0.25, -0.5]);
    }

    #[test]
    fn test_frame_uses_attached_decoder() {
        let decoder: Arc<dyn FrameDecoder<i16>> =
            Arc::new(|payload: &[u8]| -> crate::Result<Vec<i16>> {
                Ok(payload.iter().map(|b| *b as i16 * 10).collect())
            });
        let frame = Frame::new(1, 0, false, 1, vec![1, 2, 3]).with_decoder(decoder);
        assert!(frame.has_decoder());
        assert_eq!(frame.decode().unwrap(), vec![10, 20, 30]);
    }

    #[test]
    fn test_frame_decoder_error_is_returned() {
        let decoder: Arc<dyn FrameDecoder<i16>> =
            Arc::new(|_: &[u8]| -> crate::Result<Vec<i16>> {
                Err(JitterError::Decoder("corrupt".into()))
            });
        let frame = Frame::new(1, 0, false, 1, vec![0xff]).with_decoder(decoder);
        assert!(matches!(frame.decode(), Err(JitterError::Decoder(_))));
    }
}
