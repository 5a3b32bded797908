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

//! Sample formats the jitter buffer can materialize.

/// A single PCM sample.
///
/// Frames without a decoder carry raw little-endian samples of this type.
pub trait Sample: Copy + Default + PartialEq + Send + std::fmt::Debug + 'static {
    /// Size of one encoded sample in bytes.
    const BYTES: usize;

    /// Read one sample from exactly `BYTES` little-endian bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Append the little-endian encoding of this sample.
    fn write_le(self, out: &mut Vec<u8>);

    /// Normalized value in `[-1.0, 1.0]`.
    fn to_f32(self) -> f32;

    /// Build a sample from a normalized value, clamping out-of-range input.
    fn from_f32(value: f32) -> Self;

    /// Decode a raw payload. Trailing bytes that do not form a whole sample are ignored.
    fn decode_le(payload: &[u8]) -> Vec<Self> {
        payload
            .chunks_exact(Self::BYTES)
            .map(Self::read_le)
            .collect()
    }

    /// Encode samples as a raw payload.
    fn encode_le(samples: &[Self]) -> Vec<u8> {
        let mut payload = Vec::with_capacity(samples.len() * Self::BYTES);
        for sample in samples {
            sample.write_le(&mut payload);
        }
        payload
    }
}

impl Sample for i16 {
    const BYTES: usize = 2;

    fn read_le(bytes: &[u8]) -> Self {
        i16::from_le_bytes([bytes[0], bytes[1]])
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn to_f32(self) -> f32 {
        self as f32 / 32768.0
    }

    fn from_f32(value: f32) -> Self {
        (value.clamp(-1.0, 1.0) * 32767.0).round() as i16
    }
}

impl Sample for f32 {
    const BYTES: usize = 4;

    fn read_le(bytes: &[u8]) -> Self {
        f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(value: f32) -> Self {
        value.clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_s16_payload() {
        let payload = [0x01, 0x00, 0xff, 0x7f, 0x00, 0x80];
        assert_eq!(i16::decode_le(&payload), vec![1, i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_decode_ignores_partial_trailing_sample() {
        let mut payload = 0.5f32.to_le_bytes().to_vec();
        payload.extend_from_slice(&[0xaa, 0xbb]);
        assert_eq!(f32::decode_le(&payload), vec![0.5]);
    }

    #[test]
    fn test_f32_conversion_clamps() {
        assert_eq!(i16::from_f32(2.0), i16::MAX);
        assert_eq!(i16::from_f32(-2.0), -i16::MAX);
        assert_eq!(f32::from_f32(1.5), 1.0);
        assert!((i16::MIN.to_f32() + 1.0).abs() < f32::EPSILON);
    }
}
