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

/// Q14 fixed-point ratios, the format telephony stacks report rates in.
///
/// `Q14_value = ratio × 16384`, so `16384` means 100%.
///
/// ```rust
/// use jitter::statistics::q14;
/// assert_eq!(q14::from_float(0.25), 4096);
/// assert!((q14::to_per_mille(4096) - 250.0).abs() < 0.01);
/// ```
pub mod q14 {
    /// 2^14
    pub const SCALE: f64 = 16384.0;

    #[inline]
    pub fn to_float(q14_value: u16) -> f64 {
        q14_value as f64 / SCALE
    }

    /// Parts per thousand, for display
    #[inline]
    pub fn to_per_mille(q14_value: u16) -> f32 {
        (to_float(q14_value) * 1000.0) as f32
    }

    /// Clamps to `[0.0, 1.0]` before converting.
    #[inline]
    pub fn from_float(ratio: f64) -> u16 {
        (ratio * SCALE).clamp(0.0, SCALE) as u16
    }
}

use serde::{Deserialize, Serialize};

/// Counters describing what the buffer did with the stream so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JitterStatistics {
    /// Frames handed to `insert`
    pub frames_received: u64,
    /// Frames that made it into the store
    pub frames_inserted: u64,
    /// Frames stored ahead of earlier arrivals
    pub frames_reordered: u64,
    /// Frames discarded because no consumer had pulled yet
    pub frames_dropped_locked: u64,
    /// Frames discarded because their timestamp was already queued
    pub duplicates: u64,
    /// Frames discarded because playout had already passed them
    pub frames_expired: u64,
    /// Window moves caused by frames arriving too early
    pub early_shifts: u64,
    /// Window moves caused by frames arriving too late
    pub late_shifts: u64,
    /// Windows established for a new or changed source
    pub resyncs: u64,
    /// Windows dropped after the store stayed empty too long
    pub idle_resyncs: u64,
    /// Delay evaluations that pulled the window forward
    pub delay_reductions: u64,
    /// Frames decoded into at least one sample
    pub frames_decoded: u64,
    /// Frames that decoded to nothing or failed to decode
    pub decode_failures: u64,
    pub decoded_samples: u64,
    /// Samples synthesized to cover gaps
    pub concealed_samples: u64,
    /// Concealment runs started; one run may span several pulls
    pub concealment_events: u64,
    /// Samples written to the consumer
    pub emitted_samples: u64,
}

impl JitterStatistics {
    /// Share of emitted audio that was concealment, as a plain ratio.
    pub fn concealment_ratio(&self) -> f64 {
        if self.emitted_samples == 0 {
            return 0.0;
        }
        self.concealed_samples as f64 / self.emitted_samples as f64
    }

    /// Share of emitted audio that was concealment, in Q14.
    pub fn concealment_rate_q14(&self) -> u16 {
        q14::from_float(self.concealment_ratio())
    }

    pub(crate) fn frame_stored(&mut self, reordered: bool) {
        self.frames_inserted += 1;
        if reordered {
            self.frames_reordered += 1;
        }
    }

    pub(crate) fn concealment_started(&mut self) {
        self.concealment_events += 1;
    }

    pub(crate) fn concealed(&mut self, samples: usize) {
        self.concealed_samples += samples as u64;
    }

    pub(crate) fn frame_decoded(&mut self, samples: usize) {
        self.frames_decoded += 1;
        self.decoded_samples += samples as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_q14_conversions() {
        assert_eq!(q14::from_float(0.0), 0);
        assert_eq!(q14::from_float(0.5), 8192);
        assert_eq!(q14::from_float(2.0), 16384);
        assert_eq!(q14::to_float(16384), 1.0);
    }

    #[test]
    fn test_concealment_ratio() {
        let mut stats = JitterStatistics::default();
        assert_eq!(stats.concealment_ratio(), 0.0);

        stats.concealment_started();
        stats.concealed(40);
        stats.emitted_samples = 160;
        assert_eq!(stats.concealment_events, 1);
        assert!((stats.concealment_ratio() - 0.25).abs() < 1e-9);
        assert_eq!(stats.concealment_rate_q14(), 4096);
    }

    #[test]
    fn test_frame_counters() {
        let mut stats = JitterStatistics::default();
        stats.frame_stored(false);
        stats.frame_stored(true);
        stats.frame_decoded(160);

        assert_eq!(stats.frames_inserted, 2);
        assert_eq!(stats.frames_reordered, 1);
        assert_eq!(stats.frames_decoded, 1);
        assert_eq!(stats.decoded_samples, 160);
    }
}
