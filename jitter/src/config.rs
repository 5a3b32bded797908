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

use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::frame::MAX_WINDOW_SAMPLES;
use crate::{JitterError, Result};

/// First delay evaluation happens quickly so a badly placed initial window
/// is corrected early in a call.
const INITIAL_DELAY_INTERVAL: Duration = Duration::from_millis(500);

/// Later evaluations are spaced out; jitter trends change slowly.
const DELAY_INTERVAL: Duration = Duration::from_secs(2);

const IDLE_RESYNC: Duration = Duration::from_secs(2);

/// Jitter buffer configuration, fixed for the lifetime of a buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    /// Stream name used as a prefix in log output
    pub name: String,
    /// Media clock rate in Hz; timestamps tick once per sample
    pub sample_rate: u32,
    /// Delay the buffer aims to hold, in milliseconds
    pub target_window_ms: u32,
    /// Largest lead a frame may have before the window is moved, in milliseconds
    pub max_window_ms: u32,
    /// Actively shrink standing delay toward half the target window
    pub adaptive_latency: bool,
    /// Time before the first delay evaluation
    pub initial_delay_interval: Duration,
    /// Time between subsequent delay evaluations
    pub delay_interval: Duration,
    /// Drop the window after the store stayed empty this long (`None` keeps it forever)
    pub idle_resync: Option<Duration>,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            name: "jitter".to_string(),
            sample_rate: 8000,
            target_window_ms: 40,
            max_window_ms: 200,
            adaptive_latency: true,
            initial_delay_interval: INITIAL_DELAY_INTERVAL,
            delay_interval: DELAY_INTERVAL,
            idle_resync: Some(IDLE_RESYNC),
        }
    }
}

impl JitterConfig {
    /// Configuration for the common case; everything else keeps its default.
    pub fn new(
        sample_rate: u32,
        target_window_ms: u32,
        max_window_ms: u32,
        adaptive_latency: bool,
    ) -> Self {
        Self {
            sample_rate,
            target_window_ms,
            max_window_ms,
            adaptive_latency,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < 50 {
            return Err(JitterError::InvalidSampleRate(self.sample_rate));
        }
        if self.target_window_ms > self.max_window_ms {
            return Err(JitterError::InvalidConfig(format!(
                "target window {}ms exceeds max window {}ms",
                self.target_window_ms, self.max_window_ms
            )));
        }
        let max_window = self.max_window_size();
        if max_window > MAX_WINDOW_SAMPLES {
            return Err(JitterError::WindowTooLarge {
                samples: max_window,
            });
        }
        if self.initial_delay_interval.is_zero() || self.delay_interval.is_zero() {
            return Err(JitterError::InvalidConfig(
                "delay evaluation intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Target window in samples
    pub fn target_window_size(&self) -> u32 {
        self.ms_to_samples(self.target_window_ms)
    }

    /// Max window in samples
    pub fn max_window_size(&self) -> u32 {
        self.ms_to_samples(self.max_window_ms)
    }

    /// Length of the default concealment buffer.
    pub fn samples_per_20ms(&self) -> usize {
        (self.sample_rate / 50) as usize
    }

    /// Duration of one sample in seconds
    pub fn sample_duration(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }

    fn ms_to_samples(&self, ms: u32) -> u32 {
        let samples = self.sample_rate as u64 * ms as u64 / 1000;
        samples.min(u32::MAX as u64) as u32
    }
}
