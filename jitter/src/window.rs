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

//! Playout window tracking and delay-trend evaluation.
//!
//! The window is anchored at `timestamp`, the next sample the consumer is
//! owed. Frames are placed relative to it; frames that land outside
//! `0..=max_window_size` move the window, and in adaptive mode a periodic
//! evaluation pulls the window toward the producer when the smallest delay
//! seen during the last interval stayed above the target.

use crate::config::JitterConfig;
use crate::frame::timestamp_offset;

/// Where an arriving frame landed relative to the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Frame fits inside the window
    InWindow { offset: i32 },
    /// Frame was too far ahead; the window moved forward
    Early { offset: i32 },
    /// Frame was already behind the window; the window moved backward
    Late { offset: i32 },
}

/// Outcome of a delay-trend evaluation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayEvaluation {
    /// Smallest offset observed since the previous evaluation
    pub min_delay: Option<u32>,
    /// Samples the window moved forward, if a reduction was applied
    pub reduced_by: Option<u32>,
}

#[derive(Debug)]
pub struct WindowController {
    target_window_size: u32,
    max_window_size: u32,
    adaptive_latency: bool,
    sample_duration: f64,
    initial_delay_interval: f64,
    steady_delay_interval: f64,
    idle_limit: Option<u64>,

    timestamp: u32,
    valid: bool,
    ssrc: u32,

    /// -1 while unset
    min_delay: i32,
    /// Seconds of audio consumed since the last evaluation
    delay_counter: f64,
    delay_interval: f64,
    idle_samples: u64,
}

impl WindowController {
    pub fn new(config: &JitterConfig) -> Self {
        let idle_limit = config
            .idle_resync
            .map(|idle| (idle.as_secs_f64() * config.sample_rate as f64) as u64);
        let initial_delay_interval = config.initial_delay_interval.as_secs_f64();

        Self {
            target_window_size: config.target_window_size(),
            max_window_size: config.max_window_size(),
            adaptive_latency: config.adaptive_latency,
            sample_duration: config.sample_duration(),
            initial_delay_interval,
            steady_delay_interval: config.delay_interval.as_secs_f64(),
            idle_limit,
            timestamp: 0,
            valid: false,
            ssrc: 0,
            min_delay: -1,
            delay_counter: 0.0,
            delay_interval: initial_delay_interval,
            idle_samples: 0,
        }
    }

    /// Forget the window and restart delay tracking from the initial interval.
    pub fn reset(&mut self) {
        self.valid = false;
        self.idle_samples = 0;
        self.min_delay = -1;
        self.delay_counter = 0.0;
        self.delay_interval = self.initial_delay_interval;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn min_delay(&self) -> Option<u32> {
        (self.min_delay >= 0).then_some(self.min_delay as u32)
    }

    /// True when a frame from `ssrc` cannot be placed in the current window.
    pub fn needs_resync(&self, ssrc: u32) -> bool {
        !self.valid || self.ssrc != ssrc
    }

    /// Anchor a fresh window so that a frame at `timestamp` is delayed by the lead.
    pub fn establish(&mut self, timestamp: u32, ssrc: u32) {
        self.reset();
        self.valid = true;
        self.ssrc = ssrc;
        self.timestamp = timestamp.wrapping_sub(self.lead());
    }

    /// Signed offset of `timestamp` from the window start.
    pub fn offset_of(&self, timestamp: u32) -> i32 {
        timestamp_offset(timestamp, self.timestamp)
    }

    /// Run the delay-trend evaluation if its interval elapsed.
    pub fn evaluate_delay(&mut self) -> Option<DelayEvaluation> {
        if !self.valid || self.delay_counter < self.delay_interval {
            return None;
        }

        let min_delay = self.min_delay();
        let mut reduced_by = None;
        if self.adaptive_latency && self.min_delay > self.target_window_size as i32 {
            // Pull the window forward, keeping half the target as headroom
            let shift = self.min_delay as u32 - self.target_window_size / 2;
            self.timestamp = self.timestamp.wrapping_add(shift);
            reduced_by = Some(shift);
        }

        self.delay_counter -= self.delay_interval;
        self.delay_interval = self.steady_delay_interval;
        self.min_delay = -1;

        Some(DelayEvaluation {
            min_delay,
            reduced_by,
        })
    }

    /// Place a frame, moving the window if the frame falls outside of it.
    pub fn place(&mut self, timestamp: u32) -> Placement {
        let offset = self.offset_of(timestamp);

        if self.min_delay < 0 || offset < self.min_delay {
            self.min_delay = offset;
        }

        if offset > self.max_window_size as i32 {
            let lead = if self.adaptive_latency {
                self.max_window_size
            } else {
                self.target_window_size
            };
            self.timestamp = timestamp.wrapping_sub(lead);
            self.restart_delay_statistics();
            Placement::Early { offset }
        } else if offset < 0 {
            self.timestamp = timestamp.wrapping_sub(self.lead());
            self.restart_delay_statistics();
            Placement::Late { offset }
        } else {
            Placement::InWindow { offset }
        }
    }

    /// Move the window forward by `samples`. Returns true when the window was
    /// dropped because the store stayed empty longer than the idle limit.
    pub fn advance(&mut self, samples: u32, store_empty: bool) -> bool {
        if !self.valid {
            return false;
        }

        self.timestamp = self.timestamp.wrapping_add(samples);
        self.delay_counter += samples as f64 * self.sample_duration;

        if !store_empty {
            self.idle_samples = 0;
            return false;
        }

        self.idle_samples += samples as u64;
        match self.idle_limit {
            Some(limit) if self.idle_samples > limit => {
                self.valid = false;
                self.idle_samples = 0;
                true
            }
            _ => false,
        }
    }

    /// Clear the idle counter; called whenever a frame is stored.
    pub fn note_activity(&mut self) {
        self.idle_samples = 0;
    }

    fn lead(&self) -> u32 {
        if self.adaptive_latency {
            self.target_window_size / 2
        } else {
            self.target_window_size
        }
    }

    /// A moved window starts over with the short first interval.
    fn restart_delay_statistics(&mut self) {
        self.min_delay = -1;
        self.delay_counter = 0.0;
        self.delay_interval = self.initial_delay_interval;
    }
}
