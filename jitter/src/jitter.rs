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

use crate::config::JitterConfig;
use crate::frame::Frame;
use crate::materializer::SampleRun;
use crate::sample::Sample;
use crate::statistics::JitterStatistics;
use crate::store::{FrameStore, StoreResult};
use crate::window::{Placement, WindowController};
use crate::Result;

/// Timestamp-ordered jitter buffer between a bursty producer and a
/// fixed-rate consumer.
///
/// The buffer stays locked until the consumer first asks for audio; frames
/// inserted before that are dropped so no latency builds up ahead of playout.
/// It is not synchronized internally: callers that produce and consume on
/// different threads wrap it in a lock.
pub struct JitterBuffer<S: Sample> {
    config: JitterConfig,
    samples_per_20ms: usize,
    window: WindowController,
    store: FrameStore<S>,
    pub(crate) run: SampleRun<S>,
    pub(crate) statistics: JitterStatistics,
    unlocked: bool,
}

impl<S: Sample> JitterBuffer<S> {
    /// Create a jitter buffer. Fails on invalid configuration or if the
    /// concealment buffer cannot be allocated.
    pub fn create(config: JitterConfig) -> Result<Self> {
        config.validate()?;

        let samples_per_20ms = config.samples_per_20ms();
        let run = SampleRun::with_capacity(samples_per_20ms)?;
        let window = WindowController::new(&config);

        let mut jitter = Self {
            config,
            samples_per_20ms,
            window,
            store: FrameStore::new(),
            run,
            statistics: JitterStatistics::default(),
            unlocked: false,
        };
        jitter.reset();

        log::info!(
            "{} created jitter buffer (sample_rate={}, target_window={}ms, max_window={}ms, adaptive_latency={})",
            jitter.config.name,
            jitter.config.sample_rate,
            jitter.config.target_window_ms,
            jitter.config.max_window_ms,
            jitter.config.adaptive_latency
        );

        Ok(jitter)
    }

    /// Same as [`JitterBuffer::create`]
    pub fn new(config: JitterConfig) -> Result<Self> {
        Self::create(config)
    }

    /// Drop all queued frames and the concealment history, lock the buffer
    /// and forget the window.
    pub fn reset(&mut self) {
        let flushed = self.store.flush();
        self.run.clear();
        self.unlocked = false;
        self.window.reset();

        log::info!(
            "{} reset jitter buffer ({} frames dropped)",
            self.config.name,
            flushed
        );
    }

    /// Release the buffer. Equivalent to dropping it after a reset.
    pub fn destroy(mut self) {
        self.reset();
        log::info!("{} destroyed jitter buffer", self.config.name);
    }

    /// Hand a frame to the buffer. Anomalies never fail: locked buffer,
    /// duplicate timestamps and frames far outside the window are dropped or
    /// corrected silently.
    pub fn insert(&mut self, frame: Frame<S>) {
        self.statistics.frames_received += 1;

        if !self.unlocked {
            self.statistics.frames_dropped_locked += 1;
            log::trace!(
                "{} dropping frame seq={} ts={}: no consumer yet",
                self.config.name,
                frame.sequence(),
                frame.timestamp()
            );
            return;
        }

        let timestamp = frame.timestamp();
        let ssrc = frame.ssrc();

        if self.window.needs_resync(ssrc) {
            if self.window.is_valid() {
                log::info!(
                    "{} source changed from {:#010x} to {:#010x}, resynchronizing",
                    self.config.name,
                    self.window.ssrc(),
                    ssrc
                );
            } else {
                log::info!(
                    "{} first frame of source {:#010x}, establishing window",
                    self.config.name,
                    ssrc
                );
            }
            let flushed = self.store.flush();
            if flushed > 0 {
                log::debug!(
                    "{} dropped {} frames of the previous source",
                    self.config.name,
                    flushed
                );
            }
            self.run.skip();
            self.window.establish(timestamp, ssrc);
            self.statistics.resyncs += 1;
        }

        if let Some(evaluation) = self.window.evaluate_delay() {
            log::debug!(
                "{} delay statistics: target_window={}ms max_window={}ms min_delay={:?}",
                self.config.name,
                self.config.target_window_ms,
                self.config.max_window_ms,
                evaluation.min_delay.map(|d| self.samples_to_ms(d))
            );
            if let Some(shift) = evaluation.reduced_by {
                self.statistics.delay_reductions += 1;
                log::debug!(
                    "{} reducing delay by {}ms, minimum delay stayed above the target window",
                    self.config.name,
                    self.samples_to_ms(shift)
                );
            }
        }

        match self.window.place(timestamp) {
            Placement::InWindow { .. } => {}
            Placement::Early { offset } => {
                self.statistics.early_shifts += 1;
                log::debug!(
                    "{} frame ts={} is {} samples ahead of the window, moving window forward",
                    self.config.name,
                    timestamp,
                    offset
                );
            }
            Placement::Late { offset } => {
                self.statistics.late_shifts += 1;
                log::debug!(
                    "{} frame ts={} is {} samples behind the window, moving window backward",
                    self.config.name,
                    timestamp,
                    -offset
                );
            }
        }

        let sequence = frame.sequence();
        match self.store.insert(frame) {
            StoreResult::Appended => self.statistics.frame_stored(false),
            StoreResult::Reordered { distance } => {
                self.statistics.frame_stored(true);
                log::trace!(
                    "{} reordered frame seq={} ts={} by {} positions",
                    self.config.name,
                    sequence,
                    timestamp,
                    distance
                );
            }
            StoreResult::Duplicate => {
                self.statistics.duplicates += 1;
                log::debug!(
                    "{} dropping duplicate frame seq={} ts={}",
                    self.config.name,
                    sequence,
                    timestamp
                );
            }
        }
        self.window.note_activity();
    }

    /// Samples between the window and the next stored frame.
    ///
    /// Unlocks the buffer and drops frames the window already passed.
    /// Returns `None` when nothing is stored or no window exists yet.
    pub fn offset_to_next_due(&mut self) -> Option<u32> {
        self.unlocked = true;

        if !self.window.is_valid() {
            return None;
        }

        let window_timestamp = self.window.timestamp();
        let expired = self.store.discard_before(window_timestamp);
        if expired > 0 {
            self.statistics.frames_expired += expired as u64;
            log::debug!(
                "{} discarded {} frames behind the window",
                self.config.name,
                expired
            );
        }

        self.store
            .peek_next_timestamp()
            .map(|ts| self.window.offset_of(ts) as u32)
    }

    /// Remove and return the frame sitting exactly at the window, if any.
    pub fn take_due_frame(&mut self) -> Option<Frame<S>> {
        match self.offset_to_next_due() {
            Some(0) => self.store.pop_next(),
            _ => None,
        }
    }

    /// Move the window forward by `samples` that were handed to the consumer.
    pub fn advance(&mut self, samples: u32) {
        let store_empty = self.store.is_empty();
        if self.window.advance(samples, store_empty) {
            self.statistics.idle_resyncs += 1;
            log::info!(
                "{} no frames for {:?}, dropping window",
                self.config.name,
                self.config.idle_resync
            );
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn is_synchronized(&self) -> bool {
        self.window.is_valid()
    }

    /// Next sample the consumer is owed, once a window exists
    pub fn window_timestamp(&self) -> Option<u32> {
        self.window.is_valid().then(|| self.window.timestamp())
    }

    /// Samples between the window and the newest stored frame.
    pub fn standing_delay(&self) -> Option<i32> {
        if !self.window.is_valid() {
            return None;
        }
        self.store
            .peek_newest_timestamp()
            .map(|ts| self.window.offset_of(ts))
    }

    /// Number of frames waiting for playout
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Timestamps of the waiting frames in playout order
    pub fn pending_timestamps(&self) -> Vec<u32> {
        self.store.timestamps().collect()
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &JitterConfig {
        &self.config
    }

    pub fn statistics(&self) -> &JitterStatistics {
        &self.statistics
    }

    pub fn target_window_size(&self) -> u32 {
        self.config.target_window_size()
    }

    pub fn max_window_size(&self) -> u32 {
        self.config.max_window_size()
    }

    pub(crate) fn samples_per_20ms(&self) -> usize {
        self.samples_per_20ms
    }

    fn samples_to_ms(&self, samples: u32) -> u64 {
        samples as u64 * 1000 / self.config.sample_rate as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conceal::{Concealment, Silence};
    use crate::JitterError;

    const SSRC: u32 = 0x1234_5678;

    fn create_test_frame(seq: u16, ts: u32, value: i16) -> Frame<i16> {
        Frame::from_samples(seq, ts, SSRC, &[value; 160])
    }

    fn unlocked_buffer(adaptive: bool) -> JitterBuffer<i16> {
        let mut jitter = JitterBuffer::create(JitterConfig::new(8000, 40, 200, adaptive)).unwrap();
        assert_eq!(jitter.offset_to_next_due(), None);
        jitter
    }

    #[test]
    fn test_jitter_creation() {
        let jitter: JitterBuffer<i16> = JitterBuffer::create(JitterConfig::default()).unwrap();
        assert!(jitter.is_empty());
        assert!(!jitter.is_unlocked());
        assert!(!jitter.is_synchronized());
        assert_eq!(jitter.target_window_size(), 320);
        assert_eq!(jitter.max_window_size(), 1600);
        assert_eq!(jitter.name(), "jitter");
    }

    #[test]
    fn test_create_rejects_invalid_config() {
        let result: Result<JitterBuffer<f32>> =
            JitterBuffer::create(JitterConfig::new(8000, 500, 100, true));
        assert!(matches!(result, Err(JitterError::InvalidConfig(_))));
    }

    #[test]
    fn test_locked_buffer_discards_frames() {
        let mut jitter: JitterBuffer<i16> = JitterBuffer::create(JitterConfig::default()).unwrap();
        jitter.insert(create_test_frame(0, 0, 1));

        assert!(jitter.is_empty());
        assert!(!jitter.is_synchronized());
        assert_eq!(jitter.statistics().frames_dropped_locked, 1);
    }

    #[test]
    fn test_first_frame_establishes_window() {
        let mut jitter = unlocked_buffer(true);
        jitter.insert(create_test_frame(0, 8000, 1));

        assert!(jitter.is_synchronized());
        assert_eq!(jitter.window_timestamp(), Some(8000 - 160));
        assert_eq!(jitter.offset_to_next_due(), Some(160));
        assert_eq!(jitter.standing_delay(), Some(160));
        assert_eq!(jitter.statistics().resyncs, 1);
    }

    #[test]
    fn test_take_due_frame_only_at_window() {
        let mut jitter = unlocked_buffer(false);
        jitter.insert(create_test_frame(0, 320, 1));

        assert!(jitter.take_due_frame().is_none());
        jitter.advance(320);
        let frame = jitter.take_due_frame().expect("frame is due");
        assert_eq!(frame.timestamp(), 320);
        assert!(jitter.is_empty());
    }

    #[test]
    fn test_expired_frames_are_discarded() {
        let mut jitter = unlocked_buffer(false);
        jitter.insert(create_test_frame(0, 320, 1));
        jitter.insert(create_test_frame(1, 480, 2));
        jitter.advance(480);

        assert_eq!(jitter.offset_to_next_due(), Some(0));
        assert_eq!(jitter.len(), 1);
        assert_eq!(jitter.statistics().frames_expired, 1);
    }

    #[test]
    fn test_reset_locks_and_forgets() {
        let mut jitter = unlocked_buffer(true);
        jitter.insert(create_test_frame(0, 0, 1));
        jitter.insert(create_test_frame(1, 160, 1));

        jitter.reset();
        assert!(jitter.is_empty());
        assert!(!jitter.is_unlocked());
        assert!(!jitter.is_synchronized());
        assert_eq!(jitter.window_timestamp(), None);

        jitter.insert(create_test_frame(2, 320, 1));
        assert!(jitter.is_empty());
    }

    #[test]
    fn test_destroy_without_frames() {
        let jitter: JitterBuffer<f32> = JitterBuffer::create(JitterConfig::default()).unwrap();
        jitter.destroy();
    }

    #[test]
    fn test_fill_plays_frame_after_lead() {
        let mut jitter = unlocked_buffer(true);
        jitter.insert(create_test_frame(0, 0, 5));

        let mut silence = Silence;
        let mut out = [1i16; 160];
        jitter.fill(&mut out, Some(&mut silence as &mut dyn Concealment<i16>));
        assert!(out.iter().all(|s| *s == 0));

        jitter.fill(&mut out, Some(&mut silence as &mut dyn Concealment<i16>));
        assert!(out.iter().all(|s| *s == 5));
        assert_eq!(jitter.statistics().frames_decoded, 1);
        assert_eq!(jitter.statistics().emitted_samples, 320);
        assert_eq!(jitter.statistics().concealed_samples, 160);
    }

    #[test]
    fn test_fill_splits_frames_across_pulls() {
        let mut jitter = unlocked_buffer(false);
        jitter.insert(create_test_frame(0, 320, 3));
        jitter.advance(320);

        let mut out = [0i16; 100];
        jitter.fill(&mut out, None);
        assert!(out.iter().all(|s| *s == 3));
        assert_eq!(jitter.window_timestamp(), Some(420));

        jitter.fill(&mut out, None);
        assert!(out.iter().all(|s| *s == 3));
        assert_eq!(jitter.window_timestamp(), Some(520));
        assert_eq!(jitter.statistics().concealed_samples, 40);
    }
}
