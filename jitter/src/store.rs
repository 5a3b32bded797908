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

use std::collections::VecDeque;

use crate::frame::{timestamp_offset, Frame};
use crate::sample::Sample;

/// Result of storing a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoreResult {
    /// Stored at the tail
    Appended,
    /// Stored ahead of frames that arrived earlier
    Reordered { distance: usize },
    /// A frame with the same timestamp is already queued; the new one was dropped
    Duplicate,
}

/// Timestamp-ordered queue of frames awaiting playout.
///
/// Timestamps are unique and ascending in wrapping order. Frames normally
/// arrive in order, so the insertion point is searched from the tail.
#[derive(Debug)]
pub struct FrameStore<S: Sample> {
    frames: VecDeque<Frame<S>>,
}

impl<S: Sample> Default for FrameStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sample> FrameStore<S> {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Insert a frame, keeping timestamp order. First writer wins on equal timestamps.
    pub fn insert(&mut self, frame: Frame<S>) -> StoreResult {
        let timestamp = frame.timestamp();
        let mut pos = self.frames.len();

        while pos > 0 {
            let delta = timestamp_offset(self.frames[pos - 1].timestamp(), timestamp);
            if delta == 0 {
                return StoreResult::Duplicate;
            }
            if delta < 0 {
                break;
            }
            pos -= 1;
        }

        let distance = self.frames.len() - pos;
        self.frames.insert(pos, frame);

        if distance == 0 {
            StoreResult::Appended
        } else {
            StoreResult::Reordered { distance }
        }
    }

    /// Drop frames that are behind `window_timestamp`. Returns how many were dropped.
    pub fn discard_before(&mut self, window_timestamp: u32) -> usize {
        let mut discarded = 0;
        while let Some(front) = self.frames.front() {
            if timestamp_offset(front.timestamp(), window_timestamp) >= 0 {
                break;
            }
            self.frames.pop_front();
            discarded += 1;
        }
        discarded
    }

    pub fn peek_next_timestamp(&self) -> Option<u32> {
        self.frames.front().map(Frame::timestamp)
    }

    pub fn peek_newest_timestamp(&self) -> Option<u32> {
        self.frames.back().map(Frame::timestamp)
    }

    pub fn pop_next(&mut self) -> Option<Frame<S>> {
        self.frames.pop_front()
    }

    /// Drop every frame. Returns how many were dropped.
    pub fn flush(&mut self) -> usize {
        let flushed = self.frames.len();
        self.frames.clear();
        flushed
    }

    /// Timestamps in playout order
    pub fn timestamps(&self) -> impl Iterator<Item = u32> + '_ {
        self.frames.iter().map(Frame::timestamp)
    }
}
