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

//! Bridges variable-size frames to the consumer's fixed-size pulls.

use crate::conceal::Concealment;
use crate::jitter::JitterBuffer;
use crate::sample::Sample;
use crate::{JitterError, Result};

/// The decoded (or concealed) samples currently being played out.
///
/// Only `buffer[pos..end]` is readable; everything else is history that
/// concealment may extrapolate from.
#[derive(Debug)]
pub struct SampleRun<S: Sample> {
    buffer: Vec<S>,
    pos: usize,
    end: usize,
    concealed: bool,
}

impl<S: Sample> SampleRun<S> {
    /// Reserve room for `capacity` samples up front.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(capacity)
            .map_err(|e| JitterError::Allocation(e.to_string()))?;
        Ok(Self {
            buffer,
            pos: 0,
            end: 0,
            concealed: false,
        })
    }

    /// Samples left to read
    pub fn pending(&self) -> usize {
        self.end - self.pos
    }

    /// True while the pending samples are concealment rather than decoded audio.
    pub fn is_concealment(&self) -> bool {
        self.concealed && self.pending() > 0
    }

    /// Cut a pending concealment run so it ends `samples` from now.
    /// Decoded runs are left alone.
    pub fn limit_concealment(&mut self, samples: usize) {
        if self.concealed {
            self.end = self.end.min(self.pos + samples);
        }
    }

    /// Copy as many pending samples as fit into `out`.
    pub fn read_into(&mut self, out: &mut [S]) -> usize {
        let count = self.pending().min(out.len());
        out[..count].copy_from_slice(&self.buffer[self.pos..self.pos + count]);
        self.pos += count;
        count
    }

    /// Make a freshly decoded buffer the current run. The previous buffer is dropped.
    pub fn replace(&mut self, samples: Vec<S>) {
        self.end = samples.len();
        self.pos = 0;
        self.concealed = false;
        self.buffer = samples;
    }

    /// Turn the last buffer into a run of concealment samples.
    ///
    /// The run covers the whole buffer, or only `gap` samples when the next
    /// frame is due sooner. Without a previous buffer, `default_len` samples
    /// of silence are used. The run outlives the current pull, so the
    /// concealment is applied once per buffer however small the pulls are.
    /// Returns the length of the new run.
    pub fn conceal(
        &mut self,
        gap: Option<usize>,
        default_len: usize,
        conceal: Option<&mut (dyn Concealment<S> + '_)>,
    ) -> usize {
        if self.buffer.is_empty() {
            self.buffer.resize(default_len, S::default());
        }
        if let Some(conceal) = conceal {
            conceal.conceal(&mut self.buffer);
        }
        self.pos = 0;
        self.end = gap.map_or(self.buffer.len(), |gap| gap.min(self.buffer.len()));
        self.concealed = true;
        self.end
    }

    /// Abandon the pending samples but keep the buffer for concealment.
    pub fn skip(&mut self) {
        self.pos = 0;
        self.end = 0;
        self.concealed = false;
    }

    /// Forget both the pending samples and the buffer contents.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.skip();
    }
}

impl<S: Sample> JitterBuffer<S> {
    /// Fill `out` completely with playout audio.
    ///
    /// Due frames are decoded and copied; gaps (empty store, frame not due
    /// yet, undecodable frame) are covered by `conceal`, or by repeating the
    /// last buffer when `conceal` is `None`. Decoded and concealed runs both
    /// carry over into the next call. The window advances by exactly
    /// `out.len()` samples.
    pub fn fill(&mut self, out: &mut [S], mut conceal: Option<&mut (dyn Concealment<S> + '_)>) {
        let mut filled = 0;

        while filled < out.len() {
            let due = self.offset_to_next_due();
            if let Some(offset) = due {
                // A frame that arrived meanwhile takes over at its timestamp
                self.run.limit_concealment(offset as usize);
            }

            let concealing = self.run.is_concealment();
            let copied = self.run.read_into(&mut out[filled..]);
            if copied > 0 {
                filled += copied;
                if concealing {
                    self.statistics.concealed(copied);
                }
                self.advance(copied as u32);
                continue;
            }

            if due == Some(0) && self.load_due_frame() {
                continue;
            }

            let default_len = self.samples_per_20ms();
            let run = self.run.conceal(
                due.map(|offset| offset as usize),
                default_len,
                conceal.as_deref_mut(),
            );
            self.statistics.concealment_started();
            log::trace!(
                "{} concealing {} samples (next frame {:?})",
                self.name(),
                run,
                due
            );
        }

        self.statistics.emitted_samples += out.len() as u64;
    }

    /// Decode the due frame into the sample run. Returns false if no frame was due.
    fn load_due_frame(&mut self) -> bool {
        let frame = match self.take_due_frame() {
            Some(frame) => frame,
            None => return false,
        };
        let sequence = frame.sequence();
        let timestamp = frame.timestamp();

        match frame.decode() {
            Ok(samples) if !samples.is_empty() => {
                self.statistics.frame_decoded(samples.len());
                log::trace!(
                    "{} playing frame seq={} ts={} ({} samples)",
                    self.name(),
                    sequence,
                    timestamp,
                    samples.len()
                );
                self.run.replace(samples);
            }
            Ok(_) => {
                self.statistics.decode_failures += 1;
                log::debug!(
                    "{} frame seq={} ts={} decoded to no samples",
                    self.name(),
                    sequence,
                    timestamp
                );
            }
            Err(e) => {
                self.statistics.decode_failures += 1;
                log::warn!(
                    "{} failed to decode frame seq={} ts={}: {}",
                    self.name(),
                    sequence,
                    timestamp,
                    e
                );
            }
        }
        true
    }
}
