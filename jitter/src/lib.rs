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

//! # Jitter
//!
//! A timestamp-ordered jitter buffer for base-station emulators.
//! Frames arrive in bursts, out of order or duplicated; the consumer pulls
//! fixed-size blocks of samples at the media clock rate. The buffer reorders
//! frames, holds a configurable playout delay, conceals gaps and, in adaptive
//! mode, trims standing delay when the producer keeps running ahead.
//!
//! ```rust
//! use jitter::{conceal::Silence, Concealment, Frame, JitterBuffer, JitterConfig};
//!
//! let mut jitter: JitterBuffer<i16> = JitterBuffer::create(JitterConfig::default())?;
//! let mut out = [0i16; 160];
//! let mut silence = Silence;
//!
//! // The first pull unlocks the buffer
//! jitter.fill(&mut out, Some(&mut silence as &mut dyn Concealment<i16>));
//! jitter.insert(Frame::from_samples(0, 0, 0x1234, &[100i16; 160]));
//! jitter.fill(&mut out, Some(&mut silence as &mut dyn Concealment<i16>));
//! assert_eq!(jitter.statistics().frames_inserted, 1);
//! # Ok::<(), jitter::JitterError>(())
//! ```

pub mod conceal;
pub mod config;
pub mod error;
pub mod frame;
pub mod jitter;
pub mod materializer;
pub mod sample;
pub mod statistics;
pub mod store;
pub mod window;

pub use conceal::{ComfortNoise, Concealment, DecayingRepeat, Silence};
pub use config::JitterConfig;
pub use error::{JitterError, Result};
pub use frame::{Frame, FrameDecoder};
pub use jitter::JitterBuffer;
pub use sample::Sample;
pub use statistics::JitterStatistics;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_functionality() {
        let jitter: JitterBuffer<f32> = JitterBuffer::create(JitterConfig::default()).unwrap();

        assert!(jitter.is_empty());
        assert_eq!(jitter.statistics(), &JitterStatistics::default());
    }
}
