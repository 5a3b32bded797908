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

use thiserror::Error;

/// Result type for jitter buffer operations
pub type Result<T> = std::result::Result<T, JitterError>;

/// Errors that can occur while setting up a jitter buffer or decoding a frame.
///
/// Stream anomalies (late, early, duplicate or undecodable frames) are not
/// errors; the buffer corrects them silently.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JitterError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Window of {samples} samples exceeds the 16-bit timestamp offset range")]
    WindowTooLarge { samples: u32 },

    #[error("Allocation failed: {0}")]
    Allocation(String),

    #[error("Decoder error: {0}")]
    Decoder(String),
}
