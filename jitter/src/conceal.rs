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

//! Gap concealment.
//!
//! A concealment works in place on the buffer that was played last and
//! turns it into the audio for the gap. Passing no concealment to
//! [`crate::JitterBuffer::fill`] repeats that buffer unchanged.

use crate::sample::Sample;

pub trait Concealment<S: Sample> {
    fn conceal(&mut self, samples: &mut [S]);
}

impl<S, F> Concealment<S> for F
where
    S: Sample,
    F: FnMut(&mut [S]),
{
    fn conceal(&mut self, samples: &mut [S]) {
        self(samples)
    }
}

/// Fills gaps with silence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silence;

impl<S: Sample> Concealment<S> for Silence {
    fn conceal(&mut self, samples: &mut [S]) {
        samples.fill(S::default());
    }
}

/// Repeats the previous audio with decreasing volume, fading into silence
/// over consecutive gaps.
#[derive(Debug, Clone, Copy)]
pub struct DecayingRepeat {
    gain: f32,
}

impl Default for DecayingRepeat {
    fn default() -> Self {
        // -6dB per repetition
        Self { gain: 0.5 }
    }
}

impl DecayingRepeat {
    pub fn new(gain: f32) -> Self {
        Self {
            gain: gain.clamp(0.0, 1.0),
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl<S: Sample> Concealment<S> for DecayingRepeat {
    fn conceal(&mut self, samples: &mut [S]) {
        for sample in samples.iter_mut() {
            *sample = S::from_f32(sample.to_f32() * self.gain);
        }
    }
}

/// Very quiet white noise, for sinks where dead silence sounds like a dropped call.
#[derive(Debug, Clone)]
pub struct ComfortNoise {
    amplitude: f32,
    rng_state: u64,
}

impl Default for ComfortNoise {
    fn default() -> Self {
        Self::new(0.001)
    }
}

impl ComfortNoise {
    pub fn new(amplitude: f32) -> Self {
        Self {
            amplitude: amplitude.clamp(0.0, 1.0),
            rng_state: 1,
        }
    }

    fn simple_random(&mut self) -> f32 {
        self.rng_state ^= self.rng_state << 13;
        self.rng_state ^= self.rng_state >> 7;
        self.rng_state ^= self.rng_state << 17;
        ((self.rng_state as u32) >> 16) as f32 / 65536.0
    }
}

impl<S: Sample> Concealment<S> for ComfortNoise {
    fn conceal(&mut self, samples: &mut [S]) {
        for sample in samples.iter_mut() {
            *sample = S::from_f32((self.simple_random() - 0.5) * 2.0 * self.amplitude);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculate_energy(samples: &[f32]) -> f32 {
        let sum_squares: f32 = samples.iter().map(|x| x * x).sum();
        sum_squares / samples.len() as f32
    }

    #[test]
    fn test_silence() {
        let mut samples = vec![1000i16; 160];
        Silence.conceal(&mut samples[..]);
        assert!(samples.iter().all(|s| *s == 0));
    }

    #[test]
    fn test_decaying_repeat_fades_out() {
        let mut repeat = DecayingRepeat::default();
        let mut samples = vec![0.8f32; 160];

        repeat.conceal(&mut samples[..]);
        assert!((samples[0] - 0.4).abs() < 1e-6);

        for _ in 0..30 {
            repeat.conceal(&mut samples[..]);
        }
        assert!(calculate_energy(&samples) < 1e-12);
    }

    #[test]
    fn test_decaying_repeat_s16_reaches_zero() {
        let mut repeat = DecayingRepeat::new(0.5);
        let mut samples = vec![i16::MAX; 8];
        for _ in 0..20 {
            repeat.conceal(&mut samples[..]);
        }
        assert!(samples.iter().all(|s| *s == 0));
    }

    #[test]
    fn test_comfort_noise_is_quiet_but_not_silent() {
        let mut noise = ComfortNoise::default();
        let mut samples = vec![0.0f32; 800];
        noise.conceal(&mut samples[..]);

        let energy = calculate_energy(&samples);
        assert!(energy > 0.0);
        assert!(samples.iter().all(|s| s.abs() <= 0.001));
    }

    #[test]
    fn test_closure_concealment() {
        let mut calls = 0;
        let mut conceal = |samples: &mut [i16]| {
            calls += 1;
            samples.fill(7);
        };
        let mut samples = vec![0i16; 4];
        Concealment::conceal(&mut conceal, &mut samples[..]);
        assert_eq!(samples, vec![7; 4]);
        assert_eq!(calls, 1);
    }
}
