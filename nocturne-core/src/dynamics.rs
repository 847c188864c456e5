//! Dynamics: a feed-forward compressor for the mastering bus.
//!
//! Parameterized the way WebAudio's DynamicsCompressorNode is (threshold,
//! knee, ratio, attack, release), with a peak envelope follower and a
//! quadratic soft-knee. Mono, sample-by-sample, allocation free.

use crate::dsp::{db_to_lin, lin_to_db, one_pole_coeff_ms};
use core::fmt::Debug;

/// Feed-forward mono compressor.
#[derive(Copy, Clone, Debug)]
pub struct Compressor {
    threshold_db: f32,
    knee_db: f32,
    ratio: f32,
    a_atk: f32,
    a_rel: f32,
    // envelope follower state (linear)
    env: f32,
}

impl Compressor {
    /// `attack_s`/`release_s` are envelope time constants in seconds.
    #[inline]
    pub fn new(
        threshold_db: f32,
        knee_db: f32,
        ratio: f32,
        attack_s: f32,
        release_s: f32,
        sr: f32,
    ) -> Self {
        Self {
            threshold_db: threshold_db.clamp(-100.0, 0.0),
            knee_db: knee_db.max(0.0),
            ratio: ratio.clamp(1.0, 20.0),
            a_atk: one_pole_coeff_ms(attack_s * 1000.0, sr),
            a_rel: one_pole_coeff_ms(release_s * 1000.0, sr),
            env: 0.0,
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.env = 0.0;
    }

    /// Gain reduction in dB (≤ 0) for an input level in dB.
    #[inline]
    fn gain_db(&self, input_db: f32) -> f32 {
        let slope = 1.0 - 1.0 / self.ratio;
        if self.knee_db <= 0.0 {
            if input_db <= self.threshold_db {
                0.0
            } else {
                (self.threshold_db - input_db) * slope
            }
        } else {
            let half = self.knee_db * 0.5;
            let lo = self.threshold_db - half;
            let hi = self.threshold_db + half;
            if input_db <= lo {
                0.0
            } else if input_db >= hi {
                (self.threshold_db - input_db) * slope
            } else {
                // quadratic interpolation through the knee
                let x = input_db - lo;
                -(x * x) / (2.0 * self.knee_db) * slope
            }
        }
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let level = x.abs();
        // peak follower: fast up (attack), slow down (release)
        let a = if level > self.env { self.a_atk } else { self.a_rel };
        self.env = a * self.env + (1.0 - a) * level;

        let reduction_db = self.gain_db(lin_to_db(self.env));
        x * db_to_lin(reduction_db)
    }

    /// Current gain reduction in dB (≥ 0), for metering.
    #[inline]
    pub fn reduction_db(&self) -> f32 {
        -self.gain_db(lin_to_db(self.env))
    }
}

// ------------------------------------ Tests --------------------------------------
