//! Envelope generators and parameter slewing primitives.
//!
//! Provided envelopes:
//! - `ExpDecay`     : percussive exponential decay (kick/snare/hat/thunder)
//! - `LinAtkExpRel` : linear attack into exponential release (chords/bass)
//! - `SlewLimiter`  : one-pole slew/smoother for arbitrary control signals
//!
//! All envelopes are `no_std` friendly and avoid heap allocations. Transient
//! voices use `effective_len_s()` to compute their own absolute stop time, so
//! the voice arena can retire them with a plain per-tick sweep.

use core::fmt::Debug;
use crate::dsp::{exp_ramp_ratio, one_pole_coeff_ms};

// ------------------------------ Percussive decay ----------------------------------

/// Exponential decay from 1.0 down to a floor over a fixed duration.
///
/// Multiplicative per-sample form, matching WebAudio's exponential ramp:
/// `env[n+1] = env[n] * r` with `r = floor^(1/(dur*sr))`.
#[derive(Copy, Clone, Debug)]
pub struct ExpDecay {
    ratio: f32,
    floor: f32,
    env: f32,
}

impl ExpDecay {
    /// `floor` is the terminal value (e.g. 0.001 ≈ −60 dB), `dur_s` the time to
    /// reach it.
    #[inline]
    pub fn new(floor: f32, dur_s: f32, sr: f32) -> Self {
        Self {
            ratio: exp_ramp_ratio(floor, dur_s, sr),
            floor,
            env: 1.0,
        }
    }

    /// Restart from full scale.
    #[inline]
    pub fn trigger(&mut self) {
        self.env = 1.0;
    }

    /// Advance one sample and return the envelope value (pre-decay).
    #[inline]
    pub fn next(&mut self) -> f32 {
        let v = self.env;
        self.env *= self.ratio;
        if self.env < self.floor {
            self.env = 0.0;
        }
        v
    }

    #[inline]
    pub fn finished(&self) -> bool {
        self.env <= 0.0
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.env
    }
}

// ------------------------- Linear attack, exponential release ---------------------

/// Linear ramp 0→1 over the attack, then RC-style exponential release.
///
/// Release is a time constant: the tail reaches −60 dB after ~6.9 τ, which is
/// what `effective_len_s()` reports as the envelope's audible end.
#[derive(Copy, Clone, Debug)]
pub struct LinAtkExpRel {
    atk_samples: f32,
    rel_ratio: f32,
    atk_s: f32,
    rel_tau_s: f32,
    t: f32,
    env: f32,
}

impl LinAtkExpRel {
    #[inline]
    pub fn new(atk_s: f32, rel_tau_s: f32, sr: f32) -> Self {
        let sr = sr.max(1.0);
        Self {
            atk_samples: (atk_s.max(0.0) * sr).max(1.0),
            rel_ratio: one_pole_coeff_ms(rel_tau_s * 1000.0, sr),
            atk_s: atk_s.max(0.0),
            rel_tau_s: rel_tau_s.max(1.0e-3),
            t: 0.0,
            env: 0.0,
        }
    }

    /// Advance one sample and return the envelope value.
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.t < self.atk_samples {
            self.env = self.t / self.atk_samples;
            self.t += 1.0;
        } else {
            // env *= exp(-1/(tau*sr)), decaying toward zero
            self.env *= self.rel_ratio;
            if self.env < 1.0e-5 {
                self.env = 0.0;
            }
        }
        self.env
    }

    /// Seconds from trigger to the point where the tail is ~−60 dB down.
    #[inline]
    pub fn effective_len_s(&self) -> f32 {
        self.atk_s + 6.9 * self.rel_tau_s
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.env
    }
}

// -------------------------------- Slew Limiter -----------------------------------

/// One-pole slew/smoother: `y += (x - y) * (1 - a)`
///
/// Use `alpha = one_pole_coeff_ms(t_ms, sr)`.
#[derive(Copy, Clone, Debug)]
pub struct SlewLimiter {
    alpha: f32,
    y: f32,
}

impl SlewLimiter {
    #[inline]
    pub fn new(t_ms: f32, sr: f32) -> Self {
        Self { alpha: one_pole_coeff_ms(t_ms, sr), y: 0.0 }
    }

    #[inline]
    pub fn set_time_ms(&mut self, t_ms: f32, sr: f32) {
        self.alpha = one_pole_coeff_ms(t_ms, sr);
    }

    #[inline]
    pub fn reset(&mut self, y0: f32) { self.y = y0; }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.y += (x - self.y) * (1.0 - self.alpha);
        self.y
    }

    #[inline]
    pub fn value(&self) -> f32 { self.y }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exp_decay_hits_floor_on_schedule() {
        let sr = 48000.0;
        let mut e = ExpDecay::new(0.001, 0.5, sr);
        e.trigger();
        for _ in 0..(sr * 0.45) as usize {
            e.next();
        }
        assert!(e.value() > 0.001, "decayed early: {}", e.value());
        for _ in 0..(sr * 0.1) as usize {
            e.next();
        }
        assert!(e.finished(), "still audible: {}", e.value());
    }

    #[test]
    fn lin_atk_exp_rel_shape() {
        let sr = 48000.0;
        let mut e = LinAtkExpRel::new(0.1, 0.4, sr);
        // Mid-attack: rising linearly
        for _ in 0..(sr * 0.05) as usize {
            e.next();
        }
        assert!((e.value() - 0.5).abs() < 0.01, "attack midpoint {}", e.value());
        // Past attack: near peak, then decaying (we sample 0.05 s into the
        // release, so a bit of tau has already elapsed)
        for _ in 0..(sr * 0.05) as usize {
            e.next();
        }
        let peak = e.value();
        assert!(peak > 0.8, "peak {peak}");
        for _ in 0..(sr * 0.4) as usize {
            e.next();
        }
        assert!(e.value() < peak * 0.5);
        // The advertised end is effectively silent
        let total = (e.effective_len_s() * sr) as usize;
        for _ in 0..total {
            e.next();
        }
        assert!(e.value() < 2.0e-3, "tail still audible: {}", e.value());
    }

    #[test]
    fn slew_converges_monotonically_no_overshoot() {
        let sr = 48000.0;
        let mut s = SlewLimiter::new(100.0, sr);
        let mut prev = 0.0;
        for _ in 0..(sr * 0.5) as usize {
            let v = s.process(1.0);
            assert!(v >= prev, "non-monotonic: {prev} -> {v}");
            assert!(v <= 1.0 + 1e-6, "overshoot: {v}");
            prev = v;
        }
        assert!(prev > 0.98, "did not converge within ramp window: {prev}");
    }
}
