//! Filters: lightweight one-poles used for tonal coloring and DC safety.
//!
//! Goals
//! - `no_std`-friendly, allocation free
//! - Stable, musically-pleasant responses
//! - Clear APIs and predictable parameterization
//!
//! Contents
//! - `OnePoleLP` : "RC-style" one-pole low-pass (drone/kick coloring, damping)
//! - `OnePoleHP` : "RC-style" one-pole high-pass (snare/hat noise shaping)
//! - `DcBlock`   : convenience wrapper specialized for DC removal on the bus
//!
//! The one-poles use the inexpensive `y += a * (x - y)` form, where
//! `a = 1 - exp(-2π fc / sr)`. These are not bilinear/TPT matched; they're
//! great for gentle tonal shaping, which is all this engine needs.

use crate::dsp::{kill_denormals, one_pole_coeff_hz};
use core::fmt::Debug;

/// One-pole low-pass `y += a * (x - y)`.
///
/// `a` is derived from cutoff (Hz) and sample rate:
/// `a = 1 - exp(-2π * fc / sr)`.
#[derive(Copy, Clone, Debug)]
pub struct OnePoleLP {
    a: f32,
    y: f32,
    sr: f32,
    fc: f32,
}

impl OnePoleLP {
    /// Create a low-pass with cutoff `cut_hz` and sample rate `sr`.
    #[inline]
    pub fn new(cut_hz: f32, sr: f32) -> Self {
        let mut s = Self {
            a: 0.0,
            y: 0.0,
            sr: sr.max(1.0),
            fc: cut_hz.max(0.0),
        };
        s.update_coeffs();
        s
    }

    #[inline]
    pub fn set_sample_rate(&mut self, sr: f32) {
        self.sr = sr.max(1.0);
        self.update_coeffs();
    }

    #[inline]
    pub fn set_cutoff_hz(&mut self, cut_hz: f32) {
        self.fc = cut_hz.max(0.0);
        self.update_coeffs();
    }

    #[inline]
    fn update_coeffs(&mut self) {
        let exp_term = one_pole_coeff_hz(self.fc, self.sr); // = exp(-2π fc / sr)
        self.a = 1.0 - exp_term;
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.y += self.a * (x - self.y);
        kill_denormals(self.y)
    }

    #[inline] pub fn value(&self) -> f32 { self.y }
}

/// One-pole high-pass using the standard "leaky differentiator" form:
///
/// `y[n] = x[n] - x[n-1] + b * y[n-1]`, with `b = exp(-2π fc / sr)`.
#[derive(Copy, Clone, Debug)]
pub struct OnePoleHP {
    b: f32,
    x1: f32,
    y1: f32,
    sr: f32,
    fc: f32,
}

impl OnePoleHP {
    #[inline]
    pub fn new(cut_hz: f32, sr: f32) -> Self {
        let mut s = Self {
            b: 0.0,
            x1: 0.0,
            y1: 0.0,
            sr: sr.max(1.0),
            fc: cut_hz.max(0.0),
        };
        s.update_coeffs();
        s
    }

    #[inline] pub fn set_sample_rate(&mut self, sr: f32) { self.sr = sr.max(1.0); self.update_coeffs(); }
    #[inline] pub fn set_cutoff_hz(&mut self, cut_hz: f32) { self.fc = cut_hz.max(0.0); self.update_coeffs(); }

    #[inline]
    fn update_coeffs(&mut self) {
        self.b = one_pole_coeff_hz(self.fc, self.sr); // exp(-2π fc / sr)
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = x - self.x1 + self.b * self.y1;
        self.x1 = x;
        self.y1 = y;
        kill_denormals(y)
    }

    #[inline] pub fn value(&self) -> f32 { self.y1 }
}

/// Convenience DC blocker: a high-pass with a very low cutoff.
///
/// The brown-noise bed carries a slow random-walk offset; this keeps it (and
/// any saturation asymmetry) off the output.
#[derive(Copy, Clone, Debug)]
pub struct DcBlock {
    hp: OnePoleHP,
}

impl DcBlock {
    /// `cut_hz` default recommendation: 20 Hz.
    #[inline]
    pub fn new(cut_hz: f32, sr: f32) -> Self {
        Self { hp: OnePoleHP::new(cut_hz, sr) }
    }

    #[inline] pub fn process(&mut self, x: f32) -> f32 { self.hp.process(x) }
    #[inline] pub fn value(&self) -> f32 { self.hp.value() }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_pole_lp_moves_towards_input() {
        let sr = 48000.0;
        let mut lp = OnePoleLP::new(1000.0, sr);
        let mut y = 0.0;
        for _ in 0..(sr as usize) {
            y = lp.process(1.0);
        }
        assert!(y > 0.9, "y={}", y);
    }

    #[test]
    fn one_pole_hp_blocks_dc() {
        let sr = 48000.0;
        let mut hp = OnePoleHP::new(20.0, sr);
        let mut y = 0.0;
        for _ in 0..(sr as usize) {
            y = hp.process(1.0);
        }
        assert!(y.abs() < 1e-2, "y={}", y);
    }

    #[test]
    fn hp_attenuates_low_more_than_high() {
        let sr = 48000.0;
        let probe = |hz: f32| -> f32 {
            let mut hp = OnePoleHP::new(1000.0, sr);
            let mut peak = 0.0_f32;
            for n in 0..(sr as usize) {
                let x = (crate::dsp::TAU * hz * n as f32 / sr).sin();
                let y = hp.process(x).abs();
                // skip the transient
                if n > 4000 && y > peak {
                    peak = y;
                }
            }
            peak
        };
        assert!(probe(100.0) < probe(6000.0) * 0.5);
    }
}
