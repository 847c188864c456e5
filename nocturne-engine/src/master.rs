//! Mix-bus mastering chain and the visualizer's analysis tap.
//!
//! Fixed order: DC blocker → waveshaping saturation → compressor →
//! tap. The saturation is `tanh(drive·x)` normalized so full scale maps back
//! to full scale; drive is a fixed "warmth" constant, not a user parameter.
//! The compressor runs the classic WebAudio glue settings.

use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use nocturne_core::dsp::{saturate, soft_clip};
use nocturne_core::dynamics::Compressor;
use nocturne_core::filters::DcBlock;

/// Saturation warmth.
pub const SATURATION_DRIVE: f32 = 1.2;
/// Compressor constants (threshold dB, knee dB, ratio, attack s, release s).
pub const COMP_THRESHOLD_DB: f32 = -24.0;
pub const COMP_KNEE_DB: f32 = 30.0;
pub const COMP_RATIO: f32 = 12.0;
pub const COMP_ATTACK_S: f32 = 0.003;
pub const COMP_RELEASE_S: f32 = 0.25;

/// The bus chain. Owns all its filter memory; stateless otherwise.
#[derive(Copy, Clone, Debug)]
pub struct MasterChain {
    dc: DcBlock,
    comp: Compressor,
    sat_norm: f32,
}

impl MasterChain {
    pub fn new(sr: f32) -> Self {
        Self {
            dc: DcBlock::new(20.0, sr),
            comp: Compressor::new(
                COMP_THRESHOLD_DB,
                COMP_KNEE_DB,
                COMP_RATIO,
                COMP_ATTACK_S,
                COMP_RELEASE_S,
                sr,
            ),
            // tanh(drive·1) maps back to 1.0 so the curve only shapes, never
            // rescales the ceiling
            sat_norm: 1.0 / soft_clip(SATURATION_DRIVE),
        }
    }

    /// Process one bus sample through the full chain.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let x = self.dc.process(x);
        let x = saturate(x, SATURATION_DRIVE) * self.sat_norm;
        self.comp.process(x)
    }
}

// --------------------------------- Waveform tap ------------------------------------

/// Samples exposed per snapshot.
pub const TAP_LEN: usize = 1024;

/// Lock-free time-domain tap: the audio thread stores post-chain samples into
/// a ring of atomics; readers assemble an ordered snapshot (oldest → newest)
/// without ever blocking the render path. Reads never mutate engine state.
#[derive(Debug)]
pub struct WaveformTap {
    ring: Box<[AtomicU32]>,
    pos: AtomicUsize,
}

impl Default for WaveformTap {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveformTap {
    pub fn new() -> Self {
        Self {
            ring: (0..TAP_LEN).map(|_| AtomicU32::new(0)).collect(),
            pos: AtomicUsize::new(0),
        }
    }

    /// Audio side: store one sample. Single writer.
    #[inline]
    pub fn push(&self, s: f32) {
        let i = self.pos.load(Ordering::Relaxed);
        self.ring[i].store(s.to_bits(), Ordering::Relaxed);
        self.pos.store((i + 1) % TAP_LEN, Ordering::Release);
    }

    /// Reader side: ordered amplitude samples, oldest first.
    pub fn snapshot(&self) -> Vec<f32> {
        let pos = self.pos.load(Ordering::Acquire);
        let mut out = Vec::with_capacity(TAP_LEN);
        for i in 0..TAP_LEN {
            let idx = (pos + i) % TAP_LEN;
            out.push(f32::from_bits(self.ring[idx].load(Ordering::Relaxed)));
        }
        out
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    #[test]
    fn silence_in_silence_out() {
        let mut chain = MasterChain::new(SR);
        for _ in 0..10_000 {
            let y = chain.process(0.0);
            assert_eq!(y, 0.0, "phantom signal from the chain alone");
        }
    }

    #[test]
    fn chain_keeps_hot_signals_bounded() {
        let mut chain = MasterChain::new(SR);
        let mut peak = 0.0_f32;
        for n in 0..(SR as usize) {
            let x = 2.0 * (nocturne_core::dsp::TAU * 220.0 * n as f32 / SR).sin();
            peak = peak.max(chain.process(x).abs());
        }
        assert!(peak <= 1.3, "chain let a hot bus through: {peak}");
    }

    #[test]
    fn saturation_preserves_ceiling_mapping() {
        // the normalized curve maps ±1 to ±1 and boosts small signals
        let norm = 1.0 / soft_clip(SATURATION_DRIVE);
        let at_one = saturate(1.0, SATURATION_DRIVE) * norm;
        assert!((at_one - 1.0).abs() < 1e-6);
        let small = saturate(0.05, SATURATION_DRIVE) * norm;
        assert!(small > 0.05, "warmth stage should lift quiet detail");
    }

    #[test]
    fn tap_snapshot_is_ordered_and_nonmutating() {
        let tap = WaveformTap::new();
        for i in 0..(TAP_LEN + 100) {
            tap.push(i as f32);
        }
        let snap = tap.snapshot();
        assert_eq!(snap.len(), TAP_LEN);
        // oldest → newest, ending at the last pushed value
        assert_eq!(*snap.last().unwrap(), (TAP_LEN + 99) as f32);
        for pair in snap.windows(2) {
            assert_eq!(pair[1], pair[0] + 1.0);
        }
        // reading twice yields the same data (read-only)
        assert_eq!(tap.snapshot(), snap);
    }

    #[test]
    fn tap_starts_at_zero_baseline() {
        let tap = WaveformTap::new();
        assert!(tap.snapshot().iter().all(|&s| s == 0.0));
    }
}
