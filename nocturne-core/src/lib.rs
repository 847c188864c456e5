#![cfg_attr(not(feature = "std"), no_std)]
//! Nocturne Core — no_std-ready DSP primitives for the procedural lofi engine.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use `libm`/`micromath` math backends
//! - `fast-math`: enable approximations (polys/rationals) for tanh etc.
//!
//! Modules
//! - [`dsp`]       : math backend, utils (db/lin, smoothing coeffs, saturation)
//! - [`noise`]     : stateful colored-noise filters (pink, brown)
//! - [`envelopes`] : percussive decay, attack/release, slew limiter
//! - [`filters`]   : one-pole LP/HP, DC blocker
//! - [`dynamics`]  : feed-forward bus compressor
//!
//! Design
//! - No heap allocations; pure sample-by-sample stateful primitives
//! - White noise is injected, never generated here, so colored-noise output is
//!   a deterministic function of (state, input)
//! - Friendly to embedded / real-time targets

pub mod dsp;
pub mod dynamics;
pub mod envelopes;
pub mod filters;
pub mod noise;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{
        db_to_lin, exp_ramp_ratio, kill_denormals, lerp, lin_to_db, midi_to_hz,
        one_pole_coeff_hz, one_pole_coeff_ms, saturate, soft_clip, TAU,
    };
    pub use crate::dynamics::Compressor;
    pub use crate::envelopes::{ExpDecay, LinAtkExpRel, SlewLimiter};
    pub use crate::filters::{DcBlock, OnePoleHP, OnePoleLP};
    pub use crate::noise::{BrownFilter, PinkFilter};
}

#[cfg(test)]
mod smoke {

    #[test]
    fn prelude_exists() {
        use crate::prelude::*;
        let _ = db_to_lin(-6.0);
        let _ = LinAtkExpRel::new(0.1, 2.5, 48000.0);
        let mut pink = PinkFilter::new();
        let _ = pink.tick(0.5);
        let mut lp = OnePoleLP::new(400.0, 48000.0);
        let _ = lp.process(0.1);
    }
}
