//! Continuous textures: looped noise beds and the drone.
//!
//! Every bed renders a fixed-length buffer once at engine start and then
//! loops it for the life of the engine; nothing here allocates on the audio
//! path. Two seconds of noise is long enough that the loop seam is masked —
//! colored noise has no pitch to phase against.
//!
//! The drone is the one continuous *tonal* texture: two detuned oscillators
//! with a slow vibrato through a low one-pole, base pitch picked once from
//! the diurnal table.

use nocturne_core::filters::OnePoleLP;
use nocturne_core::noise::{BrownFilter, PinkFilter};
use rand::Rng;

use crate::nodes::{Lfo, Osc, Wave};

/// Length of every looped bed, in seconds.
pub const BED_SECONDS: f32 = 2.0;

/// Fixed drone detune between the two oscillators, in Hz.
pub const DRONE_DETUNE_HZ: f32 = 2.0;

/// Drone lowpass coloring cutoff.
pub const DRONE_CUTOFF_HZ: f32 = 400.0;

// --------------------------------- Diurnal table ----------------------------------

/// Host-supplied time-of-day bucket; only used to pick the drone's base pitch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimeOfDay {
    Morning,
    Day,
    Evening,
    Night,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 4] = [
        TimeOfDay::Morning,
        TimeOfDay::Day,
        TimeOfDay::Evening,
        TimeOfDay::Night,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Day => "day",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }

    pub fn from_name(s: &str) -> Option<TimeOfDay> {
        Self::ALL.iter().copied().find(|t| t.name() == s)
    }

    /// Drone base frequency: C2 / G2 / E2 / A1.
    #[inline]
    pub fn drone_hz(self) -> f32 {
        match self {
            TimeOfDay::Morning => 65.41,
            TimeOfDay::Day => 98.00,
            TimeOfDay::Evening => 82.41,
            TimeOfDay::Night => 55.00,
        }
    }
}

// ----------------------------------- Loop bed -------------------------------------

/// A pre-rendered buffer treated as a seamless loop source.
#[derive(Clone, Debug)]
pub struct LoopBed {
    buf: Vec<f32>,
    pos: usize,
}

impl LoopBed {
    fn from_buf(buf: Vec<f32>) -> Self {
        debug_assert!(!buf.is_empty());
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Next sample, wrapping at the buffer end.
    #[inline]
    pub fn next(&mut self) -> f32 {
        let s = self.buf[self.pos];
        self.pos += 1;
        if self.pos >= self.buf.len() {
            self.pos = 0;
        }
        s
    }
}

#[inline]
fn bed_len(sr: f32) -> usize {
    (BED_SECONDS * sr.max(1.0)) as usize
}

/// Rain: pink noise (≈ −3 dB/octave), the softest of the beds.
pub fn render_rain_bed(sr: f32, rng: &mut impl Rng) -> LoopBed {
    let mut pink = PinkFilter::new();
    let buf = (0..bed_len(sr))
        .map(|_| pink.tick(rng.gen_range(-1.0..1.0)))
        .collect();
    LoopBed::from_buf(buf)
}

/// Rumble: brown noise (≈ −6 dB/octave), the low weather floor.
pub fn render_rumble_bed(sr: f32, rng: &mut impl Rng) -> LoopBed {
    let mut brown = BrownFilter::new();
    let buf = (0..bed_len(sr))
        .map(|_| brown.tick(rng.gen_range(-1.0..1.0)))
        .collect();
    LoopBed::from_buf(buf)
}

/// Per-sample impulse probability of the vinyl crackle.
pub const VINYL_POP_P: f64 = 0.002;

/// Vinyl: near-silence with sparse bipolar dust impulses.
pub fn render_vinyl_bed(sr: f32, rng: &mut impl Rng) -> LoopBed {
    let buf = (0..bed_len(sr))
        .map(|_| {
            if rng.gen_bool(VINYL_POP_P) {
                let amp: f32 = rng.gen_range(0.2..0.9);
                if rng.gen_bool(0.5) { amp } else { -amp }
            } else {
                0.0
            }
        })
        .collect();
    LoopBed::from_buf(buf)
}

/// Per-sample pop probability of the fire bed.
pub const FIRE_POP_P: f64 = 0.008;

/// Fire: a low filtered-noise floor (the steady burn) plus louder sparse pops.
pub fn render_fire_bed(sr: f32, rng: &mut impl Rng) -> LoopBed {
    let mut floor_lp = OnePoleLP::new(900.0, sr);
    let buf = (0..bed_len(sr))
        .map(|_| {
            let hiss = floor_lp.process(rng.gen_range(-1.0..1.0)) * 0.18;
            if rng.gen_bool(FIRE_POP_P) {
                let amp: f32 = rng.gen_range(0.3..1.0);
                hiss + if rng.gen_bool(0.5) { amp } else { -amp }
            } else {
                hiss
            }
        })
        .collect();
    LoopBed::from_buf(buf)
}

// ------------------------------------- Drone --------------------------------------

/// Continuous sine+triangle drone, never retriggered, only gain-modulated.
#[derive(Copy, Clone, Debug)]
pub struct DroneVoice {
    osc_a: Osc,
    osc_b: Osc,
    vib: Lfo,
    lp: OnePoleLP,
    base_hz: f32,
    sr: f32,
}

impl DroneVoice {
    pub fn new(time: TimeOfDay, sr: f32) -> Self {
        let base_hz = time.drone_hz();
        Self {
            osc_a: Osc::new(base_hz, Wave::Sine),
            osc_b: Osc::new(base_hz + DRONE_DETUNE_HZ, Wave::Tri),
            vib: Lfo::sine(0.15),
            lp: OnePoleLP::new(DRONE_CUTOFF_HZ, sr),
            base_hz,
            sr,
        }
    }

    #[inline]
    pub fn base_hz(&self) -> f32 {
        self.base_hz
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        let sr = self.sr;
        // slow vibrato on the sine only; the triangle holds the beat frequency
        let vib = self.vib.next_norm(sr);
        self.osc_a.set_freq(self.base_hz * (1.0 + 0.004 * vib));
        let x = 0.5 * (self.osc_a.next(sr) + self.osc_b.next(sr));
        self.lp.process(x)
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const SR: f32 = 48000.0;

    #[test]
    fn beds_loop_seamlessly() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut bed = render_rain_bed(SR, &mut rng);
        let len = bed.len();
        assert_eq!(len, (BED_SECONDS * SR) as usize);
        let first = bed.next();
        for _ in 0..len - 1 {
            bed.next();
        }
        // wrapped: the next read is the first sample again
        assert_eq!(bed.next(), first);
    }

    #[test]
    fn vinyl_density_is_sparse() {
        let mut rng = SmallRng::seed_from_u64(2);
        let bed = render_vinyl_bed(SR, &mut rng);
        let pops = bed.buf.iter().filter(|s| s.abs() > 0.0).count();
        let density = pops as f64 / bed.len() as f64;
        assert!(density > 0.0005 && density < 0.01, "density={density}");
    }

    #[test]
    fn fire_keeps_a_continuous_floor() {
        let mut rng = SmallRng::seed_from_u64(3);
        let bed = render_fire_bed(SR, &mut rng);
        let nonzero = bed.buf.iter().filter(|s| s.abs() > 1e-6).count();
        // the hiss floor means essentially every sample is live
        assert!(nonzero as f64 > bed.len() as f64 * 0.95);
        let loud = bed.buf.iter().filter(|s| s.abs() > 0.3).count();
        assert!(loud > 100, "no pops rendered: {loud}");
    }

    #[test]
    fn drone_is_bounded_and_alive() {
        let mut drone = DroneVoice::new(TimeOfDay::Night, SR);
        assert_eq!(drone.base_hz(), 55.0);
        let mut peak = 0.0_f32;
        for _ in 0..(SR as usize) {
            let s = drone.next();
            assert!(s.abs() <= 1.0);
            peak = peak.max(s.abs());
        }
        assert!(peak > 0.1, "drone silent: {peak}");
    }

    #[test]
    fn diurnal_table_is_distinct() {
        let mut hz: Vec<f32> = TimeOfDay::ALL.iter().map(|t| t.drone_hz()).collect();
        hz.sort_by(|a, b| a.partial_cmp(b).unwrap());
        hz.dedup();
        assert_eq!(hz.len(), 4);
    }
}
