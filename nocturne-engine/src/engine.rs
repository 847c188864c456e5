//! The engine core: one object owning every piece of audio state.
//!
//! `EngineCore` is driven one block at a time; each `process_block` call is
//! one scheduling tick (drain preset → refresh targets → lightning countdown →
//! lookahead dispatch → render → sweep). The realtime glue wraps it in a cpal
//! callback; tests drive it directly, offline, with no device anywhere.
//!
//! All cross-thread state lives in [`EngineShared`]: the channel bank, the
//! waveform tap, and the lightning pulse. Everything else is owned here and
//! touched only from the render path, so the engine needs no locks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use nocturne_core::dsp::{midi_to_hz, TAU};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::channels::{ChannelBank, ChannelId, ChannelStrip, NUM_CHANNELS};
use crate::master::{MasterChain, WaveformTap};
use crate::sequencer::{Event, EventKind, GainView, Sequencer};
use crate::textures::{
    render_fire_bed, render_rain_bed, render_rumble_bed, render_vinyl_bed, DroneVoice, LoopBed,
    TimeOfDay,
};
use crate::voices::{Voice, VoiceArena};

/// Ticks the lightning flag stays up after a thunder strike (the visualizer
/// fades its flash over this countdown).
pub const LIGHTNING_PULSE_TICKS: u32 = 10;

/// Ambience drift period and depth: ±10% of the drone's base target over
/// roughly half a minute.
pub const AMBIENCE_PERIOD_S: f64 = 30.0;
pub const AMBIENCE_DEPTH: f32 = 0.10;

// ---------------------------------- Config -----------------------------------------

/// Everything the host decides before `start`.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Pick a specific output device by name; default output otherwise.
    pub device_name: Option<String>,
    /// Requested sample rate; the device default otherwise.
    pub sample_rate: Option<u32>,
    /// Diurnal bucket, computed by the host, selecting the drone's base pitch.
    pub time_of_day: TimeOfDay,
    /// Seed for every stochastic element (beds, humanize, ghosts, thunder).
    pub seed: u64,
    /// Host-persisted gains restored at startup (`loadInitialGains`).
    pub initial_gains: Vec<(ChannelId, f32)>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            sample_rate: None,
            time_of_day: TimeOfDay::Night,
            seed: 0x0C7E_ACE5,
            initial_gains: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn with_time_of_day(mut self, t: TimeOfDay) -> Self {
        self.time_of_day = t;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_initial_gains(mut self, gains: Vec<(ChannelId, f32)>) -> Self {
        self.initial_gains = gains;
        self
    }
}

// ---------------------------------- Shared state ------------------------------------

/// State shared between the render path and the UI-facing handle.
#[derive(Debug)]
pub struct EngineShared {
    pub bank: ChannelBank,
    pub tap: WaveformTap,
    pub lightning: AtomicU32,
}

impl EngineShared {
    fn new() -> Self {
        Self {
            bank: ChannelBank::new(),
            tap: WaveformTap::new(),
            lightning: AtomicU32::new(0),
        }
    }
}

// ------------------------------------ Core ------------------------------------------

/// Ambience scale factor at transport time `t`: `1 ± AMBIENCE_DEPTH`.
#[inline]
pub(crate) fn ambience_scale(t: f64) -> f32 {
    1.0 + AMBIENCE_DEPTH * ((TAU as f64 * t / AMBIENCE_PERIOD_S).sin() as f32)
}

pub struct EngineCore {
    sr: f32,
    frames: u64,
    shared: Arc<EngineShared>,
    strips: [ChannelStrip; NUM_CHANNELS],
    rain: LoopBed,
    rumble: LoopBed,
    vinyl: LoopBed,
    fire: LoopBed,
    drone: DroneVoice,
    arena: VoiceArena,
    seq: Sequencer,
    master: MasterChain,
}

impl EngineCore {
    /// Build all continuous state: beds rendered, channels created, sequencer
    /// armed at transport zero. No audio device involved.
    pub fn new(cfg: &EngineConfig, sr: f32) -> Self {
        let shared = Arc::new(EngineShared::new());
        shared.bank.load_initial(&cfg.initial_gains);

        let mut rng = SmallRng::seed_from_u64(cfg.seed);
        let strips = core::array::from_fn(|i| {
            // seed the slew at the restored target so startup does not fade in
            ChannelStrip::new(shared.bank.target(ChannelId::ALL[i]), sr)
        });

        Self {
            sr,
            frames: 0,
            strips,
            rain: render_rain_bed(sr, &mut rng),
            rumble: render_rumble_bed(sr, &mut rng),
            vinyl: render_vinyl_bed(sr, &mut rng),
            fire: render_fire_bed(sr, &mut rng),
            drone: DroneVoice::new(cfg.time_of_day, sr),
            arena: VoiceArena::new(),
            seq: Sequencer::new(rng.gen()),
            master: MasterChain::new(sr),
            shared,
        }
    }

    #[inline]
    pub fn shared(&self) -> Arc<EngineShared> {
        Arc::clone(&self.shared)
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sr
    }

    /// Transport position in seconds.
    #[inline]
    pub fn transport_secs(&self) -> f64 {
        self.frames as f64 / self.sr as f64
    }

    /// Realized (smoothed) gain of a channel right now.
    #[inline]
    pub fn channel_gain(&self, id: ChannelId) -> f32 {
        self.strips[id.index()].gain()
    }

    #[inline]
    pub fn active_voices(&self) -> usize {
        self.arena.len()
    }

    /// One scheduling tick: called at the top of every block.
    fn begin_tick(&mut self) {
        let bank = &self.shared.bank;
        bank.drain_pending_preset();

        // Refresh strip targets; the drone breathes with the ambience LFO.
        let t = self.transport_secs();
        for id in ChannelId::ALL {
            let base = bank.target(id);
            let eff = if id == ChannelId::Drone && base > 0.0 {
                id.clamp_gain(base * ambience_scale(t))
            } else {
                base
            };
            self.strips[id.index()].set_target(eff);
        }

        // Lightning countdown: engine is the only writer.
        let pulse = self.shared.lightning.load(Ordering::Relaxed);
        if pulse > 0 {
            self.shared.lightning.store(pulse - 1, Ordering::Relaxed);
        }

        // Lookahead dispatch into the voice arena.
        let gains = GainView {
            beats: bank.target(ChannelId::Beats),
            chords: bank.target(ChannelId::Chords),
            bass: bank.target(ChannelId::Bass),
            thunder: bank.target(ChannelId::Thunder),
        };
        let sr = self.sr;
        let arena = &mut self.arena;
        let shared = &self.shared;
        self.seq.advance(t, &gains, &mut |e| {
            Self::spawn_event(arena, shared, e, sr);
        });

        self.arena.sweep(self.frames);
    }

    fn spawn_event(arena: &mut VoiceArena, shared: &EngineShared, e: Event, sr: f32) {
        let start = (e.time.max(0.0) * sr as f64) as u64;
        match e.kind {
            EventKind::Kick { pitch_hz, vel } => {
                arena.spawn(Voice::kick(start, pitch_hz, vel, sr));
            }
            EventKind::Snare { pitch_hz, vel, seed } => {
                arena.spawn(Voice::snare(start, pitch_hz, vel, sr, seed));
            }
            EventKind::Hihat { cutoff_hz, vel, seed } => {
                arena.spawn(Voice::hihat(start, cutoff_hz, vel, sr, seed));
            }
            EventKind::ChordNote { note, vel } => {
                arena.spawn(Voice::chord_note(start, midi_to_hz(note as f32), vel, sr));
            }
            EventKind::Bass { note, vel, slide } => {
                arena.spawn(Voice::bass(start, midi_to_hz(note as f32), vel, slide, sr));
            }
            EventKind::Thunder { dur_s, vel, seed } => {
                arena.spawn(Voice::thunder(start, dur_s, vel, sr, seed));
                shared.lightning.store(LIGHTNING_PULSE_TICKS, Ordering::Relaxed);
            }
        }
    }

    #[inline]
    fn render_sample(&mut self) -> f32 {
        let mut gains = [0.0_f32; NUM_CHANNELS];
        for (g, strip) in gains.iter_mut().zip(self.strips.iter_mut()) {
            *g = strip.next_gain();
        }

        let mut mix = self.rain.next() * gains[ChannelId::Rain.index()]
            + self.rumble.next() * gains[ChannelId::Rumble.index()]
            + self.vinyl.next() * gains[ChannelId::Vinyl.index()]
            + self.fire.next() * gains[ChannelId::Fire.index()]
            + self.drone.next() * gains[ChannelId::Drone.index()];
        mix += self.arena.render(self.frames, self.sr, &gains);

        self.frames += 1;
        let y = self.master.process(mix);
        self.shared.tap.push(y);
        y
    }

    /// Render one mono block. One call = one scheduling tick.
    pub fn process_block(&mut self, out: &mut [f32]) {
        self.begin_tick();
        for s in out.iter_mut() {
            *s = self.render_sample();
        }
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::Preset;

    const SR: f32 = 48000.0;
    const BLOCK: usize = 512;

    fn silent_config() -> EngineConfig {
        EngineConfig::default().with_initial_gains(
            ChannelId::ALL.iter().map(|&id| (id, 0.0)).collect(),
        )
    }

    fn run_secs(core: &mut EngineCore, secs: f32) {
        let mut buf = [0.0_f32; BLOCK];
        let blocks = (secs * SR / BLOCK as f32) as usize;
        for _ in 0..blocks {
            core.process_block(&mut buf);
        }
    }

    #[test]
    fn all_zero_gains_yield_a_flat_snapshot() {
        let mut core = EngineCore::new(&silent_config(), SR);
        run_secs(&mut core, 1.0);
        let snap = core.shared().tap.snapshot();
        assert!(
            snap.iter().all(|s| s.abs() < 1e-6),
            "phantom signal during silence"
        );
    }

    #[test]
    fn set_channel_gain_converges_through_the_engine() {
        let mut core = EngineCore::new(&silent_config(), SR);
        let shared = core.shared();
        shared.bank.set_target(ChannelId::Rain, 0.8);
        run_secs(&mut core, 0.5);
        let g = core.channel_gain(ChannelId::Rain);
        assert!((g - 0.8).abs() < 0.02, "rain gain at {g}");
        // and the rain bed is audibly present now
        let snap = shared.tap.snapshot();
        assert!(snap.iter().any(|s| s.abs() > 0.005), "rain inaudible");
    }

    #[test]
    fn preset_lands_within_one_tick() {
        let mut core = EngineCore::new(&silent_config(), SR);
        let shared = core.shared();
        shared.bank.request_preset(Preset::Storm);
        let mut buf = [0.0_f32; BLOCK];
        core.process_block(&mut buf);
        assert_eq!(shared.bank.target(ChannelId::Rain), 0.8);
        assert_eq!(shared.bank.target(ChannelId::Thunder), 0.8);
        assert_eq!(shared.bank.target(ChannelId::Rumble), 0.6);
        assert_eq!(shared.bank.target(ChannelId::Chords), 0.0);
    }

    #[test]
    fn lightning_counts_down_once_per_tick() {
        let mut core = EngineCore::new(&silent_config(), SR);
        let shared = core.shared();
        shared.lightning.store(5, Ordering::Relaxed);
        let mut buf = [0.0_f32; BLOCK];
        for expect in (0..5).rev() {
            core.process_block(&mut buf);
            assert_eq!(shared.lightning.load(Ordering::Relaxed), expect);
        }
        core.process_block(&mut buf);
        assert_eq!(shared.lightning.load(Ordering::Relaxed), 0, "must not underflow");
    }

    #[test]
    fn beats_schedule_voices_into_the_arena() {
        let mut core = EngineCore::new(&silent_config(), SR);
        core.shared().bank.set_target(ChannelId::Beats, 0.8);
        run_secs(&mut core, 1.0);
        // kick on step 0 at minimum; hats/snares besides
        assert!(core.active_voices() > 0, "no percussion spawned");
    }

    #[test]
    fn ambience_drift_is_bounded_and_inert_at_zero() {
        for t in 0..300 {
            let s = ambience_scale(t as f64 * 0.25);
            assert!((1.0 - AMBIENCE_DEPTH..=1.0 + AMBIENCE_DEPTH).contains(&s));
        }

        let mut core = EngineCore::new(&silent_config(), SR);
        run_secs(&mut core, 2.0);
        assert_eq!(core.channel_gain(ChannelId::Drone), 0.0, "drift moved a silent drone");

        // with a live drone the effective gain stays inside [0, max]
        core.shared().bank.set_target(ChannelId::Drone, 0.5);
        for _ in 0..200 {
            run_secs(&mut core, 0.1);
            let g = core.channel_gain(ChannelId::Drone);
            assert!((0.0..=ChannelId::Drone.max_gain() + 1e-4).contains(&g), "gain {g}");
        }
    }

    #[test]
    fn restored_gains_do_not_ramp_from_silence() {
        let cfg = EngineConfig::default()
            .with_initial_gains(vec![(ChannelId::Vinyl, 0.4), (ChannelId::Rain, 0.0)]);
        let core = EngineCore::new(&cfg, SR);
        assert!((core.channel_gain(ChannelId::Vinyl) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn storm_eventually_strikes_and_raises_the_pulse() {
        let cfg = silent_config().with_seed(11);
        let mut core = EngineCore::new(&cfg, SR);
        let shared = core.shared();
        shared.bank.set_target(ChannelId::Thunder, 1.0);
        let mut struck = false;
        // ~480 steps at p = 0.03 each: overwhelmingly likely to fire
        for _ in 0..(90.0 * SR / BLOCK as f32) as usize {
            let mut buf = [0.0_f32; BLOCK];
            core.process_block(&mut buf);
            if shared.lightning.load(Ordering::Relaxed) > 0 {
                struck = true;
                break;
            }
        }
        assert!(struck, "no thunder in 30 simulated seconds");
    }
}
