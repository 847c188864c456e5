//! Transient synth voices and the arena that owns them.
//!
//! A voice is created per trigger with its parameters already rolled (the
//! sequencer owns all the humanization dice), carries an absolute start/stop
//! time in sample frames, and is retired by a per-tick sweep once the
//! transport passes its stop time. Chord and bass retriggers may overlap
//! earlier instances (that layering is the pad's "breathing"); percussion is
//! always a fresh entry.
//!
//! Noise-based voices (snare rattle, hats, thunder) carry their own small RNG
//! so rendering is deterministic once spawned.

use nocturne_core::dsp::exp_ramp_ratio;
use nocturne_core::envelopes::{ExpDecay, LinAtkExpRel};
use nocturne_core::filters::{OnePoleHP, OnePoleLP};
use nocturne_core::noise::BrownFilter;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::channels::ChannelId;
use crate::nodes::{Lfo, Osc, Wave};

// --------------------------------- Voice timing -----------------------------------

/// Kick: pitch falls from here toward ~zero.
pub const KICK_PITCH_HZ: f32 = 150.0;
/// Kick length (pitch and amplitude ramps share it).
pub const KICK_DUR_S: f32 = 0.5;
/// Snare body/rattle decay.
pub const SNARE_DUR_S: f32 = 0.2;
/// Snare rattle highpass cutoff.
pub const SNARE_HP_HZ: f32 = 1000.0;
/// Hi-hat burst decay.
pub const HAT_DUR_S: f32 = 0.05;
/// Chord strum attack / release (release measured to −60 dB).
pub const CHORD_ATK_S: f32 = 0.1;
pub const CHORD_REL_S: f32 = 2.5;
/// Bass attack / release (release measured to −60 dB).
pub const BASS_ATK_S: f32 = 0.05;
pub const BASS_REL_S: f32 = 1.5;
/// Bass portamento: start detuned below and slide up over this long.
pub const BASS_SLIDE_S: f32 = 0.1;

const ENV_FLOOR: f32 = 0.001; // −60 dB

// --------------------------------- Voice kinds ------------------------------------

#[derive(Clone, Debug)]
struct KickVoice {
    osc: Osc,
    freq: f32,
    freq_ratio: f32,
    amp: f32,
    amp_ratio: f32,
}

impl KickVoice {
    fn new(pitch_hz: f32, vel: f32, sr: f32) -> Self {
        Self {
            osc: Osc::new(pitch_hz, Wave::Sine),
            freq: pitch_hz,
            // pitch drops to ~0.01 Hz-scale, amplitude to −60 dB, both over the
            // same half second
            freq_ratio: exp_ramp_ratio(0.01 / KICK_PITCH_HZ, KICK_DUR_S, sr),
            amp: vel,
            amp_ratio: exp_ramp_ratio(ENV_FLOOR, KICK_DUR_S, sr),
        }
    }

    #[inline]
    fn next(&mut self, sr: f32) -> f32 {
        self.osc.set_freq(self.freq);
        let s = self.osc.next(sr) * self.amp;
        self.freq *= self.freq_ratio;
        self.amp *= self.amp_ratio;
        s
    }
}

#[derive(Clone, Debug)]
struct SnareVoice {
    body: Osc,
    body_env: ExpDecay,
    rattle_hp: OnePoleHP,
    rattle_env: ExpDecay,
    rng: SmallRng,
    vel: f32,
}

impl SnareVoice {
    fn new(pitch_hz: f32, vel: f32, sr: f32, seed: u64) -> Self {
        let mut body_env = ExpDecay::new(ENV_FLOOR, SNARE_DUR_S, sr);
        let mut rattle_env = ExpDecay::new(ENV_FLOOR, SNARE_DUR_S, sr);
        body_env.trigger();
        rattle_env.trigger();
        Self {
            body: Osc::new(pitch_hz, Wave::Tri),
            body_env,
            rattle_hp: OnePoleHP::new(SNARE_HP_HZ, sr),
            rattle_env,
            rng: SmallRng::seed_from_u64(seed),
            vel,
        }
    }

    #[inline]
    fn next(&mut self, sr: f32) -> f32 {
        let body = self.body.next(sr) * self.body_env.next() * 0.5;
        let white: f32 = self.rng.gen_range(-1.0..1.0);
        let rattle = self.rattle_hp.process(white) * self.rattle_env.next() * 0.8;
        (body + rattle) * self.vel
    }
}

#[derive(Clone, Debug)]
struct HihatVoice {
    hp: OnePoleHP,
    env: ExpDecay,
    rng: SmallRng,
    vel: f32,
}

impl HihatVoice {
    fn new(cutoff_hz: f32, vel: f32, sr: f32, seed: u64) -> Self {
        let mut env = ExpDecay::new(ENV_FLOOR, HAT_DUR_S, sr);
        env.trigger();
        Self {
            hp: OnePoleHP::new(cutoff_hz, sr),
            env,
            rng: SmallRng::seed_from_u64(seed),
            vel,
        }
    }

    #[inline]
    fn next(&mut self) -> f32 {
        let white: f32 = self.rng.gen_range(-1.0..1.0);
        self.hp.process(white) * self.env.next() * self.vel
    }
}

#[derive(Clone, Debug)]
struct ChordNoteVoice {
    osc: Osc,
    vib: Lfo,
    env: LinAtkExpRel,
    base_hz: f32,
    vel: f32,
}

impl ChordNoteVoice {
    fn new(hz: f32, vel: f32, sr: f32) -> Self {
        Self {
            osc: Osc::new(hz, Wave::Sine),
            vib: Lfo::sine(2.0),
            env: LinAtkExpRel::new(CHORD_ATK_S, CHORD_REL_S / 6.9, sr),
            base_hz: hz,
            vel,
        }
    }

    #[inline]
    fn next(&mut self, sr: f32) -> f32 {
        let vib = self.vib.next_norm(sr);
        self.osc.set_freq(self.base_hz * (1.0 + 0.006 * vib));
        self.osc.next(sr) * self.env.next() * self.vel
    }
}

#[derive(Clone, Debug)]
struct BassVoice {
    osc: Osc,
    env: LinAtkExpRel,
    hz: f32,
    target_hz: f32,
    slide_step: f32,
}

impl BassVoice {
    fn new(hz: f32, slide: bool, sr: f32) -> Self {
        let start_hz = if slide { hz * 0.94 } else { hz };
        let slide_step = if slide {
            (hz - start_hz) / (BASS_SLIDE_S * sr).max(1.0)
        } else {
            0.0
        };
        Self {
            osc: Osc::new(start_hz, Wave::Sine),
            env: LinAtkExpRel::new(BASS_ATK_S, BASS_REL_S / 6.9, sr),
            hz: start_hz,
            target_hz: hz,
            slide_step,
        }
    }

    #[inline]
    fn next(&mut self, sr: f32, vel: f32) -> f32 {
        if self.slide_step != 0.0 && self.hz < self.target_hz {
            self.hz = (self.hz + self.slide_step).min(self.target_hz);
            self.osc.set_freq(self.hz);
        }
        self.osc.next(sr) * self.env.next() * vel
    }
}

#[derive(Clone, Debug)]
struct ThunderVoice {
    brown: BrownFilter,
    lp: OnePoleLP,
    env: ExpDecay,
    rng: SmallRng,
    vel: f32,
}

impl ThunderVoice {
    fn new(dur_s: f32, vel: f32, sr: f32, seed: u64) -> Self {
        let mut env = ExpDecay::new(ENV_FLOOR, dur_s, sr);
        env.trigger();
        Self {
            brown: BrownFilter::new(),
            lp: OnePoleLP::new(120.0, sr),
            env,
            rng: SmallRng::seed_from_u64(seed),
            vel,
        }
    }

    #[inline]
    fn next(&mut self) -> f32 {
        let white: f32 = self.rng.gen_range(-1.0..1.0);
        // brown rumble, darkened further, with a hot initial front
        self.lp.process(self.brown.tick(white)) * self.env.next() * self.vel * 2.5
    }
}

#[derive(Clone, Debug)]
enum VoiceKind {
    Kick(KickVoice),
    Snare(SnareVoice),
    Hihat(HihatVoice),
    ChordNote(ChordNoteVoice),
    Bass { inner: BassVoice, vel: f32 },
    Thunder(ThunderVoice),
}

/// One active transient voice with its lifetime in absolute sample frames.
#[derive(Clone, Debug)]
pub struct Voice {
    channel: ChannelId,
    start: u64,
    stop: u64,
    kind: VoiceKind,
}

#[inline]
fn frames(start: u64, dur_s: f32, sr: f32) -> u64 {
    start + (dur_s.max(0.0) * sr) as u64
}

impl Voice {
    pub fn kick(start: u64, pitch_hz: f32, vel: f32, sr: f32) -> Voice {
        Voice {
            channel: ChannelId::Beats,
            start,
            stop: frames(start, KICK_DUR_S, sr),
            kind: VoiceKind::Kick(KickVoice::new(pitch_hz, vel, sr)),
        }
    }

    pub fn snare(start: u64, pitch_hz: f32, vel: f32, sr: f32, seed: u64) -> Voice {
        Voice {
            channel: ChannelId::Beats,
            start,
            stop: frames(start, SNARE_DUR_S, sr),
            kind: VoiceKind::Snare(SnareVoice::new(pitch_hz, vel, sr, seed)),
        }
    }

    pub fn hihat(start: u64, cutoff_hz: f32, vel: f32, sr: f32, seed: u64) -> Voice {
        Voice {
            channel: ChannelId::Beats,
            start,
            stop: frames(start, HAT_DUR_S, sr),
            kind: VoiceKind::Hihat(HihatVoice::new(cutoff_hz, vel, sr, seed)),
        }
    }

    pub fn chord_note(start: u64, hz: f32, vel: f32, sr: f32) -> Voice {
        let inner = ChordNoteVoice::new(hz, vel, sr);
        Voice {
            channel: ChannelId::Chords,
            start,
            stop: frames(start, inner.env.effective_len_s(), sr),
            kind: VoiceKind::ChordNote(inner),
        }
    }

    pub fn bass(start: u64, hz: f32, vel: f32, slide: bool, sr: f32) -> Voice {
        let inner = BassVoice::new(hz, slide, sr);
        Voice {
            channel: ChannelId::Bass,
            start,
            stop: frames(start, inner.env.effective_len_s(), sr),
            kind: VoiceKind::Bass { inner, vel },
        }
    }

    pub fn thunder(start: u64, dur_s: f32, vel: f32, sr: f32, seed: u64) -> Voice {
        Voice {
            channel: ChannelId::Thunder,
            start,
            stop: frames(start, dur_s, sr),
            kind: VoiceKind::Thunder(ThunderVoice::new(dur_s, vel, sr, seed)),
        }
    }

    #[inline]
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn stop(&self) -> u64 {
        self.stop
    }

    /// Render one sample. Callers only invoke this for `start <= now < stop`.
    #[inline]
    pub fn next(&mut self, sr: f32) -> f32 {
        match &mut self.kind {
            VoiceKind::Kick(v) => v.next(sr),
            VoiceKind::Snare(v) => v.next(sr),
            VoiceKind::Hihat(v) => v.next(),
            VoiceKind::ChordNote(v) => v.next(sr),
            VoiceKind::Bass { inner, vel } => inner.next(sr, *vel),
            VoiceKind::Thunder(v) => v.next(),
        }
    }
}

// ----------------------------------- Arena ----------------------------------------

/// Upper bound on simultaneously active transient voices.
pub const MAX_VOICES: usize = 64;

/// Arena of active voices with a per-tick stop-time sweep.
#[derive(Clone, Debug, Default)]
pub struct VoiceArena {
    voices: Vec<Voice>,
}

impl VoiceArena {
    pub fn new() -> Self {
        Self { voices: Vec::with_capacity(MAX_VOICES) }
    }

    /// Add a voice. At the cap the trigger is dropped deterministically; the
    /// soundscape never hits this in practice (a dense bar peaks well below).
    pub fn spawn(&mut self, v: Voice) {
        if self.voices.len() < MAX_VOICES {
            self.voices.push(v);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Sum every sounding voice at frame `now`, scaling each by its channel's
    /// realized gain from `gains` (indexed per `ChannelId::ALL`).
    #[inline]
    pub fn render(&mut self, now: u64, sr: f32, gains: &[f32]) -> f32 {
        let mut acc = 0.0;
        for v in &mut self.voices {
            if v.start <= now && now < v.stop {
                acc += v.next(sr) * gains[v.channel.index()];
            }
        }
        acc
    }

    /// Retire voices whose stop time has passed. Called once per tick.
    pub fn sweep(&mut self, now: u64) {
        self.voices.retain(|v| v.stop > now);
    }
}

// ------------------------------------ Tests --------------------------------------
