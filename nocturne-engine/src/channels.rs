//! Channels, presets, and the UI→audio parameter boundary.
//!
//! The engine owns nine channels, created at start and alive until teardown.
//! Gain *targets* live in a [`ChannelBank`] shared with the UI side: one
//! `AtomicU32` (f32 bits) per channel, written with plain relaxed stores and
//! read once per tick by the audio thread. Presets go through a one-slot
//! pending cell so the whole table is applied within a single tick — the UI
//! never observes a half-applied preset.
//!
//! The realized (audible) gain is smoothed on the audio side by a
//! [`ChannelStrip`] with a ~100 ms one-pole ramp, which is what keeps manual
//! volume changes and preset jumps click-free.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use nocturne_core::envelopes::SlewLimiter;

/// Gain ramp time for every channel strip.
pub const GAIN_RAMP_MS: f32 = 100.0;

/// Identifier for each mixer channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Rain,
    Drone,
    Rumble,
    Beats,
    Chords,
    Bass,
    Vinyl,
    Fire,
    Thunder,
}

/// Number of mixer channels.
pub const NUM_CHANNELS: usize = 9;

impl ChannelId {
    pub const ALL: [ChannelId; NUM_CHANNELS] = [
        ChannelId::Rain,
        ChannelId::Drone,
        ChannelId::Rumble,
        ChannelId::Beats,
        ChannelId::Chords,
        ChannelId::Bass,
        ChannelId::Vinyl,
        ChannelId::Fire,
        ChannelId::Thunder,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Rain => "rain",
            ChannelId::Drone => "drone",
            ChannelId::Rumble => "rumble",
            ChannelId::Beats => "beats",
            ChannelId::Chords => "chords",
            ChannelId::Bass => "bass",
            ChannelId::Vinyl => "vinyl",
            ChannelId::Fire => "fire",
            ChannelId::Thunder => "thunder",
        }
    }

    /// Parse a channel name as used by the CLI and persisted gain maps.
    pub fn from_name(s: &str) -> Option<ChannelId> {
        Self::ALL.iter().copied().find(|c| c.name() == s)
    }

    /// Upper gain bound per channel. The drone sits under everything for tens
    /// of minutes at a time, so it is capped lower than the rest.
    #[inline]
    pub fn max_gain(self) -> f32 {
        match self {
            ChannelId::Drone => 0.5,
            _ => 1.0,
        }
    }

    /// Clamp a requested gain into this channel's valid range.
    #[inline]
    pub fn clamp_gain(self, v: f32) -> f32 {
        if v.is_finite() { v.clamp(0.0, self.max_gain()) } else { 0.0 }
    }
}

// ----------------------------------- Presets --------------------------------------

/// Named mood: a full gain table applied atomically.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Preset {
    Focus,
    Sleep,
    Vibe,
    Storm,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Focus, Preset::Sleep, Preset::Vibe, Preset::Storm];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Focus => "focus",
            Preset::Sleep => "sleep",
            Preset::Vibe => "vibe",
            Preset::Storm => "storm",
        }
    }

    pub fn from_name(s: &str) -> Option<Preset> {
        Self::ALL.iter().copied().find(|p| p.name() == s)
    }

    /// Gain table indexed like [`ChannelId::ALL`]:
    /// rain, drone, rumble, beats, chords, bass, vinyl, fire, thunder.
    pub fn gains(self) -> [f32; NUM_CHANNELS] {
        match self {
            //                 rain  drone rumble beats chords bass  vinyl fire  thunder
            Preset::Focus => [0.50, 0.30, 0.20, 0.00, 0.00, 0.00, 0.25, 0.00, 0.00],
            Preset::Sleep => [0.30, 0.35, 0.40, 0.00, 0.00, 0.00, 0.00, 0.25, 0.00],
            Preset::Vibe  => [0.30, 0.20, 0.00, 0.70, 0.60, 0.60, 0.40, 0.00, 0.00],
            Preset::Storm => [0.80, 0.00, 0.60, 0.00, 0.00, 0.00, 0.00, 0.00, 0.80],
        }
    }

    #[inline]
    fn to_u8(self) -> u8 {
        match self {
            Preset::Focus => 0,
            Preset::Sleep => 1,
            Preset::Vibe => 2,
            Preset::Storm => 3,
        }
    }

    #[inline]
    fn from_u8(v: u8) -> Option<Preset> {
        Preset::ALL.get(v as usize).copied()
    }
}

// --------------------------------- Channel bank -----------------------------------

const NO_PRESET: u8 = u8::MAX;

/// Shared gain targets. UI side writes, audio side reads once per tick.
///
/// Every store is a single-word atomic, so a reader can never see a torn
/// value; the pending-preset slot is drained at tick start so a preset lands
/// as one logical action.
#[derive(Debug)]
pub struct ChannelBank {
    targets: [AtomicU32; NUM_CHANNELS],
    pending_preset: AtomicU8,
}

impl Default for ChannelBank {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelBank {
    /// All channels silent except a gentle default rain bed.
    pub fn new() -> Self {
        let bank = Self {
            targets: core::array::from_fn(|_| AtomicU32::new(0.0_f32.to_bits())),
            pending_preset: AtomicU8::new(NO_PRESET),
        };
        bank.set_target(ChannelId::Rain, 0.5);
        bank
    }

    /// Clamped target write; out-of-range values are clamped, never rejected.
    #[inline]
    pub fn set_target(&self, id: ChannelId, v: f32) {
        let v = id.clamp_gain(v);
        self.targets[id.index()].store(v.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn target(&self, id: ChannelId) -> f32 {
        f32::from_bits(self.targets[id.index()].load(Ordering::Relaxed))
    }

    /// Restore host-persisted gains in one pass (the `loadInitialGains` entry
    /// point). Unknown channels cannot be expressed; values are clamped.
    pub fn load_initial(&self, gains: &[(ChannelId, f32)]) {
        for &(id, v) in gains {
            self.set_target(id, v);
        }
    }

    /// UI side: request a preset. Latest request wins.
    #[inline]
    pub fn request_preset(&self, p: Preset) {
        self.pending_preset.store(p.to_u8(), Ordering::Relaxed);
    }

    /// Audio side, tick start: drain the pending preset and write its table.
    pub fn drain_pending_preset(&self) -> Option<Preset> {
        let raw = self.pending_preset.swap(NO_PRESET, Ordering::Relaxed);
        let preset = Preset::from_u8(raw)?;
        let table = preset.gains();
        for (id, &gain) in ChannelId::ALL.iter().zip(table.iter()) {
            self.set_target(*id, gain);
        }
        Some(preset)
    }
}

// --------------------------------- Channel strip ----------------------------------

/// Audio-side per-channel smoothing: realized gain chases the target through a
/// one-pole slew so changes never step.
#[derive(Copy, Clone, Debug)]
pub struct ChannelStrip {
    target: f32,
    slew: SlewLimiter,
}

impl ChannelStrip {
    /// `initial` seeds both target and realized gain, so restored sessions do
    /// not fade in from silence.
    pub fn new(initial: f32, sr: f32) -> Self {
        let mut slew = SlewLimiter::new(GAIN_RAMP_MS, sr);
        slew.reset(initial);
        Self { target: initial, slew }
    }

    /// Tick-rate target update (already clamped by the bank).
    #[inline]
    pub fn set_target(&mut self, v: f32) {
        self.target = v;
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Per-sample smoothed gain.
    #[inline]
    pub fn next_gain(&mut self) -> f32 {
        self.slew.process(self.target)
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        self.slew.value()
    }
}

// ------------------------------------ Tests --------------------------------------
