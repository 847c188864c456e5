//! Lookahead step sequencer: the rhythmic/harmonic brain.
//!
//! The host tick (one audio block) is not sample-accurate, so nothing is ever
//! played "now": on every tick the sequencer dispatches all steps that fall
//! inside a fixed lookahead window, stamping each event with an absolute time.
//! Voices then start exactly on their stamp regardless of block boundaries.
//! The dispatch loop is a `while`, not an `if` — a late tick may owe several
//! steps at once.
//!
//! Musical time: 80 BPM, 16 sixteenth-steps per bar. Odd steps carry a fixed
//! swing offset that accumulates into the step clock; every event additionally
//! gets a small humanize jitter that does *not* accumulate. Three drum
//! templates rotate every 4 bars; chords/bass fire on step 0 of every bar with
//! the bar index as harmonic position.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

// ---------------------------------- Constants --------------------------------------

pub const TEMPO_BPM: f64 = 80.0;
pub const STEPS_PER_BAR: usize = 16;
/// Sixteenth-note duration at the fixed tempo.
pub const SECONDS_PER_STEP: f64 = 0.25 * 60.0 / TEMPO_BPM;
/// Added to the step clock after every odd step.
pub const SWING_S: f64 = 0.030;
/// Dispatch-time jitter, drawn per event, never accumulated.
pub const HUMANIZE_MAX_S: f64 = 0.015;
/// How far ahead of the transport the dispatcher runs.
pub const LOOKAHEAD_S: f64 = 0.100;
/// Per-step thunder probability at full channel gain.
pub const THUNDER_STEP_P: f64 = 0.03;
/// Inter-note delay of the chord strum.
pub const STRUM_S: f64 = 0.050;

const KICK_VEL: f32 = 0.9;
const SNARE_VEL: f32 = 0.75;
const HAT_VEL: f32 = 0.5;
const CHORD_VEL: f32 = 0.5;
const BASS_VEL: f32 = 0.7;

// ------------------------------- Drum templates -------------------------------------

/// One 16-step rhythm template; bit `i` of each mask is step `i`.
#[derive(Copy, Clone, Debug)]
pub struct DrumPattern {
    pub kick: u16,
    pub snare: u16,
    pub hat: u16,
}

impl DrumPattern {
    #[inline]
    pub fn has(mask: u16, step: usize) -> bool {
        mask & (1 << step) != 0
    }
}

/// Three grooves, rotated every 4 bars. Kick stays on step 0 in all of them;
/// what rotates is the secondary kick placement and the hat density.
pub const PATTERNS: [DrumPattern; 3] = [
    // laid back: backbeat snare, offbeat hats
    DrumPattern { kick: 0x0101, snare: 0x1010, hat: 0x4444 },
    // busier: pushed kicks, running eighth hats
    DrumPattern { kick: 0x0441, snare: 0x1010, hat: 0x5555 },
    // half-time: one kick, late snare, sparse hats
    DrumPattern { kick: 0x0001, snare: 0x0100, hat: 0x1010 },
];

/// Template rotation: `floor(bar / 4) mod 3`.
#[inline]
pub fn pattern_for_bar(bar: u64) -> &'static DrumPattern {
    &PATTERNS[((bar / 4) % 3) as usize]
}

// ---------------------------------- Harmony -----------------------------------------

/// Four-note voicings (MIDI), cycled by `bar mod 4`:
/// Am9, Fmaj7, Cmaj7, Em7 — the lofi staples.
pub const CHORD_TABLE: [[u8; 4]; 4] = [
    [45, 48, 52, 59], // A2 C3 E3 B3
    [41, 45, 48, 52], // F2 A2 C3 E3
    [48, 52, 55, 59], // C3 E3 G3 B3
    [40, 43, 47, 50], // E2 G2 B2 D3
];

/// Every 8th bar the voicing is lifted a fifth as a deliberate variation.
#[inline]
pub fn is_transposed_bar(bar: u64) -> bool {
    bar % 8 == 7
}

/// Voicing for a bar, transposition applied.
pub fn chord_for_bar(bar: u64) -> [u8; 4] {
    let mut notes = CHORD_TABLE[(bar % 4) as usize];
    if is_transposed_bar(bar) {
        for n in &mut notes {
            *n += 7;
        }
    }
    notes
}

/// Bass root: an octave below the chord's lowest note.
#[inline]
pub fn bass_note_for_bar(bar: u64) -> u8 {
    chord_for_bar(bar)[0] - 12
}

// ----------------------------------- Events -----------------------------------------

/// Gain targets the dispatcher gates on, sampled once per tick.
#[derive(Copy, Clone, Debug, Default)]
pub struct GainView {
    pub beats: f32,
    pub chords: f32,
    pub bass: f32,
    pub thunder: f32,
}

#[derive(Copy, Clone, Debug)]
pub enum EventKind {
    Kick { pitch_hz: f32, vel: f32 },
    Snare { pitch_hz: f32, vel: f32, seed: u64 },
    Hihat { cutoff_hz: f32, vel: f32, seed: u64 },
    ChordNote { note: u8, vel: f32 },
    Bass { note: u8, vel: f32, slide: bool },
    Thunder { dur_s: f32, vel: f32, seed: u64 },
}

/// A dispatched trigger with its absolute play time in seconds.
#[derive(Copy, Clone, Debug)]
pub struct Event {
    pub time: f64,
    pub kind: EventKind,
}

// ---------------------------------- Sequencer ---------------------------------------

/// Lookahead scheduler state. Single "running" state from construction;
/// stopping the engine tears the whole thing down.
#[derive(Clone, Debug)]
pub struct Sequencer {
    next_event_time: f64,
    step: usize,
    bar: u64,
    rng: SmallRng,
}

impl Sequencer {
    pub fn new(seed: u64) -> Self {
        Self {
            next_event_time: 0.0,
            step: 0,
            bar: 0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    #[inline]
    pub fn next_event_time(&self) -> f64 {
        self.next_event_time
    }

    #[inline]
    pub fn step(&self) -> usize {
        self.step
    }

    #[inline]
    pub fn bar(&self) -> u64 {
        self.bar
    }

    /// Dispatch every step due inside `[now, now + lookahead)`.
    ///
    /// If the tick came so late that the step clock has fallen behind the
    /// transport, the timeline is re-anchored at `now`: the owed step plays
    /// immediately and skipped positions are not replayed.
    pub fn advance(&mut self, now: f64, gains: &GainView, sink: &mut impl FnMut(Event)) {
        if self.next_event_time < now {
            log::warn!(
                "scheduler underrun: step clock {:.3}s behind transport, re-anchoring",
                now - self.next_event_time
            );
            self.next_event_time = now;
        }
        while self.next_event_time < now + LOOKAHEAD_S {
            self.dispatch_step(gains, sink);
            self.step_once();
        }
    }

    /// Advance the step clock by one position. Swing accumulates here; the
    /// invariants (`next_event_time` non-decreasing, 16 steps per bar) live in
    /// this one place.
    fn step_once(&mut self) {
        let swing = if self.step % 2 == 1 { SWING_S } else { 0.0 };
        self.next_event_time += SECONDS_PER_STEP + swing;
        self.step = (self.step + 1) % STEPS_PER_BAR;
        if self.step == 0 {
            self.bar += 1;
        }
    }

    #[inline]
    fn humanized(&mut self, t: f64) -> f64 {
        t + self.rng.gen_range(0.0..HUMANIZE_MAX_S)
    }

    #[inline]
    fn jitter(&mut self, spread: f32) -> f32 {
        1.0 + self.rng.gen_range(-spread..spread)
    }

    fn dispatch_step(&mut self, gains: &GainView, sink: &mut impl FnMut(Event)) {
        let t = self.next_event_time;
        let (step, bar) = (self.step, self.bar);
        let pattern = pattern_for_bar(bar);

        if gains.beats > 0.0 {
            if DrumPattern::has(pattern.kick, step) {
                let time = self.humanized(t);
                sink(Event {
                    time,
                    kind: EventKind::Kick {
                        pitch_hz: 150.0 * self.jitter(0.04),
                        vel: KICK_VEL * self.jitter(0.1),
                    },
                });
            }

            let mut snare_vel = None;
            if DrumPattern::has(pattern.snare, step) {
                snare_vel = Some(SNARE_VEL);
            } else if step == 7 && self.rng.gen_bool(0.3) {
                // ghost hit
                snare_vel = Some(SNARE_VEL * 0.5);
            } else if bar % 4 == 3 && step >= 13 && self.rng.gen_bool(0.4) {
                // fill into the next 4-bar phrase
                snare_vel = Some(SNARE_VEL * 0.6);
            }
            if let Some(vel) = snare_vel {
                let time = self.humanized(t);
                sink(Event {
                    time,
                    kind: EventKind::Snare {
                        pitch_hz: 180.0 * self.jitter(0.05),
                        vel: vel * self.jitter(0.1),
                        seed: self.rng.gen(),
                    },
                });
            }

            if DrumPattern::has(pattern.hat, step) {
                let time = self.humanized(t);
                sink(Event {
                    time,
                    kind: EventKind::Hihat {
                        cutoff_hz: self.rng.gen_range(6000.0..8000.0),
                        vel: HAT_VEL * self.jitter(0.2),
                        seed: self.rng.gen(),
                    },
                });
            }
        }

        // Thunder rolls are independent of the groove: a per-step draw whose
        // probability scales with the channel's own gain.
        if gains.thunder > 0.0 && self.rng.gen_bool(THUNDER_STEP_P * gains.thunder as f64) {
            let time = self.humanized(t);
            sink(Event {
                time,
                kind: EventKind::Thunder {
                    dur_s: self.rng.gen_range(2.0..4.0),
                    vel: self.rng.gen_range(0.7..1.0),
                    seed: self.rng.gen(),
                },
            });
        }

        if step == 0 {
            if gains.chords > 0.0 {
                let notes = chord_for_bar(bar);
                let vel = CHORD_VEL * self.jitter(0.1);
                let base = self.humanized(t);
                for (i, note) in notes.into_iter().enumerate() {
                    // strum: staggered note starts with their own micro-jitter
                    let strum = i as f64 * STRUM_S + self.rng.gen_range(0.0..0.01);
                    sink(Event {
                        time: base + strum,
                        kind: EventKind::ChordNote { note, vel },
                    });
                }
            }
            if gains.bass > 0.0 {
                let time = self.humanized(t);
                sink(Event {
                    time,
                    kind: EventKind::Bass {
                        note: bass_note_for_bar(bar),
                        vel: BASS_VEL * self.jitter(0.1),
                        slide: self.rng.gen_bool(0.3),
                    },
                });
            }
        }
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_clock_is_monotonic_and_bars_count_wraps() {
        let mut seq = Sequencer::new(1);
        let mut prev = seq.next_event_time();
        for n in 1..=STEPS_PER_BAR * 3 {
            let odd = seq.step() % 2 == 1;
            seq.step_once();
            let t = seq.next_event_time();
            let dt = t - prev;
            let want = SECONDS_PER_STEP + if odd { SWING_S } else { 0.0 };
            assert!((dt - want).abs() < 1e-12, "step {n}: dt={dt}");
            assert!(t > prev);
            prev = t;
            assert_eq!(seq.bar() as usize, n / STEPS_PER_BAR);
            assert_eq!(seq.step(), n % STEPS_PER_BAR);
        }
    }

    #[test]
    fn lookahead_dispatch_is_a_while_loop() {
        let mut seq = Sequencer::new(2);
        let gains = GainView { beats: 1.0, ..Default::default() };
        let mut events = Vec::new();
        // The very first tick must run the clock past the lookahead horizon,
        // however many steps that takes.
        seq.advance(0.0, &gains, &mut |e| events.push(e));
        let after_first = seq.next_event_time();
        assert!(after_first >= LOOKAHEAD_S);
        // and the clock never moves backwards across ticks
        let mut now = 0.0;
        let mut prev = after_first;
        for _ in 0..200 {
            now += 0.011;
            seq.advance(now, &gains, &mut |e| events.push(e));
            assert!(seq.next_event_time() >= prev);
            prev = seq.next_event_time();
        }
        // dispatched stamps only ever drift forward (humanize/strum can shuffle
        // events inside one step, never across steps)
        for pair in events.windows(2) {
            assert!(
                pair[1].time >= pair[0].time - (HUMANIZE_MAX_S + 0.01),
                "event stamps regressed: {} -> {}",
                pair[0].time,
                pair[1].time
            );
        }
    }

    #[test]
    fn underrun_reanchors_instead_of_catching_up() {
        let mut seq = Sequencer::new(3);
        let gains = GainView::default();
        seq.advance(0.0, &gains, &mut |_| {});
        let stalled_to = 10.0;
        seq.advance(stalled_to, &gains, &mut |_| {});
        // no replay of ~50 skipped steps: the clock sits just past the new now
        assert!(seq.next_event_time() >= stalled_to);
        assert!(seq.next_event_time() < stalled_to + LOOKAHEAD_S + SECONDS_PER_STEP + SWING_S);
    }

    #[test]
    fn transposed_voicing_fires_exactly_on_bar_mod_8_eq_7() {
        let transposed: Vec<u64> = (0..24).filter(|&b| is_transposed_bar(b)).collect();
        assert_eq!(transposed, vec![7, 15, 23]);
        for bar in 0..24u64 {
            let base = CHORD_TABLE[(bar % 4) as usize];
            let got = chord_for_bar(bar);
            if bar % 8 == 7 {
                for (g, b) in got.iter().zip(base.iter()) {
                    assert_eq!(*g, b + 7, "bar {bar} should be up a fifth");
                }
            } else {
                assert_eq!(got, base, "bar {bar} should be the plain voicing");
            }
        }
    }

    #[test]
    fn bass_sits_an_octave_under_the_root() {
        for bar in 0..16u64 {
            assert_eq!(bass_note_for_bar(bar), chord_for_bar(bar)[0] - 12);
        }
    }

    #[test]
    fn patterns_rotate_every_four_bars_and_always_kick_step_zero() {
        for p in &PATTERNS {
            assert!(DrumPattern::has(p.kick, 0), "kick must anchor step 0");
        }
        assert!(core::ptr::eq(pattern_for_bar(0), &PATTERNS[0]));
        assert!(core::ptr::eq(pattern_for_bar(3), &PATTERNS[0]));
        assert!(core::ptr::eq(pattern_for_bar(4), &PATTERNS[1]));
        assert!(core::ptr::eq(pattern_for_bar(8), &PATTERNS[2]));
        assert!(core::ptr::eq(pattern_for_bar(12), &PATTERNS[0]));
    }

    #[test]
    fn thunder_scales_with_gain_and_gates_at_zero() {
        let count_thunder = |gain: f32, seed: u64| -> usize {
            let mut seq = Sequencer::new(seed);
            let gains = GainView { thunder: gain, ..Default::default() };
            let mut hits = 0;
            let mut now = 0.0;
            // ~500 steps of transport
            for _ in 0..((500.0 * SECONDS_PER_STEP / 0.05) as usize) {
                now += 0.05;
                seq.advance(now, &gains, &mut |e| {
                    if matches!(e.kind, EventKind::Thunder { .. }) {
                        hits += 1;
                    }
                });
            }
            hits
        };
        assert_eq!(count_thunder(0.0, 4), 0);
        assert!(count_thunder(1.0, 5) > 0, "full-gain thunder never fired");
    }

    #[test]
    fn silent_channels_trigger_nothing() {
        let mut seq = Sequencer::new(6);
        let gains = GainView::default();
        let mut n = 0;
        let mut now = 0.0;
        for _ in 0..500 {
            now += 0.05;
            seq.advance(now, &gains, &mut |_| n += 1);
        }
        assert_eq!(n, 0);
    }

    #[test]
    fn chords_and_bass_fire_on_bar_starts_only() {
        let mut seq = Sequencer::new(7);
        let gains = GainView { chords: 0.6, bass: 0.6, ..Default::default() };
        let mut chord_notes = 0;
        let mut basses = 0;
        let mut now = 0.0;
        // run exactly 2 bars of steps past the initial lookahead
        let horizon = 2.0 * 16.0 * (SECONDS_PER_STEP + SWING_S / 2.0);
        while now < horizon {
            now += 0.01;
            seq.advance(now, &gains, &mut |e| match e.kind {
                EventKind::ChordNote { .. } => chord_notes += 1,
                EventKind::Bass { .. } => basses += 1,
                _ => {}
            });
        }
        // bars 0,1,2 have been dispatched (lookahead runs slightly ahead)
        assert!(chord_notes % 4 == 0 && chord_notes >= 8, "chord notes: {chord_notes}");
        assert!((2..=3).contains(&basses), "bass triggers: {basses}");
    }
}
