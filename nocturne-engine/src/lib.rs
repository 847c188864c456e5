//! Nocturne Engine — procedural lofi/ambient soundscape synthesis.
//!
//! Crate layout:
//! - [`channels`]  : channel ids, atomic gain targets, presets
//! - [`nodes`]     : oscillators and LFOs
//! - [`textures`]  : looped noise beds and the continuous drone
//! - [`voices`]    : transient voices and the sweep-retired arena
//! - [`sequencer`] : lookahead step scheduler and harmony tables
//! - [`master`]    : mix-bus mastering chain and the waveform tap
//! - [`engine`]    : the offline-testable engine core (one block = one tick)
//! - [`realtime`]  : cpal device glue (`realtime` feature, on by default)
//! - [`error`]     : the `start()` failure taxonomy
//!
//! The engine deliberately avoids heap allocations in the audio path: beds are
//! rendered once at start, voices live in a fixed-capacity arena, and all UI
//! interaction goes through single-word atomics.

pub mod channels;
pub mod engine;
pub mod error;
pub mod master;
pub mod nodes;
pub mod sequencer;
pub mod textures;
pub mod voices;

#[cfg(feature = "realtime")]
pub mod realtime;

// Re-export the host-facing surface to make downstream imports ergonomic.
pub use channels::{ChannelBank, ChannelId, Preset, NUM_CHANNELS};
pub use engine::{EngineConfig, EngineCore, EngineShared, LIGHTNING_PULSE_TICKS};
pub use error::EngineError;
pub use textures::TimeOfDay;

#[cfg(feature = "realtime")]
pub use realtime::{output_device_names, start, EngineHandle};
