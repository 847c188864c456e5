//! Realtime glue: device acquisition and the cpal output stream.
//!
//! `start` owns the whole initialization path: resolve a device, choose a
//! config, build the engine core, and hand back an [`EngineHandle`] the host
//! keeps for the session. Any failure is returned synchronously and leaves no
//! engine state behind — there is no half-started engine to poke at.
//!
//! The engine renders mono; the callback duplicates the sample to every
//! device channel, the same way the rest of this workspace treats scenes.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::channels::{ChannelId, Preset};
use crate::engine::{EngineConfig, EngineCore, EngineShared};
use crate::error::EngineError;

/// A running engine session.
///
/// Dropping the handle (or calling [`stop`](EngineHandle::stop)) tears down
/// the stream, which stops every continuous voice and cancels the scheduling
/// tick. The handle is deliberately not `Send`: it lives on the thread that
/// started the engine, like the `cpal::Stream` it owns.
pub struct EngineHandle {
    shared: Arc<EngineShared>,
    _stream: cpal::Stream,
    device_name: String,
    sample_rate: u32,
}

impl EngineHandle {
    /// Update a channel's gain target; out-of-range values are clamped, the
    /// realized gain ramps over ~100 ms.
    pub fn set_channel_gain(&self, id: ChannelId, value: f32) {
        self.shared.bank.set_target(id, value);
    }

    /// Atomically apply a preset's full gain table (within one engine tick).
    pub fn apply_preset(&self, preset: Preset) {
        self.shared.bank.request_preset(preset);
    }

    /// Ordered post-chain amplitude samples for the visualizer. Read-only.
    pub fn waveform_snapshot(&self) -> Vec<f32> {
        self.shared.tap.snapshot()
    }

    /// Lightning flash countdown; decremented by the engine each tick.
    pub fn lightning_pulse(&self) -> u32 {
        self.shared.lightning.load(Ordering::Relaxed)
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Tear the engine down. Equivalent to dropping the handle.
    pub fn stop(self) {
        log::debug!("nocturne engine stopped");
    }
}

/// List the names of all output devices on the default host.
pub fn output_device_names() -> Result<Vec<String>, EngineError> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    for dev in host.output_devices()? {
        names.push(dev.name()?);
    }
    Ok(names)
}

fn pick_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, EngineError> {
    if let Some(name) = name {
        for d in host.output_devices()? {
            if d.name()? == name {
                return Ok(d);
            }
        }
        return Err(EngineError::DeviceNotFound(name.to_string()));
    }
    host.default_output_device().ok_or(EngineError::NoOutputDevice)
}

fn choose_config(
    device: &cpal::Device,
    req_sr: Option<u32>,
) -> Result<cpal::SupportedStreamConfig, EngineError> {
    // If nothing requested, the device default is already concrete.
    if req_sr.is_none() {
        return Ok(device.default_output_config()?);
    }
    let req = req_sr.unwrap();

    // Pick the SupportedStreamConfigRange that can get closest to the request.
    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in device.supported_output_configs()? {
        let sr_min = range.min_sample_rate().0;
        let sr_max = range.max_sample_rate().0;
        let pen = if (sr_min..=sr_max).contains(&req) {
            0
        } else {
            sr_min.abs_diff(req).min(sr_max.abs_diff(req)) as u64
        };
        if best.as_ref().map_or(true, |(b, _)| pen < *b) {
            best = Some((pen, range));
        }
    }
    let (_, range) = best.ok_or(EngineError::NoOutputDevice)?;

    let lo = range.min_sample_rate().0;
    let hi = range.max_sample_rate().0;
    Ok(range.with_sample_rate(cpal::SampleRate(req.clamp(lo, hi))))
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut core: EngineCore,
) -> Result<cpal::Stream, EngineError>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let channels = (cfg.channels as usize).max(1);
    // mono scratch reused across callbacks; sized generously so the audio
    // thread does not reallocate in steady state
    let mut mono: Vec<f32> = Vec::with_capacity(16_384);

    let err_fn = |e: cpal::StreamError| log::error!("output stream error: {e}");

    let stream = device.build_output_stream(
        cfg,
        move |output: &mut [T], _| {
            let frames = output.len() / channels;
            mono.resize(frames, 0.0);
            core.process_block(&mut mono);
            for (frame, &s) in output.chunks_mut(channels).zip(mono.iter()) {
                let v: T = T::from_sample(s.clamp(-1.0, 1.0));
                for ch in frame.iter_mut() {
                    *ch = v;
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Allocate the output device, build the mastering chain and scheduler, and
/// start rendering. Fails synchronously if the device cannot be acquired.
pub fn start(cfg: EngineConfig) -> Result<EngineHandle, EngineError> {
    let host = cpal::default_host();
    let device = pick_device(&host, cfg.device_name.as_deref())?;
    let device_name = device.name()?;

    let sup_cfg = choose_config(&device, cfg.sample_rate)?;
    let sample_format = sup_cfg.sample_format();
    let stream_cfg: cpal::StreamConfig = sup_cfg.config();

    let sr = stream_cfg.sample_rate.0;
    let core = EngineCore::new(&cfg, sr as f32);
    let shared = core.shared();

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_cfg, core)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_cfg, core)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_cfg, core)?,
        other => return Err(EngineError::UnsupportedSampleFormat(other)),
    };
    stream.play()?;

    log::info!(
        "engine running on \"{device_name}\" @ {sr} Hz ({} ch)",
        stream_cfg.channels
    );

    Ok(EngineHandle {
        shared,
        _stream: stream,
        device_name,
        sample_rate: sr,
    })
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::textures::TimeOfDay;

    #[test]
    fn start_with_unknown_device_fails_cleanly() {
        let cfg = EngineConfig {
            device_name: Some("nocturne-test-no-such-device".into()),
            time_of_day: TimeOfDay::Day,
            ..Default::default()
        };
        // Whatever the host looks like (no audio at all, or audio with other
        // devices), a made-up name must never produce a handle.
        let err = match start(cfg) {
            Err(e) => e,
            Ok(_) => panic!("started against a nonexistent device"),
        };
        assert!(!err.to_string().is_empty());
    }
}
