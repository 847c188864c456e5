//! Nocturne CLI — real-time player for the procedural soundscape engine.

use nocturne_engine::{
    output_device_names, start, ChannelId, EngineConfig, Preset, TimeOfDay,
};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Args {
    list_devices: bool,
    device_name: Option<String>,
    sample_rate: Option<u32>,
    duration_sec: Option<u64>,
    preset: Option<String>,
    time_of_day: Option<String>,
    seed: Option<u64>,
    gains: Vec<(String, f32)>,
    quiet_meter: bool,
}

fn parse_args() -> Args {
    let mut a = Args::default();
    for s in std::env::args().skip(1) {
        if s == "--list-devices" { a.list_devices = true; continue; }
        if s == "--no-meter"     { a.quiet_meter = true;  continue; }
        if let Some(rest) = s.strip_prefix("--device=")      { a.device_name = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--sample-rate=") { a.sample_rate = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--duration=")    { a.duration_sec = rest.parse().ok();     continue; }
        if let Some(rest) = s.strip_prefix("--preset=")      { a.preset = Some(rest.to_string());      continue; }
        if let Some(rest) = s.strip_prefix("--time-of-day=") { a.time_of_day = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--seed=")        { a.seed = rest.parse().ok();             continue; }
        if let Some(rest) = s.strip_prefix("--gain=") {
            // --gain=channel:value, repeatable
            if let Some((name, val)) = rest.split_once(':') {
                if let Ok(v) = val.parse::<f32>() {
                    a.gains.push((name.to_string(), v));
                    continue;
                }
            }
            eprintln!("[warn] bad --gain (want channel:value): {rest}");
            continue;
        }
        eprintln!("[warn] unknown arg: {s}");
    }
    a
}

fn print_devices() {
    match output_device_names() {
        Ok(names) => {
            println!("Available output devices:");
            for n in names {
                println!("- {n}");
            }
        }
        Err(e) => eprintln!("[error] {e}"),
    }
}

fn main() {
    env_logger::init();
    let args = parse_args();

    if args.list_devices {
        print_devices();
        return;
    }

    let time_of_day = args
        .time_of_day
        .as_deref()
        .and_then(TimeOfDay::from_name)
        .unwrap_or(TimeOfDay::Night);

    let initial_gains: Vec<(ChannelId, f32)> = args
        .gains
        .iter()
        .filter_map(|(name, v)| match ChannelId::from_name(name) {
            Some(id) => Some((id, *v)),
            None => {
                eprintln!("[warn] unknown channel: {name}");
                None
            }
        })
        .collect();

    let mut cfg = EngineConfig {
        device_name: args.device_name.clone(),
        sample_rate: args.sample_rate,
        time_of_day,
        ..Default::default()
    }
    .with_initial_gains(initial_gains);
    if let Some(seed) = args.seed {
        cfg = cfg.with_seed(seed);
    }

    println!("nocturne — procedural lofi/ambient soundscape\n");

    let handle = match start(cfg) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("[error] failed to start engine: {e}");
            std::process::exit(1);
        }
    };

    if let Some(name) = &args.preset {
        match Preset::from_name(name) {
            Some(p) => {
                handle.apply_preset(p);
                println!("Preset: {}", p.name());
            }
            None => eprintln!("[warn] unknown preset: {name} (focus/sleep/vibe/storm)"),
        }
    }

    println!("Device: {} @ {} Hz", handle.device_name(), handle.sample_rate());
    println!("Time of day: {}", time_of_day.name());
    if let Some(d) = args.duration_sec {
        println!("Auto-stop after {d} seconds");
    }
    println!("Press Ctrl+C to stop…\n");

    let started = Instant::now();
    loop {
        std::thread::sleep(Duration::from_secs(1));

        if !args.quiet_meter {
            let snap = handle.waveform_snapshot();
            let peak = snap.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
            let rms =
                (snap.iter().map(|s| s * s).sum::<f32>() / snap.len().max(1) as f32).sqrt();
            let flash = if handle.lightning_pulse() > 0 { "  ⚡" } else { "" };
            eprintln!("[meter] peak {peak:.3}  rms {rms:.3}{flash}");
        }

        if let Some(d) = args.duration_sec {
            if started.elapsed() >= Duration::from_secs(d) {
                handle.stop();
                return;
            }
        }
    }
}
