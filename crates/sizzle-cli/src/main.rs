//! # Sizzle
//!
//! Terminal WAV player with sample-accurate looping.

mod cli;
mod repl;
mod report;

use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Command, OutputArgs};
use sizzle_audio::generate::tone;
use sizzle_audio::output::{default_device_name, list_output_devices};
use sizzle_audio::{wav, AudioEngine};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Peak level of generated tones.
const TONE_AMPLITUDE: f32 = 0.5;

/// Slack on top of the expected play time before `--once` gives up.
const ONCE_GRACE: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sizzle=info,sizzle_audio=info".into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Starting Sizzle v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Info { file, json } => print_info(&file, json),
        Command::Play {
            file,
            looping,
            loop_count,
            once,
        } => play_file(&cli.output, &file, looping, loop_count, once),
        Command::Tone {
            waveform,
            frequency,
            seconds,
            sample_rate,
            channels,
            once,
        } => {
            let samples = tone(waveform, frequency, seconds, sample_rate, channels, TONE_AMPLITUDE);
            play_tone(&cli.output, samples, sample_rate, channels, once)
        }
        Command::Devices => print_devices(),
    }
}

fn print_info(file: &Path, as_json: bool) -> Result<()> {
    let audio = wav::decode_file(file).with_context(|| format!("Failed to read {}", file.display()))?;
    if as_json {
        println!("{}", report::json(&audio)?);
    } else {
        print!("{}", report::summary(&audio));
    }
    Ok(())
}

fn play_file(
    output: &OutputArgs,
    file: &Path,
    looping: bool,
    loop_count: Option<u32>,
    once: bool,
) -> Result<()> {
    let engine = open_engine(output)?;
    engine
        .load(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;

    if let Some(count) = loop_count {
        engine.set_loop_count(count);
    } else if looping {
        engine.set_loop(true);
    }

    if once {
        play_once(&engine)
    } else {
        interact(&engine)
    }
}

fn play_tone(
    output: &OutputArgs,
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    once: bool,
) -> Result<()> {
    if samples.is_empty() {
        bail!("Tone parameters produce no audio");
    }

    let engine = open_engine(output)?;
    engine.load_samples(samples, channels, sample_rate)?;
    if once {
        play_once(&engine)
    } else {
        interact(&engine)
    }
}

fn open_engine(output: &OutputArgs) -> Result<AudioEngine> {
    let engine = AudioEngine::new(output.engine_config())?;
    info!("Using {} output", engine.backend_name());
    Ok(engine)
}

/// Expected play time including every configured replay.
fn once_timeout(engine: &AudioEngine) -> Duration {
    let passes = f64::from(engine.loop_count()) + 1.0;
    Duration::try_from_secs_f64(engine.duration_seconds() * passes)
        .unwrap_or(Duration::MAX)
        .saturating_add(ONCE_GRACE)
}

fn play_once(engine: &AudioEngine) -> Result<()> {
    if engine.is_looping() && engine.loop_count() == 0 {
        bail!("Cannot play once while looping forever");
    }
    let finished = engine
        .play_to_end(once_timeout(engine))
        .context("Failed to start playback")?;
    if !finished {
        bail!("Playback did not finish in time");
    }
    Ok(())
}

fn interact(engine: &AudioEngine) -> Result<()> {
    engine.play().context("Failed to start playback")?;
    repl::run(engine, io::stdin().lock(), io::stdout().lock())?;
    engine.stop();
    Ok(())
}

fn print_devices() -> Result<()> {
    let default = default_device_name();
    let devices = list_output_devices().context("Failed to list output devices")?;
    if devices.is_empty() {
        println!("No output devices found");
    }
    for name in devices {
        let marker = if default.as_deref() == Some(name.as_str()) { "*" } else { " " };
        println!("{marker} {name}");
    }
    Ok(())
}
