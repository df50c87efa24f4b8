//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sizzle_audio::generate::Waveform;
use sizzle_audio::EngineConfig;

#[derive(Parser, Debug)]
#[command(name = "sizzle")]
#[command(about = "Play, loop, and inspect WAV files")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub output: OutputArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Output device selection, shared by every subcommand that plays audio.
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Output device name (default device if omitted or not found)
    #[arg(short, long, global = true, env = "SIZZLE_DEVICE")]
    pub device: Option<String>,

    /// Frames per audio callback
    #[arg(short, long, global = true, env = "SIZZLE_BUFFER_FRAMES")]
    pub buffer_frames: Option<u32>,
}

impl OutputArgs {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            device: self.device.clone(),
            buffer_frames: self.buffer_frames.filter(|&frames| frames > 0),
            ..EngineConfig::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print container and signal information
    Info {
        file: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play a WAV file and open the control prompt
    Play {
        file: PathBuf,

        /// Loop forever
        #[arg(short, long = "loop")]
        looping: bool,

        /// Replay this many times after the first pass
        #[arg(short = 'n', long)]
        loop_count: Option<u32>,

        /// Play through once without the control prompt, then exit
        #[arg(long, conflicts_with = "looping")]
        once: bool,
    },

    /// Play a generated test tone and open the control prompt
    Tone {
        #[arg(short, long, default_value = "sine")]
        waveform: Waveform,

        /// Frequency in Hz
        #[arg(short, long, default_value_t = 440.0)]
        frequency: f64,

        /// Length in seconds
        #[arg(short, long, default_value_t = 2.0)]
        seconds: f64,

        #[arg(short = 'r', long, default_value_t = 44_100)]
        sample_rate: u32,

        #[arg(short, long, default_value_t = 2)]
        channels: u16,

        /// Play through once without the control prompt, then exit
        #[arg(long)]
        once: bool,
    },

    /// List output devices
    Devices,
}
