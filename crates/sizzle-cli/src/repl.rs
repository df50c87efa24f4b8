//! Line-oriented playback control.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use sizzle_audio::{AudioEngine, EngineEvent, TransportState};

/// Seconds moved by `+` and `-`.
const NUDGE_SECONDS: f64 = 0.5;

const HELP: &str = "\
Commands:
  play | pause | resume | stop
  seek <seconds>       jump to a position
  + | -                move 0.5 s forward or back
  loop on|off|toggle   enable or disable looping
  loop <n>             replay n more times (0 = forever)
  loop-start <seconds> where a loop wraps to
  loop-end <seconds>   where a loop wraps from (0 = end of track)
  loop-reset           loop over the whole track
  load <path>          open another WAV file
  status | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Resume,
    Stop,
    Seek(f64),
    Nudge(f64),
    Loop(LoopSetting),
    LoopStart(f64),
    LoopEnd(f64),
    LoopReset,
    Load(PathBuf),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSetting {
    On,
    Off,
    Toggle,
    Count(u32),
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));

        let seconds = |rest: &str| {
            rest.parse::<f64>()
                .ok()
                .filter(|s| s.is_finite())
                .ok_or_else(|| format!("expected seconds, got '{rest}'"))
        };

        match word.to_ascii_lowercase().as_str() {
            "play" | "p" => Ok(Self::Play),
            "pause" => Ok(Self::Pause),
            "resume" | "r" => Ok(Self::Resume),
            "stop" | "s" => Ok(Self::Stop),
            "seek" => seconds(rest).map(Self::Seek),
            "+" => Ok(Self::Nudge(NUDGE_SECONDS)),
            "-" => Ok(Self::Nudge(-NUDGE_SECONDS)),
            "loop" | "l" => match rest.to_ascii_lowercase().as_str() {
                "" | "toggle" => Ok(Self::Loop(LoopSetting::Toggle)),
                "on" => Ok(Self::Loop(LoopSetting::On)),
                "off" => Ok(Self::Loop(LoopSetting::Off)),
                count => count
                    .parse()
                    .map(|n| Self::Loop(LoopSetting::Count(n)))
                    .map_err(|_| format!("expected on, off, toggle or a count, got '{count}'")),
            },
            "loop-start" => seconds(rest).map(Self::LoopStart),
            "loop-end" => seconds(rest).map(Self::LoopEnd),
            "loop-reset" => Ok(Self::LoopReset),
            "load" if !rest.is_empty() => Ok(Self::Load(PathBuf::from(rest))),
            "load" => Err("expected a path".to_string()),
            "" | "status" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            "quit" | "q" | "exit" => Ok(Self::Quit),
            other => Err(format!("unknown command '{other}' (try 'help')")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run one command. Engine failures are printed, not returned.
pub fn execute(engine: &AudioEngine, command: &Command, out: &mut impl Write) -> Result<Flow> {
    let outcome = match command {
        Command::Play => engine.play(),
        Command::Pause => {
            engine.pause();
            Ok(())
        }
        Command::Resume => {
            engine.resume();
            Ok(())
        }
        Command::Stop => {
            engine.stop();
            Ok(())
        }
        Command::Seek(seconds) => engine.seek(*seconds),
        Command::Nudge(delta) => engine.seek((engine.position_seconds() + delta).max(0.0)),
        Command::Loop(setting) => {
            match setting {
                LoopSetting::On => engine.set_loop(true),
                LoopSetting::Off => engine.set_loop(false),
                LoopSetting::Toggle => engine.set_loop(!engine.is_looping()),
                LoopSetting::Count(count) => engine.set_loop_count(*count),
            }
            Ok(())
        }
        Command::LoopStart(seconds) => engine.set_loop_start(*seconds),
        Command::LoopEnd(seconds) => engine.set_loop_region(engine.loop_start_seconds(), *seconds),
        Command::LoopReset => {
            engine.reset_loop_region();
            Ok(())
        }
        Command::Load(path) => engine.load(path),
        Command::Status => Ok(()),
        Command::Help => {
            writeln!(out, "{HELP}")?;
            Ok(())
        }
        Command::Quit => return Ok(Flow::Quit),
    };

    match outcome {
        Err(e) if e.is_decode_error() => writeln!(out, "error: {e} (current track kept)")?,
        Err(e) => writeln!(out, "error: {e}")?,
        Ok(()) => {}
    }
    Ok(Flow::Continue)
}

pub fn status_line(engine: &AudioEngine) -> String {
    let looping = engine.is_looping();
    let label = match engine.state() {
        TransportState::Playing if looping => "Playing (Looping)",
        TransportState::Playing => "Playing",
        TransportState::Paused => "Paused",
        TransportState::Stopped if looping => "Loop Ready",
        TransportState::Stopped => "Stopped",
    };
    format!(
        "Status: {label}  Position: {:.2} / {:.2} sec",
        engine.position_seconds(),
        engine.duration_seconds()
    )
}

fn describe(event: &EngineEvent) -> String {
    match event {
        EngineEvent::StateChanged(state) => format!("state: {state}"),
        EngineEvent::TrackLoaded { duration } => format!("loaded {duration:.2} sec"),
        EngineEvent::Looped(count) => format!("looped ({count})"),
        EngineEvent::PlaybackFinished => "finished".to_string(),
        EngineEvent::Error(message) => format!("output error: {message}"),
    }
}

fn print_events(engine: &AudioEngine, out: &mut impl Write) -> Result<()> {
    while let Some(event) = engine.try_recv_event() {
        writeln!(out, "  {}", describe(&event))?;
    }
    Ok(())
}

/// Read commands until `quit` or end of input.
pub fn run(engine: &AudioEngine, input: impl BufRead, mut out: impl Write) -> Result<()> {
    writeln!(out, "Type 'help' for commands.")?;
    print_events(engine, &mut out)?;
    writeln!(out, "{}", status_line(engine))?;
    write!(out, "> ")?;
    out.flush()?;

    for line in input.lines() {
        let line = line?;
        match line.parse::<Command>() {
            Ok(command) => {
                if execute(engine, &command, &mut out)? == Flow::Quit {
                    break;
                }
            }
            Err(message) => writeln!(out, "error: {message}")?,
        }
        print_events(engine, &mut out)?;
        writeln!(out, "{}", status_line(engine))?;
        write!(out, "> ")?;
        out.flush()?;
    }

    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::float_cmp)]

    use super::*;
    use sizzle_audio::{EngineConfig, HeadlessBackend};
    use std::io::Cursor;
    use std::sync::Arc;

    fn engine() -> (AudioEngine, HeadlessBackend) {
        let backend = HeadlessBackend::new();
        let engine = AudioEngine::with_backend(Arc::new(backend.clone()), EngineConfig::default());
        engine.load_samples(vec![0.0; 800], 1, 100).unwrap();
        (engine, backend)
    }

    fn script(engine: &AudioEngine, lines: &str) -> String {
        let mut out = Vec::new();
        run(engine, Cursor::new(lines), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!("seek 1.5".parse::<Command>(), Ok(Command::Seek(1.5)));
        assert_eq!("  PLAY ".parse::<Command>(), Ok(Command::Play));
        assert_eq!("+".parse::<Command>(), Ok(Command::Nudge(0.5)));
        assert_eq!(
            "loop 3".parse::<Command>(),
            Ok(Command::Loop(LoopSetting::Count(3)))
        );
        assert_eq!(
            "loop".parse::<Command>(),
            Ok(Command::Loop(LoopSetting::Toggle))
        );
        assert_eq!(
            "load my song.wav".parse::<Command>(),
            Ok(Command::Load(PathBuf::from("my song.wav")))
        );
        assert_eq!("".parse::<Command>(), Ok(Command::Status));
        assert_eq!("loop-end 2.5".parse::<Command>(), Ok(Command::LoopEnd(2.5)));
        assert_eq!("loop-reset".parse::<Command>(), Ok(Command::LoopReset));

        assert!("seek".parse::<Command>().is_err());
        assert!("seek inf".parse::<Command>().is_err());
        assert!("loop sometimes".parse::<Command>().is_err());
        assert!("load".parse::<Command>().is_err());
        assert!("loop-end".parse::<Command>().is_err());
        assert!("rewind".parse::<Command>().is_err());
    }

    #[test]
    fn test_status_labels() {
        let (engine, _backend) = engine();
        assert_eq!(status_line(&engine), "Status: Stopped  Position: 0.00 / 8.00 sec");

        engine.set_loop(true);
        assert!(status_line(&engine).starts_with("Status: Loop Ready"));

        engine.play().unwrap();
        assert!(status_line(&engine).starts_with("Status: Playing (Looping)"));

        engine.set_loop(false);
        assert!(status_line(&engine).starts_with("Status: Playing "));

        engine.pause();
        assert!(status_line(&engine).starts_with("Status: Paused"));
    }

    #[test]
    fn test_nudge_clamps_at_zero() {
        let (engine, _backend) = engine();
        let mut out = Vec::new();
        execute(&engine, &Command::Seek(0.25), &mut out).unwrap();
        execute(&engine, &Command::Nudge(-0.5), &mut out).unwrap();
        assert!(engine.position_seconds().abs() < f64::EPSILON);

        execute(&engine, &Command::Nudge(0.5), &mut out).unwrap();
        execute(&engine, &Command::Nudge(0.5), &mut out).unwrap();
        assert!((engine.position_seconds() - 1.0).abs() < f64::EPSILON);
        assert!(out.is_empty());
    }

    #[test]
    fn test_loop_end_keeps_loop_start() {
        let (engine, _backend) = engine();
        script(&engine, "loop on\nloop-start 1\nloop-end 3\n");
        assert_eq!(engine.loop_start_seconds(), 1.0);
        assert_eq!(engine.loop_end_seconds(), 3.0);

        // An end before the start restarts the loop from 0.
        script(&engine, "loop-end 0.5\n");
        assert_eq!(engine.loop_start_seconds(), 0.0);
        assert_eq!(engine.loop_end_seconds(), 0.5);

        script(&engine, "loop-reset\n");
        assert_eq!(engine.loop_end_seconds(), 8.0);
    }

    #[test]
    fn test_script_session() {
        let (engine, backend) = engine();
        let output = script(&engine, "play\nseek 2\nloop 2\npause\nquit\nplay\n");

        assert!(output.contains("state: Playing"));
        assert!(output.contains("Status: Paused  Position: 2.00 / 8.00 sec"));
        assert_eq!(engine.state(), TransportState::Paused);
        assert_eq!(engine.loop_count(), 2);
        assert!(backend.is_running());
    }

    #[test]
    fn test_errors_are_reported() {
        let backend = HeadlessBackend::new();
        let engine = AudioEngine::with_backend(Arc::new(backend), EngineConfig::default());
        let output = script(&engine, "play\nbogus\nload /nonexistent/file.wav\n");

        assert!(output.contains("error: No decoded audio loaded"));
        assert!(output.contains("error: unknown command 'bogus'"));
        assert!(output.contains("error: IO error"));
        assert!(output.contains("(current track kept)"));
        assert!(!output.contains("No decoded audio loaded (current track kept)"));
        assert_eq!(engine.state(), TransportState::Stopped);
    }
}
