mod config;
mod error;
mod frames;
mod link;
mod session;
mod transcript;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use machine_core::link::LineLink;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Overrides, StationConfig};
use error::StationError;
use frames::FrameSource;
use link::SerialLink;
use session::{HostInstant, Station};
use transcript::TranscriptLogger;

#[derive(Debug, Parser)]
#[command(name = "vision-station")]
#[command(about = "Watches two camera zones and drives the solenoid controller over serial")]
#[command(version)]
struct Args {
    /// INI configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Serial port of the controller
    #[arg(long)]
    port: Option<String>,

    #[arg(long)]
    baud: Option<u32>,

    /// Still image or directory of images to classify
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Sampling period in milliseconds
    #[arg(long)]
    sample_ms: Option<u64>,

    /// Serial polling period in milliseconds
    #[arg(long)]
    serial_ms: Option<u64>,

    /// Write every wire line to this file
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Log filter (error, warn, info, debug, trace); defaults to RUST_LOG or info
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port.clone(),
            baud: self.baud,
            frames: self.frames.clone(),
            sample_ms: self.sample_ms,
            serial_ms: self.serial_ms,
        }
    }
}

fn main() -> Result<(), StationError> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let config = StationConfig::resolve(args.config.as_deref(), &args.overrides())?;
    let classifier = config.classifier()?;
    let frames = FrameSource::open(config.frames_path()?)?;
    info!(frames = frames.len(), "frame source ready");
    if let Some(actual) = frames.dimensions().filter(|dims| *dims != config.camera.dimensions) {
        warn!(
            %actual,
            expected = %config.camera.dimensions,
            "frame size differs from the configured camera; frames will be skipped"
        );
    }

    let transcript = args
        .transcript
        .as_deref()
        .map(|path| {
            TranscriptLogger::create(path).map_err(|source| StationError::Transcript {
                path: path.to_path_buf(),
                source,
            })
        })
        .transpose()?;

    let link = SerialLink::open(&config.serial, transcript);
    let mut station = Station::new(classifier, link, frames);
    run(&mut station, &config, &spawn_console())
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Forwards stdin lines to the main loop; the channel closes on EOF.
fn spawn_console() -> Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

fn run(
    station: &mut Station<SerialLink>,
    config: &StationConfig,
    console: &Receiver<String>,
) -> Result<(), StationError> {
    let stdout = io::stdout();
    let mut writer = stdout.lock();

    writeln!(
        writer,
        "Vision station ready (link {}). Type `help` for commands or `exit` to quit.",
        if station.supervisor().link().is_attached() {
            "attached"
        } else {
            "detached"
        }
    )?;
    prompt(&mut writer)?;

    let mut next_sample = Instant::now();
    let mut next_serial = Instant::now();

    loop {
        let now = Instant::now();
        if now >= next_sample {
            station.sample(HostInstant::now());
            next_sample = advance(next_sample, config.timing.sample, now);
        }
        if now >= next_serial {
            station.poll_serial(HostInstant::now());
            next_serial = advance(next_serial, config.timing.serial, now);
        }
        station.drain_telemetry();

        let wait = next_sample
            .min(next_serial)
            .saturating_duration_since(Instant::now());
        match console.recv_timeout(wait) {
            Ok(line) => {
                let trimmed = line.trim();
                if should_terminate(trimmed) {
                    writeln!(writer, "Session closed.")?;
                    break;
                }
                for response in station.handle_command(trimmed, HostInstant::now()) {
                    writeln!(writer, "{response}")?;
                }
                station.drain_telemetry();
                prompt(&mut writer)?;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                writeln!(writer)?;
                break;
            }
        }
    }

    Ok(())
}

/// Next deadline on a fixed grid; a late tick is not replayed.
fn advance(deadline: Instant, period: Duration, now: Instant) -> Instant {
    let next = deadline + period;
    if next <= now { now + period } else { next }
}

fn prompt(writer: &mut impl Write) -> io::Result<()> {
    write!(writer, "> ")?;
    writer.flush()
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_ticks_are_not_replayed() {
        let start = Instant::now();
        let period = Duration::from_millis(30);
        assert_eq!(advance(start, period, start), start + period);

        let late = start + Duration::from_millis(95);
        assert_eq!(advance(start, period, late), late + period);
    }

    #[test]
    fn exit_words_ignore_case() {
        assert!(should_terminate("EXIT"));
        assert!(should_terminate("quit"));
        assert!(!should_terminate("stop"));
    }

    #[test]
    fn cli_flags_become_overrides() {
        let args = Args::parse_from([
            "vision-station",
            "--port",
            "/dev/ttyUSB1",
            "--frames",
            "captures",
            "--serial-ms",
            "50",
        ]);
        let overrides = args.overrides();
        assert_eq!(overrides.port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(overrides.frames, Some(PathBuf::from("captures")));
        assert_eq!(overrides.serial_ms, Some(50));
        assert_eq!(overrides.baud, None);
    }
}
