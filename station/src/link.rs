//! Serial port adapter for the supervisor.

use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use machine_core::link::{LineLink, LinkError};
use serialport::SerialPort;
use tracing::{debug, info, warn};

use crate::config::SerialSettings;
use crate::transcript::{TranscriptLogger, TranscriptRole};

const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Controller link over a serial port, or nothing when the port is missing.
pub struct SerialLink {
    port: Option<Box<dyn SerialPort>>,
    transcript: Option<TranscriptLogger>,
    started_at: Instant,
}

impl SerialLink {
    /// Opens the port and waits for the controller to come out of reset.
    ///
    /// A port that cannot be opened leaves the link detached; the station
    /// keeps classifying and accepting commands without transmitting.
    pub fn open(settings: &SerialSettings, transcript: Option<TranscriptLogger>) -> Self {
        let port = match serialport::new(&settings.port, settings.baud)
            .timeout(READ_TIMEOUT)
            .open()
        {
            Ok(port) => {
                info!(port = %settings.port, baud = settings.baud, "serial port opened");
                if !settings.settle.is_zero() {
                    debug!(?settings.settle, "waiting for controller reset");
                    thread::sleep(settings.settle);
                }
                Some(port)
            }
            Err(error) => {
                warn!(
                    port = %settings.port,
                    %error,
                    "serial port unavailable; running without controller"
                );
                None
            }
        };

        Self {
            port,
            transcript,
            started_at: Instant::now(),
        }
    }

    /// Drops the port after a transfer error; the link stays detached from then on.
    fn disconnect(&mut self, action: &str, error: &io::Error) {
        if self.port.take().is_some() {
            warn!(%error, action, "serial link lost; running without controller");
        }
    }

    fn transcribe(&mut self, role: TranscriptRole, line: &str) {
        let Some(transcript) = self.transcript.as_mut() else {
            return;
        };
        if let Err(error) = transcript.append_line(self.started_at.elapsed(), role, line) {
            warn!(%error, "transcript write failed; transcript disabled");
            self.transcript = None;
        }
    }
}

impl LineLink for SerialLink {
    fn is_attached(&self) -> bool {
        self.port.is_some()
    }

    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::Detached)?;
        if let Err(error) = port.write_all(line.as_bytes()).and_then(|()| port.flush()) {
            self.disconnect("write", &error);
            return Err(LinkError::Write);
        }
        self.transcribe(TranscriptRole::Host, line);
        Ok(())
    }

    fn read_available(&mut self, buffer: &mut [u8]) -> Result<usize, LinkError> {
        let Some(port) = self.port.as_mut() else {
            return Ok(0);
        };

        let pending = match port.bytes_to_read() {
            Ok(pending) => pending,
            Err(error) => {
                self.disconnect("status query", &io::Error::from(error));
                return Err(LinkError::Read);
            }
        };
        if pending == 0 || buffer.is_empty() {
            return Ok(0);
        }

        let wanted = buffer.len().min(usize::try_from(pending).unwrap_or(usize::MAX));
        match port.read(&mut buffer[..wanted]) {
            Ok(count) => Ok(count),
            Err(error) if error.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(error) => {
                self.disconnect("read", &error);
                Err(LinkError::Read)
            }
        }
    }

    fn line_received(&mut self, line: &str) {
        self.transcribe(TranscriptRole::Controller, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_port_degrades_to_detached() {
        let settings = SerialSettings {
            port: "/dev/vision-station-no-such-port".into(),
            baud: 9600,
            settle: Duration::from_secs(5),
        };
        let mut link = SerialLink::open(&settings, None);
        assert!(!link.is_attached());
        assert_eq!(link.write_line("start\n"), Err(LinkError::Detached));

        let mut buffer = [0u8; 8];
        assert_eq!(link.read_available(&mut buffer), Ok(0));
    }
}
