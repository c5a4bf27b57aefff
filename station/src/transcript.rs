use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// Direction of a transcribed wire line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptRole {
    Host,
    Controller,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Controller => "CTRL<",
        }
    }
}

/// Append-only record of serial traffic.
pub struct TranscriptLogger<W: Write = BufWriter<File>> {
    writer: W,
}

impl TranscriptLogger {
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Self::with_writer(BufWriter::new(file))
    }
}

impl<W: Write> TranscriptLogger<W> {
    pub fn with_writer(writer: W) -> io::Result<Self> {
        let mut logger = Self { writer };
        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Vision station serial transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    /// Writes one line; the wire terminator is dropped.
    pub fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line.trim_end_matches(['\r', '\n'])
        )?;
        self.writer.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}
