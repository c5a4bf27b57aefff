use core::fmt;

use heapless::{String, Vec};

use super::MAX_LINE_LEN;

/// Line assembly failures. The framer resynchronizes on the next terminator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FramingError {
    /// A line grew past the buffer before its terminator arrived.
    LineOverflow,
    /// A completed line was not valid UTF-8.
    InvalidUtf8,
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::LineOverflow => write!(f, "incoming line exceeds {MAX_LINE_LEN} bytes"),
            FramingError::InvalidUtf8 => f.write_str("incoming line is not valid UTF-8"),
        }
    }
}

/// Accumulates bytes until `\r` or `\n` and yields whole lines.
///
/// Partial lines stay buffered across calls, so a line split over several
/// reads is delivered once its terminator shows up. Empty lines (including
/// the gap inside `\r\n`) are skipped.
#[derive(Clone, Debug, Default)]
pub struct LineFramer<const N: usize = MAX_LINE_LEN> {
    buffer: Vec<u8, N>,
    discarding: bool,
}

impl<const N: usize> LineFramer<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Feeds one byte; returns a line when `byte` terminates one.
    pub fn push(&mut self, byte: u8) -> Result<Option<String<N>>, FramingError> {
        match byte {
            b'\r' | b'\n' => {
                if self.discarding {
                    self.discarding = false;
                    self.buffer.clear();
                    return Ok(None);
                }
                if self.buffer.is_empty() {
                    return Ok(None);
                }

                let bytes = core::mem::take(&mut self.buffer);
                String::from_utf8(bytes)
                    .map(Some)
                    .map_err(|_| FramingError::InvalidUtf8)
            }
            value => {
                if self.discarding {
                    return Ok(None);
                }
                if self.buffer.push(value).is_err() {
                    self.buffer.clear();
                    self.discarding = true;
                    return Err(FramingError::LineOverflow);
                }
                Ok(None)
            }
        }
    }

    /// Bytes buffered for the line in progress.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }
}
