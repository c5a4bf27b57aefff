//! Transport seam between the supervisor and the controller's serial port.
//!
//! Hosts implement [`LineLink`] over a real port. [`DetachedLink`] stands in
//! when no port could be opened, and [`MemoryLink`] records traffic in
//! fixed-capacity buffers for tests and dry runs.

use core::fmt;

use heapless::{Deque, String, Vec};

use crate::protocol::MAX_LINE_LEN;

/// Transport failures. None of them stop the supervisor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkError {
    /// No port is attached.
    Detached,
    /// The port rejected or failed a write.
    Write,
    /// The port failed while reading.
    Read,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Detached => f.write_str("serial link is not attached"),
            LinkError::Write => f.write_str("serial write failed"),
            LinkError::Read => f.write_str("serial read failed"),
        }
    }
}

/// Byte-stream link to the controller.
pub trait LineLink {
    /// Returns `false` while running in degraded mode.
    fn is_attached(&self) -> bool;

    /// Writes one encoded line, terminator included.
    fn write_line(&mut self, line: &str) -> Result<(), LinkError>;

    /// Copies whatever bytes are already available into `buffer`.
    ///
    /// Must not block; returns `Ok(0)` when the link is silent.
    fn read_available(&mut self, buffer: &mut [u8]) -> Result<usize, LinkError>;

    /// Called with every complete line framed from incoming bytes.
    fn line_received(&mut self, _line: &str) {}
}

/// Link used when the port is absent: writes vanish, reads stay empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct DetachedLink;

impl LineLink for DetachedLink {
    fn is_attached(&self) -> bool {
        false
    }

    fn write_line(&mut self, _line: &str) -> Result<(), LinkError> {
        Ok(())
    }

    fn read_available(&mut self, _buffer: &mut [u8]) -> Result<usize, LinkError> {
        Ok(0)
    }
}

/// In-memory link with bounded outbound history and inbound queue.
#[derive(Debug)]
pub struct MemoryLink<const LINES: usize = 32, const INBOUND: usize = 256> {
    attached: bool,
    fail_writes: bool,
    sent: Vec<String<MAX_LINE_LEN>, LINES>,
    inbound: Deque<u8, INBOUND>,
    received: usize,
}

impl<const LINES: usize, const INBOUND: usize> MemoryLink<LINES, INBOUND> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attached: true,
            fail_writes: false,
            sent: Vec::new(),
            inbound: Deque::new(),
            received: 0,
        }
    }

    pub fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    /// Makes every subsequent write fail with [`LinkError::Write`].
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Queues bytes for the next reads; returns how many fit.
    pub fn inject(&mut self, bytes: &[u8]) -> usize {
        let mut accepted = 0;
        for &byte in bytes {
            if self.inbound.push_back(byte).is_err() {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Lines written so far, terminators included.
    #[must_use]
    pub fn sent(&self) -> &[String<MAX_LINE_LEN>] {
        &self.sent
    }

    /// Returns and forgets the lines written so far.
    pub fn take_sent(&mut self) -> Vec<String<MAX_LINE_LEN>, LINES> {
        core::mem::take(&mut self.sent)
    }

    /// Number of complete lines handed back through [`LineLink::line_received`].
    #[must_use]
    pub const fn received_lines(&self) -> usize {
        self.received
    }
}

impl<const LINES: usize, const INBOUND: usize> Default for MemoryLink<LINES, INBOUND> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const LINES: usize, const INBOUND: usize> LineLink for MemoryLink<LINES, INBOUND> {
    fn is_attached(&self) -> bool {
        self.attached
    }

    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        if !self.attached {
            return Err(LinkError::Detached);
        }
        if self.fail_writes {
            return Err(LinkError::Write);
        }

        let mut stored = String::new();
        stored.push_str(line).map_err(|_| LinkError::Write)?;
        self.sent.push(stored).map_err(|_| LinkError::Write)
    }

    fn read_available(&mut self, buffer: &mut [u8]) -> Result<usize, LinkError> {
        if !self.attached {
            return Ok(0);
        }

        let mut count = 0;
        while count < buffer.len() {
            match self.inbound.pop_front() {
                Some(byte) => {
                    buffer[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    fn line_received(&mut self, _line: &str) {
        self.received += 1;
    }
}
