//! Line framing for the serial byte stream
//!
//! Serial reads arrive in arbitrary chunks. [`LineAssembler`] accumulates
//! bytes and yields complete lines on `\n`, stripping a trailing `\r`.
//! A line that grows past the capacity is discarded up to the next newline
//! so a noisy link cannot grow the buffer without bound.

/// Default maximum line length in bytes (excluding the newline)
pub const MAX_LINE_LEN: usize = 128;

/// Accumulates bytes into newline-terminated lines
#[derive(Debug)]
pub struct LineAssembler {
    buf: Vec<u8>,
    capacity: usize,
    discarding: bool,
    dropped: u64,
}

impl LineAssembler {
    /// Create an assembler with [`MAX_LINE_LEN`] capacity
    pub fn new() -> Self {
        Self::with_capacity(MAX_LINE_LEN)
    }

    /// Create an assembler with a custom line capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
            discarding: false,
            dropped: 0,
        }
    }

    /// Feed raw bytes, returning every line completed by them
    ///
    /// Empty lines are skipped. Invalid UTF-8 is replaced lossily.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &b in bytes {
            if b == b'\n' {
                if self.discarding {
                    self.discarding = false;
                } else if let Some(line) = self.take_line() {
                    lines.push(line);
                }
                self.buf.clear();
                continue;
            }

            if self.discarding {
                continue;
            }

            if self.buf.len() >= self.capacity {
                log::warn!(
                    "Dropping over-long line ({} bytes without newline)",
                    self.buf.len()
                );
                self.buf.clear();
                self.discarding = true;
                self.dropped += 1;
                continue;
            }

            self.buf.push(b);
        }

        lines
    }

    /// Bytes buffered for the current partial line
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Number of over-long lines discarded so far
    pub fn dropped_lines(&self) -> u64 {
        self.dropped
    }

    /// Discard any partial line
    pub fn clear(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }

    fn take_line(&mut self) -> Option<String> {
        let mut end = self.buf.len();
        if end > 0 && self.buf[end - 1] == b'\r' {
            end -= 1;
        }
        if end == 0 {
            return None;
        }
        Some(String::from_utf8_lossy(&self.buf[..end]).into_owned())
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}
