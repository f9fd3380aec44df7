//! Scriptable in-memory link

use super::LinkPort;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct MockState {
    inbound: VecDeque<u8>,
    written: Vec<u8>,
    fail_writes: bool,
    write_delay: Option<Duration>,
    disconnected: bool,
}

/// Link port whose inbound bytes and write behavior are set by the caller
///
/// Clones share state, so a test keeps one handle after boxing another
/// into a [`LinkTransport`](super::LinkTransport).
#[derive(Clone, Default)]
pub struct MockLinkPort {
    state: Arc<Mutex<MockState>>,
}

impl MockLinkPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes for the reader
    pub fn inject(&self, bytes: &[u8]) {
        self.state.lock().inbound.extend(bytes.iter().copied());
    }

    /// Queue one device line for the reader
    pub fn inject_line(&self, line: &str) {
        self.inject(line.as_bytes());
        self.inject(b"\n");
    }

    /// Lines written so far, without terminators
    pub fn written_lines(&self) -> Vec<String> {
        let state = self.state.lock();
        String::from_utf8_lossy(&state.written)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Make every following write fail
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Delay every following write
    pub fn stall_writes(&self, delay: Option<Duration>) {
        self.state.lock().write_delay = delay;
    }

    /// Make the next read report a broken connection
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }
}

impl LinkPort for MockLinkPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock link closed"));
        }
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let delay = self.state.lock().write_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(io::Error::other("mock write failure"));
        }
        state.written.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_bytes_drain_in_order() {
        let mock = MockLinkPort::new();
        let mut port = mock.clone();
        mock.inject_line("READY");
        let mut buf = [0u8; 4];
        assert_eq!(port.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"READ");
        assert_eq!(port.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"Y\n");
        assert_eq!(port.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_written_lines_and_failures() {
        let mock = MockLinkPort::new();
        let mut port = mock.clone();
        port.write_all(b"RESET\n").unwrap();
        mock.fail_writes(true);
        assert!(port.write_all(b"STOP\n").is_err());
        assert_eq!(mock.written_lines(), vec!["RESET".to_string()]);

        mock.disconnect();
        let mut buf = [0u8; 8];
        assert!(port.read(&mut buf).is_err());
    }
}
