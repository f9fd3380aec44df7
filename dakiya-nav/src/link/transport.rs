//! Link lifecycle and threaded I/O

use super::{Endpoint, LinkEvent, LinkPort, SerialLinkPort};
use crate::config::LinkConfig;
use crate::error::TransportError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use dakiya_wire::{DeviceEvent, HostCommand, LineAssembler};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

type SharedPort = Arc<Mutex<Box<dyn LinkPort>>>;

const READ_CHUNK: usize = 256;
/// Pause between reader polls so the writer can take the port
const READ_YIELD: Duration = Duration::from_millis(2);
const WRITER_POLL: Duration = Duration::from_millis(100);

/// State visible to the I/O threads
#[derive(Default)]
struct Shared {
    connected: AtomicBool,
    subscribers: Mutex<Vec<Sender<LinkEvent>>>,
}

impl Shared {
    fn broadcast(&self, event: LinkEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn mark_connected(&self, label: &str) {
        if !self.connected.swap(true, Ordering::SeqCst) {
            info!(link = label, "Link connected");
            self.broadcast(LinkEvent::Connected);
        }
    }

    fn mark_disconnected(&self, reason: &str) {
        if self.connected.swap(false, Ordering::SeqCst) {
            warn!(reason, "Link disconnected");
            self.broadcast(LinkEvent::Disconnected);
        }
    }
}

struct WriteRequest {
    line: String,
    ack: Sender<std::io::Result<()>>,
}

struct Connection {
    label: String,
    requests: Sender<WriteRequest>,
    shutdown: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Line-oriented link to the firmware
///
/// Sending never blocks longer than the write timeout and never fails just
/// because the link is down: commands issued while disconnected are
/// dropped with a warning.
pub struct LinkTransport {
    shared: Arc<Shared>,
    connection: Mutex<Option<Connection>>,
    endpoint: Mutex<Option<Endpoint>>,
    write_timeout: Duration,
}

impl LinkTransport {
    /// Transport with no connection yet
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            connection: Mutex::new(None),
            endpoint: Mutex::new(None),
            write_timeout,
        }
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        Self::new(Duration::from_millis(config.write_timeout_ms))
    }

    /// Open `endpoint` and start I/O, replacing any current connection
    pub fn open_at(&self, endpoint: Endpoint) -> Result<(), TransportError> {
        let port: Box<dyn LinkPort> = match &endpoint {
            Endpoint::Serial { path, baud_rate } => Box::new(
                SerialLinkPort::open(path, *baud_rate)
                    .map_err(|e| TransportError::Unavailable(format!("{}: {}", path, e)))?,
            ),
            #[cfg(feature = "sim")]
            Endpoint::Simulated(config) => Box::new(
                super::SimulatedLinkPort::spawn((**config).clone())
                    .map_err(|e| TransportError::Unavailable(format!("simulator: {}", e)))?,
            ),
        };
        let label = endpoint.to_string();
        *self.endpoint.lock() = Some(endpoint);
        self.attach(port, &label)
    }

    /// Start I/O on an already opened port
    pub fn attach(&self, port: Box<dyn LinkPort>, label: &str) -> Result<(), TransportError> {
        self.close();

        let port: SharedPort = Arc::new(Mutex::new(port));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (requests, request_rx) = crossbeam_channel::unbounded();

        let reader = {
            let port = Arc::clone(&port);
            let shared = Arc::clone(&self.shared);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("link-reader".to_string())
                .spawn(move || reader_loop(port, shared, shutdown))
                .map_err(|e| TransportError::Unavailable(format!("reader thread: {}", e)))?
        };
        let writer = {
            let shared = Arc::clone(&self.shared);
            let flag = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("link-writer".to_string())
                .spawn(move || writer_loop(port, request_rx, shared, flag))
        };
        let writer = match writer {
            Ok(handle) => handle,
            Err(e) => {
                shutdown.store(true, Ordering::SeqCst);
                let _ = reader.join();
                return Err(TransportError::Unavailable(format!("writer thread: {}", e)));
            }
        };

        *self.connection.lock() = Some(Connection {
            label: label.to_string(),
            requests,
            shutdown,
            reader,
            writer,
        });
        self.shared.mark_connected(label);
        Ok(())
    }

    /// Re-open the last endpoint given to [`open_at`](Self::open_at)
    pub fn reconnect(&self) -> Result<(), TransportError> {
        let endpoint = self
            .endpoint
            .lock()
            .clone()
            .ok_or_else(|| TransportError::Unavailable("no endpoint to reconnect to".to_string()))?;
        info!(link = %endpoint, "Reconnecting");
        self.open_at(endpoint)
    }

    /// Stop I/O threads and drop the port
    pub fn close(&self) {
        let Some(conn) = self.connection.lock().take() else {
            return;
        };
        conn.shutdown.store(true, Ordering::SeqCst);
        drop(conn.requests);
        for (name, handle) in [("reader", conn.reader), ("writer", conn.writer)] {
            if handle.join().is_err() {
                error!(thread = name, "Link thread panicked");
            }
        }
        self.shared.mark_disconnected("closed");
        debug!(link = %conn.label, "Link closed");
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Receive connection changes and decoded device lines
    pub fn subscribe(&self) -> Receiver<LinkEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Write one command line, waiting for the write to finish
    ///
    /// A write that outlasts the timeout is logged and treated as sent. A
    /// hard write failure marks the link disconnected and is returned.
    pub fn send(&self, line: &str) -> Result<(), TransportError> {
        let requests = {
            let conn = self.connection.lock();
            match conn.as_ref() {
                Some(conn) if self.is_connected() => conn.requests.clone(),
                _ => {
                    warn!(line, error = %TransportError::Disconnected, "Command dropped");
                    return Ok(());
                }
            }
        };

        let (ack, ack_rx) = crossbeam_channel::bounded(1);
        let request = WriteRequest {
            line: line.to_string(),
            ack,
        };
        if requests.send(request).is_err() {
            warn!(line, "Link writer gone, command dropped");
            return Ok(());
        }

        match ack_rx.recv_timeout(self.write_timeout) {
            Ok(Ok(())) => {
                debug!(line, "Sent");
                Ok(())
            }
            Ok(Err(e)) => Err(TransportError::WriteFailed(e.to_string())),
            Err(RecvTimeoutError::Timeout) => {
                let e = TransportError::SendTimeout(self.write_timeout);
                warn!(line, error = %e, "Write not confirmed, continuing");
                Ok(())
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!(line, "Link closed while sending");
                Ok(())
            }
        }
    }

    /// Encode and send a command, logging rather than returning link failures
    ///
    /// Returns whether the write went through. May block for up to the write
    /// timeout, so never call it with the robot context locked.
    pub fn issue(&self, command: &HostCommand) -> bool {
        match self.send(&command.encode()) {
            Ok(()) => true,
            Err(e) => {
                warn!(%command, error = %e, "Command not delivered");
                false
            }
        }
    }
}

impl Drop for LinkTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Frame incoming bytes into lines and broadcast them as telemetry
fn reader_loop(port: SharedPort, shared: Arc<Shared>, shutdown: Arc<AtomicBool>) {
    let mut assembler = LineAssembler::new();
    let mut buf = [0u8; READ_CHUNK];

    while !shutdown.load(Ordering::SeqCst) {
        let result = port.lock().read(&mut buf);
        match result {
            Ok(0) => {}
            Ok(n) => {
                for line in assembler.push(&buf[..n]) {
                    let event = DeviceEvent::decode(&line);
                    match &event {
                        DeviceEvent::Unknown(raw) => info!(line = %raw, "Device"),
                        DeviceEvent::Blocked(reason) => {
                            warn!(reason = %reason, "Device blocked command")
                        }
                        other => debug!(event = %other, "Telemetry"),
                    }
                    shared.broadcast(LinkEvent::Telemetry(event));
                }
            }
            Err(e) if matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ) => {}
            Err(e) => {
                shared.mark_disconnected(&e.to_string());
                break;
            }
        }
        thread::sleep(READ_YIELD);
    }
    debug!("Link reader exiting");
}

/// Serialize queued command lines onto the port
fn writer_loop(
    port: SharedPort,
    requests: Receiver<WriteRequest>,
    shared: Arc<Shared>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        let request = match requests.recv_timeout(WRITER_POLL) {
            Ok(request) => request,
            Err(RecvTimeoutError::Timeout) if shutdown.load(Ordering::SeqCst) => break,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let result = {
            let mut port = port.lock();
            let mut bytes = request.line.into_bytes();
            bytes.push(b'\n');
            port.write_all(&bytes).and_then(|()| port.flush())
        };
        let failed = result.is_err();
        if let Err(e) = &result {
            shared.mark_disconnected(&e.to_string());
        }
        // The sender may have stopped waiting
        let _ = request.ack.send(result);
        if failed {
            break;
        }
    }
    debug!("Link writer exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MockLinkPort;

    fn attached(mock: &MockLinkPort) -> LinkTransport {
        let link = LinkTransport::new(Duration::from_millis(200));
        link.attach(Box::new(mock.clone()), "mock").unwrap();
        link
    }

    fn next_telemetry(rx: &Receiver<LinkEvent>) -> Option<DeviceEvent> {
        loop {
            match rx.recv_timeout(Duration::from_secs(2)) {
                Ok(LinkEvent::Telemetry(event)) => return Some(event),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    #[test]
    fn test_send_appends_newline() {
        let mock = MockLinkPort::new();
        let link = attached(&mock);
        link.send("RESET").unwrap();
        link.send("TURN_ANGLE:90.0").unwrap();
        assert_eq!(
            mock.written_lines(),
            vec!["RESET".to_string(), "TURN_ANGLE:90.0".to_string()]
        );
    }

    #[test]
    fn test_telemetry_is_decoded_and_broadcast() {
        let mock = MockLinkPort::new();
        let link = attached(&mock);
        let rx = link.subscribe();
        mock.inject(b"MOVEMENT_COMP");
        mock.inject(b"LETE:SUCCESS\r\nOBSTACLE:DETECTED\n");
        assert_eq!(
            next_telemetry(&rx),
            Some(DeviceEvent::MovementComplete(
                dakiya_wire::CompletionStatus::Success
            ))
        );
        assert_eq!(next_telemetry(&rx), Some(DeviceEvent::ObstacleDetected));
    }

    #[test]
    fn test_send_while_disconnected_is_noop() {
        let link = LinkTransport::new(Duration::from_millis(200));
        assert!(!link.is_connected());
        assert_eq!(link.send("RESET"), Ok(()));
    }

    #[test]
    fn test_stalled_write_times_out_softly() {
        let mock = MockLinkPort::new();
        mock.stall_writes(Some(Duration::from_millis(600)));
        let link = attached(&mock);
        assert_eq!(link.send("RESET"), Ok(()));
        assert!(link.is_connected());
    }

    #[test]
    fn test_issue_reports_write_failures() {
        let mock = MockLinkPort::new();
        let link = attached(&mock);
        assert!(link.issue(&HostCommand::Reset));
        mock.fail_writes(true);
        assert!(!link.issue(&HostCommand::Stop));
        assert_eq!(mock.written_lines(), vec!["RESET".to_string()]);
    }

    #[test]
    fn test_write_failure_disconnects() {
        let mock = MockLinkPort::new();
        let link = attached(&mock);
        let rx = link.subscribe();
        mock.fail_writes(true);

        assert!(matches!(link.send("RESET"), Err(TransportError::WriteFailed(_))));
        assert!(!link.is_connected());
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)),
            Ok(LinkEvent::Disconnected)
        );
        // Further sends are accepted and dropped
        assert_eq!(link.send("STOP"), Ok(()));
    }

    #[test]
    fn test_read_error_disconnects_and_reattach_recovers() {
        let mock = MockLinkPort::new();
        let link = attached(&mock);
        let rx = link.subscribe();
        mock.disconnect();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)),
            Ok(LinkEvent::Disconnected)
        );

        let fresh = MockLinkPort::new();
        link.attach(Box::new(fresh.clone()), "mock").unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)),
            Ok(LinkEvent::Connected)
        );
        link.send("RESET").unwrap();
        assert_eq!(fresh.written_lines(), vec!["RESET".to_string()]);
    }

    #[test]
    fn test_reconnect_without_endpoint_fails() {
        let link = LinkTransport::new(Duration::from_millis(200));
        assert!(matches!(
            link.reconnect(),
            Err(TransportError::Unavailable(_))
        ));
    }
}
