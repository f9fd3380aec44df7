//! Delivery session
//!
//! Owns the floor plan, the motion planner and the robot context, and turns
//! UI-level requests (deliver to these tables, drive to that cell) into a
//! background run. Only one run is active at a time; a second request while
//! one is running is refused rather than interleaved.
//!
//! A monitor thread follows link telemetry for the whole session and
//! republishes it as [`SessionEvent`]s alongside the run's own progress.

use crate::context::SharedContext;
use crate::error::{NavError, Result};
use crate::link::{LinkEvent, LinkTransport};
use crate::motion::{ExecutionOutcome, MotionPlanner, Pacer};
use crate::planning::{Cell, FloorPlan, GridPathfinder, Route};
use crate::pose::Pose;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use dakiya_wire::{CompletionStatus, DeviceEvent, HostCommand};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MONITOR_POLL: Duration = Duration::from_millis(100);

/// Progress and telemetry reported to the UI
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    ObstacleDetected,
    ObstacleCleared,
    /// The firmware paused the current primitive for an obstacle
    MotionPaused,
    MotionResumed,
    MotionCompleted(CompletionStatus),
    /// The firmware refused a command
    DeviceBlocked(String),
    ArrivedAt { table: u8, cell: Cell },
    DeliveryFinished(Pose),
    DeliveryCancelled(Pose),
}

/// How a background run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Completed(Pose),
    Cancelled(Pose),
}

impl DeliveryOutcome {
    pub fn pose(&self) -> Pose {
        match *self {
            DeliveryOutcome::Completed(pose) | DeliveryOutcome::Cancelled(pose) => pose,
        }
    }
}

/// Handle to a background run
pub struct DeliveryHandle {
    thread: JoinHandle<DeliveryOutcome>,
}

impl DeliveryHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the run; `None` if its thread panicked
    pub fn join(self) -> Option<DeliveryOutcome> {
        self.thread.join().ok()
    }
}

/// Result of asking for a new run
pub enum DeliveryStart {
    Started(DeliveryHandle),
    /// Another run is active; nothing was planned or sent
    AlreadyRunning,
}

impl DeliveryStart {
    pub fn into_handle(self) -> Option<DeliveryHandle> {
        match self {
            DeliveryStart::Started(handle) => Some(handle),
            DeliveryStart::AlreadyRunning => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Time spent at each table after signalling arrival
    pub dwell: Duration,
    /// Send RESET when the firmware reports a blocked command
    pub reset_on_blocked: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            dwell: Duration::from_secs(3),
            reset_on_blocked: false,
        }
    }
}

/// Clears the running flag when the run thread exits, panics included
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Everything a run thread needs
#[derive(Clone)]
struct RunContext {
    ctx: SharedContext,
    planner: MotionPlanner,
    pacer: Arc<dyn Pacer>,
    cancel: Arc<AtomicBool>,
    events: Sender<SessionEvent>,
    dwell: Duration,
}

pub struct DeliverySession {
    plan: Arc<FloorPlan>,
    run: RunContext,
    running: Arc<AtomicBool>,
    events_rx: Receiver<SessionEvent>,
    monitor_shutdown: Arc<AtomicBool>,
    monitor: Option<JoinHandle<()>>,
}

impl DeliverySession {
    pub fn new(
        ctx: SharedContext,
        plan: FloorPlan,
        planner: MotionPlanner,
        pacer: Arc<dyn Pacer>,
        settings: SessionSettings,
    ) -> Result<Self> {
        let (events, events_rx) = crossbeam_channel::unbounded();
        let link = Arc::clone(ctx.lock().link());
        let telemetry = link.subscribe();

        let monitor_shutdown = Arc::new(AtomicBool::new(false));
        let monitor = {
            let events = events.clone();
            let shutdown = Arc::clone(&monitor_shutdown);
            let reset_on_blocked = settings.reset_on_blocked;
            thread::Builder::new()
                .name("session-monitor".to_string())
                .spawn(move || monitor_loop(telemetry, events, link, reset_on_blocked, shutdown))?
        };

        Ok(Self {
            plan: Arc::new(plan),
            run: RunContext {
                ctx,
                planner,
                pacer,
                cancel: Arc::new(AtomicBool::new(false)),
                events,
                dwell: settings.dwell,
            },
            running: Arc::new(AtomicBool::new(false)),
            events_rx,
            monitor_shutdown,
            monitor: Some(monitor),
        })
    }

    pub fn plan(&self) -> &FloorPlan {
        &self.plan
    }

    pub fn context(&self) -> &SharedContext {
        &self.run.ctx
    }

    /// Session events; clones share one queue
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Plan a route through `tables` and drive it in the background
    ///
    /// The whole route is planned before anything is sent, so an unknown
    /// or unreachable table fails here with no motion issued.
    pub fn start_delivery(&self, tables: &[u8]) -> Result<DeliveryStart> {
        self.start(|session| {
            let start = session.run.ctx.lock().pose().cell();
            let route = GridPathfinder::with_defaults(&session.plan).find_route(start, tables)?;
            info!(?tables, cells = route.cells.len(), "Delivery route planned");
            Ok(move |run: &RunContext| run.deliver(&route))
        })
    }

    /// Drive from the current pose to `goal` in the background
    pub fn drive_to(&self, goal: Cell) -> Result<DeliveryStart> {
        self.start(|session| {
            let start = session.run.ctx.lock().pose().cell();
            let path = GridPathfinder::with_defaults(&session.plan).find_path(start, goal)?;
            Ok(move |run: &RunContext| run.drive(&path))
        })
    }

    /// Drive a caller-supplied cell path in the background
    ///
    /// The path must start at the current pose cell and stay on traversable
    /// cells along grid axes; otherwise nothing is sent.
    pub fn drive_path(&self, path: Vec<Cell>) -> Result<DeliveryStart> {
        self.start(|session| {
            let start = session.run.ctx.lock().pose().cell();
            session.plan.check_path(start, &path)?;
            Ok(move |run: &RunContext| run.drive(&path))
        })
    }

    /// Stop the active run before its next segment
    pub fn cancel(&self) {
        if self.is_running() {
            info!("Cancelling run");
            self.run.cancel.store(true, Ordering::SeqCst);
        }
    }

    /// Tell a table its order was picked up
    pub fn confirm_received(&self, table: u8) -> Result<()> {
        if self.plan.table(table).is_none() {
            return Err(NavError::UnknownTable(table));
        }
        self.run.link().issue(&HostCommand::TableReceived(table));
        Ok(())
    }

    /// Force the firmware back to idle
    pub fn reset_device(&self) {
        self.run.link().issue(&HostCommand::Reset);
    }

    fn start<F, R>(&self, prepare: F) -> Result<DeliveryStart>
    where
        F: FnOnce(&Self) -> Result<R>,
        R: FnOnce(&RunContext) -> DeliveryOutcome + Send + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("A run is already active");
            return Ok(DeliveryStart::AlreadyRunning);
        }
        let guard = RunningGuard(Arc::clone(&self.running));

        let body = prepare(self)?;
        self.run.cancel.store(false, Ordering::SeqCst);
        let run = self.run.clone();
        let thread = thread::Builder::new()
            .name("delivery-run".to_string())
            .spawn(move || {
                let _guard = guard;
                let outcome = body(&run);
                let event = match outcome {
                    DeliveryOutcome::Completed(pose) => SessionEvent::DeliveryFinished(pose),
                    DeliveryOutcome::Cancelled(pose) => SessionEvent::DeliveryCancelled(pose),
                };
                let _ = run.events.send(event);
                outcome
            })?;
        Ok(DeliveryStart::Started(DeliveryHandle { thread }))
    }
}

impl Drop for DeliverySession {
    fn drop(&mut self) {
        self.run.cancel.store(true, Ordering::SeqCst);
        self.monitor_shutdown.store(true, Ordering::SeqCst);
        if let Some(monitor) = self.monitor.take() {
            if monitor.join().is_err() {
                error!("Session monitor panicked");
            }
        }
    }
}

impl RunContext {
    fn link(&self) -> Arc<LinkTransport> {
        Arc::clone(self.ctx.lock().link())
    }

    fn drive(&self, path: &[Cell]) -> DeliveryOutcome {
        match self.planner.execute_path(&self.ctx, path, &self.cancel, self.pacer.as_ref()) {
            ExecutionOutcome::Completed(pose) => DeliveryOutcome::Completed(pose),
            ExecutionOutcome::Cancelled(pose) => DeliveryOutcome::Cancelled(pose),
        }
    }

    fn deliver(&self, route: &Route) -> DeliveryOutcome {
        let legs = route.legs();
        for (leg, stop) in legs.iter().zip(&route.stops) {
            if let DeliveryOutcome::Cancelled(pose) = self.drive(leg) {
                return DeliveryOutcome::Cancelled(pose);
            }
            // A cancel during the leg's last wait skips the arrival and dwell
            if self.cancel.load(Ordering::SeqCst) {
                let pose = self.ctx.lock().pose();
                info!(%pose, table = stop.table, "Delivery cancelled before arrival");
                return DeliveryOutcome::Cancelled(pose);
            }
            self.link().issue(&HostCommand::TableArrived(stop.table));
            info!(table = stop.table, cell = %stop.approach, "Arrived at table");
            let _ = self.events.send(SessionEvent::ArrivedAt {
                table: stop.table,
                cell: stop.approach,
            });
            self.pacer.wait(self.dwell);
        }
        match legs.last() {
            Some(home) => self.drive(home),
            None => DeliveryOutcome::Completed(self.ctx.lock().pose()),
        }
    }
}

/// Republish link events and optionally reset the firmware on a blocked command
fn monitor_loop(
    telemetry: Receiver<LinkEvent>,
    events: Sender<SessionEvent>,
    link: Arc<LinkTransport>,
    reset_on_blocked: bool,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        let event = match telemetry.recv_timeout(MONITOR_POLL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let forwarded = match event {
            LinkEvent::Connected => Some(SessionEvent::Connected),
            LinkEvent::Disconnected => Some(SessionEvent::Disconnected),
            LinkEvent::Telemetry(device) => match device {
                DeviceEvent::ObstacleDetected => Some(SessionEvent::ObstacleDetected),
                DeviceEvent::ObstacleCleared => Some(SessionEvent::ObstacleCleared),
                DeviceEvent::MovementPaused => Some(SessionEvent::MotionPaused),
                DeviceEvent::MovementResumed => Some(SessionEvent::MotionResumed),
                DeviceEvent::MovementComplete(status) => {
                    Some(SessionEvent::MotionCompleted(status))
                }
                DeviceEvent::Blocked(reason) => {
                    if reset_on_blocked {
                        info!(%reason, "Resetting firmware after blocked command");
                        link.issue(&HostCommand::Reset);
                    }
                    Some(SessionEvent::DeviceBlocked(reason))
                }
                DeviceEvent::ReceivedEcho(line) => {
                    debug!(%line, "Firmware acknowledged");
                    None
                }
                DeviceEvent::Unknown(_) => None,
            },
        };

        if let Some(event) = forwarded {
            let _ = events.send(event);
        }
    }
    debug!("Session monitor exiting");
}
