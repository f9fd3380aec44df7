//! Delivery runs over a mock link

use crossbeam_channel::{Receiver, Sender};
use dakiya_nav::link::MockLinkPort;
use dakiya_nav::motion::{Pacer, RecordingPacer};
use dakiya_nav::session::DeliveryOutcome;
use dakiya_nav::{
    Cell, DeliverySession, DeliveryStart, FloorPlan, GridPathfinder, Heading, LinkTransport,
    MotionPlanner, NavError, PlanError, Pose, RobotContext, SessionEvent, SessionSettings,
};
use dakiya_wire::{CompletionStatus, MotionCalibration};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn floor() -> FloorPlan {
    let mut plan = FloorPlan::new(5, 6, Cell::new(2, 4), Heading::North).unwrap();
    plan.place_table(1, Cell::new(0, 0)).unwrap();
    plan.place_table(2, Cell::new(4, 0)).unwrap();
    plan.place_table(3, Cell::new(0, 2)).unwrap();
    plan.place_table(4, Cell::new(4, 2)).unwrap();
    plan
}

fn session_with(
    plan: FloorPlan,
    pacer: Arc<dyn Pacer>,
    reset_on_blocked: bool,
) -> (DeliverySession, MockLinkPort) {
    let mock = MockLinkPort::new();
    let link = Arc::new(LinkTransport::new(Duration::from_millis(500)));
    link.attach(Box::new(mock.clone()), "mock").unwrap();
    let home = Pose::at(plan.origin(), plan.facing());
    let ctx = RobotContext::new(home, MotionCalibration::default(), link).into_shared();
    let settings = SessionSettings {
        dwell: Duration::ZERO,
        reset_on_blocked,
    };
    let session = DeliverySession::new(
        ctx,
        plan,
        MotionPlanner::new(24.0, Duration::from_millis(100)),
        pacer,
        settings,
    )
    .unwrap();
    (session, mock)
}

/// Blocks every wait until the test drops the sender
struct GatePacer {
    gate: Receiver<()>,
}

impl GatePacer {
    fn new() -> (Arc<Self>, Sender<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Arc::new(Self { gate: rx }), tx)
    }
}

impl Pacer for GatePacer {
    fn wait(&self, _duration: Duration) {
        let _ = self.gate.recv_timeout(Duration::from_secs(10));
    }
}

/// Holds the n-th wait open until the test releases it
struct HoldPacer {
    hold_at: usize,
    waits: AtomicUsize,
    reached: Sender<()>,
    release: Receiver<()>,
}

impl HoldPacer {
    fn new(hold_at: usize) -> (Arc<Self>, Receiver<()>, Sender<()>) {
        let (reached, reached_rx) = crossbeam_channel::unbounded();
        let (release_tx, release) = crossbeam_channel::unbounded();
        let pacer = Arc::new(Self {
            hold_at,
            waits: AtomicUsize::new(0),
            reached,
            release,
        });
        (pacer, reached_rx, release_tx)
    }

    fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

impl Pacer for HoldPacer {
    fn wait(&self, _duration: Duration) {
        let n = self.waits.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.hold_at {
            let _ = self.reached.send(());
            let _ = self.release.recv_timeout(Duration::from_secs(5));
        }
    }
}

fn wait_for_event(events: &Receiver<SessionEvent>, wanted: &SessionEvent) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if let Ok(event) = events.recv_timeout(Duration::from_millis(50)) {
            if &event == wanted {
                return true;
            }
        }
    }
    false
}

fn moved_cells(lines: &[String]) -> usize {
    lines
        .iter()
        .filter_map(|l| l.strip_prefix("MOVE_DISTANCE:"))
        .map(|d| (d.parse::<f32>().unwrap() / 24.0).round() as usize)
        .sum()
}

#[test]
fn delivery_visits_tables_in_order_and_returns_home() {
    let plan = floor();
    let expected = GridPathfinder::with_defaults(&plan)
        .find_route(plan.origin(), &[2, 4, 1])
        .unwrap();
    let pacer = Arc::new(RecordingPacer::new());
    let (session, mock) = session_with(plan, pacer.clone(), false);
    let events = session.events();

    let handle = match session.start_delivery(&[2, 4, 1]).unwrap() {
        DeliveryStart::Started(handle) => handle,
        DeliveryStart::AlreadyRunning => panic!("nothing else was running"),
    };
    let outcome = handle.join().unwrap();

    let home = outcome.pose();
    assert_eq!(home.cell(), Cell::new(2, 4));
    assert!(matches!(outcome, DeliveryOutcome::Completed(_)));
    assert!(!session.is_running());

    let lines = mock.written_lines();
    let arrivals: Vec<&str> = lines
        .iter()
        .filter(|l| l.ends_with("_ARRIVED"))
        .map(String::as_str)
        .collect();
    assert_eq!(arrivals, vec!["TABLE2_ARRIVED", "TABLE4_ARRIVED", "TABLE1_ARRIVED"]);
    assert_eq!(moved_cells(&lines), expected.cells.len() - 1);

    let mut arrived_at = Vec::new();
    let mut finished = false;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::ArrivedAt { table, cell } => arrived_at.push((table, cell)),
            SessionEvent::DeliveryFinished(pose) => {
                finished = true;
                assert_eq!(pose, home);
            }
            _ => {}
        }
    }
    let expected_stops: Vec<(u8, Cell)> =
        expected.stops.iter().map(|s| (s.table, s.approach)).collect();
    assert_eq!(arrived_at, expected_stops);
    assert!(finished);
}

#[test]
fn unreachable_table_sends_nothing() {
    let mut plan = floor();
    plan.block(Cell::new(1, 0)).unwrap();
    plan.block(Cell::new(0, 1)).unwrap();
    let (session, mock) = session_with(plan, Arc::new(RecordingPacer::new()), false);

    match session.start_delivery(&[2, 1]) {
        Err(NavError::UnreachableTarget { table, .. }) => assert_eq!(table, 1),
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("route through a walled-off table was accepted"),
    }
    assert!(!session.is_running());
    std::thread::sleep(Duration::from_millis(50));
    assert!(mock.written_lines().is_empty());
}

#[test]
fn second_request_while_running_is_refused() {
    let (pacer, gate) = GatePacer::new();
    let (session, _mock) = session_with(floor(), pacer, false);

    let first = session.start_delivery(&[3]).unwrap();
    assert!(session.is_running());
    assert!(matches!(
        session.start_delivery(&[4]).unwrap(),
        DeliveryStart::AlreadyRunning
    ));
    assert!(matches!(
        session.drive_to(Cell::new(2, 3)).unwrap(),
        DeliveryStart::AlreadyRunning
    ));

    drop(gate);
    let outcome = first.into_handle().unwrap().join().unwrap();
    assert!(matches!(outcome, DeliveryOutcome::Completed(_)));
    assert!(!session.is_running());

    // The guard is released, so a new run starts
    let next = session.drive_to(Cell::new(2, 3)).unwrap();
    assert!(next.into_handle().unwrap().join().is_some());
}

#[test]
fn cancel_ends_run_without_arrivals() {
    let (pacer, gate) = GatePacer::new();
    let (session, mock) = session_with(floor(), pacer, false);
    let events = session.events();

    let handle = session.start_delivery(&[1, 2]).unwrap().into_handle().unwrap();
    session.cancel();
    drop(gate);

    let outcome = handle.join().unwrap();
    assert!(matches!(outcome, DeliveryOutcome::Cancelled(_)));
    assert!(
        mock.written_lines()
            .iter()
            .all(|l| !l.ends_with("_ARRIVED"))
    );
    assert!(wait_for_event(
        &events,
        &SessionEvent::DeliveryCancelled(outcome.pose())
    ));
}

#[test]
fn drive_to_single_cell() {
    let (session, mock) = session_with(floor(), Arc::new(RecordingPacer::new()), false);
    let outcome = session
        .drive_to(Cell::new(2, 3))
        .unwrap()
        .into_handle()
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(
        outcome,
        DeliveryOutcome::Completed(Pose::new(2, 3, Heading::North))
    );
    assert_eq!(mock.written_lines(), vec!["MOVE_DISTANCE:24.00".to_string()]);
}

#[test]
fn confirm_received_checks_table() {
    let (session, mock) = session_with(floor(), Arc::new(RecordingPacer::new()), false);
    session.confirm_received(2).unwrap();
    assert!(matches!(
        session.confirm_received(9),
        Err(NavError::UnknownTable(9))
    ));
    assert_eq!(mock.written_lines(), vec!["TABLE2_RECEIVED".to_string()]);
}

#[test]
fn telemetry_is_republished() {
    let (session, mock) = session_with(floor(), Arc::new(RecordingPacer::new()), false);
    let events = session.events();

    mock.inject_line("OBSTACLE:DETECTED");
    mock.inject_line("MOVEMENT_PAUSED:OBSTACLE");
    mock.inject_line("MOVEMENT_RESUMED");
    mock.inject_line("MOVEMENT_COMPLETE:SUCCESS");

    assert!(wait_for_event(&events, &SessionEvent::ObstacleDetected));
    assert!(wait_for_event(&events, &SessionEvent::MotionPaused));
    assert!(wait_for_event(&events, &SessionEvent::MotionResumed));
    assert!(wait_for_event(
        &events,
        &SessionEvent::MotionCompleted(CompletionStatus::Success)
    ));
}

#[test]
fn blocked_command_triggers_reset_when_enabled() {
    let (session, mock) = session_with(floor(), Arc::new(RecordingPacer::new()), true);
    let events = session.events();

    mock.inject_line("BLOCKED:BUSY_MOVING");
    assert!(wait_for_event(
        &events,
        &SessionEvent::DeviceBlocked("BUSY_MOVING".to_string())
    ));
    assert_eq!(mock.written_lines(), vec!["RESET".to_string()]);
}

#[test]
fn blocked_command_is_only_reported_by_default() {
    let (session, mock) = session_with(floor(), Arc::new(RecordingPacer::new()), false);
    let events = session.events();

    mock.inject_line("BLOCKED:BUSY_TURNING");
    assert!(wait_for_event(
        &events,
        &SessionEvent::DeviceBlocked("BUSY_TURNING".to_string())
    ));
    assert!(mock.written_lines().is_empty());
}

#[test]
fn cancel_during_last_wait_of_leg_skips_arrival() {
    let plan = floor();
    let route = GridPathfinder::with_defaults(&plan)
        .find_route(plan.origin(), &[2])
        .unwrap();
    let planner = MotionPlanner::new(24.0, Duration::from_millis(100));
    let first_leg = route.legs()[0];
    let (primitives, _) = planner.plan_path(Pose::at(plan.origin(), plan.facing()), first_leg);

    let (pacer, reached, release) = HoldPacer::new(primitives.len());
    let (session, mock) = session_with(plan, pacer.clone(), false);
    let handle = session.start_delivery(&[2]).unwrap().into_handle().unwrap();

    reached.recv_timeout(Duration::from_secs(3)).unwrap();
    session.cancel();
    release.send(()).unwrap();

    let outcome = handle.join().unwrap();
    assert!(matches!(outcome, DeliveryOutcome::Cancelled(_)));
    assert_eq!(outcome.pose().cell(), route.stops[0].approach);
    assert!(
        mock.written_lines()
            .iter()
            .all(|l| !l.ends_with("_ARRIVED"))
    );
    // No dwell after the held wait
    assert_eq!(pacer.waits(), primitives.len());
}

#[test]
fn drive_path_rejects_paths_off_the_floor() {
    let (session, mock) = session_with(floor(), Arc::new(RecordingPacer::new()), false);
    let home = Pose::new(2, 4, Heading::North);

    match session.drive_path(vec![Cell::new(2, 4), Cell::new(2, 9)]) {
        Err(NavError::Planning(PlanError::OutOfBounds(cell))) => assert_eq!(cell, Cell::new(2, 6)),
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("path off the floor was accepted"),
    }
    match session.drive_path(vec![Cell::new(0, 1), Cell::new(1, 1)]) {
        Err(NavError::Planning(PlanError::Detached { pose, start })) => {
            assert_eq!(pose, Cell::new(2, 4));
            assert_eq!(start, Cell::new(0, 1));
        }
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("path away from the robot was accepted"),
    }
    // Table 4 sits at (4, 2)
    match session.drive_path(vec![Cell::new(2, 4), Cell::new(2, 2), Cell::new(4, 2)]) {
        Err(NavError::Planning(PlanError::Blocked(cell))) => assert_eq!(cell, Cell::new(4, 2)),
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("path through a table was accepted"),
    }

    assert!(!session.is_running());
    assert_eq!(session.context().lock().pose(), home);
    std::thread::sleep(Duration::from_millis(50));
    assert!(mock.written_lines().is_empty());

    // A valid hand-built path still drives
    let outcome = session
        .drive_path(vec![Cell::new(2, 4), Cell::new(2, 3), Cell::new(3, 3)])
        .unwrap()
        .into_handle()
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(
        outcome,
        DeliveryOutcome::Completed(Pose::new(3, 3, Heading::East))
    );
}
