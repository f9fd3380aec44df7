//! dakiya-nav - drive the Dakiya delivery robot from the command line
//!
//! ```bash
//! dakiya-nav --config dakiya.toml deliver 2 4
//! dakiya-nav --simulated goto 3 1
//! dakiya-nav calibrate 4.2 175
//! ```

use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use dakiya_nav::context::update_calibration;
use dakiya_nav::link::Endpoint;
use dakiya_nav::motion::ThreadPacer;
use dakiya_nav::session::DeliveryHandle;
use dakiya_nav::{
    Cell, DakiyaConfig, DeliverySession, DeliveryStart, LinkTransport, MotionPlanner, NavError,
    Pose, Result, RobotContext, SessionEvent, SessionSettings,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dakiya-nav")]
#[command(about = "Table-delivery navigator for the Dakiya robot")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = "dakiya.toml")]
    config: PathBuf,

    /// Run against the in-process simulated firmware instead of the serial port
    #[arg(long)]
    simulated: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Visit tables in order, then return home
    Deliver {
        #[arg(required = true)]
        tables: Vec<u8>,
    },
    /// Drive to a cell
    Goto { x: i32, y: i32 },
    /// Tell a table its order was picked up
    Received { table: u8 },
    /// Force the firmware back to idle
    Reset,
    /// Push a new motion calibration
    Calibrate {
        /// Straight-line speed, inches per second
        inches_per_second: f32,
        /// Turn rate, degrees per second
        degrees_per_second: f32,
    },
    /// Print link telemetry
    Monitor {
        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(long)]
        seconds: Option<u64>,
    },
}

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dakiya_nav=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    info!("dakiya-nav v{}", env!("CARGO_PKG_VERSION"));
    info!("Loading configuration from {:?}", args.config);
    let config = DakiyaConfig::load(&args.config)?;

    let link = Arc::new(LinkTransport::from_config(&config.link));
    let endpoint = endpoint(&config, args.simulated)?;
    if let Err(e) = link.open_at(endpoint) {
        warn!("{}; continuing without a link", e);
    }

    let plan = config.floor.build()?;
    let home = Pose::at(plan.origin(), plan.facing());
    let ctx = RobotContext::new(home, config.motion.calibration, Arc::clone(&link)).into_shared();
    let settings = SessionSettings {
        dwell: Duration::from_millis(config.delivery.dwell_ms),
        reset_on_blocked: config.delivery.reset_on_blocked,
    };
    let session = DeliverySession::new(
        ctx,
        plan,
        MotionPlanner::from_config(&config.motion),
        Arc::new(ThreadPacer),
        settings,
    )?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| NavError::Config(format!("Error setting Ctrl-C handler: {}", e)))?;

    match args.command {
        Command::Deliver { tables } => {
            let start = session.start_delivery(&tables)?;
            follow(&session, start, &interrupted);
        }
        Command::Goto { x, y } => {
            let start = session.drive_to(Cell::new(x, y))?;
            follow(&session, start, &interrupted);
        }
        Command::Received { table } => session.confirm_received(table)?,
        Command::Reset => session.reset_device(),
        Command::Calibrate {
            inches_per_second,
            degrees_per_second,
        } => {
            let calibration = dakiya_wire::MotionCalibration {
                inches_per_second,
                degrees_per_second,
                ..session.context().lock().calibration()
            };
            update_calibration(session.context(), calibration)?;
        }
        Command::Monitor { seconds } => {
            let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
            let events = session.events();
            while !interrupted.load(Ordering::SeqCst)
                && deadline.is_none_or(|d| Instant::now() < d)
            {
                print_next(&events);
            }
        }
    }

    link.close();
    Ok(())
}

fn endpoint(config: &DakiyaConfig, simulated: bool) -> Result<Endpoint> {
    if simulated {
        #[cfg(feature = "sim")]
        {
            let mut firmware = config.simulator.clone();
            firmware.calibration = config.motion.calibration;
            return Ok(Endpoint::Simulated(Box::new(firmware)));
        }
        #[cfg(not(feature = "sim"))]
        return Err(NavError::Config(
            "built without the `sim` feature".to_string(),
        ));
    }
    Ok(Endpoint::Serial {
        path: config.link.port.clone(),
        baud_rate: config.link.baud_rate,
    })
}

/// Print session events until the run ends; Ctrl-C cancels it
fn follow(session: &DeliverySession, start: DeliveryStart, interrupted: &AtomicBool) {
    let Some(handle) = start.into_handle() else {
        warn!("A run is already active");
        return;
    };
    let events = session.events();
    let mut cancel_sent = false;
    while !handle.is_finished() {
        if interrupted.load(Ordering::SeqCst) && !cancel_sent {
            session.cancel();
            cancel_sent = true;
        }
        print_next(&events);
    }
    while let Ok(event) = events.try_recv() {
        report(&event);
    }
    finish(handle);
}

fn finish(handle: DeliveryHandle) {
    match handle.join() {
        Some(outcome) => info!("Run ended: {:?}", outcome),
        None => error!("Run thread panicked"),
    }
}

fn print_next(events: &Receiver<SessionEvent>) {
    match events.recv_timeout(Duration::from_millis(200)) {
        Ok(event) => report(&event),
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
    }
}

fn report(event: &SessionEvent) {
    match event {
        SessionEvent::ArrivedAt { table, cell } => info!("Arrived at table {} ({})", table, cell),
        SessionEvent::MotionPaused => warn!("Paused for obstacle"),
        SessionEvent::MotionResumed => info!("Resumed"),
        SessionEvent::DeviceBlocked(reason) => warn!("Firmware blocked command: {}", reason),
        SessionEvent::Disconnected => warn!("Link lost"),
        other => info!("{:?}", other),
    }
}
