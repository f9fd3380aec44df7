//! dakiya-fw-sim - simulated Dakiya firmware on a serial port
//!
//! Runs the firmware control loop against the simulated board and speaks the
//! line protocol on a real serial device (typically one end of a pty pair),
//! so the host navigator can be exercised without hardware.
//!
//! ```bash
//! socat -d -d pty,raw,echo=0,link=/tmp/dakiya-dev pty,raw,echo=0,link=/tmp/dakiya-host &
//! dakiya-fw-sim --port /tmp/dakiya-dev --baud 115200
//! ```

use clap::Parser;
use dakiya_fw::platform::serial::SerialPortLine;
use dakiya_fw::sim::SimBoard;
use dakiya_fw::{Firmware, FirmwareConfig, FirmwareError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Parser)]
#[command(name = "dakiya-fw-sim")]
#[command(about = "Serve the simulated Dakiya firmware on a serial port")]
struct Args {
    /// Serial device to serve on
    #[arg(short, long)]
    port: String,

    /// Baud rate (must match the host)
    #[arg(short, long)]
    baud: u32,

    /// Firmware configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Place a static obstacle this many cm in front of the center sensor
    #[arg(long)]
    obstacle_cm: Option<f32>,

    /// Noise seed (0 = random)
    #[arg(long)]
    seed: Option<u64>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    log::info!("dakiya-fw-sim v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Using config: {}", path.display());
            FirmwareConfig::load(path)?
        }
        None => FirmwareConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.sim.seed = seed;
    }

    let serial = SerialPortLine::open(&args.port, args.baud)?;
    let board = SimBoard::new(serial, &config);
    let obstacle = board.obstacle();
    if let Some(cm) = args.obstacle_cm {
        obstacle.set(Some(cm));
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        flag.store(true, Ordering::Relaxed);
    })
    .map_err(|e| FirmwareError::Config(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut firmware = Firmware::new(board, config)?;
    firmware.run(&shutdown);
    Ok(())
}
