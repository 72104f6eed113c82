// ==============================================================================
// main.rs — HEADLESS DEMO HOST
// ------------------------------------------------------------------------------
// Stands in for the browser frame loop: builds a simple track, drives the
// simulation from a TickScheduler, plays a scripted "driver" through the key
// interface and logs race events. The final snapshot is printed as JSON.
//
//   arcade-drive drive [--config track.json] [--seconds 30] [--hz 60]
//   arcade-drive fly   [--seconds 30] [--hz 60] [--throttle]
// ==============================================================================

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nalgebra::Point3;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arcade_drive::collision::{StaticMesh, SurfaceProperties};
use arcade_drive::lap::{CheckpointConfig, RaceConfig, RaceEvent};
use arcade_drive::tuning::{ControllerConfig, HandlingProfile, SpawnConfig, ARCADE};
use arcade_drive::vehicle::yaw_rotation;
use arcade_drive::{CameraConfig, DriveSimulation, FlightSimulation, FlightTuning, TickScheduler};

#[derive(Parser, Debug)]
#[command(name = "arcade-drive")]
#[command(version, about = "Headless host for the arcade vehicle controller", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive laps on the built-in straight track (default)
    Drive {
        /// Controller config (JSON); the built-in track config if omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long, default_value_t = 30.0)]
        seconds: f32,

        #[arg(long, default_value_t = 60)]
        hz: u32,
    },

    /// Fly the aircraft over flat terrain until it lands or time runs out
    Fly {
        #[arg(short, long, default_value_t = 30.0)]
        seconds: f32,

        #[arg(long, default_value_t = 60)]
        hz: u32,

        /// Hold full throttle instead of gliding
        #[arg(long)]
        throttle: bool,
    },
}

// Straight 600-unit strip; the scripted driver is carried from the far end
// back to the near end, which makes it a circuit for lap timing.
const TRACK_NEAR_Z: f32 = 260.0;
const TRACK_FAR_Z: f32 = -260.0;

fn builtin_config() -> ControllerConfig {
    ControllerConfig {
        vehicle: ARCADE,
        handling: HandlingProfile::default(),
        race: RaceConfig {
            lap_count: 3,
            min_lap_seconds: 5.0,
            checkpoints: vec![
                CheckpointConfig {
                    position: [4.0, 10.0, 80.0],
                    rotation_yaw: 0.0,
                    half_width: 8.0,
                    thickness: 2.0,
                    is_finish: true,
                },
                CheckpointConfig {
                    position: [0.0, 0.0, -120.0],
                    rotation_yaw: 0.0,
                    half_width: 12.0,
                    thickness: 2.0,
                    is_finish: false,
                },
            ],
        },
        camera: CameraConfig::default(),
        spawn: SpawnConfig { position: [0.0, 30.0, 180.0], yaw: 0.0 },
    }
}

fn builtin_track() -> Vec<StaticMesh> {
    vec![
        StaticMesh::floor("road", 0.0, (-20.0, 20.0), (-300.0, 300.0), SurfaceProperties::ROAD),
        StaticMesh::wall("barrier-left", (-20.0, 300.0), (-20.0, -300.0), -1.0, 3.0, SurfaceProperties::BARRIER),
        StaticMesh::wall("barrier-right", (20.0, -300.0), (20.0, 300.0), -1.0, 3.0, SurfaceProperties::BARRIER),
        StaticMesh::floor("safety-net", -5.0, (-200.0, 200.0), (-400.0, 400.0), SurfaceProperties::IGNORED),
    ]
}

fn log_event(event: &RaceEvent) {
    match event {
        RaceEvent::RaceStarted => info!("green flag"),
        RaceEvent::CheckpointPassed { index } => info!("checkpoint {index}"),
        RaceEvent::LapCompleted { lap, duration, best } => {
            info!("lap {lap}: {duration:.2}s (best {best:.2}s)")
        }
        RaceEvent::LapRejected { duration } => info!("lap rejected after {duration:.2}s"),
        RaceEvent::RaceFinished { laps, best } => info!("chequered flag: {laps:?}, best {best:.2}s"),
    }
}

async fn run_drive(config: Option<PathBuf>, seconds: f32, hz: u32) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => ControllerConfig::load(&path).with_context(|| format!("loading {}", path.display()))?,
        None => builtin_config(),
    };

    let mut sim = DriveSimulation::new(config)?;
    for warning in sim.register_static_geometry(builtin_track()) {
        warn!("{warning}");
    }
    sim.key_down("KeyW", false);

    let mut scheduler = TickScheduler::new(sim, hz)?;
    let mut snapshots = scheduler.start().await?;
    let shared = scheduler.simulation();

    let deadline = tokio::time::Instant::now() + Duration::from_secs_f32(seconds.max(0.0));
    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut sim = shared.lock().await;
        for event in sim.drain_events() {
            log_event(&event);
        }
        if sim.is_finished() {
            break;
        }
        if sim.position().z < TRACK_FAR_Z {
            let x = sim.position().x;
            sim.place_vehicle(Point3::new(x, ARCADE.ride_height, TRACK_NEAR_Z), yaw_rotation(0.0));
        }
    }

    scheduler.stop().await;
    let snapshot = snapshots.borrow_and_update().clone();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn run_fly(seconds: f32, hz: u32, throttle: bool) -> anyhow::Result<()> {
    let mut sim = FlightSimulation::new(FlightTuning::default())?;
    sim.register_static_geometry([StaticMesh::floor(
        "terrain",
        0.0,
        (-5000.0, 5000.0),
        (-5000.0, 5000.0),
        SurfaceProperties::ROAD,
    )]);
    if throttle {
        sim.key_down("ShiftLeft", false);
    }

    let mut scheduler = TickScheduler::new(sim, hz)?;
    let mut snapshots = scheduler.start().await?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs_f32(seconds.max(0.0));
    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if snapshots.borrow().landed {
            break;
        }
    }

    scheduler.stop().await;
    let snapshot = snapshots.borrow_and_update().clone();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    info!("arcade-drive v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        None => run_drive(None, 30.0, 60).await,
        Some(Commands::Drive { config, seconds, hz }) => run_drive(config, seconds, hz).await,
        Some(Commands::Fly { seconds, hz, throttle }) => run_fly(seconds, hz, throttle).await,
    }
}
