// ==============================================================================
// controller.rs — ONE TICK OF THE DRIVE PIPELINE + THE OWNING SIMULATION
// ------------------------------------------------------------------------------
// Pipeline order (each stage reads the previous stage's output, never a stale
// transform):
//   input -> integrator -> wall resolver -> ground resolver -> lap tracker
//         -> camera rig
//
// advance() is the pure core: state in, state + report out. It knows nothing
// about laps, cameras or keys.
//
// DriveSimulation owns everything a host needs for one vehicle on one track:
// collision world, vehicle state, input sampler, race tracker and camera rig.
// The host calls advance(dt) once per frame and reads results back through
// getters or snapshot(). dt is clamped to handling.maxTick; dt <= 0 is a no-op.
// ==============================================================================

use nalgebra::{Point3, UnitQuaternion};
use tracing::{debug, info, warn};

use crate::camera::{CameraMode, CameraRig};
use crate::collision::{CollisionWorld, RayCaster, StaticMesh};
use crate::error::{ConfigError, GeometryWarning};
use crate::ground::{resolve_ground, GroundOutcome, GroundStatus};
use crate::input::{DriveIntent, InputSampler, KeyBindings, ToggleAction};
use crate::integrator::integrate;
use crate::lap::{RaceEvent, RacePhase, RaceTracker};
use crate::snapshot::{DebugOverlay, VehicleSnapshot};
use crate::tuning::{ControllerConfig, HandlingProfile, VehicleTuning};
use crate::vehicle::{yaw_rotation, SafeTransform, VehicleState};
use crate::wall::{resolve_walls, WallOutcome};

/// What the resolvers saw during one tick. Feeds the debug overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub dt: f32,
    pub wall: WallOutcome,
    pub ground: GroundOutcome,
}

/// One simulation step for a single vehicle.
pub fn advance<W: RayCaster + ?Sized>(
    state: &VehicleState,
    intent: &DriveIntent,
    world: &W,
    tuning: &VehicleTuning,
    handling: &HandlingProfile,
    dt: f32,
) -> (VehicleState, TickReport) {
    if !(dt > 0.0) {
        return (*state, TickReport::default());
    }

    let moved = integrate(state, intent, tuning, handling, dt);
    let (mut walled, wall) = resolve_walls(&moved, world, tuning, handling);
    if wall.contact.is_some() {
        // a crash restarts the safe-transform debounce
        walled.stable_time = 0.0;
    }
    let (grounded, ground) = resolve_ground(&walled, world, tuning, handling, dt);

    (grounded, TickReport { dt, wall, ground })
}

pub struct DriveSimulation {
    tuning: VehicleTuning,
    handling: HandlingProfile,
    world: CollisionWorld,

    spawn: SafeTransform,
    state: VehicleState,

    input: InputSampler,
    race: RaceTracker,
    camera: CameraRig,

    tick: u64,
    last_report: TickReport,
    events: Vec<RaceEvent>,           // since the last drain_events()
}

impl DriveSimulation {
    /// Validates the whole config up front; nothing is defaulted silently.
    pub fn new(config: ControllerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let [x, y, z] = config.spawn.position;
        let spawn = SafeTransform {
            position: Point3::new(x, y, z),
            orientation: yaw_rotation(config.spawn.yaw),
        };
        let race = RaceTracker::new(&config.race)?;
        let mut camera = CameraRig::new(config.camera);
        camera.update(&spawn);

        info!(
            "drive simulation ready: spawn ({x:.1}, {y:.1}, {z:.1}), {} gates, {} laps",
            race.checkpoints().len(),
            race.lap_count()
        );

        Ok(Self {
            tuning: config.vehicle,
            handling: config.handling,
            world: CollisionWorld::new(),
            spawn,
            state: VehicleState::spawn(spawn.position, spawn.orientation),
            input: InputSampler::new(KeyBindings::default()),
            race,
            camera,
            tick: 0,
            last_report: TickReport::default(),
            events: Vec::new(),
        })
    }

    /// Register track geometry once assets are loaded. Rejected meshes are
    /// returned to the host; the simulation keeps running without them.
    pub fn register_static_geometry(
        &mut self,
        meshes: impl IntoIterator<Item = StaticMesh>,
    ) -> Vec<GeometryWarning> {
        let warnings = self.world.register_static_geometry(meshes);
        if !warnings.is_empty() {
            warn!("{} collision mesh(es) rejected", warnings.len());
        }
        if self.world.surface_count() == 0 {
            warn!("no collision geometry registered; vehicle will free fall");
        }
        warnings
    }

    pub fn advance(&mut self, dt: f32) {
        if !(dt > 0.0) {
            return;
        }
        let dt = dt.min(self.handling.max_tick);

        let intent = if self.race.is_finished() {
            DriveIntent::IDLE
        } else {
            self.input.drive_intent()
        };

        let (next, report) = advance(&self.state, &intent, &self.world, &self.tuning, &self.handling, dt);
        self.state = next;
        self.last_report = report;

        let events = self.race.update(&self.state.position, dt);
        if events.iter().any(|e| matches!(e, RaceEvent::RaceFinished { .. })) {
            self.input.clear();
        }
        self.events.extend(events);

        if report.ground.status == GroundStatus::Respawned {
            self.camera.snap();
        }
        self.camera.update(&self.state.transform());
        self.tick += 1;
    }

    // ------------------------------------------------------------------
    // Host input
    // ------------------------------------------------------------------

    pub fn key_down(&mut self, code: &str, repeat: bool) {
        match self.input.key_down(code, repeat) {
            Some(ToggleAction::CycleCamera) => {
                let mode = self.camera.cycle_mode();
                debug!("camera mode -> {mode:?}");
            }
            Some(ToggleAction::Reset) => self.reset(),
            None => {}
        }
    }

    pub fn key_up(&mut self, code: &str) {
        self.input.key_up(code);
    }

    pub fn pointer_drag(&mut self, dx: f32, dy: f32) {
        self.camera.pointer_drag(dx, dy);
    }

    pub fn scroll(&mut self, delta: f32) {
        self.camera.scroll(delta);
    }

    /// Back to the spawn transform in Warmup, with input and camera cleared.
    pub fn reset(&mut self) {
        self.state = VehicleState::spawn(self.spawn.position, self.spawn.orientation);
        self.race.reset();
        self.input.clear();
        self.camera.reset();
        self.camera.update(&self.spawn);
        self.last_report = TickReport::default();
        self.events.clear();
        info!("session reset");
    }

    /// Teleport the vehicle. Motion and ground memory are dropped; the new
    /// transform also becomes the respawn point.
    pub fn place_vehicle(&mut self, position: Point3<f32>, orientation: UnitQuaternion<f32>) {
        self.state = VehicleState::spawn(position, orientation);
        self.camera.snap();
        self.camera.update(&self.state.transform());
        debug!("vehicle placed at ({:.1}, {:.1}, {:.1})", position.x, position.y, position.z);
    }

    // ------------------------------------------------------------------
    // Observable outputs
    // ------------------------------------------------------------------

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn position(&self) -> Point3<f32> {
        self.state.position
    }

    pub fn orientation(&self) -> UnitQuaternion<f32> {
        self.state.orientation
    }

    pub fn speed(&self) -> f32 {
        self.state.speed
    }

    /// |speed| / maxSpeed, for engine pitch and speedometers.
    pub fn normalized_speed(&self) -> f32 {
        (self.state.speed.abs() / self.tuning.max_speed).clamp(0.0, 1.0)
    }

    pub fn is_grounded(&self) -> bool {
        self.state.is_grounded
    }

    pub fn race(&self) -> &RaceTracker {
        &self.race
    }

    pub fn phase(&self) -> RacePhase {
        self.race.phase()
    }

    pub fn lap_index(&self) -> u32 {
        self.race.lap_index()
    }

    pub fn current_lap_seconds(&self) -> f32 {
        self.race.current_lap_seconds()
    }

    pub fn best_lap(&self) -> Option<f32> {
        self.race.best_lap()
    }

    pub fn is_finished(&self) -> bool {
        self.race.is_finished()
    }

    pub fn lap_history(&self) -> &[f32] {
        self.race.lap_history()
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn camera_mode(&self) -> CameraMode {
        self.camera.mode()
    }

    pub fn world(&self) -> &CollisionWorld {
        &self.world
    }

    pub fn tuning(&self) -> &VehicleTuning {
        &self.tuning
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn last_report(&self) -> &TickReport {
        &self.last_report
    }

    /// Race events produced since the previous call.
    pub fn drain_events(&mut self) -> Vec<RaceEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot::capture(self)
    }

    pub fn debug_overlay(&self) -> DebugOverlay {
        DebugOverlay::from_report(&self.last_report)
    }
}
