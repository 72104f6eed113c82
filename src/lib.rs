// ==============================================================================
// arcade_drive — ARCADE VEHICLE CONTROLLER FOR FRAME-DRIVEN HOSTS
// ------------------------------------------------------------------------------
// Kinematic vehicle + raycast ground follow + forward wall probe + checkpoint
// lap timing + chase/attached camera, advanced one tick at a time against a
// static triangle-mesh collision world.
//
// Layout (leaf first):
// - collision:  static mesh world, RayCaster contract
// - vehicle:    VehicleState
// - input:      key events -> intents
// - tuning:     VehicleTuning / HandlingProfile / ControllerConfig
// - integrator: speed, steering, yaw, momentum
// - wall:       forward probe, bounce / slide
// - ground:     ground follow, memory, respawn
// - lap:        checkpoints + lap timer
// - camera:     chase / attached rig
// - controller: advance() + DriveSimulation
// - flight:     thrust-driven aircraft + FlightSimulation
// - scheduler:  single owned tick loop
// - snapshot:   serializable read-only views, debug overlay
// ==============================================================================

pub mod camera;
pub mod collision;
pub mod controller;
pub mod error;
pub mod flight;
pub mod ground;
pub mod input;
pub mod integrator;
pub mod lap;
pub mod scheduler;
pub mod snapshot;
pub mod tuning;
pub mod vehicle;
pub mod wall;

pub use camera::{CameraConfig, CameraMode, CameraRig};
pub use collision::{CollisionWorld, RayCaster, RayHit, RayLayer, StaticMesh, SurfaceId, SurfaceProperties};
pub use controller::{advance, DriveSimulation, TickReport};
pub use error::{ConfigError, GeometryWarning, SchedulerError};
pub use flight::{AircraftState, FlightSimulation, FlightTuning};
pub use input::{DriveIntent, FlightIntent, InputSampler, KeyBindings};
pub use lap::{CheckpointConfig, RaceConfig, RaceEvent, RacePhase, RaceTracker};
pub use scheduler::{Simulated, TickScheduler};
pub use snapshot::{DebugOverlay, FlightSnapshot, VehicleSnapshot};
pub use tuning::{ControllerConfig, HandlingProfile, SpawnConfig, VehicleTuning};
pub use vehicle::{SafeTransform, VehicleState};
