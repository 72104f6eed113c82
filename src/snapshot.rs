// ==============================================================================
// snapshot.rs — READ-ONLY VIEWS FOR THE PRESENTATION LAYER
// ------------------------------------------------------------------------------
// Serializable post-tick snapshots:
// - VehicleSnapshot: transform, speed (+ normalized, for audio pitch), grounded
//   flag, race progress, camera
// - FlightSnapshot: aircraft transform, velocity, thrust, landed flag, camera
// - DebugOverlay / DebugRay: the rays cast during the last tick, projected
//   from the TickReport (nothing debug-related is stored in VehicleState)
//
// Vectors go out as plain [f32; 3] arrays, quaternions as [x, y, z, w].
// ==============================================================================

use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::Serialize;

use crate::camera::CameraMode;
use crate::controller::{DriveSimulation, TickReport};
use crate::flight::FlightSimulation;
use crate::lap::RacePhase;

#[inline] fn v3(v: Vector3<f32>) -> [f32; 3] { [v.x, v.y, v.z] }
#[inline] fn p3(p: Point3<f32>) -> [f32; 3] { [p.x, p.y, p.z] }
#[inline] fn q4(q: UnitQuaternion<f32>) -> [f32; 4] { [q.i, q.j, q.k, q.w] }

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CameraSnapshot {
    pub mode: CameraMode,
    pub position: [f32; 3],
    pub look_at: [f32; 3],
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSnapshot {
    pub tick: u64,
    pub position: [f32; 3],
    pub rotation: [f32; 4],           // quaternion
    pub speed: f32,
    pub normalized_speed: f32,        // [0, 1]
    pub grounded: bool,

    // --- race ---
    pub phase: RacePhase,
    pub lap_index: u32,
    pub lap_count: u32,
    pub current_lap: f32,             // s
    pub best_lap: Option<f32>,        // s
    pub finished: bool,
    pub lap_history: Vec<f32>,

    pub camera: CameraSnapshot,
}

impl VehicleSnapshot {
    pub fn capture(sim: &DriveSimulation) -> Self {
        let race = sim.race();
        let camera = sim.camera();
        Self {
            tick: sim.tick(),
            position: p3(sim.position()),
            rotation: q4(sim.orientation()),
            speed: sim.speed(),
            normalized_speed: sim.normalized_speed(),
            grounded: sim.is_grounded(),

            phase: race.phase(),
            lap_index: race.lap_index(),
            lap_count: race.lap_count(),
            current_lap: race.current_lap_seconds(),
            best_lap: race.best_lap(),
            finished: race.is_finished(),
            lap_history: race.lap_history().to_vec(),

            camera: CameraSnapshot {
                mode: camera.mode(),
                position: p3(camera.position()),
                look_at: p3(camera.look_at()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightSnapshot {
    pub tick: u64,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub velocity: [f32; 3],
    pub speed: f32,
    pub normalized_speed: f32,
    pub altitude: f32,
    pub thrust: f32,                  // [0, 1]
    pub landed: bool,
    pub camera_position: [f32; 3],
    pub camera_look_at: [f32; 3],
}

impl FlightSnapshot {
    pub fn capture(sim: &FlightSimulation) -> Self {
        let state = sim.state();
        let speed = state.velocity.norm();
        Self {
            tick: sim.tick(),
            position: p3(state.position),
            rotation: q4(state.orientation),
            velocity: v3(state.velocity),
            speed,
            normalized_speed: (speed / sim.tuning().max_speed).clamp(0.0, 1.0),
            altitude: state.position.y,
            thrust: state.thrust,
            landed: state.landed,
            camera_position: p3(sim.camera_position()),
            camera_look_at: p3(sim.camera_look_at()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DebugRay {
    pub origin: [f32; 3],
    pub direction: [f32; 3],
    pub length: f32,
    pub hit: Option<[f32; 3]>,
    pub color: [f32; 3],
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DebugOverlay {
    pub ground_rays: Vec<DebugRay>,
    pub wall_rays: Vec<DebugRay>,
    pub grounded: bool,
}

const GROUND_HIT: [f32; 3] = [0.1, 0.9, 0.2];
const GROUND_MISS: [f32; 3] = [0.9, 0.6, 0.1];
const FALLBACK: [f32; 3] = [0.2, 0.5, 1.0];
const WALL: [f32; 3] = [1.0, 0.1, 0.1];

impl DebugOverlay {
    pub fn from_report(report: &TickReport) -> Self {
        let mut overlay = Self {
            grounded: report.ground.contact.is_some(),
            ..Self::default()
        };

        if let Some(probe) = report.ground.down {
            overlay.ground_rays.push(DebugRay {
                origin: p3(probe.origin),
                direction: v3(probe.direction),
                length: probe.length,
                hit: probe.hit.map(p3),
                color: if probe.hit.is_some() { GROUND_HIT } else { GROUND_MISS },
            });
        }
        if let Some(probe) = report.ground.up {
            overlay.ground_rays.push(DebugRay {
                origin: p3(probe.origin),
                direction: v3(probe.direction),
                length: probe.length,
                hit: probe.hit.map(p3),
                color: FALLBACK,
            });
        }
        if let Some(probe) = report.ground.sweep {
            overlay.ground_rays.push(DebugRay {
                origin: p3(probe.origin),
                direction: v3(probe.direction),
                length: probe.length,
                hit: probe.hit.map(p3),
                color: if probe.hit.is_some() { GROUND_HIT } else { GROUND_MISS },
            });
        }
        if let Some(probe) = report.wall.probe {
            overlay.wall_rays.push(DebugRay {
                origin: p3(probe.origin),
                direction: v3(probe.direction),
                length: probe.length,
                hit: probe.hit.map(p3),
                color: WALL,
            });
        }
        overlay
    }

    pub fn is_empty(&self) -> bool {
        self.ground_rays.is_empty() && self.wall_rays.is_empty()
    }
}
