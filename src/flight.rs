// ==============================================================================
// flight.rs — THRUST-DRIVEN AIRCRAFT (FLIGHT DEMO)
// ------------------------------------------------------------------------------
// Body frame: forward is local -X, up is local +Y, left wing is local +Z.
//
// Per tick (until landed):
//   1) keys -> angular velocity (rad/s, body frame) and thrust in [0, 1]
//   2) angular velocity damping: ω *= max(0, 1 - angularDamping·dt)
//   3) a = forward·thrust·thrustAccel - gravity·up + up·(|v_xz|·liftFactor)
//   4) v += a·dt; v -= v·(maxThrust / maxSpeed)·dt; |v| <= maxSpeed
//   5) p += v·dt; p.y <= maxAltitude
//   6) landing check: a 6×6 grid of body-local points under the fuselage, each
//      cast downward; any hit within contactDistance lands the aircraft and
//      freezes it until reset
//   7) orientation *= euler_yxz(ω·dt)
//
// The attached camera trails at a body-local offset, blended by min(1, 5·dt).
// ==============================================================================

use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::Deserialize;
use tracing::{debug, info};

use crate::collision::{CollisionWorld, RayCaster, RayLayer, StaticMesh};
use crate::error::{ConfigError, GeometryWarning};
use crate::input::{FlightIntent, InputSampler, KeyBindings, ToggleAction};
use crate::snapshot::FlightSnapshot;

pub const LANDING_GRID: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct FlightTuning {
    pub max_speed: f32,               // units/s
    pub max_altitude: f32,
    pub gravity: f32,                 // units/s²
    pub thrust_accel: f32,            // units/s² at full thrust
    pub lift_factor: f32,             // 1/s, upward accel per unit of horizontal speed
    pub max_thrust: f32,              // sets the linear drag coefficient with maxSpeed

    pub angular_rate: f32,            // rad/s² of angular velocity per held key
    pub angular_damping: f32,         // 1/s
    pub thrust_rate: f32,             // 1/s
    pub air_brake_rate: f32,          // 1/s

    pub half_extents: [f32; 3],       // body-local landing box (x along fuselage)
    pub contact_distance: f32,        // landing ray hit distance that counts as touchdown
    pub landing_probe_lift: f32,      // landing rays start this far above each sample

    pub initial_position: [f32; 3],
    pub initial_velocity: [f32; 3],
    pub initial_thrust: f32,

    pub camera_offset: [f32; 3],      // body local
    pub camera_look_at: [f32; 3],     // body local
    pub camera_smoothing: f32,        // 1/s

    pub max_tick: f32,
}

impl Default for FlightTuning {
    fn default() -> Self {
        Self {
            max_speed: 55.0,
            max_altitude: 4200.0,
            gravity: 9.81,
            thrust_accel: 30.0,
            lift_factor: 0.003,
            max_thrust: 10.0,

            angular_rate: 2.0,
            angular_damping: 3.0,
            thrust_rate: 1.0,
            air_brake_rate: 3.0,

            half_extents: [4.0, 1.0, 5.5],
            contact_distance: 0.75,
            landing_probe_lift: 3.0,

            initial_position: [0.0, 200.0, 0.0],
            initial_velocity: [-20.0, 0.0, 0.0],
            initial_thrust: 0.5,

            camera_offset: [100.0, 50.0, 0.0],
            camera_look_at: [0.0, 20.0, 0.0],
            camera_smoothing: 5.0,

            max_tick: 0.05,
        }
    }
}

impl FlightTuning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("maxSpeed", self.max_speed),
            ("thrustAccel", self.thrust_accel),
            ("maxThrust", self.max_thrust),
            ("angularRate", self.angular_rate),
            ("thrustRate", self.thrust_rate),
            ("airBrakeRate", self.air_brake_rate),
            ("contactDistance", self.contact_distance),
            ("cameraSmoothing", self.camera_smoothing),
            ("maxTick", self.max_tick),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(format!("flight.{name} must be > 0 (got {value})")));
            }
        }
        for (name, value) in [
            ("gravity", self.gravity),
            ("liftFactor", self.lift_factor),
            ("angularDamping", self.angular_damping),
            ("landingProbeLift", self.landing_probe_lift),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(format!("flight.{name} must be >= 0 (got {value})")));
            }
        }
        if !self.half_extents.iter().all(|e| e.is_finite() && *e > 0.0) {
            return Err(ConfigError::invalid("flight.halfExtents must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.initial_thrust) {
            return Err(ConfigError::invalid(format!(
                "flight.initialThrust must be in [0, 1] (got {})",
                self.initial_thrust
            )));
        }
        Ok(())
    }

    fn initial_state(&self) -> AircraftState {
        let [px, py, pz] = self.initial_position;
        let [vx, vy, vz] = self.initial_velocity;
        AircraftState {
            position: Point3::new(px, py, pz),
            orientation: UnitQuaternion::identity(),
            velocity: Vector3::new(vx, vy, vz),
            angular_velocity: Vector3::zeros(),
            thrust: self.initial_thrust,
            landed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AircraftState {
    pub position: Point3<f32>,
    pub orientation: UnitQuaternion<f32>,
    pub velocity: Vector3<f32>,           // world
    pub angular_velocity: Vector3<f32>,   // body frame, rad/s
    pub thrust: f32,                      // [0, 1]
    pub landed: bool,
}

impl AircraftState {
    pub fn forward(&self) -> Vector3<f32> {
        self.orientation * -Vector3::x()
    }
}

fn axis(positive: bool, negative: bool) -> f32 {
    match (positive, negative) {
        (true, false) => 1.0,
        (false, true) => -1.0,
        _ => 0.0,
    }
}

fn apply_controls(state: &mut AircraftState, intent: &FlightIntent, tuning: &FlightTuning, dt: f32) {
    let rate = tuning.angular_rate * dt;

    // +z pitches the -X nose down, +x drops the left (+Z) wing, +y swings the nose left
    state.angular_velocity.z += axis(intent.pitch_down, intent.pitch_up) * rate;
    state.angular_velocity.x += axis(intent.roll_left, intent.roll_right) * rate;
    state.angular_velocity.y += axis(intent.yaw_left, intent.yaw_right) * rate;

    if intent.throttle_up {
        state.thrust += tuning.thrust_rate * dt;
    }
    if intent.throttle_down {
        state.thrust -= tuning.thrust_rate * dt;
    }
    if intent.air_brake {
        state.thrust -= tuning.air_brake_rate * dt;
    }
    state.thrust = state.thrust.clamp(0.0, 1.0);
}

/// Body-local sample points on the underside of the landing box.
pub fn landing_samples(half_extents: [f32; 3]) -> [Vector3<f32>; LANDING_GRID * LANDING_GRID] {
    let [hx, hy, hz] = half_extents;
    let step_x = 2.0 * hx / (LANDING_GRID - 1) as f32;
    let step_z = 2.0 * hz / (LANDING_GRID - 1) as f32;

    let mut samples = [Vector3::zeros(); LANDING_GRID * LANDING_GRID];
    for row in 0..LANDING_GRID {
        for col in 0..LANDING_GRID {
            samples[row * LANDING_GRID + col] =
                Vector3::new(-hx + row as f32 * step_x, -hy, -hz + col as f32 * step_z);
        }
    }
    samples
}

/// Highest required lift (ground point minus sample point) over all samples
/// that touch down, or `None` while airborne.
fn touchdown<W: RayCaster + ?Sized>(state: &AircraftState, world: &W, tuning: &FlightTuning) -> Option<f32> {
    let max_distance = tuning.landing_probe_lift + tuning.contact_distance;

    landing_samples(tuning.half_extents)
        .iter()
        .filter_map(|local| {
            let sample = state.position + state.orientation * local;
            let origin = sample + Vector3::y() * tuning.landing_probe_lift;
            let hit = world.cast_ray(origin, -Vector3::y(), max_distance, RayLayer::Ground)?;
            Some(hit.point.y - sample.y)
        })
        .reduce(f32::max)
}

/// One flight step. A landed aircraft is returned unchanged.
pub fn advance_flight<W: RayCaster + ?Sized>(
    state: &AircraftState,
    intent: &FlightIntent,
    world: &W,
    tuning: &FlightTuning,
    dt: f32,
) -> AircraftState {
    if state.landed || !(dt > 0.0) {
        return *state;
    }
    let mut next = *state;

    apply_controls(&mut next, intent, tuning, dt);
    next.angular_velocity *= (1.0 - tuning.angular_damping * dt).max(0.0);

    // ------------------------------------------------------------------
    // Linear
    // ------------------------------------------------------------------
    let xz_speed = next.velocity.x.hypot(next.velocity.z);
    let mut accel = next.forward() * next.thrust * tuning.thrust_accel;
    accel.y += xz_speed * tuning.lift_factor - tuning.gravity;

    next.velocity += accel * dt;
    next.velocity -= next.velocity * (tuning.max_thrust / tuning.max_speed) * dt;
    if next.velocity.norm_squared() > tuning.max_speed * tuning.max_speed {
        next.velocity = next.velocity.normalize() * tuning.max_speed;
    }

    next.position += next.velocity * dt;
    next.position.y = next.position.y.min(tuning.max_altitude);

    // ------------------------------------------------------------------
    // Landing
    // ------------------------------------------------------------------
    if let Some(lift) = touchdown(&next, world, tuning) {
        next.position.y += lift;
        next.velocity = Vector3::zeros();
        next.angular_velocity = Vector3::zeros();
        next.thrust = 0.0;
        next.landed = true;
        info!(
            "aircraft landed at ({:.1}, {:.1}, {:.1})",
            next.position.x, next.position.y, next.position.z
        );
        return next;
    }

    // ------------------------------------------------------------------
    // Angular (body frame, Y then X then Z)
    // ------------------------------------------------------------------
    let w = next.angular_velocity * dt;
    let delta = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), w.y)
        * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), w.x)
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), w.z);
    next.orientation = UnitQuaternion::new_normalize((next.orientation * delta).into_inner());

    next
}

pub struct FlightSimulation {
    tuning: FlightTuning,
    world: CollisionWorld,
    state: AircraftState,
    input: InputSampler,

    camera_position: Point3<f32>,
    camera_look_at: Point3<f32>,
    tick: u64,
}

impl FlightSimulation {
    pub fn new(tuning: FlightTuning) -> Result<Self, ConfigError> {
        tuning.validate()?;
        let state = tuning.initial_state();
        let mut sim = Self {
            tuning,
            world: CollisionWorld::new(),
            state,
            input: InputSampler::new(KeyBindings::default()),
            camera_position: state.position,
            camera_look_at: state.position,
            tick: 0,
        };
        sim.snap_camera();
        Ok(sim)
    }

    pub fn register_static_geometry(
        &mut self,
        meshes: impl IntoIterator<Item = StaticMesh>,
    ) -> Vec<GeometryWarning> {
        self.world.register_static_geometry(meshes)
    }

    fn camera_target(&self) -> (Point3<f32>, Point3<f32>) {
        let offset = Vector3::from(self.tuning.camera_offset);
        let look_at = Vector3::from(self.tuning.camera_look_at);
        (
            self.state.position + self.state.orientation * offset,
            self.state.position + self.state.orientation * look_at,
        )
    }

    fn snap_camera(&mut self) {
        (self.camera_position, self.camera_look_at) = self.camera_target();
    }

    pub fn advance(&mut self, dt: f32) {
        if !(dt > 0.0) {
            return;
        }
        let dt = dt.min(self.tuning.max_tick);

        let intent = self.input.flight_intent();
        self.state = advance_flight(&self.state, &intent, &self.world, &self.tuning, dt);

        let (position, look_at) = self.camera_target();
        let t = (dt * self.tuning.camera_smoothing).min(1.0);
        self.camera_position += (position - self.camera_position) * t;
        self.camera_look_at = look_at;
        self.tick += 1;
    }

    pub fn key_down(&mut self, code: &str, repeat: bool) {
        if let Some(ToggleAction::Reset) = self.input.key_down(code, repeat) {
            self.reset();
        }
    }

    pub fn key_up(&mut self, code: &str) {
        self.input.key_up(code);
    }

    pub fn reset(&mut self) {
        self.state = self.tuning.initial_state();
        self.input.clear();
        self.snap_camera();
        debug!("flight reset");
    }

    pub fn state(&self) -> &AircraftState {
        &self.state
    }

    pub fn tuning(&self) -> &FlightTuning {
        &self.tuning
    }

    pub fn is_landed(&self) -> bool {
        self.state.landed
    }

    pub fn camera_position(&self) -> Point3<f32> {
        self.camera_position
    }

    pub fn camera_look_at(&self) -> Point3<f32> {
        self.camera_look_at
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn snapshot(&self) -> FlightSnapshot {
        FlightSnapshot::capture(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::SurfaceProperties;

    const DT: f32 = 1.0 / 60.0;

    fn ground() -> CollisionWorld {
        let mut world = CollisionWorld::new();
        world.register_static_geometry([StaticMesh::floor(
            "terrain",
            0.0,
            (-2000.0, 2000.0),
            (-2000.0, 2000.0),
            SurfaceProperties::ROAD,
        )]);
        world
    }

    fn level(y: f32, vx: f32, thrust: f32) -> AircraftState {
        AircraftState {
            position: Point3::new(0.0, y, 0.0),
            orientation: UnitQuaternion::identity(),
            velocity: Vector3::new(vx, 0.0, 0.0),
            angular_velocity: Vector3::zeros(),
            thrust,
            landed: false,
        }
    }

    #[test]
    fn landing_grid_covers_the_box_underside() {
        let samples = landing_samples([4.0, 1.0, 5.5]);
        assert_eq!(samples.len(), 36);
        assert_eq!(samples[0], Vector3::new(-4.0, -1.0, -5.5));
        assert_eq!(samples[35], Vector3::new(4.0, -1.0, 5.5));
        assert!(samples.iter().all(|s| s.y == -1.0));
    }

    #[test]
    fn thrust_and_air_brake_stay_in_range() {
        let tuning = FlightTuning::default();
        let world = CollisionWorld::new();

        let up = FlightIntent { throttle_up: true, ..FlightIntent::default() };
        let mut state = level(1000.0, -20.0, 0.9);
        for _ in 0..30 {
            state = advance_flight(&state, &up, &world, &tuning, DT);
        }
        assert_eq!(state.thrust, 1.0);

        let brake = FlightIntent { air_brake: true, ..FlightIntent::default() };
        for _ in 0..30 {
            state = advance_flight(&state, &brake, &world, &tuning, DT);
        }
        assert_eq!(state.thrust, 0.0);
    }

    #[test]
    fn speed_and_altitude_are_capped() {
        let tuning = FlightTuning::default();
        let world = CollisionWorld::new();

        let mut state = level(tuning.max_altitude - 1.0, -200.0, 1.0);
        state.velocity.y = 100.0;
        state = advance_flight(&state, &FlightIntent::default(), &world, &tuning, DT);

        assert!(state.velocity.norm() <= tuning.max_speed + 1e-3);
        assert!(state.position.y <= tuning.max_altitude);
    }

    #[test]
    fn full_thrust_flies_along_negative_x() {
        let tuning = FlightTuning::default();
        let world = CollisionWorld::new();
        let mut state = level(500.0, 0.0, 1.0);
        for _ in 0..60 {
            state = advance_flight(&state, &FlightIntent::default(), &world, &tuning, DT);
        }
        assert!(state.position.x < -10.0);
        assert!(state.velocity.x < 0.0);
    }

    #[test]
    fn yaw_left_swings_the_nose_left() {
        let tuning = FlightTuning::default();
        let world = CollisionWorld::new();
        let left = FlightIntent { yaw_left: true, ..FlightIntent::default() };
        let mut state = level(500.0, -20.0, 0.5);
        for _ in 0..30 {
            state = advance_flight(&state, &left, &world, &tuning, DT);
        }
        assert!(state.forward().z > 0.0);
    }

    #[test]
    fn touching_the_ground_lands_and_freezes() {
        let tuning = FlightTuning::default();
        let world = ground();
        // underside 0.5 above the terrain, sinking
        let mut state = level(1.5, -20.0, 0.0);
        state.velocity.y = -5.0;

        let landed = advance_flight(&state, &FlightIntent::default(), &world, &tuning, DT);
        assert!(landed.landed);
        assert_eq!(landed.velocity, Vector3::zeros());
        assert_eq!(landed.thrust, 0.0);
        assert!((landed.position.y - 1.0).abs() < 1e-3, "underside rests on the terrain");

        let full = FlightIntent { throttle_up: true, ..FlightIntent::default() };
        assert_eq!(advance_flight(&landed, &full, &world, &tuning, DT), landed);
    }

    #[test]
    fn reset_restores_the_initial_flight() {
        let mut sim = FlightSimulation::new(FlightTuning::default()).unwrap();
        sim.register_static_geometry([StaticMesh::floor("terrain", 0.0, (-10.0, 10.0), (-10.0, 10.0), SurfaceProperties::ROAD)]);
        sim.key_down("ShiftLeft", false);
        for _ in 0..60 {
            sim.advance(DT);
        }
        assert!(sim.state().thrust > 0.5);

        sim.key_down("KeyR", false);
        assert_eq!(sim.state().position, Point3::new(0.0, 200.0, 0.0));
        assert_eq!(sim.state().thrust, 0.5);
        assert_eq!(sim.snapshot().camera_position, [100.0, 250.0, 0.0]);
    }
}
