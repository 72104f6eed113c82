// ==============================================================================
// ground.rs — GROUND-FOLLOW RESOLVER (PROBE, SNAP, MEMORY, RESPAWN)
// ------------------------------------------------------------------------------
// Per tick:
//   1) ray straight down from probeLift above the vehicle, nearest hit within
//      probeRange
//   2) no hit -> ray straight up from the vehicle (overpass / tunnel roof)
//   3) classify the hit: surface angle from world up first, then the surface's
//      rideable flag. A rideable hit whose target height (hit.y + rideHeight)
//      is within snapDistance becomes the ground contact:
//        - grounded, memory refilled, vertical velocity zeroed
//        - height blends toward the target, orientation slerps toward the
//          surface normal keeping the projected heading
//   4) no contact -> burn ground memory; while memory lasts, hold the vehicle
//      at the last valid ground height. Once exhausted, free fall.
//   5) below the void floor -> hard respawn at the last safe transform
//
// A free-fall step longer than the snap window is swept: rideable ground the
// vehicle dropped through during the step lands it at ride height instead of
// letting it pass below the floor between two probes.
//
// Safe transforms are only taken while in real contact, above safeSpeed, after
// safeDebounce seconds of uninterrupted stable driving.
// ==============================================================================

use nalgebra::{Point3, UnitQuaternion, Vector3};
use tracing::{debug, info, trace};

use crate::collision::{RayCaster, RayHit, RayLayer, SurfaceId};
use crate::tuning::{HandlingProfile, VehicleTuning};
use crate::vehicle::{world_up, VehicleState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GroundStatus {
    Contact,    // a ray found rideable ground this tick
    Remembered, // ray missed, ground memory still holding the vehicle
    #[default]
    Airborne,
    Respawned,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundContact {
    pub surface_id: SurfaceId,
    pub point: Point3<f32>,
    pub normal: Vector3<f32>, // canonical, upper hemisphere
}

/// One ray cast by the resolver, for debug projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundProbe {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
    pub length: f32,
    pub hit: Option<Point3<f32>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GroundOutcome {
    pub status: GroundStatus,
    pub down: Option<GroundProbe>,
    pub up: Option<GroundProbe>,
    pub sweep: Option<GroundProbe>, // free-fall step, cast only while falling
    pub contact: Option<GroundContact>,
}

#[inline]
fn blend(rate: f32, dt: f32) -> f32 {
    (1.0 - (-rate * dt).exp()).clamp(0.0, 1.0)
}

/// Canonical normal (flipped into the upper hemisphere), or `None` when the
/// surface is too steep or not rideable.
fn classify(hit: &RayHit, handling: &HandlingProfile) -> Option<Vector3<f32>> {
    let normal = if hit.normal.y < 0.0 { -hit.normal } else { hit.normal };
    let angle = normal.dot(&world_up()).clamp(-1.0, 1.0).acos();
    if angle >= handling.max_ground_angle {
        trace!("ground hit on {:?} too steep ({:.2} rad)", hit.surface_id, angle);
        return None;
    }
    if !hit.surface.rideable {
        trace!("ground hit on {:?} excluded", hit.surface_id);
        return None;
    }
    Some(normal)
}

/// Orientation whose up axis is `normal` and whose facing is the current
/// facing projected onto the surface plane.
fn surface_aligned(orientation: &UnitQuaternion<f32>, normal: &Vector3<f32>) -> Option<UnitQuaternion<f32>> {
    let facing = orientation * -Vector3::z();
    let projected = (facing - normal * facing.dot(normal)).try_normalize(1e-6)?;
    // face_towards maps local +Z onto its direction; the vehicle faces -Z
    Some(UnitQuaternion::face_towards(&-projected, normal))
}

/// Contact bookkeeping shared by the probe and the fall sweep. Height is left
/// to the caller.
fn settle_on(
    next: &mut VehicleState,
    contact: &GroundContact,
    tuning: &VehicleTuning,
    handling: &HandlingProfile,
    dt: f32,
) {
    next.is_grounded = true;
    next.ground_memory_remaining = tuning.ground_memory_duration;
    next.vertical_velocity = 0.0;
    next.last_valid_ground_height = Some(contact.point.y);

    if let Some(aligned) = surface_aligned(&next.orientation, &contact.normal) {
        let t = blend(handling.tilt_rate, dt);
        next.orientation = next.orientation.try_slerp(&aligned, t, 1e-6).unwrap_or(aligned);
    }

    // safe-transform debounce
    if next.speed.abs() > handling.safe_speed {
        next.stable_time += dt;
        if next.stable_time >= handling.safe_debounce {
            next.last_safe_transform = next.transform();
        }
    } else {
        next.stable_time = 0.0;
    }
}

/// Rideable ground whose ride height lies between where a falling vehicle
/// started this step (`from`) and where it ended (`to_y`).
fn sweep_fall<W: RayCaster + ?Sized>(
    from: Point3<f32>,
    to_y: f32,
    world: &W,
    tuning: &VehicleTuning,
    handling: &HandlingProfile,
    outcome: &mut GroundOutcome,
) -> Option<GroundContact> {
    let drop = from.y - to_y;
    if !(drop > 0.0) {
        return None;
    }

    let length = drop + tuning.ride_height;
    let hit = world.cast_ray(from, -world_up(), length, RayLayer::Ground);
    outcome.sweep = Some(GroundProbe {
        origin: from,
        direction: -world_up(),
        length,
        hit: hit.map(|h| h.point),
    });

    let hit = hit?;
    let normal = classify(&hit, handling)?;
    let target = hit.point.y + tuning.ride_height;
    if target < to_y || target > from.y {
        return None;
    }
    debug!("fall of {:.2} swept onto {:?} at y={:.2}", drop, hit.surface_id, hit.point.y);
    Some(GroundContact { surface_id: hit.surface_id, point: hit.point, normal })
}

fn respawn(state: &VehicleState, handling: &HandlingProfile) -> VehicleState {
    let safe = state.last_safe_transform;
    let mut next = *state;

    next.position = safe.position + world_up() * handling.respawn_lift;
    next.orientation = safe.orientation;
    next.halt();
    next.is_grounded = false;
    next.ground_memory_remaining = 0.0;
    next.stable_time = 0.0;

    info!(
        "vehicle fell below y={:.1} at ({:.1}, {:.1}, {:.1}); respawning at ({:.1}, {:.1}, {:.1})",
        handling.void_floor,
        state.position.x,
        state.position.y,
        state.position.z,
        next.position.x,
        next.position.y,
        next.position.z,
    );
    next
}

pub fn resolve_ground<W: RayCaster + ?Sized>(
    state: &VehicleState,
    world: &W,
    tuning: &VehicleTuning,
    handling: &HandlingProfile,
    dt: f32,
) -> (VehicleState, GroundOutcome) {
    let mut outcome = GroundOutcome::default();

    if state.position.y < handling.void_floor {
        outcome.status = GroundStatus::Respawned;
        return (respawn(state, handling), outcome);
    }

    // ------------------------------------------------------------------
    // 1) + 2) probes
    // ------------------------------------------------------------------
    let down_origin = state.position + world_up() * handling.probe_lift;
    let down_length = handling.probe_range;
    let down_hit = world.cast_ray(down_origin, -world_up(), down_length, RayLayer::Ground);
    outcome.down = Some(GroundProbe {
        origin: down_origin,
        direction: -world_up(),
        length: down_length,
        hit: down_hit.map(|h| h.point),
    });

    let hit = match down_hit {
        Some(hit) => Some(hit),
        None => {
            let up_hit = world.cast_ray(state.position, world_up(), handling.probe_range, RayLayer::Ground);
            outcome.up = Some(GroundProbe {
                origin: state.position,
                direction: world_up(),
                length: handling.probe_range,
                hit: up_hit.map(|h| h.point),
            });
            up_hit
        }
    };

    // ------------------------------------------------------------------
    // 3) classification + snap window
    // ------------------------------------------------------------------
    let contact = hit.and_then(|hit| {
        let normal = classify(&hit, handling)?;
        let target = hit.point.y + tuning.ride_height;
        if (target - state.position.y).abs() > handling.snap_distance {
            trace!("ground hit on {:?} outside snap window ({:.2})", hit.surface_id, target - state.position.y);
            return None;
        }
        Some(GroundContact { surface_id: hit.surface_id, point: hit.point, normal })
    });

    let mut next = *state;

    if let Some(contact) = contact {
        let target = contact.point.y + tuning.ride_height;
        next.position.y += (target - next.position.y) * blend(handling.height_snap_rate, dt);
        settle_on(&mut next, &contact, tuning, handling, dt);

        outcome.status = GroundStatus::Contact;
        outcome.contact = Some(contact);
        return (next, outcome);
    }

    // ------------------------------------------------------------------
    // 4) memory, then free fall (swept)
    // ------------------------------------------------------------------
    next.ground_memory_remaining = (state.ground_memory_remaining - dt).max(0.0);

    match state.last_valid_ground_height {
        Some(ground_y) if next.ground_memory_remaining > 0.0 => {
            let target = ground_y + tuning.ride_height;
            next.position.y += (target - next.position.y) * blend(handling.height_snap_rate, dt);
            next.vertical_velocity = 0.0;
            next.is_grounded = true;
            outcome.status = GroundStatus::Remembered;
        }
        _ => {
            if state.is_grounded {
                debug!("ground memory exhausted at ({:.1}, {:.1}, {:.1})", state.position.x, state.position.y, state.position.z);
            }
            next.vertical_velocity -= tuning.gravity * dt;
            next.position.y += next.vertical_velocity * dt;
            next.is_grounded = false;
            next.stable_time = 0.0;
            outcome.status = GroundStatus::Airborne;

            if let Some(contact) = sweep_fall(state.position, next.position.y, world, tuning, handling, &mut outcome) {
                next.position.y = contact.point.y + tuning.ride_height;
                settle_on(&mut next, &contact, tuning, handling, dt);
                outcome.status = GroundStatus::Contact;
                outcome.contact = Some(contact);
                return (next, outcome);
            }
        }
    }

    // ------------------------------------------------------------------
    // 5) void floor
    // ------------------------------------------------------------------
    if next.position.y < handling.void_floor {
        outcome.status = GroundStatus::Respawned;
        return (respawn(&next, handling), outcome);
    }

    (next, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionWorld, StaticMesh, SurfaceProperties};
    use crate::tuning::ARCADE;
    use crate::vehicle::{yaw_rotation, SafeTransform};

    const DT: f32 = 1.0 / 60.0;

    fn world_from(meshes: Vec<StaticMesh>) -> CollisionWorld {
        let mut world = CollisionWorld::new();
        assert!(world.register_static_geometry(meshes).is_empty());
        world
    }

    fn flat_ground() -> CollisionWorld {
        world_from(vec![StaticMesh::floor("ground", 0.0, (-100.0, 100.0), (-100.0, 100.0), SurfaceProperties::ROAD)])
    }

    #[test]
    fn snaps_to_ride_height_gradually() {
        let world = flat_ground();
        let handling = HandlingProfile::default();
        let mut state = VehicleState::spawn(Point3::new(0.0, ARCADE.ride_height + 0.01, 0.0), yaw_rotation(0.0));

        let (first, outcome) = resolve_ground(&state, &world, &ARCADE, &handling, DT);
        assert!(first.is_grounded);
        assert_eq!(outcome.status, GroundStatus::Contact);
        assert!(first.position.y > ARCADE.ride_height, "blends, does not teleport");
        assert_eq!(first.ground_memory_remaining, ARCADE.ground_memory_duration);

        state = first;
        for _ in 0..60 {
            state = resolve_ground(&state, &world, &ARCADE, &handling, DT).0;
        }
        assert!((state.position.y - ARCADE.ride_height).abs() < 1e-3);
    }

    #[test]
    fn tilts_toward_a_ramp_normal() {
        // 0.3 rad ramp rising toward -Z
        let (s, c) = (0.3f32.sin(), 0.3f32.cos());
        let ramp = StaticMesh::new(
            "ramp",
            vec![
                Point3::new(-20.0, -20.0 * s, 20.0 * c),
                Point3::new(20.0, -20.0 * s, 20.0 * c),
                Point3::new(20.0, 20.0 * s, -20.0 * c),
                Point3::new(-20.0, 20.0 * s, -20.0 * c),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
            SurfaceProperties::ROAD,
        );
        let world = world_from(vec![ramp]);
        let handling = HandlingProfile::default();
        let mut state = VehicleState::spawn(Point3::new(0.0, ARCADE.ride_height, 0.0), yaw_rotation(0.0));

        for _ in 0..240 {
            state = resolve_ground(&state, &world, &ARCADE, &handling, DT).0;
        }

        let up = state.orientation * Vector3::y();
        assert!((up - Vector3::new(0.0, c, s)).norm() < 1e-2, "up = {up:?}");
        assert!(state.facing().y > 0.0, "nose follows the slope up");
    }

    #[test]
    fn ramps_steeper_than_the_ground_angle_are_not_ground() {
        // 1.2 rad ramp through the origin, rising toward -Z
        let (s, c) = (1.2f32.sin(), 1.2f32.cos());
        let wall_like = StaticMesh::new(
            "cliff",
            vec![
                Point3::new(-20.0, -20.0 * s, 20.0 * c),
                Point3::new(20.0, -20.0 * s, 20.0 * c),
                Point3::new(20.0, 20.0 * s, -20.0 * c),
                Point3::new(-20.0, 20.0 * s, -20.0 * c),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
            SurfaceProperties::ROAD,
        );
        let world = world_from(vec![wall_like]);
        let handling = HandlingProfile::default();
        let mut state = VehicleState::spawn(Point3::new(0.0, ARCADE.ride_height, 0.0), yaw_rotation(0.0));
        state.ground_memory_remaining = 0.0;

        let (next, outcome) = resolve_ground(&state, &world, &ARCADE, &handling, DT);
        assert!(outcome.down.and_then(|p| p.hit).is_some(), "the ray did reach the ramp");
        assert_eq!(outcome.status, GroundStatus::Airborne);
        assert!(outcome.contact.is_none());
        assert!(!next.is_grounded);
    }

    #[test]
    fn long_fall_steps_land_on_the_floor() {
        let world = flat_ground();
        let handling = HandlingProfile::default();
        let dt = handling.max_tick;
        let mut state = VehicleState::spawn(Point3::new(0.0, 80.0, 0.0), yaw_rotation(0.0));

        let mut swept = false;
        for _ in 0..200 {
            let (next, outcome) = resolve_ground(&state, &world, &ARCADE, &handling, dt);
            assert_ne!(outcome.status, GroundStatus::Respawned);
            assert!(next.position.y >= ARCADE.ride_height - 1e-4, "below the floor at y={}", next.position.y);
            swept |= outcome.sweep.is_some_and(|p| p.hit.is_some()) && outcome.status == GroundStatus::Contact;
            state = next;
        }
        assert!(swept, "the fall outran the probe window at least once");
        assert!(state.is_grounded);
        assert!((state.position.y - ARCADE.ride_height).abs() < 1e-3);
    }

    #[test]
    fn ground_memory_bridges_a_gap() {
        let world = world_from(vec![
            StaticMesh::floor("near", 0.0, (-10.0, 10.0), (0.5, 100.0), SurfaceProperties::ROAD),
            StaticMesh::floor("far", 0.0, (-10.0, 10.0), (-100.0, -0.5), SurfaceProperties::ROAD),
        ]);
        let handling = HandlingProfile::default();
        let mut state = VehicleState::spawn(Point3::new(0.0, ARCADE.ride_height, 10.0), yaw_rotation(0.0));
        state.speed = 20.0;

        let mut remembered = 0;
        for _ in 0..60 {
            state.position.z -= state.speed * DT;
            let (next, outcome) = resolve_ground(&state, &world, &ARCADE, &handling, DT);
            assert!(next.is_grounded, "lost ground at z={}", next.position.z);
            assert_ne!(outcome.status, GroundStatus::Respawned);
            if outcome.status == GroundStatus::Remembered {
                remembered += 1;
            }
            state = next;
        }
        assert!(remembered > 0, "the gap was actually crossed");
    }

    #[test]
    fn excluded_surfaces_are_never_ground() {
        let world = world_from(vec![StaticMesh::floor("net", 0.0, (-10.0, 10.0), (-10.0, 10.0), SurfaceProperties::IGNORED)]);
        let handling = HandlingProfile::default();
        let state = VehicleState::spawn(Point3::new(0.0, ARCADE.ride_height, 0.0), yaw_rotation(0.0));

        let (next, outcome) = resolve_ground(&state, &world, &ARCADE, &handling, DT);
        assert_eq!(outcome.status, GroundStatus::Airborne);
        assert!(!next.is_grounded);
        assert!(next.vertical_velocity < 0.0);
    }

    #[test]
    fn overpass_roof_is_found_from_below() {
        // deck just above the vehicle, nothing underneath
        let world = world_from(vec![StaticMesh::floor("deck", 0.8, (-10.0, 10.0), (-10.0, 10.0), SurfaceProperties::ROAD)]);
        let handling = HandlingProfile::default();
        let state = VehicleState::spawn(Point3::new(0.0, 0.0, 0.0), yaw_rotation(0.0));

        // down ray starts above the deck and finds it directly
        let (_, outcome) = resolve_ground(&state, &world, &ARCADE, &handling, DT);
        assert_eq!(outcome.status, GroundStatus::Contact);

        // with no lift the down ray misses and the up ray takes over
        let no_lift = HandlingProfile { probe_lift: 0.0, ..handling };
        let (next, outcome) = resolve_ground(&state, &world, &ARCADE, &no_lift, DT);
        assert!(outcome.up.and_then(|p| p.hit).is_some());
        assert_eq!(outcome.status, GroundStatus::Contact);
        assert!(next.position.y > 0.0);
        assert!(outcome.contact.is_some_and(|c| c.normal.y > 0.0));
    }

    #[test]
    fn falling_into_the_void_respawns_at_the_safe_transform() {
        let world = flat_ground();
        let handling = HandlingProfile::default();
        let mut state = VehicleState::spawn(Point3::new(0.0, -15.0, 0.0), yaw_rotation(0.0));
        state.speed = 25.0;
        state.vertical_velocity = -12.0;
        state.ground_memory_remaining = 0.2;
        state.last_safe_transform = SafeTransform {
            position: Point3::new(3.0, 0.5, -40.0),
            orientation: yaw_rotation(0.5),
        };

        let (next, outcome) = resolve_ground(&state, &world, &ARCADE, &handling, DT);
        assert_eq!(outcome.status, GroundStatus::Respawned);
        assert_eq!(next.position, Point3::new(3.0, 0.5 + handling.respawn_lift, -40.0));
        assert_eq!(next.orientation, yaw_rotation(0.5));
        assert_eq!(next.speed, 0.0);
        assert_eq!(next.vertical_velocity, 0.0);
        assert_eq!(next.ground_memory_remaining, 0.0);
    }

    #[test]
    fn safe_transform_waits_for_stable_driving() {
        let world = flat_ground();
        let handling = HandlingProfile::default();
        let spawn = Point3::new(0.0, ARCADE.ride_height, 50.0);
        let mut state = VehicleState::spawn(spawn, yaw_rotation(0.0));
        state.speed = 10.0;

        let half = (handling.safe_debounce / DT / 2.0) as usize;
        for _ in 0..half {
            state.position.z -= state.speed * DT;
            state = resolve_ground(&state, &world, &ARCADE, &handling, DT).0;
        }
        assert_eq!(state.last_safe_transform.position, spawn);

        for _ in 0..half + 5 {
            state.position.z -= state.speed * DT;
            state = resolve_ground(&state, &world, &ARCADE, &handling, DT).0;
        }
        assert!(state.last_safe_transform.position.z < spawn.z);
    }
}
