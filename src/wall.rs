// ==============================================================================
// wall.rs — FORWARD WALL PROBE + BOUNCE / SLIDE RESPONSE
// ------------------------------------------------------------------------------
// One ray along the direction of travel (facing, flipped in reverse), starting
// slightly above the vehicle origin, no longer than carProbeLength.
//
// Classification of the nearest hit:
// - surface not flagged as wall (safety net, decoration) -> ignored
// - |normal.y| above the surface's wall tolerance        -> slope, ignored
// - travel · normal < headOnDot                          -> head-on: bounce
// - otherwise                                            -> glancing: slide
//
// The corrected state is returned directly; the ground resolver and the next
// tick always read the corrected transform, never a stale one.
// ==============================================================================

use nalgebra::{Point3, UnitQuaternion, Vector3};
use tracing::trace;

use crate::collision::{RayCaster, RayHit, RayLayer, SurfaceId};
use crate::tuning::{HandlingProfile, VehicleTuning};
use crate::vehicle::{world_up, VehicleState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WallResponse {
    Bounce,
    Slide,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallContact {
    pub response: WallResponse,
    pub surface_id: SurfaceId,
    pub normal: Vector3<f32>,
    pub distance: f32,
}

/// The ray that was cast this tick, for debug projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallProbe {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
    pub length: f32,
    pub hit: Option<Point3<f32>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WallOutcome {
    pub probe: Option<WallProbe>,
    pub contact: Option<WallContact>,
}

/// Returns the hit normal facing back toward the ray, or `None` if the hit is
/// not a wall for this surface.
fn classify(hit: &RayHit, travel: &Vector3<f32>) -> Option<Vector3<f32>> {
    if !hit.surface.wall {
        return None;
    }

    let normal = if hit.normal.dot(travel) > 0.0 { -hit.normal } else { hit.normal };
    if normal.y.abs() > hit.surface.wall_tolerance {
        return None;
    }
    Some(normal)
}

pub fn resolve_walls<W: RayCaster + ?Sized>(
    state: &VehicleState,
    world: &W,
    tuning: &VehicleTuning,
    handling: &HandlingProfile,
) -> (VehicleState, WallOutcome) {
    if state.speed.abs() < handling.wall_min_speed {
        return (*state, WallOutcome::default());
    }

    let travel = state.facing() * state.speed.signum();
    let origin = state.position + world_up() * handling.wall_probe_lift;
    let hit = world.cast_ray(origin, travel, tuning.car_probe_length, RayLayer::Wall);

    let mut outcome = WallOutcome {
        probe: Some(WallProbe {
            origin,
            direction: travel,
            length: tuning.car_probe_length,
            hit: hit.map(|h| h.point),
        }),
        contact: None,
    };

    let Some(hit) = hit else {
        return (*state, outcome);
    };
    if hit.distance >= tuning.car_probe_length {
        return (*state, outcome);
    }
    let Some(normal) = classify(&hit, &travel) else {
        trace!("wall probe ignored surface {:?} (normal {:?})", hit.surface_id, hit.normal);
        return (*state, outcome);
    };

    let mut next = *state;
    let along = travel.dot(&normal);

    let response = if along < handling.head_on_dot {
        // ----------------------------------------------------------------
        // Head-on: reverse and lose energy, step back out of the wall
        // ----------------------------------------------------------------
        let bounced = -state.speed * tuning.wall_bounce_factor;
        next.speed = bounced.clamp(-handling.max_bounce_speed, handling.max_bounce_speed);
        next.position -= travel * handling.bounce_push_back;
        next.momentum_direction = next.facing();
        WallResponse::Bounce
    } else {
        // ----------------------------------------------------------------
        // Glancing: turn parallel to the wall, scrub speed, step away
        // ----------------------------------------------------------------
        let flat_normal = Vector3::new(normal.x, 0.0, normal.z)
            .try_normalize(1e-6)
            .unwrap_or(normal);
        let tangent = (travel - flat_normal * travel.dot(&flat_normal))
            .try_normalize(1e-6)
            .unwrap_or(travel);

        let desired_facing = tangent * state.speed.signum();
        let current = state.facing();
        let current_flat = Vector3::new(current.x, 0.0, current.z);
        let desired_flat = Vector3::new(desired_facing.x, 0.0, desired_facing.z);
        let turn = UnitQuaternion::rotation_between(&current_flat, &desired_flat)
            .unwrap_or_else(UnitQuaternion::identity);

        next.orientation = turn * state.orientation;
        next.speed = state.speed * handling.glancing_damping;
        next.position += flat_normal * handling.glancing_push_out;
        next.momentum_direction = next.facing();
        WallResponse::Slide
    };

    trace!("wall {:?} on surface {:?}: speed {:.2} -> {:.2}", response, hit.surface_id, state.speed, next.speed);

    outcome.contact = Some(WallContact {
        response,
        surface_id: hit.surface_id,
        normal,
        distance: hit.distance,
    });
    (next, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionWorld, StaticMesh, SurfaceProperties, DEFAULT_WALL_TOLERANCE};
    use crate::tuning::ARCADE;
    use crate::vehicle::yaw_rotation;

    fn world_with(wall: StaticMesh) -> CollisionWorld {
        let mut world = CollisionWorld::new();
        assert!(world.register_static_geometry([wall]).is_empty());
        world
    }

    fn car_at(z: f32, yaw: f32, speed: f32) -> VehicleState {
        let mut state = VehicleState::spawn(Point3::new(0.0, 0.5, z), yaw_rotation(yaw));
        state.speed = speed;
        state
    }

    // barrier across the track at z = -3, facing +Z
    fn cross_wall(surface: SurfaceProperties) -> StaticMesh {
        StaticMesh::wall("barrier", (-10.0, -3.0), (10.0, -3.0), -1.0, 4.0, surface)
    }

    // 0.8 rad slope rising toward -Z, meeting the probe height (y = 1) near
    // z = -2.97; |normal.y| = cos(0.8) ≈ 0.70
    fn steep_slope(surface: SurfaceProperties) -> StaticMesh {
        let t = 0.8f32.tan();
        StaticMesh::new(
            "embankment",
            vec![
                Point3::new(-10.0, -2.0 * t, 0.0),
                Point3::new(10.0, -2.0 * t, 0.0),
                Point3::new(10.0, 8.0 * t, -10.0),
                Point3::new(-10.0, 8.0 * t, -10.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
            surface,
        )
    }

    #[test]
    fn head_on_hit_bounces_with_reduced_speed() {
        let world = world_with(cross_wall(SurfaceProperties::BARRIER));
        let handling = HandlingProfile::default();

        let (next, outcome) = resolve_walls(&car_at(0.0, 0.0, 20.0), &world, &ARCADE, &handling);

        let contact = outcome.contact.expect("wall within probe length");
        assert_eq!(contact.response, WallResponse::Bounce);
        assert!((next.speed - (-20.0 * ARCADE.wall_bounce_factor)).abs() < 1e-5);
        assert!(next.position.z > 0.0);
    }

    #[test]
    fn bounce_speed_is_clamped() {
        let world = world_with(cross_wall(SurfaceProperties::BARRIER));
        let handling = HandlingProfile { max_bounce_speed: 8.0, ..HandlingProfile::default() };
        let tuning = VehicleTuning { wall_bounce_factor: 1.0, ..ARCADE };

        let (next, _) = resolve_walls(&car_at(0.0, 0.0, 20.0), &world, &tuning, &handling);
        assert_eq!(next.speed, -8.0);
    }

    #[test]
    fn glancing_hit_slides_along_the_wall() {
        let world = world_with(cross_wall(SurfaceProperties::BARRIER));
        let handling = HandlingProfile::default();
        // 60° off the wall normal
        let (next, outcome) =
            resolve_walls(&car_at(-1.5, 1.05, 20.0), &world, &ARCADE, &handling);

        assert_eq!(outcome.contact.map(|c| c.response), Some(WallResponse::Slide));
        assert!((next.speed - 20.0 * handling.glancing_damping).abs() < 1e-4);
        assert!(next.facing().z.abs() < 1e-3, "now parallel to the wall");
        assert!(next.facing().x < 0.0, "keeps sliding the way it was going");
    }

    #[test]
    fn slow_vehicles_and_non_walls_are_ignored() {
        let handling = HandlingProfile::default();

        let barrier = world_with(cross_wall(SurfaceProperties::BARRIER));
        let (_, outcome) = resolve_walls(&car_at(0.0, 0.0, 0.5), &barrier, &ARCADE, &handling);
        assert_eq!(outcome, WallOutcome::default());

        let net = world_with(cross_wall(SurfaceProperties::IGNORED));
        let (next, outcome) = resolve_walls(&car_at(0.0, 0.0, 20.0), &net, &ARCADE, &handling);
        assert!(outcome.contact.is_none());
        assert_eq!(next.speed, 20.0);
    }

    #[test]
    fn slopes_beyond_the_wall_tolerance_are_driven_over() {
        let world = world_with(steep_slope(SurfaceProperties::BARRIER));
        let handling = HandlingProfile::default();

        let (next, outcome) = resolve_walls(&car_at(0.0, 0.0, 20.0), &world, &ARCADE, &handling);
        assert!(outcome.probe.and_then(|p| p.hit).is_some(), "the probe reached the slope");
        assert!(outcome.contact.is_none());
        assert_eq!(next.speed, 20.0);
        assert_eq!(next.position, Point3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn raised_wall_tolerance_turns_a_slope_into_a_wall() {
        let world = world_with(steep_slope(SurfaceProperties::SOLID.with_wall_tolerance(0.95)));
        let handling = HandlingProfile::default();

        let (next, outcome) = resolve_walls(&car_at(0.0, 0.0, 20.0), &world, &ARCADE, &handling);
        let contact = outcome.contact.expect("slope counted as a wall");
        assert!(contact.normal.y.abs() > DEFAULT_WALL_TOLERANCE);
        assert_eq!(contact.response, WallResponse::Slide);
        assert!(next.speed.abs() < 20.0);
    }

    #[test]
    fn reversing_probes_behind() {
        let world = world_with(cross_wall(SurfaceProperties::BARRIER));
        let handling = HandlingProfile::default();

        // facing +Z (yaw = π) and reversing toward the wall at z = -3
        let (next, outcome) =
            resolve_walls(&car_at(0.0, std::f32::consts::PI, -10.0), &world, &ARCADE, &handling);
        assert_eq!(outcome.contact.map(|c| c.response), Some(WallResponse::Bounce));
        assert!(next.speed > 0.0);
    }
}
