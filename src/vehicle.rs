// ==============================================================================
// vehicle.rs — KINEMATIC VEHICLE STATE
// ------------------------------------------------------------------------------
// Plain data, advanced once per tick by controller::advance(). Nothing in here
// talks to the collision world or the presentation layer.
//
// Conventions:
// - world up is +Y
// - the vehicle faces local -Z (forward = orientation * -Z)
// - speed is signed along the facing direction, positive = forward
// ==============================================================================

use nalgebra::{Point3, UnitQuaternion, Vector3};

#[inline]
pub fn world_up() -> Vector3<f32> {
    Vector3::y()
}

/// Facing direction of an orientation (local -Z in world space).
#[inline]
pub fn facing(orientation: &UnitQuaternion<f32>) -> Vector3<f32> {
    orientation * -Vector3::z()
}

/// Orientation facing `yaw` radians counter-clockwise (seen from above) from -Z.
#[inline]
pub fn yaw_rotation(yaw: f32) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafeTransform {
    pub position: Point3<f32>,
    pub orientation: UnitQuaternion<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub position: Point3<f32>,             // world space, authoritative
    pub orientation: UnitQuaternion<f32>,  // world space
    pub speed: f32,                        // signed, along facing
    pub steering_angle: f32,               // signed, |x| <= maxSteer
    pub momentum_direction: Vector3<f32>,  // unit, lags facing while drifting
    pub vertical_velocity: f32,            // free-fall component, units/s

    // --- ground follow ---
    pub is_grounded: bool,
    pub ground_memory_remaining: f32,      // s
    pub last_valid_ground_height: Option<f32>,
    pub stable_time: f32,                  // s grounded + moving, debounce for safe snapshots
    pub last_safe_transform: SafeTransform,
}

impl VehicleState {
    pub fn spawn(position: Point3<f32>, orientation: UnitQuaternion<f32>) -> Self {
        Self {
            position,
            orientation,
            speed: 0.0,
            steering_angle: 0.0,
            momentum_direction: facing(&orientation),
            vertical_velocity: 0.0,
            is_grounded: false,
            ground_memory_remaining: 0.0,
            last_valid_ground_height: None,
            stable_time: 0.0,
            last_safe_transform: SafeTransform { position, orientation },
        }
    }

    pub fn facing(&self) -> Vector3<f32> {
        facing(&self.orientation)
    }

    pub fn transform(&self) -> SafeTransform {
        SafeTransform { position: self.position, orientation: self.orientation }
    }

    /// World velocity as driven: momentum * speed plus the free-fall component.
    pub fn velocity(&self) -> Vector3<f32> {
        self.momentum_direction * self.speed + world_up() * self.vertical_velocity
    }

    /// Drop all motion (used by respawn and scripted placement).
    pub fn halt(&mut self) {
        self.speed = 0.0;
        self.steering_angle = 0.0;
        self.vertical_velocity = 0.0;
        self.momentum_direction = self.facing();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn spawn_faces_negative_z_and_is_its_own_safe_point() {
        let state = VehicleState::spawn(Point3::new(0.0, 30.0, 180.0), UnitQuaternion::identity());
        assert!((state.facing() - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-6);
        assert_eq!(state.last_safe_transform.position, state.position);
        assert_eq!(state.momentum_direction, state.facing());
    }

    #[test]
    fn positive_yaw_turns_left() {
        let left = facing(&yaw_rotation(FRAC_PI_2));
        assert!((left - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-5);
    }
}
