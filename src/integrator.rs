// ==============================================================================
// integrator.rs — LONGITUDINAL + LATERAL STEP (ARCADE)
// ==============================================================================
// Responsibilities:
// - intents -> new speed (accelerate / brake-reverse / exponential coast drag)
// - intents -> new steering angle (rate limited toward ±maxSteer or 0)
// - steering -> yaw about world up, sign follows speed (natural reverse)
// - momentum direction chases facing at `grip` per tick (drift when low)
// - tentative translation = momentum * speed * dt
//
// Speed is clamped to [-maxSpeed/2, maxSpeed]: reverse tops out at half speed.
// The drift multiplier scales the yaw RATE, never the stored steering angle,
// so |steering_angle| <= maxSteer holds on every tick.
// ==============================================================================

use nalgebra::{UnitQuaternion, Vector3};

use crate::input::DriveIntent;
use crate::tuning::{HandlingProfile, VehicleTuning};
use crate::vehicle::{facing, VehicleState};

#[inline]
fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_delta {
        target
    } else {
        current + max_delta.copysign(delta)
    }
}

pub fn update_speed(speed: f32, intent: &DriveIntent, tuning: &VehicleTuning, dt: f32) -> f32 {
    let next = if intent.accelerate {
        speed + tuning.acceleration * dt
    } else if intent.brake {
        speed - tuning.brake_strength * dt
    } else {
        speed * (1.0 - tuning.drag * dt).max(0.0)
    };

    next.clamp(-tuning.max_speed * 0.5, tuning.max_speed)
}

pub fn update_steering(angle: f32, intent: &DriveIntent, tuning: &VehicleTuning, dt: f32) -> f32 {
    // held turn -> full lock, released -> relax to center, same rate both ways
    let target = intent.steer_axis() * tuning.max_steer;
    move_towards(angle, target, tuning.steer_response * dt).clamp(-tuning.max_steer, tuning.max_steer)
}

/// Yaw change for this tick. Zero below the minimum speed (a parked car does
/// not spin in place); inverted in reverse.
pub fn yaw_delta(
    steering_angle: f32,
    speed: f32,
    drift: bool,
    handling: &HandlingProfile,
    dt: f32,
) -> f32 {
    if speed.abs() <= handling.min_yaw_speed {
        return 0.0;
    }

    let rate = if drift {
        steering_angle * handling.drift_steer_multiplier
    } else {
        steering_angle
    };

    rate * speed.signum() * dt
}

/// Blend the momentum direction toward the facing direction.
pub fn blend_momentum(
    momentum: Vector3<f32>,
    facing: Vector3<f32>,
    speed: f32,
    grip: f32,
    handling: &HandlingProfile,
) -> Vector3<f32> {
    if speed.abs() < handling.momentum_snap_speed {
        return facing;
    }

    momentum
        .lerp(&facing, grip.clamp(0.0, 1.0))
        .try_normalize(1e-6)
        .unwrap_or(facing)
}

/// Advance speed, steering, heading and momentum, and move the vehicle to its
/// tentative position. Ground and walls are resolved afterwards.
pub fn integrate(
    state: &VehicleState,
    intent: &DriveIntent,
    tuning: &VehicleTuning,
    handling: &HandlingProfile,
    dt: f32,
) -> VehicleState {
    let mut next = *state;

    next.speed = update_speed(state.speed, intent, tuning, dt);
    next.steering_angle = update_steering(state.steering_angle, intent, tuning, dt);

    let yaw = yaw_delta(next.steering_angle, next.speed, intent.drift, handling, dt);
    if yaw != 0.0 {
        let turn = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw);
        next.orientation = turn * next.orientation;
    }

    let grip = if intent.drift { handling.drift_grip } else { handling.grip };
    next.momentum_direction = blend_momentum(
        state.momentum_direction,
        facing(&next.orientation),
        next.speed,
        grip,
        handling,
    );

    next.position += next.momentum_direction * next.speed * dt;
    next
}
