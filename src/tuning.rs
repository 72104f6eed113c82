// ==============================================================================
// tuning.rs — VEHICLE / RACE / CAMERA CONFIGURATION
// ------------------------------------------------------------------------------
// VehicleTuning holds the parameters every vehicle must declare. None of them
// has a serde default: a missing field is a parse error, never a silent value.
//
// HandlingProfile holds the secondary constants of the arcade model (grip,
// drift, thresholds, blend rates, respawn policy). They have documented
// defaults and are validated like the required tuning.
//
// ControllerConfig bundles vehicle + handling + race + camera and loads from a
// single JSON document.
// ==============================================================================

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::camera::CameraConfig;
use crate::error::ConfigError;
use crate::lap::RaceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VehicleTuning {
    pub max_speed: f32,               // units/s
    pub acceleration: f32,            // units/s²
    pub brake_strength: f32,          // units/s² (also reverse acceleration)
    pub drag: f32,                    // 1/s, exponential coast decay, [0,1]
    pub max_steer: f32,               // rad/s of yaw at full lock
    pub steer_response: f32,          // rad/s the steering angle moves
    pub gravity: f32,                 // units/s²
    pub ride_height: f32,             // clearance above the ground contact
    pub ground_memory_duration: f32,  // s of grace after a ground ray miss
    pub wall_bounce_factor: f32,      // [0,1] fraction of speed kept on head-on hits
    pub car_probe_length: f32,        // forward wall probe distance
}

pub const ARCADE: VehicleTuning = VehicleTuning {
    max_speed: 60.0,
    acceleration: 10.0,
    brake_strength: 20.0,
    drag: 0.3,
    max_steer: 0.8,
    steer_response: 1.5,
    gravity: 30.0,
    ride_height: 0.5,
    ground_memory_duration: 0.3,
    wall_bounce_factor: 0.5,
    car_probe_length: 4.0,
};

pub const HEAVY: VehicleTuning = VehicleTuning {
    max_speed: 35.0,
    acceleration: 5.0,
    brake_strength: 12.0,
    drag: 0.15,
    max_steer: 0.5,
    steer_response: 1.0,
    gravity: 40.0,
    ride_height: 0.9,
    ground_memory_duration: 0.4,
    wall_bounce_factor: 0.2,
    car_probe_length: 6.0,
};

impl VehicleTuning {
    pub const ARCADE: Self = ARCADE;
    pub const HEAVY: Self = HEAVY;

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("maxSpeed", self.max_speed),
            ("acceleration", self.acceleration),
            ("brakeStrength", self.brake_strength),
            ("maxSteer", self.max_steer),
            ("steerResponse", self.steer_response),
            ("gravity", self.gravity),
            ("rideHeight", self.ride_height),
            ("groundMemoryDuration", self.ground_memory_duration),
            ("carProbeLength", self.car_probe_length),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(format!(
                    "vehicle.{name} must be > 0 (got {value})"
                )));
            }
        }

        for (name, value) in [("drag", self.drag), ("wallBounceFactor", self.wall_bounce_factor)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::invalid(format!(
                    "vehicle.{name} must be in [0, 1] (got {value})"
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct HandlingProfile {
    // --- grip / drift ---
    pub grip: f32,                    // per-tick momentum blend while driving
    pub drift_grip: f32,              // per-tick momentum blend while handbraking
    pub drift_steer_multiplier: f32,  // yaw-rate multiplier while handbraking
    pub momentum_snap_speed: f32,     // below this |speed| momentum == facing
    pub min_yaw_speed: f32,           // below this |speed| steering has no effect

    // --- ground ---
    pub probe_lift: f32,              // ground ray starts this far above the vehicle
    pub probe_range: f32,             // ground ray max distance (down and up)
    pub snap_distance: f32,           // max |target height - height| to snap
    pub max_ground_angle: f32,        // rad from world up still rideable
    pub height_snap_rate: f32,        // 1/s, exponential height blend
    pub tilt_rate: f32,               // 1/s, exponential orientation blend
    pub safe_speed: f32,              // min |speed| to accumulate stability
    pub safe_debounce: f32,           // s of stable driving before snapshotting
    pub void_floor: f32,              // y below which the vehicle respawns
    pub respawn_lift: f32,            // raise applied to the restored safe transform

    // --- walls ---
    pub wall_min_speed: f32,          // wall probe is skipped below this |speed|
    pub wall_probe_lift: f32,         // probe origin above the vehicle origin
    pub head_on_dot: f32,             // forward·normal below this is a head-on hit
    pub max_bounce_speed: f32,        // clamp on |speed| after a bounce
    pub bounce_push_back: f32,        // distance pushed back on head-on hits
    pub glancing_damping: f32,        // speed factor kept on glancing hits
    pub glancing_push_out: f32,       // distance pushed out along the wall normal

    // --- tick ---
    pub max_tick: f32,                // s, upper bound on a single step
}

impl Default for HandlingProfile {
    fn default() -> Self {
        Self {
            grip: 0.8,
            drift_grip: 0.1,
            drift_steer_multiplier: 2.0,
            momentum_snap_speed: 5.0,
            min_yaw_speed: 0.01,

            probe_lift: 2.0,
            probe_range: 6.0,
            snap_distance: 1.5,
            max_ground_angle: 1.0,
            height_snap_rate: 12.0,
            tilt_rate: 8.0,
            safe_speed: 2.0,
            safe_debounce: 1.0,
            void_floor: -10.0,
            respawn_lift: 2.0,

            wall_min_speed: 1.0,
            wall_probe_lift: 0.5,
            head_on_dot: -0.8,
            max_bounce_speed: 15.0,
            bounce_push_back: 0.5,
            glancing_damping: 0.4,
            glancing_push_out: 0.3,

            max_tick: 0.05,
        }
    }
}

impl HandlingProfile {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("grip", self.grip),
            ("driftGrip", self.drift_grip),
            ("glancingDamping", self.glancing_damping),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::invalid(format!(
                    "handling.{name} must be in (0, 1] (got {value})"
                )));
            }
        }

        for (name, value) in [
            ("driftSteerMultiplier", self.drift_steer_multiplier),
            ("probeRange", self.probe_range),
            ("snapDistance", self.snap_distance),
            ("maxGroundAngle", self.max_ground_angle),
            ("heightSnapRate", self.height_snap_rate),
            ("tiltRate", self.tilt_rate),
            ("safeDebounce", self.safe_debounce),
            ("maxBounceSpeed", self.max_bounce_speed),
            ("maxTick", self.max_tick),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(format!(
                    "handling.{name} must be > 0 (got {value})"
                )));
            }
        }

        for (name, value) in [
            ("momentumSnapSpeed", self.momentum_snap_speed),
            ("minYawSpeed", self.min_yaw_speed),
            ("probeLift", self.probe_lift),
            ("safeSpeed", self.safe_speed),
            ("respawnLift", self.respawn_lift),
            ("wallMinSpeed", self.wall_min_speed),
            ("wallProbeLift", self.wall_probe_lift),
            ("bouncePushBack", self.bounce_push_back),
            ("glancingPushOut", self.glancing_push_out),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(format!(
                    "handling.{name} must be >= 0 (got {value})"
                )));
            }
        }

        if !(-1.0..=0.0).contains(&self.head_on_dot) {
            return Err(ConfigError::invalid(format!(
                "handling.headOnDot must be in [-1, 0] (got {})",
                self.head_on_dot
            )));
        }
        if !self.void_floor.is_finite() {
            return Err(ConfigError::invalid("handling.voidFloor must be finite"));
        }
        if self.safe_debounce < 1.0 {
            return Err(ConfigError::invalid(format!(
                "handling.safeDebounce must be >= 1 s (got {})",
                self.safe_debounce
            )));
        }

        Ok(())
    }
}

/// Everything needed to build a drive simulation, as read from disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ControllerConfig {
    pub vehicle: VehicleTuning,
    #[serde(default)]
    pub handling: HandlingProfile,
    pub race: RaceConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    pub spawn: SpawnConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpawnConfig {
    pub position: [f32; 3],
    #[serde(default)]
    pub yaw: f32,                     // rad about world up, 0 faces -Z
}

impl ControllerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.vehicle.validate()?;
        self.handling.validate()?;
        self.race.validate()?;
        self.camera.validate()?;
        if !self.spawn.position.iter().all(|c| c.is_finite()) || !self.spawn.yaw.is_finite() {
            return Err(ConfigError::invalid("spawn transform must be finite"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "vehicle": {
            "maxSpeed": 60, "acceleration": 10, "brakeStrength": 20, "drag": 0.3,
            "maxSteer": 0.8, "steerResponse": 1.5, "gravity": 30, "rideHeight": 0.5,
            "groundMemoryDuration": 0.3, "wallBounceFactor": 0.5, "carProbeLength": 4
        },
        "race": {
            "lapCount": 3,
            "minLapSeconds": 5,
            "checkpoints": [
                { "position": [4, 10, 80], "rotationYaw": 0, "halfWidth": 8, "thickness": 2, "isFinish": true }
            ]
        },
        "spawn": { "position": [0, 30, 180] }
    }"#;

    #[test]
    fn presets_are_valid() {
        assert!(ARCADE.validate().is_ok());
        assert!(HEAVY.validate().is_ok());
        assert!(HandlingProfile::default().validate().is_ok());
    }

    #[test]
    fn parses_minimal_document_with_defaults_for_secondary_sections() {
        let config: ControllerConfig = serde_json::from_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.vehicle, ARCADE);
        assert_eq!(config.handling, HandlingProfile::default());
        assert_eq!(config.race.checkpoints.len(), 1);
        assert_eq!(config.spawn.position, [0.0, 30.0, 180.0]);
    }

    #[test]
    fn missing_tuning_parameter_is_a_parse_error() {
        let broken = MINIMAL.replace(r#""gravity": 30, "#, "");
        let err = serde_json::from_str::<ControllerConfig>(&broken).unwrap_err();
        assert!(err.to_string().contains("gravity"));
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let mut tuning = ARCADE;
        tuning.max_speed = 0.0;
        assert!(matches!(tuning.validate(), Err(ConfigError::Validation(msg)) if msg.contains("maxSpeed")));

        let mut tuning = ARCADE;
        tuning.wall_bounce_factor = 1.5;
        assert!(tuning.validate().is_err());

        let handling = HandlingProfile { safe_debounce: 0.5, ..HandlingProfile::default() };
        assert!(handling.validate().is_err());
    }

    #[test]
    fn load_reports_io_errors_with_path() {
        let err = ControllerConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
