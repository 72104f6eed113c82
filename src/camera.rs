// ==============================================================================
// camera.rs — CHASE / ATTACHED CAMERA RIG
// ------------------------------------------------------------------------------
// Chase:
//   offset = spherical(radius, polar, azimuth) in vehicle space
//            x = r·sin(polar)·sin(azimuth)
//            y = r·cos(polar)
//            z = r·sin(polar)·cos(azimuth)     (+Z is behind the vehicle)
//   desired = vehicle.position + vehicle.orientation * offset
//   camera  = lerp(camera, desired, chaseLerp)  -- per tick, factor clamped to
//             [0, 1], >= 1 snaps
//   look-at = vehicle.position + lookAtOffset
//
// Attached (hood / cockpit):
//   camera  = vehicle.position + vehicle.orientation * offset, no smoothing
//   look-at = same offset pushed lookAhead units along the vehicle's facing
//
// The rig never feeds back into the simulation; it only reads the final
// transform of each tick.
// ==============================================================================

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::vehicle::SafeTransform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    Chase,
    Hood,
    Cockpit,
}

impl CameraMode {
    pub fn is_attached(self) -> bool {
        !matches!(self, CameraMode::Chase)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CameraConfig {
    // --- chase sphere ---
    pub radius: f32,
    pub polar: f32,                   // rad from vehicle up
    pub azimuth: f32,                 // rad about vehicle up, 0 = straight behind
    pub min_radius: f32,
    pub max_radius: f32,
    pub min_polar: f32,
    pub max_polar: f32,

    // --- pointer ---
    pub pointer_speed: f32,           // rad per pixel dragged
    pub zoom_factor: f32,             // units per scroll delta

    pub chase_lerp: f32,              // per-tick blend, >= 1 snaps
    pub look_at_offset: [f32; 3],

    // --- attached ---
    pub hood_offset: [f32; 3],        // vehicle space
    pub cockpit_offset: [f32; 3],     // vehicle space
    pub look_ahead: f32,

    /// Modes the vehicle model offers, cycled in order by the toggle.
    pub modes: Vec<CameraMode>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            radius: 8.0,
            polar: 42f32.to_radians(),
            azimuth: 0.0,
            min_radius: 4.0,
            max_radius: 20.0,
            min_polar: 20f32.to_radians(),
            max_polar: 70f32.to_radians(),

            pointer_speed: 0.0055,
            zoom_factor: 0.004,

            chase_lerp: 0.12,
            look_at_offset: [0.0, 1.5, 0.0],

            hood_offset: [0.0, 1.4, -1.2],
            cockpit_offset: [-0.35, 1.1, 0.2],
            look_ahead: 10.0,

            modes: vec![CameraMode::Chase, CameraMode::Hood],
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=3).contains(&self.modes.len()) {
            return Err(ConfigError::invalid(format!(
                "camera.modes must list 2 or 3 modes (got {})",
                self.modes.len()
            )));
        }
        for (i, mode) in self.modes.iter().enumerate() {
            if self.modes[..i].contains(mode) {
                return Err(ConfigError::invalid(format!("camera.modes lists {mode:?} twice")));
            }
        }

        if !(self.min_radius > 0.0 && self.min_radius <= self.max_radius) {
            return Err(ConfigError::invalid(format!(
                "camera radius limits must satisfy 0 < minRadius <= maxRadius (got {}, {})",
                self.min_radius, self.max_radius
            )));
        }
        if !(self.min_polar >= 0.0 && self.min_polar <= self.max_polar && self.max_polar <= std::f32::consts::PI) {
            return Err(ConfigError::invalid(format!(
                "camera polar limits must satisfy 0 <= minPolar <= maxPolar <= π (got {}, {})",
                self.min_polar, self.max_polar
            )));
        }
        if !(self.chase_lerp.is_finite() && self.chase_lerp >= 0.0) {
            return Err(ConfigError::invalid(format!(
                "camera.chaseLerp must be finite and >= 0 (got {})",
                self.chase_lerp
            )));
        }

        let scalars = [self.radius, self.polar, self.azimuth, self.pointer_speed, self.zoom_factor, self.look_ahead];
        let vectors = [self.look_at_offset, self.hood_offset, self.cockpit_offset];
        if !scalars.iter().chain(vectors.iter().flatten()).all(|v| v.is_finite()) {
            return Err(ConfigError::invalid("camera parameters must be finite"));
        }
        Ok(())
    }
}

fn vec3(v: [f32; 3]) -> Vector3<f32> {
    Vector3::new(v[0], v[1], v[2])
}

#[derive(Debug, Clone)]
pub struct CameraRig {
    config: CameraConfig,
    mode_index: usize,

    radius: f32,
    polar: f32,
    azimuth: f32,

    position: Point3<f32>,
    look_at: Point3<f32>,
    needs_snap: bool,                 // first update after construction / reset
}

impl CameraRig {
    pub fn new(config: CameraConfig) -> Self {
        let radius = config.radius.clamp(config.min_radius, config.max_radius);
        let polar = config.polar.clamp(config.min_polar, config.max_polar);
        let azimuth = config.azimuth;
        Self {
            config,
            mode_index: 0,
            radius,
            polar,
            azimuth,
            position: Point3::origin(),
            look_at: Point3::origin(),
            needs_snap: true,
        }
    }

    pub fn mode(&self) -> CameraMode {
        self.config.modes.get(self.mode_index).copied().unwrap_or(CameraMode::Chase)
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn look_at(&self) -> Point3<f32> {
        self.look_at
    }

    pub fn spherical(&self) -> (f32, f32, f32) {
        (self.radius, self.polar, self.azimuth)
    }

    pub fn cycle_mode(&mut self) -> CameraMode {
        self.mode_index = (self.mode_index + 1) % self.config.modes.len().max(1);
        self.needs_snap = true;
        self.mode()
    }

    /// Jump straight to the desired position on the next update (teleports).
    pub fn snap(&mut self) {
        self.needs_snap = true;
    }

    /// Pointer drag in pixels.
    pub fn pointer_drag(&mut self, dx: f32, dy: f32) {
        self.azimuth -= dx * self.config.pointer_speed;
        self.polar = (self.polar + dy * self.config.pointer_speed).clamp(self.config.min_polar, self.config.max_polar);
    }

    /// Scroll wheel delta (positive zooms out).
    pub fn scroll(&mut self, delta: f32) {
        self.radius = (self.radius + delta * self.config.zoom_factor).clamp(self.config.min_radius, self.config.max_radius);
    }

    /// Restore the configured chase sphere and snap on the next update.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    fn chase_offset(&self) -> Vector3<f32> {
        let (sin_p, cos_p) = self.polar.sin_cos();
        let (sin_a, cos_a) = self.azimuth.sin_cos();
        Vector3::new(
            self.radius * sin_p * sin_a,
            self.radius * cos_p,
            self.radius * sin_p * cos_a,
        )
    }

    pub fn update(&mut self, vehicle: &SafeTransform) {
        match self.mode() {
            CameraMode::Chase => {
                let desired = vehicle.position + vehicle.orientation * self.chase_offset();
                let t = self.config.chase_lerp.clamp(0.0, 1.0);
                self.position = if self.needs_snap || t >= 1.0 {
                    desired
                } else {
                    self.position + (desired - self.position) * t
                };
                self.look_at = vehicle.position + vec3(self.config.look_at_offset);
            }
            mode => {
                let offset = match mode {
                    CameraMode::Cockpit => vec3(self.config.cockpit_offset),
                    _ => vec3(self.config.hood_offset),
                };
                let ahead = offset - Vector3::z() * self.config.look_ahead;
                self.position = vehicle.position + vehicle.orientation * offset;
                self.look_at = vehicle.position + vehicle.orientation * ahead;
            }
        }
        self.needs_snap = false;
    }
}
