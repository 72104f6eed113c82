// ==============================================================================
// lap.rs — CHECKPOINT GATES + LAP TIMER STATE MACHINE
// ------------------------------------------------------------------------------
//   Warmup --(finish gate)--> Running --(last lap done)--> Finished
//
// - The finish gate doubles as the start line: crossing it in Warmup starts the
//   race and zeroes every timer.
// - While Running, only the expected gate advances `next`; anything else is
//   ignored. Crossing the finish gate with every other gate passed completes a
//   lap, unless the lap is shorter than minLapSeconds (rejected, no state
//   change).
// - A gate fires when the vehicle enters it, not on every tick spent inside.
//
// Gate test ("doorframe"): vehicle position in the gate's local frame (inverse
// yaw), |x| < halfWidth && |z| < thickness. Height is not checked.
//
// Time is simulation time accumulated from dt, never wall clock.
// ==============================================================================

use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CheckpointConfig {
    pub position: [f32; 3],
    #[serde(default)]
    pub rotation_yaw: f32,            // rad about world up
    pub half_width: f32,              // across the track
    pub thickness: f32,               // along the track, each side of the plane
    #[serde(default)]
    pub is_finish: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RaceConfig {
    pub lap_count: u32,
    pub min_lap_seconds: f32,
    pub checkpoints: Vec<CheckpointConfig>,
}

impl RaceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.checkpoints.is_empty() {
            return Err(ConfigError::invalid("race.checkpoints must not be empty"));
        }

        let finishes = self.checkpoints.iter().filter(|c| c.is_finish).count();
        if finishes != 1 {
            return Err(ConfigError::invalid(format!(
                "race.checkpoints must contain exactly one finish gate (found {finishes})"
            )));
        }

        for (i, gate) in self.checkpoints.iter().enumerate() {
            if !gate.position.iter().all(|c| c.is_finite()) || !gate.rotation_yaw.is_finite() {
                return Err(ConfigError::invalid(format!("race.checkpoints[{i}] transform must be finite")));
            }
            if !(gate.half_width > 0.0 && gate.thickness > 0.0) {
                return Err(ConfigError::invalid(format!(
                    "race.checkpoints[{i}] halfWidth and thickness must be > 0 (got {}, {})",
                    gate.half_width, gate.thickness
                )));
            }
        }

        if self.lap_count == 0 {
            return Err(ConfigError::invalid("race.lapCount must be >= 1"));
        }
        if !(self.min_lap_seconds.is_finite() && self.min_lap_seconds > 0.0) {
            return Err(ConfigError::invalid(format!(
                "race.minLapSeconds must be > 0 (got {})",
                self.min_lap_seconds
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checkpoint {
    pub position: Point3<f32>,
    pub rotation_yaw: f32,
    pub half_width: f32,
    pub thickness: f32,
    pub is_finish: bool,
    pub passed: bool,                 // cleared every lap
}

impl Checkpoint {
    fn from_config(config: &CheckpointConfig) -> Self {
        let [x, y, z] = config.position;
        Self {
            position: Point3::new(x, y, z),
            rotation_yaw: config.rotation_yaw,
            half_width: config.half_width,
            thickness: config.thickness,
            is_finish: config.is_finish,
            passed: false,
        }
    }

    /// Doorframe containment test.
    pub fn contains(&self, point: &Point3<f32>) -> bool {
        let inverse = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -self.rotation_yaw);
        let local = inverse * (point - self.position);
        local.x.abs() < self.half_width && local.z.abs() < self.thickness
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RacePhase {
    #[default]
    Warmup,
    Running,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RaceEvent {
    RaceStarted,
    CheckpointPassed { index: usize },
    LapCompleted { lap: u32, duration: f32, best: f32 },
    LapRejected { duration: f32 },
    RaceFinished { laps: Vec<f32>, best: f32 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LapTimer {
    pub lap_index: u32,               // completed laps
    pub lap_start: f32,               // race clock at the start of the current lap
    pub best_lap: Option<f32>,
    pub history: Vec<f32>,            // completed lap durations, in order
}

#[derive(Debug, Clone)]
pub struct RaceTracker {
    checkpoints: Vec<Checkpoint>,
    inside: Vec<bool>,
    finish: usize,
    next: usize,

    phase: RacePhase,
    clock: f32,
    timer: LapTimer,

    lap_count: u32,
    min_lap_seconds: f32,
}

impl RaceTracker {
    pub fn new(config: &RaceConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let checkpoints: Vec<Checkpoint> = config.checkpoints.iter().map(Checkpoint::from_config).collect();
        let finish = checkpoints
            .iter()
            .position(|c| c.is_finish)
            .ok_or_else(|| ConfigError::invalid("race.checkpoints has no finish gate"))?;

        Ok(Self {
            inside: vec![false; checkpoints.len()],
            checkpoints,
            finish,
            next: finish,
            phase: RacePhase::Warmup,
            clock: 0.0,
            timer: LapTimer::default(),
            lap_count: config.lap_count,
            min_lap_seconds: config.min_lap_seconds,
        })
    }

    /// Back to Warmup with the same gates.
    pub fn reset(&mut self) {
        for gate in &mut self.checkpoints {
            gate.passed = false;
        }
        self.inside.fill(false);
        self.next = self.finish;
        self.phase = RacePhase::Warmup;
        self.clock = 0.0;
        self.timer = LapTimer::default();
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == RacePhase::Finished
    }

    pub fn lap_index(&self) -> u32 {
        self.timer.lap_index
    }

    pub fn lap_count(&self) -> u32 {
        self.lap_count
    }

    pub fn next_checkpoint(&self) -> usize {
        self.next
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn timer(&self) -> &LapTimer {
        &self.timer
    }

    pub fn current_lap_seconds(&self) -> f32 {
        match self.phase {
            RacePhase::Running => self.clock - self.timer.lap_start,
            RacePhase::Warmup | RacePhase::Finished => 0.0,
        }
    }

    pub fn best_lap(&self) -> Option<f32> {
        self.timer.best_lap
    }

    pub fn lap_history(&self) -> &[f32] {
        &self.timer.history
    }

    fn gate_after(&self, index: usize) -> usize {
        (index + 1) % self.checkpoints.len()
    }

    /// Advance the race clock by `dt` and test the gates against the final
    /// vehicle position of this tick.
    pub fn update(&mut self, position: &Point3<f32>, dt: f32) -> Vec<RaceEvent> {
        let mut events = Vec::new();
        if self.phase == RacePhase::Finished {
            return events;
        }
        if self.phase == RacePhase::Running {
            self.clock += dt;
        }

        for index in 0..self.checkpoints.len() {
            let now_inside = self.checkpoints[index].contains(position);
            let entered = now_inside && !self.inside[index];
            self.inside[index] = now_inside;

            if entered {
                self.on_gate_entered(index, &mut events);
            }
        }
        events
    }

    fn on_gate_entered(&mut self, index: usize, events: &mut Vec<RaceEvent>) {
        match self.phase {
            RacePhase::Warmup => {
                if index != self.finish {
                    return;
                }
                self.clock = 0.0;
                self.timer = LapTimer::default();
                self.checkpoints[self.finish].passed = true;
                self.next = self.gate_after(self.finish);
                self.phase = RacePhase::Running;
                info!("race started ({} laps, {} gates)", self.lap_count, self.checkpoints.len());
                events.push(RaceEvent::RaceStarted);
            }

            RacePhase::Running => {
                if index != self.next {
                    trace!("gate {index} entered out of order (expecting {})", self.next);
                    return;
                }

                if index != self.finish {
                    self.checkpoints[index].passed = true;
                    self.next = self.gate_after(index);
                    debug!("gate {index} passed, next {}", self.next);
                    events.push(RaceEvent::CheckpointPassed { index });
                    return;
                }

                let duration = self.clock - self.timer.lap_start;
                if duration <= self.min_lap_seconds {
                    debug!("lap rejected: {duration:.2}s does not exceed the {:.2}s minimum", self.min_lap_seconds);
                    events.push(RaceEvent::LapRejected { duration });
                    return;
                }
                self.complete_lap(duration, events);
            }

            RacePhase::Finished => {}
        }
    }

    fn complete_lap(&mut self, duration: f32, events: &mut Vec<RaceEvent>) {
        let best = self.timer.best_lap.map_or(duration, |b| b.min(duration));
        self.timer.best_lap = Some(best);
        self.timer.history.push(duration);
        self.timer.lap_index += 1;
        self.timer.lap_start = self.clock;

        for gate in &mut self.checkpoints {
            gate.passed = false;
        }
        self.checkpoints[self.finish].passed = true;
        self.next = self.gate_after(self.finish);

        info!("lap {} completed in {duration:.2}s (best {best:.2}s)", self.timer.lap_index);
        events.push(RaceEvent::LapCompleted { lap: self.timer.lap_index, duration, best });

        if self.timer.lap_index >= self.lap_count {
            self.phase = RacePhase::Finished;
            info!("race finished: laps {:?}, best {best:.2}s", self.timer.history);
            events.push(RaceEvent::RaceFinished { laps: self.timer.history.clone(), best });
        }
    }
}
