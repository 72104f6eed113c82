// ==============================================================================
// input.rs — KEY EVENTS -> PERSISTENT INTENTS
// ------------------------------------------------------------------------------
// The host forwards raw key-down / key-up events (DOM-style codes such as
// "KeyW" or "ArrowUp"). The sampler keeps one boolean per logical intent and
// hands out a DriveIntent / FlightIntent snapshot each tick.
//
// Held intents are level-triggered and repeat events are harmless. Toggle
// actions (camera cycle, reset) are edge-triggered and ignore repeats.
// Unknown codes are ignored.
// ==============================================================================

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    // --- driving ---
    Accelerate,
    Brake,
    SteerLeft,
    SteerRight,
    Drift,

    // --- flying ---
    PitchDown,
    PitchUp,
    RollLeft,
    RollRight,
    YawLeft,
    YawRight,
    ThrottleUp,
    ThrottleDown,
    AirBrake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleAction {
    CycleCamera,
    Reset,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveIntent {
    pub accelerate: bool,
    pub brake: bool,
    pub steer_left: bool,
    pub steer_right: bool,
    pub drift: bool,
}

impl DriveIntent {
    pub const IDLE: Self = Self {
        accelerate: false,
        brake: false,
        steer_left: false,
        steer_right: false,
        drift: false,
    };

    /// -1 (right) .. 1 (left); both held cancel out.
    pub fn steer_axis(&self) -> f32 {
        match (self.steer_left, self.steer_right) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlightIntent {
    pub pitch_down: bool,
    pub pitch_up: bool,
    pub roll_left: bool,
    pub roll_right: bool,
    pub yaw_left: bool,
    pub yaw_right: bool,
    pub throttle_up: bool,
    pub throttle_down: bool,
    pub air_brake: bool,
}

#[derive(Debug, Clone)]
pub struct KeyBindings {
    held: HashMap<&'static str, Vec<Intent>>,
    toggles: HashMap<&'static str, ToggleAction>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use Intent::*;

        // One physical key may drive both a car intent and a plane intent;
        // only the active simulation reads its own set.
        let held: HashMap<&'static str, Vec<Intent>> = [
            ("KeyW", vec![Accelerate, PitchDown]),
            ("ArrowUp", vec![Accelerate]),
            ("KeyS", vec![Brake, PitchUp]),
            ("ArrowDown", vec![Brake]),
            ("KeyA", vec![SteerLeft, RollLeft]),
            ("ArrowLeft", vec![SteerLeft]),
            ("KeyD", vec![SteerRight, RollRight]),
            ("ArrowRight", vec![SteerRight]),
            ("Space", vec![Drift, AirBrake]),
            ("KeyQ", vec![YawLeft]),
            ("KeyE", vec![YawRight]),
            ("ShiftLeft", vec![ThrottleUp]),
            ("ShiftRight", vec![ThrottleUp]),
            ("ControlLeft", vec![ThrottleDown]),
            ("ControlRight", vec![ThrottleDown]),
        ]
        .into_iter()
        .collect();

        let toggles = [("KeyC", ToggleAction::CycleCamera), ("KeyR", ToggleAction::Reset)]
            .into_iter()
            .collect();

        Self { held, toggles }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputSampler {
    bindings: KeyBindings,
    pressed: HashMap<&'static str, bool>,
    active: HashSet<Intent>,
}

impl InputSampler {
    pub fn new(bindings: KeyBindings) -> Self {
        Self { bindings, ..Self::default() }
    }

    /// Returns a toggle action on its first (non-repeat) press.
    pub fn key_down(&mut self, code: &str, repeat: bool) -> Option<ToggleAction> {
        if let Some((&key, &action)) = self.bindings.toggles.get_key_value(code) {
            let was_down = self.pressed.insert(key, true).unwrap_or(false);
            return (!repeat && !was_down).then_some(action);
        }

        let (&key, _) = self.bindings.held.get_key_value(code)?;
        self.pressed.insert(key, true);
        self.rebuild();
        None
    }

    pub fn key_up(&mut self, code: &str) {
        if let Some(down) = self.pressed.get_mut(code) {
            *down = false;
            self.rebuild();
        }
    }

    /// Forget every held key (focus loss, session reset).
    pub fn clear(&mut self) {
        self.pressed.clear();
        self.active.clear();
    }

    pub fn is_active(&self, intent: Intent) -> bool {
        self.active.contains(&intent)
    }

    pub fn drive_intent(&self) -> DriveIntent {
        DriveIntent {
            accelerate: self.is_active(Intent::Accelerate),
            brake: self.is_active(Intent::Brake),
            steer_left: self.is_active(Intent::SteerLeft),
            steer_right: self.is_active(Intent::SteerRight),
            drift: self.is_active(Intent::Drift),
        }
    }

    pub fn flight_intent(&self) -> FlightIntent {
        FlightIntent {
            pitch_down: self.is_active(Intent::PitchDown),
            pitch_up: self.is_active(Intent::PitchUp),
            roll_left: self.is_active(Intent::RollLeft),
            roll_right: self.is_active(Intent::RollRight),
            yaw_left: self.is_active(Intent::YawLeft),
            yaw_right: self.is_active(Intent::YawRight),
            throttle_up: self.is_active(Intent::ThrottleUp),
            throttle_down: self.is_active(Intent::ThrottleDown),
            air_brake: self.is_active(Intent::AirBrake),
        }
    }

    // several keys can map to one intent (KeyW + ArrowUp), so intents are
    // recomputed from the full key set rather than toggled per event
    fn rebuild(&mut self) {
        self.active = self
            .pressed
            .iter()
            .filter(|(_, down)| **down)
            .filter_map(|(code, _)| self.bindings.held.get(code))
            .flatten()
            .copied()
            .collect();
    }
}
