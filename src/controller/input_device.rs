//! Controller snapshot types and the input device capability

use super::ControllerError;
use crate::config::ControllerConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Face, shoulder and d-pad buttons of an Xbox style controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ButtonType {
    A,
    B,
    X,
    Y,
    Start,
    Select,
    LeftBumper,
    RightBumper,
    LeftStick,
    RightStick,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    Guide,
}

/// Analog axes exposed by [`ControllerState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StickAxis {
    LeftX,
    LeftY,
    RightX,
    RightY,
    LeftTrigger,
    RightTrigger,
}

/// Snapshot of a controller at one tick
///
/// Stick axes are in `[-1, 1]` with the WPILib sign convention: pushing a
/// stick forward gives a negative Y. Triggers are in `[0, 1]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControllerState {
    pub left_x: f32,
    pub left_y: f32,
    pub right_x: f32,
    pub right_y: f32,
    pub left_trigger: f32,
    pub right_trigger: f32,
    pub held: BTreeSet<ButtonType>,
}

impl ControllerState {
    pub fn axis(&self, axis: StickAxis) -> f32 {
        match axis {
            StickAxis::LeftX => self.left_x,
            StickAxis::LeftY => self.left_y,
            StickAxis::RightX => self.right_x,
            StickAxis::RightY => self.right_y,
            StickAxis::LeftTrigger => self.left_trigger,
            StickAxis::RightTrigger => self.right_trigger,
        }
    }

    pub fn set_axis(&mut self, axis: StickAxis, value: f32) {
        let slot = match axis {
            StickAxis::LeftX => &mut self.left_x,
            StickAxis::LeftY => &mut self.left_y,
            StickAxis::RightX => &mut self.right_x,
            StickAxis::RightY => &mut self.right_y,
            StickAxis::LeftTrigger => &mut self.left_trigger,
            StickAxis::RightTrigger => &mut self.right_trigger,
        };
        *slot = value;
    }

    pub fn is_held(&self, button: ButtonType) -> bool {
        self.held.contains(&button)
    }

    /// True when every axis is centered and no button is held
    pub fn is_neutral(&self) -> bool {
        self.left_x == 0.0
            && self.left_y == 0.0
            && self.right_x == 0.0
            && self.right_y == 0.0
            && self.left_trigger == 0.0
            && self.right_trigger == 0.0
            && self.held.is_empty()
    }
}

/// A human input device bound to a driver station port
///
/// The robot only reads from it. `poll` takes `&mut self` because real
/// backends have to drain their event queue to produce a fresh snapshot.
pub trait InputDevice {
    /// Port index the device was constructed with
    fn port(&self) -> u32;

    /// Current controller state, never blocks
    fn poll(&mut self) -> ControllerState;
}

/// Input devices that can be opened from the controller config section
pub trait OpenInput: InputDevice + Sized {
    fn open(config: &ControllerConfig) -> Result<Self, ControllerError>;
}

/// In-memory device whose state is set by the caller
///
/// Used by simulation runs without a gamepad and by tests.
#[derive(Clone, Debug, Default)]
pub struct ScriptedInput {
    port: u32,
    state: ControllerState,
}

impl ScriptedInput {
    pub fn new(port: u32) -> Self {
        debug!("Creating scripted input on port {}", port);
        Self {
            port,
            state: ControllerState::default(),
        }
    }

    pub fn set_axis(&mut self, axis: StickAxis, value: f32) {
        self.state.set_axis(axis, value.clamp(-1.0, 1.0));
    }

    pub fn press(&mut self, button: ButtonType) {
        self.state.held.insert(button);
    }

    pub fn release(&mut self, button: ButtonType) {
        self.state.held.remove(&button);
    }

    pub fn set_state(&mut self, state: ControllerState) {
        self.state = state;
    }

    pub fn reset(&mut self) {
        self.state = ControllerState::default();
    }
}

impl InputDevice for ScriptedInput {
    fn port(&self) -> u32 {
        self.port
    }

    fn poll(&mut self) -> ControllerState {
        self.state.clone()
    }
}

impl OpenInput for ScriptedInput {
    fn open(config: &ControllerConfig) -> Result<Self, ControllerError> {
        Ok(Self::new(config.port))
    }
}

// Values inside the deadzone read as zero, the rest is rescaled to the full range
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        sign * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}
