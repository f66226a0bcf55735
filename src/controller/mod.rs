//! Operator input subsystem
//!
//! Everything the robot knows about the human driver flows through the
//! [`InputDevice`] trait:
//!
//! 1. [`input_device`] - State snapshot types, the trait itself and a scripted device
//! 2. [`gamepad`] - gilrs backed gamepad bound to a port index
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► gilrs events ──► GamepadInput ──► ControllerState ──► Robot::teleop_tick
//! ```
//!
//! Polling never blocks: pending gilrs events are drained once per tick and
//! the latest axis values are folded into a snapshot.

pub mod gamepad;
pub mod input_device;

pub use gamepad::GamepadInput;
pub use input_device::{
    apply_deadzone, ButtonType, ControllerState, InputDevice, OpenInput, ScriptedInput,
    StickAxis,
};

/// Errors raised while bringing up an input backend
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// gilrs could not open the platform input API
    #[error("Failed to initialize gamepad backend: {0}")]
    InitializationError(String),

    /// Deadzone outside of `[0, 1)`
    #[error("Invalid deadzone: {0}")]
    InvalidDeadzone(f32),
}
