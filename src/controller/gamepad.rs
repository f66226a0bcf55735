//! gilrs backed gamepad input
//!
//! Binds to the n-th connected gamepad, where n is the configured port index,
//! the same way a driver station assigns joysticks to USB slots. Every poll
//! drains the pending gilrs events (which also keeps gilrs' cached gamepad
//! state current) and then reads the cached axes and buttons.

use super::input_device::{apply_deadzone, ButtonType, ControllerState, InputDevice, OpenInput};
use super::ControllerError;
use crate::config::ControllerConfig;
use chrono::Local;
use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use tracing::{debug, error, info, warn};

const BUTTONS: [(Button, ButtonType); 15] = [
    (Button::South, ButtonType::A),
    (Button::East, ButtonType::B),
    (Button::West, ButtonType::X),
    (Button::North, ButtonType::Y),
    (Button::Start, ButtonType::Start),
    (Button::Select, ButtonType::Select),
    (Button::LeftTrigger, ButtonType::LeftBumper),
    (Button::RightTrigger, ButtonType::RightBumper),
    (Button::LeftThumb, ButtonType::LeftStick),
    (Button::RightThumb, ButtonType::RightStick),
    (Button::DPadUp, ButtonType::DPadUp),
    (Button::DPadDown, ButtonType::DPadDown),
    (Button::DPadLeft, ButtonType::DPadLeft),
    (Button::DPadRight, ButtonType::DPadRight),
    (Button::Mode, ButtonType::Guide),
];

/// Gamepad on a driver station port
pub struct GamepadInput {
    gilrs: Gilrs,
    port: u32,
    deadzone: f32,
    active: Option<GamepadId>,
}

impl GamepadInput {
    pub fn new(port: u32, deadzone: f32) -> Result<Self, ControllerError> {
        if !(0.0..1.0).contains(&deadzone) {
            return Err(ControllerError::InvalidDeadzone(deadzone));
        }

        info!("Initializing gilrs controller interface for port {}", port);
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(ControllerError::InitializationError(e.to_string()));
            }
        };

        let mut input = Self {
            gilrs,
            port,
            deadzone,
            active: None,
        };
        input.bind_port();
        Ok(input)
    }

    /// Whether a physical gamepad is currently bound to this port
    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }

    fn bind_port(&mut self) {
        let mut ids: Vec<GamepadId> = self.gilrs.gamepads().map(|(id, _)| id).collect();
        ids.sort_by_key(|id| usize::from(*id));

        let previous = self.active;
        self.active = ids.get(self.port as usize).copied();

        match (previous, self.active) {
            (_, Some(id)) if previous != Some(id) => {
                let name = self
                    .gilrs
                    .connected_gamepad(id)
                    .map(|g| g.name().to_string())
                    .unwrap_or_default();
                info!("Port {} bound to gamepad {} ({})", self.port, name, id);
            }
            (Some(_), None) => {
                warn!("Port {} lost its gamepad, reporting neutral input", self.port);
            }
            (None, None) => {
                debug!(
                    "No gamepad for port {} ({} connected)",
                    self.port,
                    ids.len()
                );
            }
            _ => {}
        }
    }

    fn drain_events(&mut self) {
        let mut rebind = false;
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    info!(
                        "Controller {} connected at {}",
                        id,
                        Local::now().format("%H:%M:%S.%3f")
                    );
                    rebind = true;
                }
                EventType::Disconnected => {
                    warn!(
                        "Controller {} disconnected at {}",
                        id,
                        Local::now().format("%H:%M:%S.%3f")
                    );
                    rebind = true;
                }
                EventType::ButtonPressed(button, _) if Some(id) == self.active => {
                    debug!("Button pressed: {:?}", button);
                }
                _ => {}
            }
        }
        if rebind {
            self.bind_port();
        }
    }

    fn stick(&self, value: f32) -> f32 {
        apply_deadzone(value.clamp(-1.0, 1.0), self.deadzone)
    }
}

impl InputDevice for GamepadInput {
    fn port(&self) -> u32 {
        self.port
    }

    fn poll(&mut self) -> ControllerState {
        self.drain_events();

        let Some(gamepad) = self.active.and_then(|id| self.gilrs.connected_gamepad(id)) else {
            return ControllerState::default();
        };

        let trigger = |button: Button| {
            gamepad
                .button_data(button)
                .map(|data| data.value())
                .unwrap_or(0.0)
        };

        // gilrs reports stick-up as positive, the drive code expects forward to be negative
        let mut state = ControllerState {
            left_x: self.stick(gamepad.value(Axis::LeftStickX)),
            left_y: self.stick(-gamepad.value(Axis::LeftStickY)),
            right_x: self.stick(gamepad.value(Axis::RightStickX)),
            right_y: self.stick(-gamepad.value(Axis::RightStickY)),
            left_trigger: trigger(Button::LeftTrigger2).clamp(0.0, 1.0),
            right_trigger: trigger(Button::RightTrigger2).clamp(0.0, 1.0),
            ..Default::default()
        };

        for (button, button_type) in BUTTONS {
            if gamepad.is_pressed(button) {
                state.held.insert(button_type);
            }
        }

        state
    }
}

impl OpenInput for GamepadInput {
    fn open(config: &ControllerConfig) -> Result<Self, ControllerError> {
        Self::new(config.port, config.deadzone)
    }
}
