//! Differential drive kinematics

use serde::{Deserialize, Serialize};

/// Chassis motion request
///
/// Positive `forward_mps` drives forward, positive `rotation_radps` turns
/// counter-clockwise seen from above.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveCommand {
    pub forward_mps: f64,
    pub rotation_radps: f64,
}

impl DriveCommand {
    pub const STOP: DriveCommand = DriveCommand {
        forward_mps: 0.0,
        rotation_radps: 0.0,
    };

    pub fn new(forward_mps: f64, rotation_radps: f64) -> Self {
        Self {
            forward_mps,
            rotation_radps,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.forward_mps == 0.0 && self.rotation_radps == 0.0
    }

    /// Clamp both components to their limits
    pub fn clamped(self, max_speed_mps: f64, max_angular_radps: f64) -> Self {
        Self {
            forward_mps: self.forward_mps.clamp(-max_speed_mps, max_speed_mps),
            rotation_radps: self
                .rotation_radps
                .clamp(-max_angular_radps, max_angular_radps),
        }
    }
}

/// Left and right wheel surface speeds in meters per second
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelSpeeds {
    pub left_mps: f64,
    pub right_mps: f64,
}

impl WheelSpeeds {
    pub fn new(left_mps: f64, right_mps: f64) -> Self {
        Self {
            left_mps,
            right_mps,
        }
    }

    /// Scale both sides down so neither exceeds `max_mps`, keeping their ratio
    pub fn desaturate(self, max_mps: f64) -> Self {
        let peak = self.left_mps.abs().max(self.right_mps.abs());
        if peak <= max_mps || peak == 0.0 {
            return self;
        }
        let scale = max_mps / peak;
        Self {
            left_mps: self.left_mps * scale,
            right_mps: self.right_mps * scale,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DifferentialKinematics {
    pub track_width_m: f64,
}

impl DifferentialKinematics {
    pub fn new(track_width_m: f64) -> Self {
        Self { track_width_m }
    }

    pub fn to_wheel_speeds(&self, command: DriveCommand) -> WheelSpeeds {
        let half = self.track_width_m / 2.0;
        WheelSpeeds {
            left_mps: command.forward_mps - command.rotation_radps * half,
            right_mps: command.forward_mps + command.rotation_radps * half,
        }
    }

    pub fn to_chassis(&self, speeds: WheelSpeeds) -> DriveCommand {
        DriveCommand {
            forward_mps: (speeds.left_mps + speeds.right_mps) / 2.0,
            rotation_radps: (speeds.right_mps - speeds.left_mps) / self.track_width_m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_drives_both_sides_equally() {
        let kinematics = DifferentialKinematics::new(0.6);
        let speeds = kinematics.to_wheel_speeds(DriveCommand::new(2.0, 0.0));
        assert_eq!(speeds, WheelSpeeds::new(2.0, 2.0));
    }

    #[test]
    fn turning_in_place_spins_sides_opposite() {
        let kinematics = DifferentialKinematics::new(0.5);
        let speeds = kinematics.to_wheel_speeds(DriveCommand::new(0.0, 2.0));
        assert!((speeds.left_mps + 0.5).abs() < 1e-9);
        assert!((speeds.right_mps - 0.5).abs() < 1e-9);

        let back = kinematics.to_chassis(speeds);
        assert!(back.forward_mps.abs() < 1e-9);
        assert!((back.rotation_radps - 2.0).abs() < 1e-9);
    }

    #[test]
    fn desaturate_keeps_ratio() {
        let speeds = WheelSpeeds::new(6.0, 3.0).desaturate(3.0);
        assert!((speeds.left_mps - 3.0).abs() < 1e-9);
        assert!((speeds.right_mps - 1.5).abs() < 1e-9);

        let untouched = WheelSpeeds::new(1.0, -1.0).desaturate(3.0);
        assert_eq!(untouched, WheelSpeeds::new(1.0, -1.0));
    }

    #[test]
    fn clamp_limits_each_component() {
        let command = DriveCommand::new(10.0, -10.0).clamped(3.0, 2.0);
        assert_eq!(command, DriveCommand::new(3.0, -2.0));
        assert!(DriveCommand::STOP.is_stop());
    }
}
