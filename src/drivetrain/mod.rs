//! Differential drivetrain subsystem
//!
//! The drivetrain turns a chassis [`DriveCommand`] into left/right wheel
//! speeds and forwards them to whatever [`MotorOutput`] it was built with. It
//! also keeps a pose estimate from a [`WheelEncoders`] source.
//!
//! # Architecture
//!
//! ```text
//! DriveCommand ──► clamp ──► kinematics ──► desaturate ──► MotorOutput
//!                                                             │
//! Pose2d ◄── Odometry ◄────────────── WheelEncoders ◄─────────┘ (physically)
//! ```
//!
//! Hardware backends and the simulated plant in [`sim`] both plug in through
//! the two traits, so the drivetrain never knows whether it is simulated.

pub mod kinematics;
pub mod odometry;
pub mod sim;

pub use kinematics::{DifferentialKinematics, DriveCommand, WheelSpeeds};
pub use odometry::{Odometry, Pose2d};
pub use sim::DrivetrainSim;

use crate::config::DriveConfig;
use tracing::{debug, info, trace, warn};

/// Drivetrain errors
#[derive(Debug, thiserror::Error)]
pub enum DrivetrainError {
    /// The motor backend rejected a command
    #[error("Motor output error: {0}")]
    OutputError(String),

    /// Command contained NaN or infinite components
    #[error("Invalid drive command: {0:?}")]
    InvalidCommand(DriveCommand),
}

/// Sink for wheel speed setpoints
pub trait MotorOutput {
    fn set_wheel_speeds(&mut self, speeds: WheelSpeeds) -> Result<(), DrivetrainError>;

    fn stop(&mut self) -> Result<(), DrivetrainError> {
        self.set_wheel_speeds(WheelSpeeds::default())
    }
}

/// Wheel distance and heading sensors
pub trait WheelEncoders {
    fn left_distance_m(&self) -> f64;
    fn right_distance_m(&self) -> f64;
    fn gyro_rad(&self) -> f64;
}

/// Motor output that only traces setpoints, for runs without hardware
#[derive(Debug, Default)]
pub struct LoggedOutput {
    last: WheelSpeeds,
}

impl MotorOutput for LoggedOutput {
    fn set_wheel_speeds(&mut self, speeds: WheelSpeeds) -> Result<(), DrivetrainError> {
        if speeds != self.last {
            debug!(
                "Wheel setpoint: left {:.3} m/s, right {:.3} m/s",
                speeds.left_mps, speeds.right_mps
            );
            self.last = speeds;
        }
        Ok(())
    }
}

/// Encoders that never move, paired with [`LoggedOutput`]
#[derive(Debug, Default)]
pub struct StaticEncoders;

impl WheelEncoders for StaticEncoders {
    fn left_distance_m(&self) -> f64 {
        0.0
    }

    fn right_distance_m(&self) -> f64 {
        0.0
    }

    fn gyro_rad(&self) -> f64 {
        0.0
    }
}

pub struct Drivetrain {
    kinematics: DifferentialKinematics,
    max_speed_mps: f64,
    max_angular_speed_radps: f64,
    output: Box<dyn MotorOutput>,
    encoders: Box<dyn WheelEncoders>,
    odometry: Odometry,
    last_command: Option<DriveCommand>,
    last_speeds: WheelSpeeds,
}

impl Drivetrain {
    pub fn new(
        config: &DriveConfig,
        output: Box<dyn MotorOutput>,
        encoders: Box<dyn WheelEncoders>,
    ) -> Self {
        info!(
            "Creating drivetrain: track {:.3} m, max {:.2} m/s, max {:.2} rad/s",
            config.track_width_m, config.max_speed_mps, config.max_angular_speed_radps
        );
        let odometry = Odometry::new(
            encoders.gyro_rad(),
            encoders.left_distance_m(),
            encoders.right_distance_m(),
            Pose2d::default(),
        );
        Self {
            kinematics: DifferentialKinematics::new(config.track_width_m),
            max_speed_mps: config.max_speed_mps,
            max_angular_speed_radps: config.max_angular_speed_radps,
            output,
            encoders,
            odometry,
            last_command: None,
            last_speeds: WheelSpeeds::default(),
        }
    }

    /// Drivetrain with no hardware behind it
    pub fn unconnected(config: &DriveConfig) -> Self {
        Self::new(
            config,
            Box::new(LoggedOutput::default()),
            Box::new(StaticEncoders),
        )
    }

    pub fn kinematics(&self) -> DifferentialKinematics {
        self.kinematics
    }

    pub fn max_speed_mps(&self) -> f64 {
        self.max_speed_mps
    }

    pub fn max_angular_speed_radps(&self) -> f64 {
        self.max_angular_speed_radps
    }

    /// Forward a chassis command to the motors
    ///
    /// The command is clamped to the configured limits before conversion and
    /// the resulting wheel speeds are desaturated, so a full-stick turn while
    /// driving at full speed keeps its curvature instead of clipping one side.
    pub fn drive(&mut self, command: DriveCommand) -> Result<(), DrivetrainError> {
        if !command.forward_mps.is_finite() || !command.rotation_radps.is_finite() {
            return Err(DrivetrainError::InvalidCommand(command));
        }

        let command = command.clamped(self.max_speed_mps, self.max_angular_speed_radps);
        let speeds = self
            .kinematics
            .to_wheel_speeds(command)
            .desaturate(self.max_speed_mps);

        trace!("Drive {:?} -> {:?}", command, speeds);
        self.last_command = Some(command);
        self.last_speeds = speeds;
        self.output.set_wheel_speeds(speeds)
    }

    pub fn stop(&mut self) -> Result<(), DrivetrainError> {
        self.last_command = Some(DriveCommand::STOP);
        self.last_speeds = WheelSpeeds::default();
        self.output.stop()
    }

    /// Update odometry from the encoders
    pub fn periodic(&mut self) -> Pose2d {
        self.odometry.update(
            self.encoders.gyro_rad(),
            self.encoders.left_distance_m(),
            self.encoders.right_distance_m(),
        )
    }

    pub fn reset_pose(&mut self, pose: Pose2d) {
        debug!("Resetting odometry to {:?}", pose);
        self.odometry.reset(
            self.encoders.gyro_rad(),
            self.encoders.left_distance_m(),
            self.encoders.right_distance_m(),
            pose,
        );
    }

    pub fn pose(&self) -> Pose2d {
        self.odometry.pose()
    }

    /// Last command after clamping, `None` until the first `drive` or `stop`
    pub fn last_command(&self) -> Option<DriveCommand> {
        self.last_command
    }

    pub fn last_wheel_speeds(&self) -> WheelSpeeds {
        self.last_speeds
    }
}

impl Drop for Drivetrain {
    fn drop(&mut self) {
        if let Err(e) = self.output.stop() {
            warn!("Failed to stop motors on shutdown: {}", e);
        }
    }
}
