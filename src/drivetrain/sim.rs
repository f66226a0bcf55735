//! Simulated differential drive plant
//!
//! The plant follows the commanded wheel speeds with a first-order lag and
//! integrates wheel distances, gyro angle and a ground-truth pose. The
//! drivetrain talks to it through [`SimMotors`] and [`SimEncoders`], which
//! share state with the [`DrivetrainSim`] that advances it.
//!
//! Everything lives on the scheduler thread, so the shared state is an
//! `Rc<RefCell<_>>`.

use super::kinematics::{DifferentialKinematics, WheelSpeeds};
use super::odometry::{wrap_angle, Pose2d};
use super::{DrivetrainError, MotorOutput, WheelEncoders};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Clone, Debug, Default)]
struct SimState {
    commanded: WheelSpeeds,
    velocity: WheelSpeeds,
    left_m: f64,
    right_m: f64,
    gyro_rad: f64,
    pose: Pose2d,
}

pub struct DrivetrainSim {
    state: Rc<RefCell<SimState>>,
    kinematics: DifferentialKinematics,
    time_constant_s: f64,
}

impl DrivetrainSim {
    pub fn new(kinematics: DifferentialKinematics, time_constant_s: f64, start: Pose2d) -> Self {
        debug!(
            "Creating drivetrain sim: track {:.3} m, tau {:.3} s",
            kinematics.track_width_m, time_constant_s
        );
        let state = SimState {
            gyro_rad: start.heading_rad,
            pose: start,
            ..Default::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
            kinematics,
            time_constant_s,
        }
    }

    pub fn motors(&self) -> SimMotors {
        SimMotors {
            state: Rc::clone(&self.state),
        }
    }

    pub fn encoders(&self) -> SimEncoders {
        SimEncoders {
            state: Rc::clone(&self.state),
        }
    }

    pub fn pose_handle(&self) -> SimPose {
        SimPose {
            state: Rc::clone(&self.state),
        }
    }

    pub fn pose(&self) -> Pose2d {
        self.state.borrow().pose
    }

    pub fn wheel_velocity(&self) -> WheelSpeeds {
        self.state.borrow().velocity
    }

    /// Advance the plant by `dt`
    pub fn update(&mut self, dt: Duration) {
        let dt_s = dt.as_secs_f64();
        if dt_s <= 0.0 {
            return;
        }

        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let alpha = if self.time_constant_s > 0.0 {
            1.0 - (-dt_s / self.time_constant_s).exp()
        } else {
            1.0
        };
        state.velocity = WheelSpeeds::new(
            state.velocity.left_mps + (state.commanded.left_mps - state.velocity.left_mps) * alpha,
            state.velocity.right_mps
                + (state.commanded.right_mps - state.velocity.right_mps) * alpha,
        );

        let chassis = self.kinematics.to_chassis(state.velocity);
        let heading = state.pose.heading_rad;
        let mid_heading = heading + chassis.rotation_radps * dt_s / 2.0;

        state.left_m += state.velocity.left_mps * dt_s;
        state.right_m += state.velocity.right_mps * dt_s;
        state.gyro_rad += chassis.rotation_radps * dt_s;
        state.pose = Pose2d {
            x_m: state.pose.x_m + chassis.forward_mps * dt_s * mid_heading.cos(),
            y_m: state.pose.y_m + chassis.forward_mps * dt_s * mid_heading.sin(),
            heading_rad: wrap_angle(heading + chassis.rotation_radps * dt_s),
        };
        trace!("Sim pose {:?}", state.pose);
    }
}

/// Motor side of the simulated plant
pub struct SimMotors {
    state: Rc<RefCell<SimState>>,
}

impl MotorOutput for SimMotors {
    fn set_wheel_speeds(&mut self, speeds: WheelSpeeds) -> Result<(), DrivetrainError> {
        let mut state = self
            .state
            .try_borrow_mut()
            .map_err(|e| DrivetrainError::OutputError(e.to_string()))?;
        state.commanded = speeds;
        Ok(())
    }
}

/// Encoder and gyro side of the simulated plant
pub struct SimEncoders {
    state: Rc<RefCell<SimState>>,
}

impl WheelEncoders for SimEncoders {
    fn left_distance_m(&self) -> f64 {
        self.state.borrow().left_m
    }

    fn right_distance_m(&self) -> f64 {
        self.state.borrow().right_m
    }

    fn gyro_rad(&self) -> f64 {
        self.state.borrow().gyro_rad
    }
}

/// Read-only view of the ground-truth pose, for simulated sensors
#[derive(Clone)]
pub struct SimPose {
    state: Rc<RefCell<SimState>>,
}

impl SimPose {
    pub fn get(&self) -> Pose2d {
        self.state.borrow().pose
    }
}
