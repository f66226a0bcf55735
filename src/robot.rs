//! Robot program: composition root for the operator controller, drivetrain and camera

use crate::config::RobotConfig;
use crate::controller::{ControllerError, ControllerState, InputDevice, OpenInput};
use crate::drivetrain::{DifferentialKinematics, DriveCommand, Drivetrain, DrivetrainSim, Pose2d};
use crate::scheduler::PeriodicCallbackTarget;
use crate::vision::{NoVision, SimulatedCamera, TargetObservation, VisionSource};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Owns exactly one input device and one drivetrain for its whole lifetime
pub struct Robot<I: InputDevice> {
    config: RobotConfig,
    controller: I,
    drive: Drivetrain,
    vision: Box<dyn VisionSource>,
    sim: Option<DrivetrainSim>,
    period: Duration,
    initialized: bool,
    ticks: u64,
    latest_target: Option<TargetObservation>,
}

impl<I: OpenInput> Robot<I> {
    /// Robot with the given drivetrain and camera, input opened from the config port
    pub fn new(
        config: RobotConfig,
        drive: Drivetrain,
        vision: Box<dyn VisionSource>,
    ) -> Result<Self, ControllerError> {
        let controller = I::open(&config.controller)?;
        info!(
            "Robot created with controller on port {} and camera {}",
            controller.port(),
            vision.camera_name()
        );
        Ok(Self {
            period: Duration::from_millis(config.scheduler.period_ms),
            config,
            controller,
            drive,
            vision,
            sim: None,
            initialized: false,
            ticks: 0,
            latest_target: None,
        })
    }

    /// Robot with no motors and no camera attached
    pub fn unconnected(config: RobotConfig) -> Result<Self, ControllerError> {
        let drive = Drivetrain::unconnected(&config.drive);
        Self::new(config, drive, Box::new(NoVision))
    }

    /// Robot whose drivetrain and camera are backed by the simulated plant
    pub fn simulated(config: RobotConfig) -> Result<Self, ControllerError> {
        let sim = DrivetrainSim::new(
            DifferentialKinematics::new(config.drive.track_width_m),
            config.drive.sim_time_constant_s,
            Pose2d::default(),
        );
        let drive = Drivetrain::new(
            &config.drive,
            Box::new(sim.motors()),
            Box::new(sim.encoders()),
        );
        let camera = SimulatedCamera::new(&config.vision, sim.pose_handle());

        let mut robot = Self::new(config, drive, Box::new(camera))?;
        robot.sim = Some(sim);
        Ok(robot)
    }
}

impl<I: InputDevice> Robot<I> {
    pub fn controller(&self) -> &I {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut I {
        &mut self.controller
    }

    pub fn drivetrain(&self) -> &Drivetrain {
        &self.drive
    }

    pub fn simulation(&self) -> Option<&DrivetrainSim> {
        self.sim.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn latest_target(&self) -> Option<&TargetObservation> {
        self.latest_target.as_ref()
    }

    /// Arcade mapping from a controller snapshot to a chassis command
    ///
    /// Pushing the left stick forward (negative Y) drives forward, pushing the
    /// right stick right (positive X) turns clockwise. While the aim button is
    /// held and a target is visible, the turn is taken over by a proportional
    /// controller on the target yaw.
    pub fn command_for(&self, state: &ControllerState) -> DriveCommand {
        let max_speed = self.drive.max_speed_mps();
        let max_turn = self.drive.max_angular_speed_radps();

        let forward = -f64::from(state.left_y) * max_speed;
        let mut rotation = -f64::from(state.right_x) * max_turn;

        if state.is_held(self.config.controller.aim_button) {
            if let Some(target) = &self.latest_target {
                rotation = (-self.config.drive.aim_kp * target.yaw_deg).clamp(-max_turn, max_turn);
            }
        }

        DriveCommand::new(forward, rotation)
    }
}

impl<I: InputDevice> PeriodicCallbackTarget for Robot<I> {
    fn init(&mut self) {
        if self.initialized {
            warn!("init called more than once, ignoring");
            return;
        }
        self.drive.reset_pose(Pose2d::default());
        self.initialized = true;
        info!(
            "Robot initialized: port {}, max {:.2} m/s, simulation {}",
            self.controller.port(),
            self.config.drive.max_speed_mps,
            self.sim.is_some()
        );
    }

    fn periodic_update(&mut self) {
        let pose = self.drive.periodic();
        let target = self.vision.latest();

        if target.as_ref().map(|t| t.fiducial_id)
            != self.latest_target.as_ref().map(|t| t.fiducial_id)
        {
            match &target {
                Some(t) => debug!("Tracking tag {} at {:.2} m", t.fiducial_id, t.distance_m),
                None => debug!("No tag in view"),
            }
        }
        self.latest_target = target;

        self.ticks += 1;
        if self.config.scheduler.telemetry_every > 0
            && self.ticks % self.config.scheduler.telemetry_every == 0
        {
            let speeds = self.drive.last_wheel_speeds();
            info!(
                "Pose ({:.2}, {:.2}, {:.1} deg), wheels ({:.2}, {:.2}) m/s, tag {:?}",
                pose.x_m,
                pose.y_m,
                pose.heading_rad.to_degrees(),
                speeds.left_mps,
                speeds.right_mps,
                self.latest_target.as_ref().map(|t| t.fiducial_id)
            );
        }
    }

    fn teleop_tick(&mut self) {
        let state = self.controller.poll();
        let command = self.command_for(&state);
        if let Err(e) = self.drive.drive(command) {
            warn!("Failed to forward drive command {:?}: {}", command, e);
        }
    }

    fn simulation_tick(&mut self) {
        match &mut self.sim {
            Some(sim) => sim.update(self.period),
            None => debug!("simulation_tick without a simulated drivetrain"),
        }
    }

    fn disabled_init(&mut self) {
        info!("Robot disabled, stopping drivetrain");
        if let Err(e) = self.drive.stop() {
            warn!("Failed to stop drivetrain on disable: {}", e);
        }
    }
}
