//! # tagbot
//!
//! Control program for a differential-drive competition robot carrying an
//! AprilTag camera. A [`robot::Robot`] owns the operator controller and the
//! drivetrain and exposes its lifecycle hooks through
//! [`scheduler::PeriodicCallbackTarget`]; the [`scheduler::HostScheduler`]
//! calls them at a fixed period.
//!
//! ```text
//! HostScheduler ──► Robot ──┬──► InputDevice (gilrs / scripted)
//!                           ├──► Drivetrain ──► MotorOutput / WheelEncoders
//!                           └──► VisionSource
//! ```

pub mod config;
pub mod controller;
pub mod drivetrain;
pub mod robot;
pub mod scheduler;
pub mod vision;
