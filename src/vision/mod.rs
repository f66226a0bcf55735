//! Vision capability
//!
//! The robot only consumes tag observations; detection itself happens on the
//! coprocessor. [`VisionSource`] is the seam, with [`NoVision`] for robots
//! without a camera and [`SimulatedCamera`] reporting what a camera mounted on
//! the simulated robot would see.

use crate::config::{TagPlacement, VisionConfig};
use crate::drivetrain::odometry::wrap_angle;
use crate::drivetrain::sim::SimPose;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Best visible target, angles in the camera frame
///
/// Yaw follows the PhotonVision convention: positive means the target is to
/// the right of the camera center.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetObservation {
    pub fiducial_id: u32,
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    pub distance_m: f64,
}

pub trait VisionSource {
    fn camera_name(&self) -> &str;

    /// Most relevant target from the latest frame, if any
    fn latest(&mut self) -> Option<TargetObservation>;
}

#[derive(Debug, Default)]
pub struct NoVision;

impl VisionSource for NoVision {
    fn camera_name(&self) -> &str {
        "none"
    }

    fn latest(&mut self) -> Option<TargetObservation> {
        None
    }
}

/// Geometric camera model on top of the simulated ground-truth pose
pub struct SimulatedCamera {
    name: String,
    half_fov_rad: f64,
    max_range_m: f64,
    camera_height_m: f64,
    tags: Vec<TagPlacement>,
    pose: SimPose,
}

impl SimulatedCamera {
    pub fn new(config: &VisionConfig, pose: SimPose) -> Self {
        debug!(
            "Creating simulated camera {} with {} field tags",
            config.camera_name,
            config.tags.len()
        );
        Self {
            name: config.camera_name.clone(),
            half_fov_rad: config.horizontal_fov_deg.to_radians() / 2.0,
            max_range_m: config.max_range_m,
            camera_height_m: config.camera_height_m,
            tags: config.tags.clone(),
            pose,
        }
    }
}

impl VisionSource for SimulatedCamera {
    fn camera_name(&self) -> &str {
        &self.name
    }

    fn latest(&mut self) -> Option<TargetObservation> {
        let pose = self.pose.get();

        let best = self
            .tags
            .iter()
            .filter_map(|tag| {
                let distance = pose.distance_to(tag.x_m, tag.y_m);
                if distance > self.max_range_m || distance <= f64::EPSILON {
                    return None;
                }
                let bearing = (tag.y_m - pose.y_m).atan2(tag.x_m - pose.x_m);
                let relative = wrap_angle(bearing - pose.heading_rad);
                if relative.abs() > self.half_fov_rad {
                    return None;
                }
                let pitch = (tag.z_m - self.camera_height_m).atan2(distance);
                Some(TargetObservation {
                    fiducial_id: tag.id,
                    yaw_deg: -relative.to_degrees(),
                    pitch_deg: pitch.to_degrees(),
                    distance_m: distance,
                })
            })
            .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

        trace!("Simulated camera sees {:?}", best);
        best
    }
}
