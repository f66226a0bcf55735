//! Pose tracking from wheel encoders and a gyro

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Field relative robot pose, heading counter-clockwise from +x
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose2d {
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
}

impl Pose2d {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            x_m,
            y_m,
            heading_rad: wrap_angle(heading_rad),
        }
    }

    pub fn distance_to(&self, x_m: f64, y_m: f64) -> f64 {
        (x_m - self.x_m).hypot(y_m - self.y_m)
    }
}

/// Wrap an angle into `(-pi, pi]`
pub fn wrap_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}

fn rotate_vec(x: f64, y: f64, t: f64) -> (f64, f64) {
    (x * t.cos() - y * t.sin(), x * t.sin() + y * t.cos())
}

/// Integrates encoder deltas along constant-curvature arcs
#[derive(Clone, Debug, Default)]
pub struct Odometry {
    pose: Pose2d,
    prev_left_m: f64,
    prev_right_m: f64,
    prev_gyro_rad: f64,
    heading_offset_rad: f64,
}

impl Odometry {
    pub fn new(gyro_rad: f64, left_m: f64, right_m: f64, initial: Pose2d) -> Self {
        Self {
            pose: initial,
            prev_left_m: left_m,
            prev_right_m: right_m,
            prev_gyro_rad: gyro_rad,
            heading_offset_rad: initial.heading_rad - gyro_rad,
        }
    }

    pub fn pose(&self) -> Pose2d {
        self.pose
    }

    /// Start tracking from `pose` with the current sensor readings as reference
    pub fn reset(&mut self, gyro_rad: f64, left_m: f64, right_m: f64, pose: Pose2d) {
        *self = Self::new(gyro_rad, left_m, right_m, pose);
    }

    pub fn update(&mut self, gyro_rad: f64, left_m: f64, right_m: f64) -> Pose2d {
        let delta_left = left_m - self.prev_left_m;
        let delta_right = right_m - self.prev_right_m;
        let delta_theta = wrap_angle(gyro_rad - self.prev_gyro_rad);
        (self.prev_left_m, self.prev_right_m, self.prev_gyro_rad) = (left_m, right_m, gyro_rad);

        let ds = (delta_left + delta_right) / 2.0;

        // Straight segments would divide by zero below
        let (local_x, local_y) = if delta_theta.abs() < 1e-9 {
            (ds, 0.0)
        } else {
            let sin_term = delta_theta.sin() / delta_theta;
            let cos_term = (1.0 - delta_theta.cos()) / delta_theta;
            (ds * sin_term, ds * cos_term)
        };

        let (dx, dy) = rotate_vec(local_x, local_y, self.pose.heading_rad);
        self.pose = Pose2d::new(
            self.pose.x_m + dx,
            self.pose.y_m + dy,
            gyro_rad + self.heading_offset_rad,
        );
        self.pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn wrap_angle_stays_in_range() {
        assert!((wrap_angle(1.5 * PI) + FRAC_PI_2).abs() < 1e-9);
        assert!((wrap_angle(-FRAC_PI_2) + FRAC_PI_2).abs() < 1e-9);
        assert!((wrap_angle(2.0 * PI)).abs() < 1e-9);
    }

    #[test]
    fn straight_drive_moves_along_heading() {
        let mut odom = Odometry::default();
        let pose = odom.update(0.0, 1.0, 1.0);
        assert!((pose.x_m - 1.0).abs() < 1e-9);
        assert!(pose.y_m.abs() < 1e-9);
    }

    #[test]
    fn quarter_arc_ends_on_the_circle() {
        // Quarter circle of radius 1 traced by the robot center
        let mut odom = Odometry::default();
        let arc = FRAC_PI_2;
        let pose = odom.update(FRAC_PI_2, arc * 0.5, arc * 1.5);
        assert!((pose.x_m - 1.0).abs() < 1e-9);
        assert!((pose.y_m - 1.0).abs() < 1e-9);
        assert!((pose.heading_rad - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn reset_uses_current_readings_as_reference() {
        let mut odom = Odometry::default();
        odom.update(0.0, 5.0, 5.0);
        odom.reset(0.3, 5.0, 5.0, Pose2d::new(1.0, 2.0, 0.0));
        let pose = odom.update(0.3, 5.0, 5.0);
        assert_eq!(pose, Pose2d::new(1.0, 2.0, 0.0));
    }
}
