//! Robot pose as observed by the overhead camera.

use std::time::{Duration, Instant};

use crate::geometry::ImagePoint;

/// One localisation sample: both chassis markers at capture time.
///
/// `front` is the marker leading in the travel direction, `back` the one
/// trailing it. Together they give the chassis a position and a heading
/// in the camera frame.
#[derive(Debug, Clone, Copy)]
pub struct RobotPose {
    pub front: ImagePoint,
    pub back: ImagePoint,
    pub captured_at: Instant,
}

impl RobotPose {
    pub fn new(front: ImagePoint, back: ImagePoint) -> Self {
        RobotPose {
            front,
            back,
            captured_at: Instant::now(),
        }
    }

    /// Geometric center of the chassis.
    pub fn center(&self) -> ImagePoint {
        self.back.midpoint(&self.front)
    }

    /// Heading of the back-to-front axis, in radians.
    ///
    /// Coincident markers degenerate to 0.0 (atan2 of two zeros). The
    /// sample is still usable; the next detection separates them again.
    pub fn heading(&self) -> f32 {
        self.back.angle_to(&self.front)
    }

    /// How long ago this sample was captured.
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}
