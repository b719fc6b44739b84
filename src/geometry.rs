//! Pixel-space geometry shared by the vision feed and the seek controller.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// A point in camera pixel coordinates (origin top-left, y axis down).
///
/// All navigation happens in this frame; headings produced by `angle_to`
/// are only ever compared against other angles in the same frame, so the
/// inverted y axis needs no special handling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImagePoint {
    pub x: f32,
    pub y: f32,
}

impl ImagePoint {
    pub const ZERO: ImagePoint = ImagePoint { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        ImagePoint { x, y }
    }

    /// Euclidean distance to another point, in pixels.
    #[inline]
    pub fn distance(&self, other: &ImagePoint) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Bearing from this point toward another, in radians.
    #[inline]
    pub fn angle_to(&self, other: &ImagePoint) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Midpoint between this point and another.
    #[inline]
    pub fn midpoint(&self, other: &ImagePoint) -> ImagePoint {
        ImagePoint {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }
}

impl std::ops::Add for ImagePoint {
    type Output = ImagePoint;

    fn add(self, other: ImagePoint) -> ImagePoint {
        ImagePoint::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for ImagePoint {
    type Output = ImagePoint;

    fn sub(self, other: ImagePoint) -> ImagePoint {
        ImagePoint::new(self.x - other.x, self.y - other.y)
    }
}

/// Wraps an angle into the half-open interval (-PI, PI].
///
/// The boundary lands on +PI, never -PI, so a dead-astern heading error
/// resolves to one rotation direction instead of flapping between two.
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle;
    while a > PI {
        a -= 2.0 * PI;
    }
    while a <= -PI {
        a += 2.0 * PI;
    }
    a
}
