//! Configuration loading for the navigation daemon.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{LakshyaError, Result};

/// Top-level configuration, loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct LakshyaConfig {
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub control: ControlConfig,
}

/// Pose detection service (HTTP, JSON detections endpoint).
#[derive(Debug, Clone, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_vision_url")]
    pub base_url: String,
    /// Delay between successive detection polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Which detection in the response belongs to our chassis.
    #[serde(default)]
    pub tracked_index: usize,
    /// Index of the front marker within a detection's keypoint pair (0 or 1).
    #[serde(default)]
    pub front_keypoint: usize,
    /// Keypoints below this confidence are discarded.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

/// Robot chassis HTTP command interface.
#[derive(Debug, Clone, Deserialize)]
pub struct RobotConfig {
    #[serde(default = "default_robot_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// How long a motion command is held before the trailing stop.
    #[serde(default = "default_pulse_duration_ms")]
    pub pulse_duration_ms: u64,
}

/// Seek controller thresholds and budgets.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    /// Arrival radius around the target, in pixels.
    #[serde(default = "default_arrival_threshold")]
    pub arrival_threshold: f32,
    /// Heading error (radians) above which the chassis rotates in place.
    #[serde(default = "default_heading_threshold")]
    pub heading_threshold: f32,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Budget for consecutive rotation steps before the run is abandoned.
    #[serde(default = "default_max_rotation_steps")]
    pub max_rotation_steps: u32,
    /// Pause after each pulse so the next pose reflects the movement.
    #[serde(default = "default_settle_time_ms")]
    pub settle_time_ms: u64,
    /// Ring capacity for the recorded path.
    #[serde(default = "default_path_history")]
    pub path_history: usize,
}

fn default_vision_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_robot_url() -> String {
    "http://192.168.4.1".to_string()
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_request_timeout_ms() -> u64 {
    1000
}

fn default_min_confidence() -> f32 {
    0.3
}

fn default_pulse_duration_ms() -> u64 {
    200
}

fn default_arrival_threshold() -> f32 {
    30.0
}

fn default_heading_threshold() -> f32 {
    0.15
}

fn default_max_iterations() -> u32 {
    500
}

fn default_max_rotation_steps() -> u32 {
    50
}

fn default_settle_time_ms() -> u64 {
    5000
}

fn default_path_history() -> usize {
    500
}

impl Default for LakshyaConfig {
    fn default() -> Self {
        LakshyaConfig {
            vision: VisionConfig::default(),
            robot: RobotConfig::default(),
            control: ControlConfig::default(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        VisionConfig {
            base_url: default_vision_url(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            tracked_index: 0,
            front_keypoint: 0,
            min_confidence: default_min_confidence(),
        }
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        RobotConfig {
            base_url: default_robot_url(),
            request_timeout_ms: default_request_timeout_ms(),
            pulse_duration_ms: default_pulse_duration_ms(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        ControlConfig {
            arrival_threshold: default_arrival_threshold(),
            heading_threshold: default_heading_threshold(),
            max_iterations: default_max_iterations(),
            max_rotation_steps: default_max_rotation_steps(),
            settle_time_ms: default_settle_time_ms(),
            path_history: default_path_history(),
        }
    }
}

impl LakshyaConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| LakshyaError::Config(format!("Failed to read config file: {e}")))?;
        let config: LakshyaConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Reject values the controller cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.vision.front_keypoint > 1 {
            return Err(LakshyaError::Config(format!(
                "front_keypoint must be 0 or 1, got {}",
                self.vision.front_keypoint
            )));
        }
        if !(0.0..=1.0).contains(&self.vision.min_confidence) {
            return Err(LakshyaError::Config(format!(
                "min_confidence must be within [0, 1], got {}",
                self.vision.min_confidence
            )));
        }
        if self.vision.poll_interval_ms == 0
            || self.vision.request_timeout_ms == 0
            || self.robot.request_timeout_ms == 0
            || self.robot.pulse_duration_ms == 0
            || self.control.settle_time_ms == 0
        {
            return Err(LakshyaError::Config(
                "intervals and durations must be positive".to_string(),
            ));
        }
        if self.control.arrival_threshold <= 0.0 {
            return Err(LakshyaError::Config(
                "arrival_threshold must be positive".to_string(),
            ));
        }
        if self.control.heading_threshold <= 0.0 {
            return Err(LakshyaError::Config(
                "heading_threshold must be positive".to_string(),
            ));
        }
        if self.control.max_iterations == 0 || self.control.max_rotation_steps == 0 {
            return Err(LakshyaError::Config(
                "iteration budgets must be at least 1".to_string(),
            ));
        }
        if self.control.path_history == 0 {
            return Err(LakshyaError::Config(
                "path_history must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl VisionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl RobotConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn pulse_duration(&self) -> Duration {
        Duration::from_millis(self.pulse_duration_ms)
    }
}

impl ControlConfig {
    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle_time_ms)
    }
}
