//! LakshyaNav: vision-guided target seeking for a two-marker RC chassis.
//!
//! An overhead camera watches the floor and a detection service reports
//! the chassis' two markers per frame over HTTP. This crate closes the
//! loop: it polls those detections, decides rotate/advance pulses and
//! fires them at the chassis firmware until the front marker lands
//! within the arrival radius of a pixel-space target.
//!
//! The shipped binary wires up three threads (detection poller, control
//! loop, supervisor). Embedders can instead hold a [`SharedState`] and
//! drive it directly: [`SharedState::set_target`] starts a run,
//! [`SharedState::cancel`] abandons it, and [`SessionSnapshot`] plus the
//! recorded path feed status displays.

pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod pose;
pub mod robot;
pub mod shared;
pub mod threads;
pub mod vision;

pub use config::LakshyaConfig;
pub use controller::{ControlState, NavigationSession, SeekController, SeekMeasure, SeekParams};
pub use error::{LakshyaError, Result};
pub use geometry::{ImagePoint, normalize_angle};
pub use pose::RobotPose;
pub use robot::{DriveCommand, RobotChannel};
pub use shared::{SessionSnapshot, SharedState};
pub use threads::{ThreadHandles, spawn_threads};
pub use vision::{DetectionsResponse, FeedStats, VisionClient};
