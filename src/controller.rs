//! Two-phase seek controller.
//!
//! The controller drives the chassis toward a pixel-space target by
//! alternating between rotating in place and advancing. Each call to
//! [`SeekController::get_command`] consumes one fresh pose and produces
//! at most one drive action; the caller owns pacing and actuation.

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, info, warn};

use crate::config::ControlConfig;
use crate::geometry::{ImagePoint, normalize_angle};
use crate::pose::RobotPose;
use crate::robot::DriveCommand;

/// Where the controller is in its rotate/advance cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Rotating,
    Moving,
    Success,
    Failed,
}

impl ControlState {
    /// Active states consume poses and issue commands.
    pub fn is_active(&self) -> bool {
        matches!(self, ControlState::Rotating | ControlState::Moving)
    }

    /// Terminal states persist until a new target replaces the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ControlState::Success | ControlState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlState::Idle => "IDLE",
            ControlState::Rotating => "ROTATING",
            ControlState::Moving => "MOVING",
            ControlState::Success => "SUCCESS",
            ControlState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Thresholds and budgets for one seek run.
#[derive(Debug, Clone)]
pub struct SeekParams {
    /// Arrival radius around the target, in pixels.
    pub arrival_threshold: f32,
    /// Heading error (radians) above which the chassis rotates in place.
    pub heading_threshold: f32,
    /// Hard cap on decisions per session.
    pub max_iterations: u32,
    /// Cap on consecutive rotation steps before the run is abandoned.
    pub max_rotation_steps: u32,
    /// Ring capacity for the recorded path.
    pub path_history: usize,
}

impl Default for SeekParams {
    fn default() -> Self {
        SeekParams {
            arrival_threshold: 30.0,
            heading_threshold: 0.15,
            max_iterations: 500,
            max_rotation_steps: 50,
            path_history: 500,
        }
    }
}

impl From<&ControlConfig> for SeekParams {
    fn from(config: &ControlConfig) -> Self {
        SeekParams {
            arrival_threshold: config.arrival_threshold,
            heading_threshold: config.heading_threshold,
            max_iterations: config.max_iterations,
            max_rotation_steps: config.max_rotation_steps,
            path_history: config.path_history,
        }
    }
}

/// Mutable per-run state. A new target replaces the session wholesale.
#[derive(Debug, Clone)]
pub struct NavigationSession {
    pub target: Option<ImagePoint>,
    pub state: ControlState,
    pub iteration: u32,
    pub rotation_steps: u32,
    path: VecDeque<ImagePoint>,
}

impl NavigationSession {
    fn idle() -> Self {
        NavigationSession {
            target: None,
            state: ControlState::Idle,
            iteration: 0,
            rotation_steps: 0,
            path: VecDeque::new(),
        }
    }

    fn started(target: ImagePoint, path_capacity: usize) -> Self {
        NavigationSession {
            target: Some(target),
            state: ControlState::Rotating,
            iteration: 0,
            rotation_steps: 0,
            path: VecDeque::with_capacity(path_capacity),
        }
    }

    /// Front marker positions in decision order, oldest first, bounded.
    pub fn path(&self) -> &VecDeque<ImagePoint> {
        &self.path
    }

    fn record_point(&mut self, point: ImagePoint, capacity: usize) {
        if self.path.len() >= capacity {
            self.path.pop_front();
        }
        self.path.push_back(point);
    }
}

/// Distance and heading error of a pose relative to the current target.
#[derive(Debug, Clone, Copy)]
pub struct SeekMeasure {
    pub distance: f32,
    pub heading_error: f32,
}

/// The decision core. Pure state machine over poses; owns no I/O.
pub struct SeekController {
    params: SeekParams,
    session: NavigationSession,
}

impl SeekController {
    pub fn new(params: SeekParams) -> Self {
        SeekController {
            params,
            session: NavigationSession::idle(),
        }
    }

    /// Begin a fresh session toward `target`. Any previous session,
    /// terminal or not, is discarded along with its counters and path.
    pub fn set_target(&mut self, target: ImagePoint) {
        info!("Seek started toward ({:.1}, {:.1})", target.x, target.y);
        self.session = NavigationSession::started(target, self.params.path_history);
    }

    /// Return to idle. Counters and path stay readable until the next
    /// `set_target`; this issues no stop by itself.
    pub fn cancel(&mut self) {
        if self.session.state.is_active() {
            info!("Seek cancelled at iteration {}", self.session.iteration);
        }
        self.session.state = ControlState::Idle;
        self.session.target = None;
    }

    /// Decide the next drive action for one pose sample.
    ///
    /// Outside an active session this returns `None` and mutates nothing.
    /// Within one, every call consumes exactly one iteration from the
    /// budget, so lost commands still count against it. A heading error
    /// of exactly zero always falls through to the advance branch.
    pub fn get_command(&mut self, pose: &RobotPose) -> Option<DriveCommand> {
        if !self.session.state.is_active() {
            return None;
        }
        let target = self.session.target?;

        self.session
            .record_point(pose.front, self.params.path_history);
        let measure = self.measure_against(&target, pose);

        self.session.iteration += 1;
        if self.session.iteration >= self.params.max_iterations {
            warn!(
                "Iteration budget exhausted ({}); abandoning target",
                self.params.max_iterations
            );
            self.session.state = ControlState::Failed;
            return Some(DriveCommand::Stop);
        }

        if measure.distance <= self.params.arrival_threshold {
            info!(
                "Target reached after {} iterations ({:.1}px away)",
                self.session.iteration, measure.distance
            );
            self.session.state = ControlState::Success;
            return Some(DriveCommand::Stop);
        }

        if measure.heading_error.abs() > self.params.heading_threshold {
            self.session.state = ControlState::Rotating;
            self.session.rotation_steps += 1;
            if self.session.rotation_steps > self.params.max_rotation_steps {
                warn!(
                    "{} consecutive rotation steps without aligning; abandoning target",
                    self.session.rotation_steps
                );
                self.session.state = ControlState::Failed;
                return Some(DriveCommand::Stop);
            }
            let command = if measure.heading_error > 0.0 {
                DriveCommand::TurnRight
            } else {
                DriveCommand::TurnLeft
            };
            debug!(
                "iter {}: d={:.1}px e={:+.3}rad -> {}",
                self.session.iteration, measure.distance, measure.heading_error, command
            );
            return Some(command);
        }

        self.session.state = ControlState::Moving;
        self.session.rotation_steps = 0;
        debug!(
            "iter {}: d={:.1}px e={:+.3}rad -> ADVANCE",
            self.session.iteration, measure.distance, measure.heading_error
        );
        Some(DriveCommand::Advance)
    }

    /// Measure a pose against the current target without deciding
    /// anything. `None` when no target is set.
    pub fn measure(&self, pose: &RobotPose) -> Option<SeekMeasure> {
        let target = self.session.target?;
        Some(self.measure_against(&target, pose))
    }

    fn measure_against(&self, target: &ImagePoint, pose: &RobotPose) -> SeekMeasure {
        let distance = pose.front.distance(target);
        let desired = pose.front.angle_to(target);
        SeekMeasure {
            distance,
            heading_error: normalize_angle(desired - pose.heading()),
        }
    }

    pub fn state(&self) -> ControlState {
        self.session.state
    }

    pub fn session(&self) -> &NavigationSession {
        &self.session
    }

    pub fn params(&self) -> &SeekParams {
        &self.params
    }
}
