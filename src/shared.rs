//! State shared between the poller, the control loop and the supervisor.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::controller::{ControlState, SeekController, SeekMeasure, SeekParams};
use crate::geometry::ImagePoint;
use crate::pose::RobotPose;
use crate::robot::DriveCommand;
use crate::vision::FeedStats;

/// Atomic f32 via bit-casting through an AtomicU32.
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        AtomicF32 {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Read-only view of the current session for status and exit reporting.
#[derive(Debug, Clone, Copy)]
pub struct SessionSnapshot {
    pub state: ControlState,
    pub target: Option<ImagePoint>,
    pub iteration: u32,
    pub rotation_steps: u32,
    pub path_len: usize,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        SessionSnapshot {
            state: ControlState::Idle,
            target: None,
            iteration: 0,
            rotation_steps: 0,
            path_len: 0,
        }
    }
}

/// Everything the worker threads exchange.
///
/// The pose slot is a single-sample mailbox: the poller overwrites it on
/// every detection and the control loop reads whatever is freshest.
/// Stale intermediate samples are meant to be lost.
pub struct SharedState {
    shutdown: AtomicBool,
    latest_pose: Mutex<Option<RobotPose>>,
    controller: Mutex<SeekController>,
    pub vision_fps: AtomicF32,
    pub inference_ms: AtomicF32,
    pub detection_confidence: AtomicF32,
}

impl SharedState {
    pub fn new(controller: SeekController) -> Self {
        SharedState {
            shutdown: AtomicBool::new(false),
            latest_pose: Mutex::new(None),
            controller: Mutex::new(controller),
            vision_fps: AtomicF32::new(0.0),
            inference_ms: AtomicF32::new(0.0),
            detection_confidence: AtomicF32::new(0.0),
        }
    }

    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Overwrite the pose mailbox with a fresh sample.
    pub fn store_pose(&self, pose: RobotPose) {
        if let Ok(mut slot) = self.latest_pose.lock() {
            *slot = Some(pose);
        }
    }

    /// Freshest pose seen so far, if any.
    pub fn latest_pose(&self) -> Option<RobotPose> {
        self.latest_pose.lock().ok().and_then(|slot| *slot)
    }

    pub fn record_feed_stats(&self, stats: FeedStats) {
        self.vision_fps.store(stats.fps);
        self.inference_ms.store(stats.inference_ms);
        self.detection_confidence.store(stats.last_confidence);
    }

    pub fn feed_stats(&self) -> FeedStats {
        FeedStats {
            fps: self.vision_fps.load(),
            inference_ms: self.inference_ms.load(),
            last_confidence: self.detection_confidence.load(),
        }
    }

    /// Start a seek session toward `target`.
    pub fn set_target(&self, target: ImagePoint) {
        if let Ok(mut controller) = self.controller.lock() {
            controller.set_target(target);
        }
    }

    /// Cancel the current session. The control loop stops issuing
    /// commands on its next pass; it does not send a chassis stop.
    pub fn cancel(&self) {
        if let Ok(mut controller) = self.controller.lock() {
            controller.cancel();
        }
    }

    /// Run one controller decision against a pose.
    pub fn decide(&self, pose: &RobotPose) -> Option<DriveCommand> {
        self.controller
            .lock()
            .ok()
            .and_then(|mut controller| controller.get_command(pose))
    }

    pub fn measure(&self, pose: &RobotPose) -> Option<SeekMeasure> {
        self.controller
            .lock()
            .ok()
            .and_then(|controller| controller.measure(pose))
    }

    pub fn control_state(&self) -> ControlState {
        self.controller
            .lock()
            .map(|controller| controller.state())
            .unwrap_or(ControlState::Idle)
    }

    /// Budgets and thresholds the controller was built with, for
    /// rendering counters against their limits.
    pub fn params(&self) -> SeekParams {
        self.controller
            .lock()
            .map(|controller| controller.params().clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        match self.controller.lock() {
            Ok(controller) => {
                let session = controller.session();
                SessionSnapshot {
                    state: session.state,
                    target: session.target,
                    iteration: session.iteration,
                    rotation_steps: session.rotation_steps,
                    path_len: session.path().len(),
                }
            }
            Err(_) => SessionSnapshot::default(),
        }
    }

    /// Copy of the recorded path, oldest first.
    pub fn path(&self) -> Vec<ImagePoint> {
        self.controller
            .lock()
            .map(|controller| controller.session().path().iter().copied().collect())
            .unwrap_or_default()
    }
}
