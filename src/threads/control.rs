//! Decision and actuation thread.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use crate::config::LakshyaConfig;
use crate::pose::RobotPose;
use crate::robot::RobotChannel;
use crate::shared::SharedState;

/// Wait between retries when no pose has arrived yet.
const NO_POSE_BACKOFF: Duration = Duration::from_millis(50);
/// Poll interval while no session is active.
const IDLE_INTERVAL: Duration = Duration::from_millis(100);
/// The settle wait sleeps in slices this long, so cancellation and
/// shutdown take effect within one slice instead of one settle period.
const SETTLE_SLICE: Duration = Duration::from_millis(50);
/// Cadence of the periodic status line.
const STATUS_INTERVAL: Duration = Duration::from_secs(3);

/// Consumes poses, asks the controller for a decision and pulses the
/// chassis, then waits for the movement to settle before the next pass.
pub struct ControlThread {
    channel: RobotChannel,
    shared: Arc<SharedState>,
    settle_time: Duration,
    last_status: Instant,
}

impl ControlThread {
    pub fn new(config: &LakshyaConfig, shared: Arc<SharedState>) -> Self {
        ControlThread {
            channel: RobotChannel::new(&config.robot),
            shared,
            settle_time: config.control.settle_time(),
            last_status: Instant::now(),
        }
    }

    pub fn run(&mut self) {
        self.channel.check_reachable();
        info!("Control loop started");

        loop {
            if self.shared.should_shutdown() {
                info!("Control loop shutting down");
                self.channel.stop();
                break;
            }

            if !self.shared.control_state().is_active() {
                thread::sleep(IDLE_INTERVAL);
                continue;
            }

            let Some(pose) = self.shared.latest_pose() else {
                // Active session but no detection yet. Retrying costs no
                // iteration budget; only decisions do.
                thread::sleep(NO_POSE_BACKOFF);
                continue;
            };

            self.log_status(&pose);

            match self.shared.decide(&pose) {
                Some(command) => {
                    self.channel.pulse(command);
                    self.settle();
                }
                None => thread::sleep(NO_POSE_BACKOFF),
            }
        }
    }

    /// Wait for the chassis to come to rest after a pulse. Exits early
    /// on shutdown or when the session leaves its active states.
    fn settle(&self) {
        let deadline = Instant::now() + self.settle_time;
        loop {
            if self.shared.should_shutdown() || !self.shared.control_state().is_active() {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(SETTLE_SLICE.min(deadline - now));
        }
    }

    fn log_status(&mut self, pose: &RobotPose) {
        if self.last_status.elapsed() < STATUS_INTERVAL {
            return;
        }
        self.last_status = Instant::now();

        let snapshot = self.shared.snapshot();
        let params = self.shared.params();
        let stats = self.shared.feed_stats();
        if let Some(measure) = self.shared.measure(pose) {
            info!(
                "Seeking: state={}, iter={}/{}, rot={}/{}, d={:.1}px, e={:+.3}rad, pose_age={}ms, feed={:.1}fps/{:.0}ms",
                snapshot.state,
                snapshot.iteration,
                params.max_iterations,
                snapshot.rotation_steps,
                params.max_rotation_steps,
                measure.distance,
                measure.heading_error,
                pose.age().as_millis(),
                stats.fps,
                stats.inference_ms
            );
        } else {
            info!(
                "Seeking: state={}, iter={}/{}, rot={}/{}",
                snapshot.state,
                snapshot.iteration,
                params.max_iterations,
                snapshot.rotation_steps,
                params.max_rotation_steps
            );
        }
    }
}
