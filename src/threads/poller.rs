//! Detection polling thread.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::LakshyaConfig;
use crate::shared::SharedState;
use crate::vision::VisionClient;

/// Polls the detection service and keeps the shared pose mailbox fresh.
///
/// Poll failures are transient by assumption: the thread logs the first
/// one, degrades to debug logging while the outage lasts, and keeps
/// retrying at the configured interval. Only a failed startup probe
/// takes the daemon down.
pub struct PollerThread {
    client: VisionClient,
    shared: Arc<SharedState>,
    interval: Duration,
}

impl PollerThread {
    pub fn new(config: &LakshyaConfig, shared: Arc<SharedState>) -> Self {
        PollerThread {
            client: VisionClient::new(&config.vision),
            shared,
            interval: config.vision.poll_interval(),
        }
    }

    pub fn run(&mut self) {
        if let Err(e) = self.client.check_health() {
            error!("{e}");
            error!("Pose feed unavailable; requesting shutdown");
            self.shared.signal_shutdown();
            return;
        }
        info!(
            "Pose poller started ({}ms interval)",
            self.interval.as_millis()
        );

        let mut healthy = true;
        loop {
            if self.shared.should_shutdown() {
                info!("Pose poller shutting down");
                break;
            }

            match self.client.poll() {
                Ok(sample) => {
                    if !healthy {
                        info!("Detection service recovered");
                        healthy = true;
                    }
                    self.shared.record_feed_stats(self.client.stats());
                    if let Some(pose) = sample {
                        self.shared.store_pose(pose);
                    }
                }
                Err(e) => {
                    if healthy {
                        warn!("Detection poll failed: {e}");
                        healthy = false;
                    } else {
                        debug!("Detection poll still failing: {e}");
                    }
                }
            }

            thread::sleep(self.interval);
        }
    }
}
