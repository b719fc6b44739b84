//! Worker thread spawning and supervision handles.

mod control;
mod poller;

pub use control::ControlThread;
pub use poller::PollerThread;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::LakshyaConfig;
use crate::shared::SharedState;

pub struct ThreadHandles {
    pub poller: JoinHandle<()>,
    pub control: JoinHandle<()>,
}

impl ThreadHandles {
    /// True when any worker has exited, expectedly or not.
    pub fn any_finished(&self) -> bool {
        self.poller.is_finished() || self.control.is_finished()
    }
}

/// Spawn the detection poller and the control loop.
pub fn spawn_threads(config: LakshyaConfig, shared: Arc<SharedState>) -> ThreadHandles {
    let poller_config = config.clone();
    let poller_shared = Arc::clone(&shared);
    let poller = thread::Builder::new()
        .name("pose-poller".into())
        .spawn(move || {
            let mut thread = PollerThread::new(&poller_config, poller_shared);
            thread.run();
        })
        .expect("Failed to spawn pose poller thread");

    let control_shared = Arc::clone(&shared);
    let control = thread::Builder::new()
        .name("control-loop".into())
        .spawn(move || {
            let mut thread = ControlThread::new(&config, control_shared);
            thread.run();
        })
        .expect("Failed to spawn control loop thread");

    ThreadHandles { poller, control }
}
