//! Best-effort HTTP command channel to the chassis firmware.
//!
//! The chassis joins the camera's WiFi network and exposes one GET
//! endpoint per motion. Commands are fire-and-forget: the link drops
//! requests routinely, so failures are logged and reported to the
//! caller as `false` instead of aborting the run.

use std::fmt;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::RobotConfig;

/// A single drive action the chassis understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveCommand {
    Advance,
    TurnLeft,
    TurnRight,
    Stop,
}

impl DriveCommand {
    /// Endpoint path on the chassis firmware.
    ///
    /// The chassis camera faces opposite the travel direction, so
    /// advancing toward the target maps to the firmware's "back" motion.
    pub fn endpoint(&self) -> &'static str {
        match self {
            DriveCommand::Advance => "back",
            DriveCommand::TurnLeft => "left",
            DriveCommand::TurnRight => "right",
            DriveCommand::Stop => "stop",
        }
    }
}

impl fmt::Display for DriveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriveCommand::Advance => "ADVANCE",
            DriveCommand::TurnLeft => "TURN_LEFT",
            DriveCommand::TurnRight => "TURN_RIGHT",
            DriveCommand::Stop => "STOP",
        };
        write!(f, "{s}")
    }
}

/// HTTP channel to the chassis.
pub struct RobotChannel {
    agent: ureq::Agent,
    base_url: String,
    pulse_duration: Duration,
}

impl RobotChannel {
    pub fn new(config: &RobotConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.request_timeout())
            .build();
        RobotChannel {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            pulse_duration: config.pulse_duration(),
        }
    }

    /// Fire one command at the chassis. Returns whether the chassis
    /// acknowledged it with a success status.
    pub fn send(&self, command: DriveCommand) -> bool {
        let url = format!("{}/{}", self.base_url, command.endpoint());
        match self.agent.get(&url).call() {
            Ok(_) => {
                debug!("Sent {command}");
                true
            }
            Err(ureq::Error::Status(code, _)) => {
                warn!("Command {command} rejected with HTTP {code}");
                false
            }
            Err(e) => {
                warn!("Command {command} failed: {e}");
                false
            }
        }
    }

    /// Drive pulse: send the command, hold for the pulse duration, stop.
    ///
    /// The trailing stop goes out even when the initiating send failed.
    /// The chassis may have acted on a request whose response was lost,
    /// and an unmatched motion command leaves the motors running.
    pub fn pulse(&self, command: DriveCommand) -> bool {
        if command == DriveCommand::Stop {
            return self.send(DriveCommand::Stop);
        }
        let sent = self.send(command);
        thread::sleep(self.pulse_duration);
        let stopped = self.send(DriveCommand::Stop);
        if !stopped {
            error!("Trailing stop after {command} failed; chassis may still be moving");
        }
        sent && stopped
    }

    pub fn stop(&self) -> bool {
        self.send(DriveCommand::Stop)
    }

    /// Reachability probe at startup, logged only. The chassis link is
    /// expected to be flaky, so an unreachable chassis is not fatal.
    pub fn check_reachable(&self) {
        let url = format!("{}/", self.base_url);
        match self.agent.get(&url).timeout(Duration::from_secs(5)).call() {
            Ok(_) | Err(ureq::Error::Status(_, _)) => {
                info!("Chassis reachable at {}", self.base_url);
            }
            Err(e) => {
                warn!("Chassis not responding at {}: {e}", self.base_url);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_mapping() {
        assert_eq!(DriveCommand::Advance.endpoint(), "back");
        assert_eq!(DriveCommand::TurnLeft.endpoint(), "left");
        assert_eq!(DriveCommand::TurnRight.endpoint(), "right");
        assert_eq!(DriveCommand::Stop.endpoint(), "stop");
    }

    #[test]
    fn test_display() {
        assert_eq!(DriveCommand::Advance.to_string(), "ADVANCE");
        assert_eq!(DriveCommand::TurnRight.to_string(), "TURN_RIGHT");
    }
}
