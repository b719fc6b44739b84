//! HTTP client for the marker detection service.
//!
//! The service runs pose inference on an overhead camera stream and
//! exposes the latest frame's detections as JSON. Each detection carries
//! a keypoint pair (the two markers taped to the chassis); this module
//! turns that payload into a [`RobotPose`].

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::VisionConfig;
use crate::error::{LakshyaError, Result};
use crate::geometry::ImagePoint;
use crate::pose::RobotPose;

/// One named marker keypoint in pixel coordinates.
#[derive(Debug, Clone, Deserialize)]
pub struct Keypoint {
    #[serde(default)]
    pub name: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub confidence: f32,
}

impl Keypoint {
    pub fn point(&self) -> ImagePoint {
        ImagePoint::new(self.x, self.y)
    }
}

/// One detected chassis with its keypoint pair.
#[derive(Debug, Clone, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub keypoints: Vec<Keypoint>,
}

impl Detection {
    /// Front and back markers, honouring which keypoint slot is the front.
    ///
    /// Returns `None` when the detection does not carry both markers or
    /// the slot index is out of range.
    pub fn marker_pair(&self, front_keypoint: usize) -> Option<(&Keypoint, &Keypoint)> {
        let back_slot = match front_keypoint {
            0 => 1,
            1 => 0,
            _ => return None,
        };
        let front = self.keypoints.get(front_keypoint)?;
        let back = self.keypoints.get(back_slot)?;
        Some((front, back))
    }
}

/// Response of the detections endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionsResponse {
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub fps: f32,
    #[serde(default)]
    pub inference_ms: f32,
}

impl DetectionsResponse {
    /// Detection at `index`, falling back to the first one in frame when
    /// the index is out of range. The flag reports whether the fallback
    /// was taken. `None` only for an empty frame.
    pub fn tracked(&self, index: usize) -> Option<(&Detection, bool)> {
        if let Some(detection) = self.detections.get(index) {
            return Some((detection, false));
        }
        self.detections.first().map(|d| (d, true))
    }
}

/// Stats the service reports alongside each frame, plus the confidence of
/// the most recently inspected marker pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedStats {
    pub fps: f32,
    pub inference_ms: f32,
    pub last_confidence: f32,
}

/// Polling client for the detection service.
pub struct VisionClient {
    agent: ureq::Agent,
    base_url: String,
    tracked_index: usize,
    front_keypoint: usize,
    min_confidence: f32,
    stats: FeedStats,
    fallback_active: bool,
}

impl VisionClient {
    pub fn new(config: &VisionConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.request_timeout())
            .build();
        VisionClient {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tracked_index: config.tracked_index,
            front_keypoint: config.front_keypoint,
            min_confidence: config.min_confidence,
            stats: FeedStats::default(),
            fallback_active: false,
        }
    }

    /// Probe the service before entering the poll loop.
    ///
    /// A reachable service that answers with an error status is reported
    /// but tolerated; only a transport failure is fatal here.
    pub fn check_health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        match self.agent.get(&url).timeout(Duration::from_secs(5)).call() {
            Ok(_) => {
                info!("Detection service reachable at {}", self.base_url);
                Ok(())
            }
            Err(ureq::Error::Status(code, _)) => {
                warn!("Detection service health probe returned HTTP {code}; continuing");
                Ok(())
            }
            Err(e) => Err(LakshyaError::Vision(format!(
                "detection service unreachable at {}: {e}",
                self.base_url
            ))),
        }
    }

    /// Fetch the current detections and reduce them to a chassis pose.
    ///
    /// `Ok(None)` means the service answered but the frame held no usable
    /// pose; `Err` means the request itself failed.
    pub fn poll(&mut self) -> Result<Option<RobotPose>> {
        let url = format!("{}/detections", self.base_url);
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| LakshyaError::Vision(e.to_string()))?;
        let payload: DetectionsResponse = response
            .into_json()
            .map_err(|e| LakshyaError::Vision(format!("bad detections payload: {e}")))?;

        self.stats.fps = payload.fps;
        self.stats.inference_ms = payload.inference_ms;
        Ok(self.select_pose(&payload))
    }

    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    fn select_pose(&mut self, payload: &DetectionsResponse) -> Option<RobotPose> {
        let (detection, fell_back) = payload.tracked(self.tracked_index)?;

        if fell_back && !self.fallback_active {
            warn!(
                "Detection {} not in frame ({} available); tracking the first instead",
                self.tracked_index,
                payload.detections.len()
            );
            self.fallback_active = true;
        } else if !fell_back && self.fallback_active {
            info!("Detection {} back in frame", self.tracked_index);
            self.fallback_active = false;
        }

        let Some((front, back)) = detection.marker_pair(self.front_keypoint) else {
            debug!(
                "Detection carries {} keypoints, need a marker pair",
                detection.keypoints.len()
            );
            return None;
        };

        let confidence = front.confidence.min(back.confidence);
        self.stats.last_confidence = confidence;
        if confidence < self.min_confidence {
            debug!(
                "Discarding low-confidence marker pair ({:.2} < {:.2})",
                confidence, self.min_confidence
            );
            return None;
        }

        Some(RobotPose::new(front.point(), back.point()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "detections": [
            {
                "bbox": [290.0, 230.0, 340.0, 265.0],
                "confidence": 0.91,
                "keypoints": [
                    {"name": "front", "x": 320.5, "y": 240.1, "confidence": 0.92},
                    {"name": "back", "x": 300.2, "y": 250.7, "confidence": 0.88}
                ]
            }
        ],
        "fps": 24.8,
        "inference_ms": 34.2
    }"#;

    fn client(config: VisionConfig) -> VisionClient {
        VisionClient::new(&config)
    }

    fn parsed() -> DetectionsResponse {
        serde_json::from_str(PAYLOAD).unwrap()
    }

    #[test]
    fn test_parse_detections_payload() {
        let payload = parsed();
        assert_eq!(payload.detections.len(), 1);
        assert!((payload.fps - 24.8).abs() < 1e-5);
        assert!((payload.inference_ms - 34.2).abs() < 1e-5);
        let kp = &payload.detections[0].keypoints[0];
        assert_eq!(kp.name, "front");
        assert!((kp.x - 320.5).abs() < 1e-5);
    }

    #[test]
    fn test_tracked_falls_back_to_first() {
        let payload = parsed();
        let (_, fell_back) = payload.tracked(0).unwrap();
        assert!(!fell_back);
        let (detection, fell_back) = payload.tracked(3).unwrap();
        assert!(fell_back);
        assert_eq!(detection.keypoints.len(), 2);

        let empty = DetectionsResponse {
            detections: vec![],
            fps: 0.0,
            inference_ms: 0.0,
        };
        assert!(empty.tracked(0).is_none());
    }

    #[test]
    fn test_marker_pair_respects_front_slot() {
        let payload = parsed();
        let detection = &payload.detections[0];

        let (front, back) = detection.marker_pair(0).unwrap();
        assert_eq!(front.name, "front");
        assert_eq!(back.name, "back");

        let (front, back) = detection.marker_pair(1).unwrap();
        assert_eq!(front.name, "back");
        assert_eq!(back.name, "front");

        assert!(detection.marker_pair(2).is_none());
    }

    #[test]
    fn test_select_pose_maps_markers() {
        let mut client = client(VisionConfig::default());
        let pose = client.select_pose(&parsed()).unwrap();
        assert!((pose.front.x - 320.5).abs() < 1e-5);
        assert!((pose.back.y - 250.7).abs() < 1e-5);
        assert!((client.stats().last_confidence - 0.88).abs() < 1e-5);
    }

    #[test]
    fn test_select_pose_rejects_low_confidence() {
        let mut config = VisionConfig::default();
        config.min_confidence = 0.95;
        let mut client = client(config);
        assert!(client.select_pose(&parsed()).is_none());
        assert!((client.stats().last_confidence - 0.88).abs() < 1e-5);
    }

    #[test]
    fn test_select_pose_empty_frame() {
        let mut client = client(VisionConfig::default());
        let empty = DetectionsResponse {
            detections: vec![],
            fps: 12.0,
            inference_ms: 80.0,
        };
        assert!(client.select_pose(&empty).is_none());
    }

    #[test]
    fn test_select_pose_single_keypoint_rejected() {
        let mut client = client(VisionConfig::default());
        let payload: DetectionsResponse = serde_json::from_str(
            r#"{"detections": [{"keypoints": [{"name": "front", "x": 1.0, "y": 2.0, "confidence": 0.9}]}]}"#,
        )
        .unwrap();
        assert!(client.select_pose(&payload).is_none());
    }
}
