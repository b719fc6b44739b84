//! Wire-level tests for the vision feed and the chassis channel,
//! against an in-process HTTP stub.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use lakshya_nav::config::{RobotConfig, VisionConfig};
use lakshya_nav::{
    ControlState, DriveCommand, ImagePoint, RobotChannel, SeekController, SeekParams, VisionClient,
};

// ============================================================================
// Stub server
// ============================================================================

type RequestLog = Arc<Mutex<Vec<(String, Instant)>>>;

/// Minimal HTTP stub: one request per connection, response chosen by the
/// closure from the request path. Serves until the test process exits.
fn spawn_stub<F>(respond: F) -> (String, RequestLog)
where
    F: Fn(&str) -> (u16, String) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let thread_log = Arc::clone(&log);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let mut buf = [0u8; 1024];
            let n = stream.read(&mut buf).unwrap_or(0);
            let head = String::from_utf8_lossy(&buf[..n]);
            let path = head
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or("/")
                .to_string();
            thread_log
                .lock()
                .unwrap()
                .push((path.clone(), Instant::now()));

            let (status, body) = respond(&path);
            let reason = if status == 200 { "OK" } else { "Error" };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    (base_url, log)
}

/// Bound-then-dropped port: connections get refused immediately.
fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

fn paths(log: &RequestLog) -> Vec<String> {
    log.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
}

fn robot_channel(base_url: &str, pulse_ms: u64) -> RobotChannel {
    let mut config = RobotConfig::default();
    config.base_url = base_url.to_string();
    config.pulse_duration_ms = pulse_ms;
    RobotChannel::new(&config)
}

fn vision_client(base_url: &str) -> VisionClient {
    let mut config = VisionConfig::default();
    config.base_url = base_url.to_string();
    VisionClient::new(&config)
}

fn frame(front: (f32, f32), back: (f32, f32)) -> String {
    format!(
        r#"{{"detections":[{{"confidence":0.9,"keypoints":[{{"name":"front","x":{},"y":{},"confidence":0.95}},{{"name":"back","x":{},"y":{},"confidence":0.93}}]}}],"fps":25.0,"inference_ms":30.0}}"#,
        front.0, front.1, back.0, back.1
    )
}

// ============================================================================
// Chassis channel
// ============================================================================

#[test]
fn send_hits_the_mapped_endpoint() {
    let (url, log) = spawn_stub(|_| (200, String::new()));
    let channel = robot_channel(&url, 50);

    assert!(channel.send(DriveCommand::Advance));
    assert!(channel.send(DriveCommand::TurnLeft));
    assert!(channel.send(DriveCommand::TurnRight));
    assert!(channel.stop());

    assert_eq!(paths(&log), vec!["/back", "/left", "/right", "/stop"]);
}

#[test]
fn send_reports_rejection() {
    let (url, log) = spawn_stub(|_| (500, String::new()));
    let channel = robot_channel(&url, 50);
    assert!(!channel.send(DriveCommand::Advance));
    assert_eq!(paths(&log), vec!["/back"]);
}

#[test]
fn send_reports_transport_failure() {
    let channel = robot_channel(&dead_url(), 50);
    assert!(!channel.send(DriveCommand::Stop));
}

#[test]
fn pulse_holds_then_stops() {
    let (url, log) = spawn_stub(|_| (200, String::new()));
    let channel = robot_channel(&url, 80);

    assert!(channel.pulse(DriveCommand::Advance));

    let log = log.lock().unwrap();
    let seen: Vec<&str> = log.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(seen, vec!["/back", "/stop"]);
    let held = log[1].1.duration_since(log[0].1);
    assert!(held >= Duration::from_millis(80), "held only {held:?}");
}

#[test]
fn pulse_sends_stop_after_failed_command() {
    let (url, log) = spawn_stub(|path| {
        if path == "/stop" {
            (200, String::new())
        } else {
            (500, String::new())
        }
    });
    let channel = robot_channel(&url, 50);

    // The initiating send is rejected; the trailing stop still goes out.
    assert!(!channel.pulse(DriveCommand::Advance));
    assert_eq!(paths(&log), vec!["/back", "/stop"]);
}

#[test]
fn pulse_stop_skips_the_hold() {
    let (url, log) = spawn_stub(|_| (200, String::new()));
    let channel = robot_channel(&url, 5000);

    let started = Instant::now();
    assert!(channel.pulse(DriveCommand::Stop));
    assert!(started.elapsed() < Duration::from_millis(1000));
    assert_eq!(paths(&log), vec!["/stop"]);
}

// ============================================================================
// Vision feed
// ============================================================================

#[test]
fn poll_returns_pose_and_stats() {
    let body = frame((320.5, 240.1), (300.2, 250.7));
    let (url, log) = spawn_stub(move |path| {
        assert_eq!(path, "/detections");
        (200, body.clone())
    });
    let mut client = vision_client(&url);

    let pose = client.poll().unwrap().unwrap();
    assert!((pose.front.x - 320.5).abs() < 1e-4);
    assert!((pose.front.y - 240.1).abs() < 1e-4);
    assert!((pose.back.x - 300.2).abs() < 1e-4);
    assert!((client.stats().fps - 25.0).abs() < 1e-4);
    assert!((client.stats().inference_ms - 30.0).abs() < 1e-4);
    assert_eq!(paths(&log).len(), 1);
}

#[test]
fn poll_low_confidence_is_no_pose() {
    let body = r#"{"detections":[{"keypoints":[
        {"name":"front","x":10.0,"y":10.0,"confidence":0.12},
        {"name":"back","x":20.0,"y":20.0,"confidence":0.55}
    ]}],"fps":22.0,"inference_ms":41.0}"#
        .to_string();
    let (url, _log) = spawn_stub(move |_| (200, body.clone()));
    let mut client = vision_client(&url);

    // Service answered, frame unusable: not an error.
    assert!(client.poll().unwrap().is_none());
    assert!((client.stats().last_confidence - 0.12).abs() < 1e-4);
    assert!((client.stats().fps - 22.0).abs() < 1e-4);
}

#[test]
fn poll_empty_frame_is_no_pose() {
    let (url, _log) = spawn_stub(|_| {
        (
            200,
            r#"{"detections":[],"fps":5.0,"inference_ms":11.0}"#.to_string(),
        )
    });
    let mut client = vision_client(&url);
    assert!(client.poll().unwrap().is_none());
    assert!((client.stats().fps - 5.0).abs() < 1e-4);
}

#[test]
fn poll_out_of_range_index_falls_back() {
    let body = frame((100.0, 100.0), (80.0, 100.0));
    let (url, _log) = spawn_stub(move |_| (200, body.clone()));

    let mut config = VisionConfig::default();
    config.base_url = url;
    config.tracked_index = 3;
    let mut client = VisionClient::new(&config);

    let pose = client.poll().unwrap().unwrap();
    assert!((pose.front.x - 100.0).abs() < 1e-4);
}

#[test]
fn poll_malformed_payload_is_error() {
    let (url, _log) = spawn_stub(|_| (200, "not json at all".to_string()));
    let mut client = vision_client(&url);
    assert!(client.poll().is_err());
}

#[test]
fn poll_transport_failure_is_error() {
    let mut client = vision_client(&dead_url());
    assert!(client.poll().is_err());
}

#[test]
fn health_probe() {
    let (url, log) = spawn_stub(|_| (200, "ok".to_string()));
    assert!(vision_client(&url).check_health().is_ok());
    assert_eq!(paths(&log), vec!["/health"]);

    assert!(vision_client(&dead_url()).check_health().is_err());
}

// ============================================================================
// Closed loop against both stubs
// ============================================================================

#[test]
fn closed_loop_reaches_target_through_stubs() {
    // Scripted detections: misaligned and far, then aligned and far,
    // then inside the arrival radius of target (400, 100).
    let frames = [
        frame((100.0, 100.0), (100.0, 120.0)),
        frame((100.0, 100.0), (80.0, 100.0)),
        frame((390.0, 100.0), (370.0, 100.0)),
    ];
    let served = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&served);
    let (vision_url, _vision_log) = spawn_stub(move |_| {
        let mut i = counter.lock().unwrap();
        let body = frames[(*i).min(frames.len() - 1)].clone();
        *i += 1;
        (200, body)
    });
    let (robot_url, robot_log) = spawn_stub(|_| (200, String::new()));

    let mut client = vision_client(&vision_url);
    let channel = robot_channel(&robot_url, 10);
    let mut controller = SeekController::new(SeekParams::default());
    controller.set_target(ImagePoint::new(400.0, 100.0));

    while controller.state().is_active() {
        let pose = client.poll().unwrap().unwrap();
        if let Some(command) = controller.get_command(&pose) {
            channel.pulse(command);
        }
    }

    assert_eq!(controller.state(), ControlState::Success);
    assert_eq!(controller.session().iteration, 3);
    assert_eq!(
        paths(&robot_log),
        vec!["/right", "/stop", "/back", "/stop", "/stop"]
    );
}
