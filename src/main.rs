//! Binary entrypoint: seek one pixel target, then exit.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lakshya_nav::{
    ControlState, ImagePoint, LakshyaConfig, Result, SeekController, SeekParams, SharedState,
    spawn_threads,
};

const DEFAULT_CONFIG: &str = "lakshya.toml";
const SUPERVISOR_INTERVAL: Duration = Duration::from_millis(200);

struct CliArgs {
    config_path: Option<PathBuf>,
    vision_url: Option<String>,
    robot_url: Option<String>,
    target: Option<ImagePoint>,
}

fn print_usage() {
    eprintln!("Usage: lakshya-nav --target X,Y [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --target <x,y>    Pixel target to seek (required)");
    eprintln!("  --config <path>   Configuration file (default: {DEFAULT_CONFIG} if present)");
    eprintln!("  --vision <url>    Detection service base URL override");
    eprintln!("  --robot <url>     Chassis base URL override");
}

fn parse_target(value: &str) -> std::result::Result<ImagePoint, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("Target must be X,Y, got '{value}'"))?;
    let x: f32 = x
        .trim()
        .parse()
        .map_err(|_| format!("Bad target x coordinate '{x}'"))?;
    let y: f32 = y
        .trim()
        .parse()
        .map_err(|_| format!("Bad target y coordinate '{y}'"))?;
    Ok(ImagePoint::new(x, y))
}

fn parse_args() -> std::result::Result<CliArgs, String> {
    let mut parsed = CliArgs {
        config_path: None,
        vision_url: None,
        robot_url: None,
        target: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--target" => {
                let value = args.next().ok_or("--target needs a value")?;
                parsed.target = Some(parse_target(&value)?);
            }
            "--config" => {
                let value = args.next().ok_or("--config needs a path")?;
                parsed.config_path = Some(PathBuf::from(value));
            }
            "--vision" => {
                parsed.vision_url = Some(args.next().ok_or("--vision needs a URL")?);
            }
            "--robot" => {
                parsed.robot_url = Some(args.next().ok_or("--robot needs a URL")?);
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("Unknown argument: {other}")),
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("lakshya_nav=info".parse().unwrap()),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            print_usage();
            std::process::exit(1);
        }
    };
    let Some(target) = args.target else {
        eprintln!("No --target given");
        print_usage();
        std::process::exit(1);
    };

    let mut config = match &args.config_path {
        Some(path) => LakshyaConfig::load(path)?,
        None => {
            let fallback = Path::new(DEFAULT_CONFIG);
            if fallback.exists() {
                info!("Loading configuration from {DEFAULT_CONFIG}");
                LakshyaConfig::load(fallback)?
            } else {
                info!("Using default configuration");
                LakshyaConfig::default()
            }
        }
    };
    if let Some(url) = args.vision_url {
        config.vision.base_url = url;
    }
    if let Some(url) = args.robot_url {
        config.robot.base_url = url;
    }
    config.validate()?;

    info!("LakshyaNav v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Detection service: {}", config.vision.base_url);
    info!("Chassis: {}", config.robot.base_url);
    info!(
        "Target ({:.1}, {:.1}), arrival radius {:.0}px, {} iterations / {} rotation steps max",
        target.x,
        target.y,
        config.control.arrival_threshold,
        config.control.max_iterations,
        config.control.max_rotation_steps
    );

    let interrupt = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&interrupt))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&interrupt))?;

    let controller = SeekController::new(SeekParams::from(&config.control));
    let shared = Arc::new(SharedState::new(controller));
    let handles = spawn_threads(config, Arc::clone(&shared));

    shared.set_target(target);

    let mut interrupted = false;
    loop {
        thread::sleep(SUPERVISOR_INTERVAL);

        if interrupt.load(Ordering::Relaxed) {
            warn!("Interrupt received; cancelling seek");
            shared.cancel();
            interrupted = true;
            break;
        }
        if shared.control_state().is_terminal() {
            break;
        }
        if shared.should_shutdown() {
            // A worker requested shutdown, e.g. after a failed preflight.
            break;
        }
        if handles.any_finished() {
            warn!("A worker thread exited unexpectedly");
            break;
        }
    }

    shared.signal_shutdown();
    if let Err(e) = handles.poller.join() {
        error!("Pose poller panicked: {e:?}");
    }
    if let Err(e) = handles.control.join() {
        error!("Control loop panicked: {e:?}");
    }

    let session = shared.snapshot();
    match session.state {
        ControlState::Success => info!(
            "Seek finished: SUCCESS in {} iterations ({} path points)",
            session.iteration, session.path_len
        ),
        ControlState::Failed => warn!(
            "Seek finished: FAILED after {} iterations ({} rotation steps)",
            session.iteration, session.rotation_steps
        ),
        state => info!(
            "Seek ended in state {state} after {} iterations",
            session.iteration
        ),
    }

    if session.state != ControlState::Success && !interrupted {
        std::process::exit(1);
    }
    Ok(())
}
