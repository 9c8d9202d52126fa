//! ---
//! ipc_section: "03-node-binaries"
//! ipc_subsection: "binary"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Navigation RPC server steering via movement commands."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
use std::f64::consts::{FRAC_PI_4, PI, TAU};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use parking_lot::Mutex;
use serde_json::json;
use tokio::signal;
use tracing::{info, warn};

use potrero_common::{init_tracing, AppConfig};
use potrero_ipc::{Dispatcher, RpcServer};
use potrero_schema::{Direction, NavigateRequest, NodeId, Odometry, UserInput};
use potrero_transport::RedisBroker;

/// Give the simulator time to integrate a command and publish new
/// odometry before deciding on the next one.
const CONTROL_PERIOD: Duration = Duration::from_millis(60);
/// Commands issued before a navigation attempt is abandoned.
const MAX_STEPS: u32 = 2000;
/// Ticks waited for the first odometry sample.
const ODOMETRY_WAIT_TICKS: u32 = 50;

type SharedPose = Arc<Mutex<Option<Odometry>>>;

#[derive(Debug, Parser)]
#[command(author, version, about = "Potrero navigation server", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "navigator", help = "Node identity to publish under")]
    node_id: String,
}

/// Smallest signed rotation from `from` to `to`, in (-PI, PI].
fn angular_error(from: f64, to: f64) -> f64 {
    let delta = (to - from).rem_euclid(TAU);
    if delta > PI {
        delta - TAU
    } else {
        delta
    }
}

/// Next discrete command moving the robot toward the target: turn until
/// roughly facing it, then step forward.
fn next_command(pose: &Odometry, target_x: f64, target_y: f64) -> Direction {
    let desired = (target_y - pose.y_position()).atan2(target_x - pose.x_position());
    let error = angular_error(pose.heading(), desired);
    if error > FRAC_PI_4 {
        Direction::Left
    } else if error < -FRAC_PI_4 {
        Direction::Right
    } else {
        Direction::Forward
    }
}

fn distance_to(pose: &Odometry, target_x: f64, target_y: f64) -> f64 {
    let dx = target_x - pose.x_position();
    let dy = target_y - pose.y_position();
    (dx * dx + dy * dy).sqrt()
}

async fn navigate(
    dispatcher: Arc<Dispatcher>,
    pose: SharedPose,
    request: NavigateRequest,
) -> std::result::Result<serde_json::Value, String> {
    let target = request.position();

    let mut waited = 0;
    while pose.lock().is_none() {
        waited += 1;
        if waited > ODOMETRY_WAIT_TICKS {
            return Err("no odometry received; is the simulator running?".to_owned());
        }
        tokio::time::sleep(CONTROL_PERIOD).await;
    }

    for _ in 0..MAX_STEPS {
        let current = match *pose.lock() {
            Some(current) => current,
            None => return Err("odometry stream lost".to_owned()),
        };
        if distance_to(&current, target.x, target.y) <= request.tolerance() {
            return Ok(json!({ "x": current.x_position(), "y": current.y_position() }));
        }

        let direction = next_command(&current, target.x, target.y);
        dispatcher
            .publish(&UserInput { direction })
            .await
            .map_err(|err| format!("failed to publish movement command: {err}"))?;
        tokio::time::sleep(CONTROL_PERIOD).await;
    }

    Err(format!(
        "gave up after {MAX_STEPS} commands without reaching ({}, {}) within {}",
        target.x,
        target.y,
        request.tolerance()
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/potrero.toml"));

    let config = AppConfig::load_or_default(&candidates)?;
    init_tracing("potrero-navd", &config.logging)?;

    let broker = RedisBroker::connect(&config.broker.host, config.broker.port).await?;
    let dispatcher = Arc::new(Dispatcher::new(NodeId::new(cli.node_id), Arc::new(broker)));

    let pose: SharedPose = Arc::new(Mutex::new(None));
    let pose_for_sub = Arc::clone(&pose);
    let _odometry = dispatcher
        .subscribe(move |msg: Odometry| {
            let pose = Arc::clone(&pose_for_sub);
            async move {
                *pose.lock() = Some(msg);
            }
        })
        .await?;

    let dispatcher_for_rpc = Arc::clone(&dispatcher);
    let pose_for_rpc = Arc::clone(&pose);
    let _server = RpcServer::<NavigateRequest>::serve(Arc::clone(&dispatcher), move |request| {
        let dispatcher = Arc::clone(&dispatcher_for_rpc);
        let pose = Arc::clone(&pose_for_rpc);
        async move {
            let target = request.position();
            info!(x = target.x, y = target.y, tolerance = request.tolerance(), "navigation requested");
            let outcome = navigate(dispatcher, pose, request).await;
            if let Err(reason) = &outcome {
                warn!(%reason, "navigation failed");
            }
            outcome
        }
    })
    .await?;

    info!("navigation server running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    Ok(())
}
