//! ---
//! ipc_section: "03-node-binaries"
//! ipc_subsection: "binary"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Simulator node integrating commands into a pose."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
use std::f64::consts::{FRAC_PI_2, TAU};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use parking_lot::Mutex;
use tokio::signal;
use tracing::{debug, info, warn};

use potrero_common::{init_tracing, AppConfig};
use potrero_ipc::Dispatcher;
use potrero_schema::{
    Direction, JoystickDeflection, JoystickType, NodeId, Odometry, UserInput,
};
use potrero_transport::RedisBroker;

/// Inclusive world bounds, shared with the viewer's map.
const WORLD_MIN: f64 = -10.0;
const WORLD_MAX: f64 = 10.0;
/// Distance covered by one discrete forward or backward command.
const STEP: f64 = 0.5;
/// Odometry publish period (20 Hz).
const ODOMETRY_PERIOD: Duration = Duration::from_millis(50);

#[derive(Debug, Parser)]
#[command(author, version, about = "Potrero simulator node", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "simulator", help = "Node identity to publish under")]
    node_id: String,
}

/// Simulated robot state. Heading is in radians, 0 pointing east,
/// increasing counter-clockwise.
#[derive(Debug, Clone, Copy)]
struct Pose {
    x: f64,
    y: f64,
    heading: f64,
}

impl Pose {
    fn origin() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            heading: FRAC_PI_2,
        }
    }

    fn rotate(&mut self, delta: f64) {
        self.heading = (self.heading + delta).rem_euclid(TAU);
    }

    fn advance(&mut self, distance: f64) {
        self.x = (self.x + distance * self.heading.cos()).clamp(WORLD_MIN, WORLD_MAX);
        self.y = (self.y + distance * self.heading.sin()).clamp(WORLD_MIN, WORLD_MAX);
    }

    fn apply_direction(&mut self, direction: Direction) {
        match direction {
            Direction::Left => self.rotate(FRAC_PI_2),
            Direction::Right => self.rotate(-FRAC_PI_2),
            Direction::Forward => self.advance(STEP),
            Direction::Backward => self.advance(-STEP),
        }
    }

    fn apply_deflection(&mut self, msg: &JoystickDeflection) {
        match msg.joystick() {
            JoystickType::TrackLeft | JoystickType::TrackRight => {
                self.advance(msg.deflection() * STEP);
            }
            JoystickType::CabSwing => self.rotate(msg.deflection() * FRAC_PI_2),
            other => {
                debug!(joystick = ?other, "axis not modelled; ignoring");
            }
        }
    }
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
    init_tracing("potrero-sim", &config.logging)?;

    let broker = RedisBroker::connect(&config.broker.host, config.broker.port).await?;
    let dispatcher = Arc::new(Dispatcher::new(NodeId::new(cli.node_id), Arc::new(broker)));
    info!(broker = %format!("{}:{}", config.broker.host, config.broker.port), "simulator connected");

    let pose = Arc::new(Mutex::new(Pose::origin()));

    let pose_for_input = Arc::clone(&pose);
    let _user_input = dispatcher
        .subscribe(move |msg: UserInput| {
            let pose = Arc::clone(&pose_for_input);
            async move {
                pose.lock().apply_direction(msg.direction);
            }
        })
        .await?;

    let pose_for_joystick = Arc::clone(&pose);
    let _joystick = dispatcher
        .subscribe(move |msg: JoystickDeflection| {
            let pose = Arc::clone(&pose_for_joystick);
            async move {
                pose.lock().apply_deflection(&msg);
            }
        })
        .await?;

    let publisher = {
        let dispatcher = Arc::clone(&dispatcher);
        let pose = Arc::clone(&pose);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ODOMETRY_PERIOD);
            loop {
                ticker.tick().await;
                let snapshot = *pose.lock();
                let odometry = match Odometry::new(snapshot.x, snapshot.y, snapshot.heading) {
                    Ok(msg) => msg,
                    Err(err) => {
                        warn!(error = %err, "pose failed validation; skipping sample");
                        continue;
                    }
                };
                if let Err(err) = dispatcher.publish(&odometry).await {
                    warn!(error = %err, "failed to publish odometry");
                }
            }
        })
    };

    info!("simulator running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    publisher.abort();
    Ok(())
}
