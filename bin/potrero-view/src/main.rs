//! ---
//! ipc_section: "03-node-binaries"
//! ipc_subsection: "binary"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Viewer node rendering odometry as an ASCII map."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
use std::f64::consts::{FRAC_PI_4, TAU};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::info;

use potrero_common::{init_tracing, AppConfig};
use potrero_ipc::Dispatcher;
use potrero_schema::{NodeId, Odometry};
use potrero_transport::RedisBroker;

/// Inclusive map bounds, shared with the simulator's world.
const MAP_MIN: f64 = -10.0;
const MAP_MAX: f64 = 10.0;

#[derive(Debug, Parser)]
#[command(author, version, about = "Potrero odometry viewer", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "potrero_view", help = "Node identity")]
    node_id: String,
}

/// Nearest cardinal glyph for a heading in radians (0 = east, counter-
/// clockwise positive).
fn heading_glyph(heading: f64) -> char {
    let h = heading.rem_euclid(TAU);
    if h < FRAC_PI_4 || h >= 7.0 * FRAC_PI_4 {
        '>'
    } else if h < 3.0 * FRAC_PI_4 {
        '^'
    } else if h < 5.0 * FRAC_PI_4 {
        '<'
    } else {
        'v'
    }
}

/// Render the pose as a labelled 2-D text map. The robot's row carries its
/// heading glyph at the clamped x cell; every other row is empty track.
fn render_map(msg: &Odometry) -> String {
    let width = (MAP_MAX - MAP_MIN) as usize;
    let height = (MAP_MAX - MAP_MIN) as usize;

    let column = ((msg.x_position() - MAP_MIN).clamp(0.0, width as f64) as usize).min(width - 1);
    let row = ((msg.y_position() - MAP_MIN).clamp(0.0, height as f64) as usize).min(height - 1);

    let robot_line = format!(
        "{}|{}{}{}|{} [{:.1}]",
        MAP_MIN,
        "-".repeat(column),
        heading_glyph(msg.heading()),
        "-".repeat(width - column - 1),
        MAP_MAX,
        msg.x_position()
    );
    let empty_line = format!("{}|{}|{}", MAP_MIN, "-".repeat(width), MAP_MAX);

    let mut out = String::new();
    out.push_str(&format!("{} [{:.1}]\n", MAP_MAX, msg.y_position()));
    for _ in 0..(height - row - 1) {
        out.push_str(&empty_line);
        out.push('\n');
    }
    out.push_str(&robot_line);
    out.push('\n');
    for _ in 0..row {
        out.push_str(&empty_line);
        out.push('\n');
    }
    out.push_str(&format!("{}\n", MAP_MIN));
    out
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
    init_tracing("potrero-view", &config.logging)?;

    let broker = RedisBroker::connect(&config.broker.host, config.broker.port).await?;
    let dispatcher = Arc::new(Dispatcher::new(NodeId::new(cli.node_id), Arc::new(broker)));

    println!("# Potrero viewer: a map of your robot in the world.");

    let _odometry = dispatcher
        .subscribe(|msg: Odometry| async move {
            print!("{}", render_map(&msg));
        })
        .await?;

    info!("viewer running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn glyph_follows_quadrant() {
        assert_eq!(heading_glyph(0.0), '>');
        assert_eq!(heading_glyph(FRAC_PI_2), '^');
        assert_eq!(heading_glyph(PI), '<');
        assert_eq!(heading_glyph(-FRAC_PI_2), 'v');
    }

    #[test]
    fn map_places_robot_row_and_column() {
        let msg = Odometry::new(0.0, 0.0, FRAC_PI_2).expect("valid");
        let map = render_map(&msg);
        let robot_line = map
            .lines()
            .find(|line| line.contains('^'))
            .expect("robot row present");
        assert!(robot_line.starts_with("-10|----------^"));
        // Origin sits mid-map: equal empty rows above and below.
        let empties = map.lines().filter(|l| !l.contains('^')).count();
        assert_eq!(empties, 21);
    }

    #[test]
    fn map_clamps_out_of_bounds_pose() {
        let msg = Odometry::new(42.0, -42.0, 0.0).expect("valid");
        let map = render_map(&msg);
        assert!(map.contains('>'));
    }
}
