//! ---
//! ipc_section: "03-node-binaries"
//! ipc_subsection: "binary"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Keyboard node translating arrow keys into commands."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::sync::mpsc;
use tracing::{info, warn};

use potrero_common::{init_tracing, AppConfig, LogFormat};
use potrero_ipc::Dispatcher;
use potrero_schema::{Direction, NodeId, UserInput};
use potrero_transport::RedisBroker;

const KEY_POLL_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(author, version, about = "Potrero keyboard remote control", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "potrero_rc", help = "Node identity to publish under")]
    node_id: String,
}

fn direction_for(code: KeyCode) -> Option<Direction> {
    match code {
        KeyCode::Left => Some(Direction::Left),
        KeyCode::Right => Some(Direction::Right),
        KeyCode::Up => Some(Direction::Forward),
        KeyCode::Down => Some(Direction::Backward),
        _ => None,
    }
}

/// Blocking keyboard reader. Runs on a dedicated thread because crossterm
/// event polling is synchronous; commands flow back over the channel.
/// Returning closes the channel, which ends the publish loop.
fn read_keyboard(tx: mpsc::UnboundedSender<Direction>) {
    loop {
        // The publish loop dropping its receiver is the exit signal; check
        // every poll tick so exit does not wait for another keypress.
        if tx.is_closed() {
            return;
        }
        match event::poll(KEY_POLL_PERIOD) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                warn!(error = %err, "keyboard poll failed");
                return;
            }
        }
        let key = match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
            Ok(_) => continue,
            Err(err) => {
                warn!(error = %err, "keyboard read failed");
                return;
            }
        };
        if key.code == KeyCode::Char('q') {
            return;
        }
        if let Some(direction) = direction_for(key.code) {
            if tx.send(direction).is_err() {
                return;
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

    let mut config = AppConfig::load_or_default(&candidates)?;
    // Structured JSON is unreadable on a raw-mode terminal.
    config.logging.format = LogFormat::Pretty;
    init_tracing("potrero-rc", &config.logging)?;

    let broker = RedisBroker::connect(&config.broker.host, config.broker.port).await?;
    let dispatcher = Arc::new(Dispatcher::new(NodeId::new(cli.node_id), Arc::new(broker)));

    println!("# Welcome to Potrero remote control.");
    println!("# Left/right arrows turn the robot; up/down move it.");
    println!("# Press 'q' to exit.");

    enable_raw_mode()?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let reader = tokio::task::spawn_blocking(move || read_keyboard(tx));

    let result = async {
        while let Some(direction) = rx.recv().await {
            print!("\rDIRECTION: [{:?}]   ", direction);
            std::io::Write::flush(&mut std::io::stdout())?;
            dispatcher.publish(&UserInput { direction }).await?;
        }
        Ok::<_, anyhow::Error>(())
    }
    .await;

    disable_raw_mode()?;
    println!();
    reader.await?;
    result?;
    info!("remote control exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrow_keys_map_to_directions() {
        assert_eq!(direction_for(KeyCode::Left), Some(Direction::Left));
        assert_eq!(direction_for(KeyCode::Right), Some(Direction::Right));
        assert_eq!(direction_for(KeyCode::Up), Some(Direction::Forward));
        assert_eq!(direction_for(KeyCode::Down), Some(Direction::Backward));
    }

    #[test]
    fn other_keys_are_ignored() {
        assert_eq!(direction_for(KeyCode::Char('w')), None);
        assert_eq!(direction_for(KeyCode::Esc), None);
    }

    #[test]
    fn reader_exit_signal_needs_no_keypress() {
        // The poll loop exits on a closed channel, so the flag must flip
        // as soon as the receiver is gone, not on the next failed send.
        let (tx, rx) = mpsc::unbounded_channel::<Direction>();
        assert!(!tx.is_closed());
        drop(rx);
        assert!(tx.is_closed());
    }
}
