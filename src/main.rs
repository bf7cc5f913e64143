//! Weft client - command line session runner
//!
//! Thin shell over the workspace crates: connect to a live weft backend and
//! mirror its app tree, or replay a recorded snapshot offline.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use weft_app::{AppNode, Engine, EngineUpdate, SessionControl};
use weft_core::wire::{BackMsg, ForwardMsgList};
use weft_session::{
    ConnectionManager, ConnectionManagerConfig, FileStorage, HttpEndpoints, SessionEvent,
};

use crate::config::Settings;

/// Weft client - run or replay a weft app session
#[derive(Parser, Debug)]
#[command(name = "weft")]
#[command(about = "Client session runtime for Weft data apps", long_about = None)]
struct Args {
    /// Path to a config file (defaults to ./.weft/config.toml, then the
    /// user config dir)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to a running weft backend and mirror its app tree
    Connect {
        /// Server URL, e.g. http://localhost:8701/
        url: Option<String>,
    },

    /// Replay a recorded snapshot file through the session engine
    Replay {
        /// Path to a serialized message-list snapshot
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    weft_core::logging::init()?;

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref());

    match args.command {
        Command::Connect { url } => run_connect(url, settings).await,
        Command::Replay { path } => run_replay(&path),
    }
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// Session control for offline replay: nothing to send to, nothing to age.
struct ReplayControl;

impl SessionControl for ReplayControl {
    fn send_back_msg(&self, msg: BackMsg) {
        debug!("replay session discards outgoing message: {msg:?}");
    }

    fn increment_message_cache_run_count(&self, _max_age: u32) {}
}

fn run_replay(path: &PathBuf) -> Result<()> {
    let bytes = std::fs::read(path)
        .map_err(|e| eyre!("cannot read snapshot '{}': {e}", path.display()))?;
    let list = ForwardMsgList::decode(&bytes)?;
    info!("replaying {} messages from {}", list.messages.len(), path.display());

    let mut engine = Engine::new(Arc::new(ReplayControl));
    for msg in &list.messages {
        engine.handle_forward_msg(msg)?;
    }

    print_summary(&engine);
    Ok(())
}

// ---------------------------------------------------------------------------
// Connect
// ---------------------------------------------------------------------------

async fn run_connect(url: Option<String>, settings: Settings) -> Result<()> {
    let address = url
        .or(settings.server_url)
        .unwrap_or_else(|| "http://localhost:8701/".to_string());
    let session_url = weft_session::parse_session_url(&address)?;

    let endpoints = Arc::new(HttpEndpoints::new()?);
    let storage = Arc::new(FileStorage::open_default());
    let (shell_tx, mut shell_rx) = mpsc::channel::<SessionEvent>(256);

    let mut manager_config = ConnectionManagerConfig::new(session_url);
    if let Some(static_config_url) = settings.static_config_url {
        manager_config.static_config_url = static_config_url;
    }

    let manager = Arc::new(ConnectionManager::start(
        manager_config,
        endpoints,
        storage,
        shell_tx,
    ));
    let mut engine = Engine::new(manager.clone() as Arc<dyn SessionControl>);

    println!("Connecting to {address} ...");
    loop {
        tokio::select! {
            event = shell_rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    SessionEvent::StateChanged { state, .. } => {
                        println!("[connection] {state}");
                        if state.is_terminal() {
                            break;
                        }
                    }
                    SessionEvent::Message(msg) => {
                        match engine.handle_forward_msg(&msg)? {
                            EngineUpdate::RunFinished { .. } => print_summary(&engine),
                            update => debug!("engine update: {update:?}"),
                        }
                    }
                    SessionEvent::Error { message } => {
                        eprintln!("[warning] {message}");
                    }
                    SessionEvent::HostConfig(host_config) => {
                        debug!("host config: {host_config:?}");
                    }
                    SessionEvent::Retry { .. } => {
                        // Retries below the warning threshold stay quiet.
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; disconnecting");
                manager.disconnect();
                break;
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_summary(engine: &Engine) {
    let tree = engine.tree();
    println!(
        "── app '{}' run {} ──",
        engine.app_name().unwrap_or("?"),
        engine.run_id(),
    );
    print_block("main", tree.main().children.as_slice());
    print_block("sidebar", tree.sidebar().children.as_slice());
}

fn print_block(label: &str, children: &[AppNode]) {
    println!("{label}: {} node(s)", children.len());
    for child in children {
        print_node(child, 1);
    }
}

fn print_node(node: &AppNode, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        AppNode::Block(block) => {
            println!("{indent}[block] {} child(ren)", block.children.len());
            for child in &block.children {
                print_node(child, depth + 1);
            }
        }
        AppNode::Element(element) => {
            let kind = element.element.kind();
            match element.element.widget_id() {
                Some(id) => println!("{indent}{kind} (widget '{id}')"),
                None => println!("{indent}{kind}"),
            }
        }
    }
}
