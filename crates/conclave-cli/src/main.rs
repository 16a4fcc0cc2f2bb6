//! Conclave console entry point.
//!
//! # Usage
//!
//! ```bash
//! # Chat with two simulated peers
//! conclave --user alice --peer bob --peer carol
//!
//! # Relay transport data by hand
//! conclave --user alice --show-wire
//! ```

use std::{io, time::Duration};

use clap::Parser;
use conclave_app::{Runtime, Session, SystemEnv, WatchdogConfig, WatchdogFactory};
use conclave_cli::{Console, ConsoleDriver, ConsoleOptions, PeerGroup};
use conclave_core::{Room, RoomConfig};
use conclave_harness::LoopbackFactory;
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Conclave console client
#[derive(Parser, Debug)]
#[command(name = "conclave")]
#[command(about = "Line-mode client for multi-party secure chat rooms")]
#[command(version)]
struct Args {
    /// Local account; everything from the first '@' is dropped
    #[arg(short, long, default_value = "me")]
    user: String,

    /// Start a simulated peer (repeatable)
    #[arg(short, long = "peer")]
    peers: Vec<String>,

    /// Prefix that marks a chat line as a room command
    #[arg(long, default_value_t = '.')]
    command_prefix: char,

    /// Relay chat unchanged instead of running the secure protocol
    #[arg(long)]
    plaintext: bool,

    /// Keep promotions when a new member joins a channel
    #[arg(long)]
    keep_promotions: bool,

    /// Engine calls slower than this many milliseconds are logged
    #[arg(long, default_value = "500")]
    slow_call_ms: u64,

    /// Print every transport payload
    #[arg(long)]
    show_wire: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    if args.command_prefix == conclave_cli::HOST_PREFIX {
        return Err(format!("command prefix cannot be {:?}", conclave_cli::HOST_PREFIX).into());
    }

    let config = RoomConfig {
        protocol_enabled: !args.plaintext,
        command_prefix: args.command_prefix,
        demote_on_join: !args.keep_promotions,
        auto_connect: true,
    };
    let env = SystemEnv::new();
    let room = Room::new(env, &args.user, config.clone());
    let username = room.username().to_owned();
    if username.is_empty() {
        return Err(format!("account {:?} has an empty username", args.user).into());
    }
    tracing::info!(user = %username, peers = args.peers.len(), "conclave starting");

    let (peers, greetings) = PeerGroup::start(username, &args.peers, &config);
    let watchdog = WatchdogConfig { slow_call_threshold: Duration::from_millis(args.slow_call_ms) };
    let factory = WatchdogFactory::new(LoopbackFactory::new(1), env, watchdog);
    let session = Session::new(room, factory, Console::new(io::stdout()));

    let options = ConsoleOptions { show_wire: args.show_wire, ..ConsoleOptions::default() };
    let driver = ConsoleDriver::new(BufReader::new(tokio::io::stdin()), io::stdout(), peers, greetings, options);

    let session = Runtime::new(driver, session).run().await?;
    tracing::info!(engine_failures = session.engine_failures(), "conclave stopped");
    Ok(())
}
