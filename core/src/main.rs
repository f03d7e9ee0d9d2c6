//! JournalShare activity CLI
//!
//! Serve a local document collection and share it over an in-process tube
//! channel.
//!
//! Usage:
//!   journalshare-cli --serve --root <dir>           # serve documents
//!   journalshare-cli --demo --root <dir>            # serve + in-process joiner

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use journalshare_core::{
    ActivityEvent, LoopbackChannel, Session, SessionConfig, DEFAULT_PORT,
};

fn print_usage() {
    println!("JournalShare Activity Core v0.1.0");
    println!();
    println!("Usage:");
    println!("  journalshare-cli --serve --root <dir>        Serve a document collection");
    println!("  journalshare-cli --demo --root <dir>         Serve and run an in-process joiner");
    println!();
    println!("Options:");
    println!("  --serve, -s            Run as the sharing participant");
    println!("  --demo                 Also start a joining session over a loopback channel");
    println!("  --root <DIR>           Document collection to serve (default: web)");
    println!("  --state-dir <DIR>      Writable working directory for the server (default: .)");
    println!("  --server <PATH>        File-server program (default: journal-http-server)");
    println!("  --port <PORT>          Server port (default: {})", DEFAULT_PORT);
    println!("  --help, -h             Show this help");
    println!();
    println!("Environment:");
    println!("  RUST_LOG               Set log level (e.g., info, debug)");
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let show_help = args.iter().any(|a| a == "--help" || a == "-h");
    let serve_mode = args.iter().any(|a| a == "--serve" || a == "-s");
    let demo_mode = args.iter().any(|a| a == "--demo");

    if show_help || (!serve_mode && !demo_mode) {
        print_usage();
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let root: PathBuf = args
        .windows(2)
        .find(|w| w[0] == "--root")
        .map(|w| PathBuf::from(&w[1]))
        .unwrap_or_else(|| PathBuf::from("web"));

    let state_dir: PathBuf = args
        .windows(2)
        .find(|w| w[0] == "--state-dir")
        .map(|w| PathBuf::from(&w[1]))
        .unwrap_or_else(|| PathBuf::from("."));

    let server_program: PathBuf = args
        .windows(2)
        .find(|w| w[0] == "--server")
        .map(|w| PathBuf::from(&w[1]))
        .unwrap_or_else(|| PathBuf::from("journal-http-server"));

    let port: u16 = args
        .windows(2)
        .find(|w| w[0] == "--port")
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let (sharer_end, joiner_end) = LoopbackChannel::pair();

    let mut config = SessionConfig::sharer(root, state_dir, server_program);
    config.port = port;
    let local_url = config.local_url();

    let session = match Session::start(config, sharer_end).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to start session: {}", e);
            std::process::exit(1);
        }
    };

    println!("Serving documents at {}", local_url);

    // The shell would flip this on its collaboration toggle; the CLI shares
    // immediately.
    if let Err(e) = session.shared() {
        eprintln!("❌ Failed to share: {}", e);
    }

    if demo_mode {
        run_join_demo(joiner_end).await;
    }

    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");
    session.close().await;
}

/// Start a joining session on the other end of the loopback pair and report
/// the URL its viewer would load.
async fn run_join_demo(joiner_end: LoopbackChannel) {
    let mut config = SessionConfig::joiner();
    config.already_joined = true;

    let joiner = match Session::start(config, joiner_end).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to start joiner: {}", e);
            return;
        }
    };

    let Some(mut events) = joiner.events().await else {
        return;
    };

    let resolved = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            if let ActivityEvent::LoadUrl(url) = event {
                return Some(url);
            }
        }
        None
    })
    .await;

    match resolved {
        Ok(Some(url)) => println!("Joiner would load {}", url),
        _ => eprintln!("⚠️  Joiner did not resolve a tube address"),
    }

    joiner.close().await;
}
