#![forbid(unsafe_code)]
//! Custodychain node binary: loads configuration, joins the overlay,
//! synchronizes, then serves the REST API.

use clap::Parser;
use custodychain::config::load_config;
use custodychain::node::Node;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "custody-node", about = "Run a custodychain ledger node")]
struct Args {
    /// Port for the REST API listener (overrides config and PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Bootstrap peer base URL (overrides config and BOOTSTRAP_URL)
    #[arg(long)]
    bootstrap: Option<String>,

    /// Proof-of-work difficulty in leading zero hex digits
    #[arg(long)]
    difficulty: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = load_config()?;
    if let Some(port) = args.port {
        config.network.listen_port = port;
    }
    if let Some(bootstrap) = args.bootstrap {
        config.network.bootstrap_url = Some(bootstrap);
    }
    if let Some(difficulty) = args.difficulty {
        config.chain.difficulty = difficulty;
    }
    config.validate()?;

    let node = Arc::new(Node::init(config)?);
    node.start().await
}
