use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Context;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::net::TcpListener;

use peer_handshake_signaling_server::router::{self, ServerState};

const DEFAULT_ADDRESS: &str = "127.0.0.1:9001";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    TermLogger::init(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let address = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDRESS.to_owned());
    let address = SocketAddr::from_str(&address)
        .with_context(|| format!("invalid ip address provided: {address}"))?;

    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("signaling server listening on {}", address);

    axum::serve(listener, router::create(ServerState::default())).await?;
    Ok(())
}
