use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use room_gateway::{build_router, GatewayState};

#[derive(Parser, Debug)]
#[command(name = "room-gateway")]
struct Args {
    /// Address to bind the gateway on
    #[arg(long, default_value = "127.0.0.1:3000", env = "ROOM_GATEWAY_ADDR")]
    bind_addr: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "room_gateway=info".into()),
        )
        .init();

    let args = Args::parse();
    let state = GatewayState::new();
    let router = build_router(state);

    let listener = TcpListener::bind(args.bind_addr.as_str()).await?;
    info!(addr = %listener.local_addr()?, "room gateway listening");
    axum::serve(listener, router.into_make_service()).await?;

    Ok(())
}
