//! Chat server binary: parses CLI flags, binds a TCP listener, and spawns a
//! `Dispatcher` per accepted connection with the System/User/Channel
//! components registered (§4.4, §6 CLI surface).

use std::sync::Arc;

use clap::Parser;
use jchat_core::{ConnectionIdAllocator, ConnectionRegistry, Dispatcher};
use jchat_server::{ChannelComponentServer, SystemComponentServer, UserComponentServer, UserDirectory, UserRegistry};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// A chat server speaking the jchat wire protocol.
#[derive(Parser, Debug)]
#[command(name = "jchat-server")]
struct Args {
    /// Address to listen on.
    #[arg(long = "ipaddress", default_value = "0.0.0.0")]
    ip_address: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9998)]
    port: u16,

    /// Default log level, overridable per-module via `RUST_LOG`.
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> std::io::Result<()> {
    let bind_addr = format!("{}:{}", args.ip_address, args.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");

    let connection_registry = Arc::new(ConnectionRegistry::new());
    let id_alloc = Arc::new(ConnectionIdAllocator::new());

    let user_registry = Arc::new(UserRegistry::new());
    let user_component = Arc::new(UserComponentServer::new(user_registry));
    let user_directory: Arc<dyn UserDirectory> = user_component.clone();
    let system_component = Arc::new(SystemComponentServer::new(user_directory.clone()));
    let channel_component = Arc::new(ChannelComponentServer::new(user_directory));

    loop {
        let (socket, peer_addr) = listener.accept().await?;
        tracing::info!(peer = %peer_addr, "accepted connection");

        let connection_id = id_alloc.allocate();
        let mut dispatcher = Dispatcher::new(
            connection_id,
            connection_registry.clone(),
            peer_addr.to_string(),
            socket,
        );
        // Registration order fixes hook-firing order on connect/disconnect (§4.4).
        dispatcher.register_component(system_component.clone()).expect("system registers once");
        dispatcher.register_component(user_component.clone()).expect("user registers once");
        dispatcher.register_component(channel_component.clone()).expect("channel registers once");

        tokio::spawn(async move {
            if let Err(e) = dispatcher.run().await {
                tracing::warn!(connection = %connection_id, error = %e, "connection dropped");
            }
        });
    }
}
