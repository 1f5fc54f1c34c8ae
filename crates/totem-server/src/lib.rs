pub mod command_bus;
pub mod config;
pub mod connection;
pub mod error;
pub mod game;
pub mod lobby;
pub mod logging;
pub mod registry;

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use config::ServerConfig;
pub use error::AppError;
pub use registry::Registry;

/// Resolves the server's bind address: `0.0.0.0:<port>`, as the external
/// interface contract requires. Routed through `ToSocketAddrs` (rather than
/// constructed directly) so a resolution failure maps to exit code 1, per
/// the CLI's documented contract.
pub fn resolve_bind_addr(port: u16) -> Result<SocketAddr, AppError> {
    format!("0.0.0.0:{port}")
        .to_socket_addrs()
        .map_err(AppError::AddressResolution)?
        .next()
        .ok_or_else(|| {
            AppError::AddressResolution(std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no address resolved"))
        })
}

/// Binds the listening socket. `tokio::net::TcpListener` enables
/// `SO_REUSEADDR` on the underlying socket by default on every platform this
/// server targets, satisfying the external-interface contract without a
/// separate socket-options dependency.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, AppError> {
    TcpListener::bind(addr).await.map_err(AppError::Bind)
}

/// Wires up the Registry, Command Bus and Lobby Controller around an
/// already-bound listener and runs until `cancel` fires (typically from
/// `SIGINT`). Factored out of `main` so integration tests can spin up a
/// real server on an ephemeral port without going through the CLI.
pub async fn serve(listener: TcpListener, config: Arc<ServerConfig>, cancel: CancellationToken) {
    let registry = Arc::new(Registry::new());
    let (bus_handle, bus_consumer) = command_bus::command_bus(config.limits.command_bus_capacity);
    lobby::run(listener, registry, bus_handle, bus_consumer, config, cancel).await;
}

/// Full startup sequence: resolve/bind the listening socket, wire up the
/// `SIGINT` cancellation signal, and run the Lobby Controller until shutdown.
pub async fn run(port: u16, config: Arc<ServerConfig>) -> Result<(), AppError> {
    let addr = resolve_bind_addr(port)?;

    let listener = bind(addr).await?;
    tracing::info!(%addr, "Totem server listening");

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received SIGINT, shutting down");
            signal_cancel.cancel();
        }
    });

    serve(listener, config, cancel).await;
    Ok(())
}
