use std::sync::Arc;

use clap::Parser;

use totem_server::ServerConfig;

/// Networked multiplayer server for the card game Totem.
#[derive(Debug, Parser)]
#[command(name = "server")]
struct Cli {
    /// TCP port to listen on.
    port: u16,
}

#[tokio::main]
async fn main() {
    totem_server::logging::init();

    let cli = Cli::try_parse().unwrap_or_else(|_| {
        eprintln!("usage: server <port>");
        std::process::exit(10);
    });

    let config = Arc::new(ServerConfig::load());
    config.validate();

    match totem_server::run(cli.port, config).await {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(err.exit_code());
        },
    }
}
