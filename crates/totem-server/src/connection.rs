//! Connection Handler: shepherds one client socket from greeting to
//! disconnect. Owns nickname negotiation, line reassembly, and
//! classification of each line into a locally-served `list`, a forwarded
//! lobby command, or a forwarded gameplay command. Never mutates room
//! membership itself -- a disconnect is a synthetic `leave` handed to the
//! Command Bus, so the Lobby Controller remains the only writer of room
//! membership.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use totem_core::Command;

use crate::command_bus::CommandBusHandle;
use crate::config::ServerConfig;
use crate::registry::{Registry, SetNicknameError};

/// Brief pause after enqueueing the synthetic `leave` so the Lobby
/// Controller has a chance to process it before the client record is torn
/// down.
const SYNTHETIC_LEAVE_GRACE: Duration = Duration::from_millis(50);

pub async fn handle_connection(
    socket: TcpStream,
    registry: Arc<Registry>,
    bus: CommandBusHandle,
    config: Arc<ServerConfig>,
) {
    let peer = socket.peer_addr().ok();
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(async move {
        while let Some(line) = outbox_rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });

    let handle = registry.allocate_handle();
    registry.insert_client(handle, outbox_tx.clone());

    let _ = outbox_tx.send("Welcome to Totem.".to_string());
    let _ = outbox_tx.send("Enter a nickname (3-16 characters):".to_string());

    let mut line_buf = String::new();
    let nickname = loop {
        line_buf.clear();
        match reader.read_line(&mut line_buf).await {
            Ok(0) | Err(_) => {
                disconnect(&registry, &bus, handle).await;
                writer_task.abort();
                return;
            },
            Ok(_) => {},
        }
        let candidate = trim_line(&line_buf);
        if candidate.is_empty() {
            continue;
        }
        if candidate.len() < config.limits.nickname_min_len || candidate.len() > config.limits.nickname_max_len {
            let _ = outbox_tx.send(format!(
                "Nickname must be between {} and {} characters.",
                config.limits.nickname_min_len, config.limits.nickname_max_len
            ));
            continue;
        }
        match registry.set_nickname(handle, candidate) {
            Ok(()) => break candidate.to_string(),
            Err(SetNicknameError::Taken) => {
                let _ = outbox_tx.send("Nickname unavailable.".to_string());
            },
            Err(SetNicknameError::AlreadySet) => {
                let _ = outbox_tx.send("Nickname unavailable.".to_string());
            },
        }
    };

    tracing::info!(?handle, nickname, peer = ?peer, "client entered command phase");
    let _ = outbox_tx.send(format!("Welcome, {nickname}."));

    loop {
        line_buf.clear();
        match reader.read_line(&mut line_buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {},
        }
        let line = trim_line(&line_buf);
        if line.is_empty() {
            continue;
        }
        if line.len() > config.limits.max_command_len {
            let _ = outbox_tx.send("Command too long.".to_string());
            continue;
        }

        match Command::parse(line) {
            Ok(Command::List) => {
                let _ = outbox_tx.send(registry.list_rooms_text());
            },
            Ok(command) => {
                if bus.send(handle, command).await.is_err() {
                    break;
                }
            },
            Err(err) => {
                let _ = outbox_tx.send(err.reply().to_string());
            },
        }
    }

    disconnect(&registry, &bus, handle).await;
    writer_task.abort();
}

/// Strips the trailing `\n` left by `read_line` and an optional preceding
/// `\r`, for CRLF tolerance.
fn trim_line(raw: &str) -> &str {
    let stripped = raw.strip_suffix('\n').unwrap_or(raw);
    stripped.strip_suffix('\r').unwrap_or(stripped)
}

async fn disconnect(registry: &Arc<Registry>, bus: &CommandBusHandle, handle: totem_core::ClientHandle) {
    let _ = bus.send(handle, Command::Leave).await;
    tokio::time::sleep(SYNTHETIC_LEAVE_GRACE).await;
    registry.remove_client(handle);
}
