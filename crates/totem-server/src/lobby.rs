//! Lobby Controller: the single consumer of the Command Bus. Executes every
//! lobby mutation serially, enforces room-membership invariants, and spawns
//! a Game Runner when `start` is accepted. Also owns the listening socket's
//! accept loop, per the permission in the server's design to run the
//! acceptor and the Lobby Controller as one task.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use totem_core::protocol::ROOM_BUS_OPEN_RETRY_BUDGET;
use totem_core::{Command, RoomId, RoomState};

use crate::command_bus::{CommandBusConsumer, CommandBusHandle, Envelope};
use crate::config::ServerConfig;
use crate::connection;
use crate::game;
use crate::registry::Registry;

/// How often the drain loop polls the Command Bus and the accept socket
/// when neither has produced anything yet.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(5);

pub async fn run(
    listener: TcpListener,
    registry: Arc<Registry>,
    bus_handle: CommandBusHandle,
    mut consumer: CommandBusConsumer,
    config: Arc<ServerConfig>,
    cancel: CancellationToken,
) {
    let mut tick = tokio::time::interval(IDLE_POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("lobby controller shutting down");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, addr)) => {
                        tracing::info!(%addr, "accepted connection");
                        let registry = Arc::clone(&registry);
                        let bus_handle = bus_handle.clone();
                        let config = Arc::clone(&config);
                        tokio::spawn(connection::handle_connection(socket, registry, bus_handle, config));
                    },
                    Err(error) => tracing::warn!(%error, "accept failed"),
                }
            }
            _ = tick.tick() => {
                if let Some(envelope) = consumer.try_receive() {
                    handle_envelope(envelope, &registry, &config).await;
                }
            }
        }
    }
}

async fn handle_envelope(envelope: Envelope, registry: &Arc<Registry>, config: &Arc<ServerConfig>) {
    let Envelope { sender, command } = envelope;
    match command {
        Command::Create(id) => handle_create(registry, sender, id).await,
        Command::Join(id) => handle_join(registry, sender, id).await,
        Command::Spectate(id) => handle_spectate(registry, sender, id).await,
        Command::Start => handle_start(registry, sender, config).await,
        Command::Leave => handle_leave(registry, sender).await,
        Command::Draw(_) | Command::Grab(_) | Command::Refresh => {
            handle_gameplay(registry, sender, command).await
        },
        Command::List => unreachable!("List is served locally by the connection handler"),
    }
}

async fn handle_create(registry: &Arc<Registry>, sender: totem_core::ClientHandle, id: RoomId) {
    if registry.client_room(sender).is_some() {
        registry.send_line(sender, "Already in a room.");
        return;
    }
    let seq = registry.allocate_join_seq();
    if registry.insert_room(id, sender, seq) {
        registry.set_client_room(sender, Some(id));
        registry.send_line(sender, format!("Created room {id}."));
    } else {
        registry.send_line(sender, "Room already exists.");
    }
}

async fn handle_join(registry: &Arc<Registry>, sender: totem_core::ClientHandle, id: RoomId) {
    if registry.client_room(sender).is_some() {
        registry.send_line(sender, "Already in a room.");
        return;
    }
    enum Outcome {
        Joined,
        Missing,
        Full,
        InProgress,
    }
    let outcome = registry
        .with_room(id, |record| {
            if record.room.state == RoomState::InProgress {
                return Outcome::InProgress;
            }
            match record.room.first_empty_seat() {
                Some(seat_idx) => {
                    let seq = registry.allocate_join_seq();
                    record.room.seats[seat_idx] =
                        totem_core::Seat { occupant: Some(sender), joined_at: seq };
                    Outcome::Joined
                },
                None => Outcome::Full,
            }
        })
        .unwrap_or(Outcome::Missing);

    match outcome {
        Outcome::Joined => {
            registry.set_client_room(sender, Some(id));
            registry.send_line(sender, format!("Joined room {id}."));
        },
        Outcome::Missing => registry.send_line(sender, "Room not found."),
        Outcome::Full => registry.send_line(sender, format!("Room {id} is full.")),
        Outcome::InProgress => {
            registry.send_line(sender, "Match already in progress; try 'spectate <id>' instead.")
        },
    }
}

async fn handle_spectate(registry: &Arc<Registry>, sender: totem_core::ClientHandle, id: RoomId) {
    if registry.client_room(sender).is_some() {
        registry.send_line(sender, "Already in a room.");
        return;
    }
    let result = registry.with_room(id, |record| {
        record.room.spectator_count += 1;
        (record.room.state, record.room_bus.clone())
    });
    match result {
        None => registry.send_line(sender, "Room not found."),
        Some((state, room_bus)) => {
            registry.set_client_room(sender, Some(id));
            registry.send_line(sender, format!("Spectating room {id}."));
            if state == RoomState::InProgress
                && let Some(tx) = room_bus
            {
                let _ = tx.send(Envelope { sender, command: Command::Spectate(id) }).await;
            }
        },
    }
}

async fn handle_start(registry: &Arc<Registry>, sender: totem_core::ClientHandle, config: &Arc<ServerConfig>) {
    let Some(room_id) = registry.client_room(sender) else {
        registry.send_line(sender, "Currently not in a room.");
        return;
    };

    enum StartError {
        NotIdle,
        NoPermission,
    }

    let started = registry.with_room(room_id, |record| {
        if record.room.state != RoomState::Idle {
            return Err(StartError::NotIdle);
        }
        let min_players = config.rooms.min_players_to_start;
        let sender_seat = record.room.seat_of(sender);
        let dealer_seat = record.room.dealer_seat();
        if record.room.seated_count() < min_players || sender_seat != dealer_seat || sender_seat.is_none() {
            return Err(StartError::NoPermission);
        }
        record.room.state = RoomState::InProgress;
        Ok(())
    });

    match started {
        None => registry.send_line(sender, "Room not found."),
        Some(Err(StartError::NotIdle)) => registry.send_line(sender, "Match already in progress."),
        Some(Err(StartError::NoPermission)) => registry.send_line(
            sender,
            "Only the earliest-joined player may start, and at least 2 players are required.",
        ),
        Some(Ok(())) => spawn_game(registry, room_id, sender, config).await,
    }
}

async fn spawn_game(
    registry: &Arc<Registry>,
    room_id: RoomId,
    starter: totem_core::ClientHandle,
    config: &Arc<ServerConfig>,
) {
    let (tx, rx) = crate::command_bus::room_bus(config.limits.command_bus_capacity);
    registry.with_room(room_id, |record| {
        record.room_bus = Some(tx.clone());
    });

    let task_registry = Arc::clone(registry);
    let task_config = Arc::clone(config);
    let handle = tokio::spawn(async move {
        game::run_game(room_id, task_registry, rx, task_config).await;
    });
    registry.with_room(room_id, |record| {
        record.game_task = Some(handle);
    });

    tracing::info!(room_id, "game runner spawned");

    let deadline = tokio::time::Instant::now() + ROOM_BUS_OPEN_RETRY_BUDGET;
    loop {
        if let Some(bus) = registry.room_bus(room_id) {
            let _ = bus.send(Envelope { sender: starter, command: Command::Refresh }).await;
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!(room_id, "timed out opening room bus after start");
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn handle_leave(registry: &Arc<Registry>, sender: totem_core::ClientHandle) {
    let Some(room_id) = registry.client_room(sender) else {
        registry.send_line(sender, "Currently not in a room.");
        return;
    };

    registry.set_client_room(sender, None);

    struct LeaveOutcome {
        was_in_progress: bool,
        room_bus: Option<tokio::sync::mpsc::Sender<Envelope>>,
        destroy: bool,
    }

    let outcome = registry.with_room(room_id, |record| {
        let was_seated = record.room.remove_occupant(sender);
        if !was_seated {
            record.room.spectator_count = record.room.spectator_count.saturating_sub(1);
        }
        LeaveOutcome {
            was_in_progress: record.room.state == RoomState::InProgress,
            room_bus: record.room_bus.clone(),
            destroy: record.room.is_empty_room(),
        }
    });

    registry.send_line(sender, format!("Left room {room_id}."));

    let Some(outcome) = outcome else { return };

    if outcome.was_in_progress
        && let Some(tx) = outcome.room_bus
    {
        let _ = tx.send(Envelope { sender, command: Command::Leave }).await;
    }

    if outcome.destroy {
        registry.remove_room(room_id);
        tracing::info!(room_id, "room destroyed");
    }
}

async fn handle_gameplay(registry: &Arc<Registry>, sender: totem_core::ClientHandle, command: Command) {
    let Some(room_id) = registry.client_room(sender) else {
        registry.send_line(sender, "Currently not in a room.");
        return;
    };

    match registry.room_state(room_id) {
        None => registry.send_line(sender, "Room not found."),
        Some(RoomState::Idle) => {
            if matches!(command, Command::Refresh) {
                if let Some(text) = registry.room_description(room_id) {
                    registry.send_line(sender, text);
                }
            } else {
                registry.send_line(sender, "Match has not started.");
            }
        },
        Some(RoomState::InProgress) => match registry.room_bus(room_id) {
            Some(tx) => {
                let _ = tx.send(Envelope { sender, command }).await;
            },
            None => registry.send_line(sender, "Room not found."),
        },
    }
}
