//! Game Runner and the Totem state machine: one task per in-progress room.
//! Owns hands, table piles, and the public pile entirely in its own memory
//! (never in the Registry); the Registry is touched only to resolve seated
//! rosters and nicknames and to push outbound lines to clients.

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use totem_core::card::{self, Card};
use totem_core::{ClientHandle, Command, RoomId};

use crate::command_bus::Envelope;
use crate::config::ServerConfig;
use crate::registry::Registry;

/// All mutable match state the Game Runner owns. Never shared outside this
/// task; the Registry only ever sees the roster via `room_seats`.
struct MatchState {
    roster: Vec<ClientHandle>,
    hands: Vec<Vec<Card>>,
    tables: Vec<Vec<Card>>,
    public_pile: Vec<Card>,
    turn: u64,
    current: usize,
}

enum Outcome {
    Continue,
    Terminate,
}

pub async fn run_game(room_id: RoomId, registry: Arc<Registry>, mut room_rx: mpsc::Receiver<Envelope>, config: Arc<ServerConfig>) {
    let Some(mut state) = setup(room_id, &registry) else {
        tracing::warn!(room_id, "game runner spawned for room with no seated roster");
        return;
    };
    broadcast_state(room_id, &registry, &state);

    let poll_interval = std::time::Duration::from_millis(config.rooms.game_runner_poll_interval_ms);
    let idle_timeout = std::time::Duration::from_secs(config.rooms.turn_idle_timeout_secs);
    let mut interval = tokio::time::interval(poll_interval);
    let mut last_event = Instant::now();

    loop {
        interval.tick().await;

        if last_event.elapsed() >= idle_timeout {
            tracing::info!(room_id, turn = state.turn, "idle timeout, forcing draw");
            do_draw(&mut state);
            broadcast_state(room_id, &registry, &state);
            last_event = Instant::now();
        }

        match room_rx.try_recv() {
            Ok(envelope) => {
                last_event = Instant::now();
                match handle_envelope(room_id, &registry, &mut state, envelope) {
                    Outcome::Terminate => return,
                    Outcome::Continue => {},
                }
                if state.roster.is_empty() {
                    tracing::info!(room_id, "all players departed, game runner exiting");
                    return;
                }
            },
            Err(TryRecvError::Empty) => {},
            Err(TryRecvError::Disconnected) => {
                tracing::info!(room_id, "room bus closed, game runner exiting");
                return;
            },
        }
    }
}

fn setup(room_id: RoomId, registry: &Arc<Registry>) -> Option<MatchState> {
    let seats = registry.room_seats(room_id)?;
    let roster: Vec<ClientHandle> = seats.iter().filter_map(|s| s.occupant).collect();
    if roster.is_empty() {
        return None;
    }

    let deck = card::shuffled_deck();
    let mut hands = vec![Vec::new(); roster.len()];
    for (i, c) in deck.into_iter().enumerate() {
        hands[i % roster.len()].push(c);
    }

    let current = rand::rng().random_range(0..roster.len());

    Some(MatchState { roster, hands, tables: vec![Vec::new(); roster.len()], public_pile: Vec::new(), turn: 0, current })
}

fn handle_envelope(room_id: RoomId, registry: &Arc<Registry>, state: &mut MatchState, envelope: Envelope) -> Outcome {
    let Envelope { sender, command } = envelope;
    match command {
        Command::Refresh => {
            registry.send_line(sender, snapshot_text(room_id, registry, state));
            Outcome::Continue
        },
        Command::Spectate(_) => {
            // LC forwards a spectate so the new spectator gets an initial
            // snapshot; it never joins a seat, but sync_roster can still
            // reconcile departures pending since the last poll, including
            // the last seated player(s) leaving.
            if sync_roster(room_id, registry, state).is_none() {
                return Outcome::Terminate;
            }
            if state.roster.is_empty() {
                return Outcome::Terminate;
            }
            registry.send_line(sender, snapshot_text(room_id, registry, state));
            Outcome::Continue
        },
        Command::Leave => {
            if sync_roster(room_id, registry, state).is_none() {
                return Outcome::Terminate;
            }
            if state.roster.is_empty() {
                return Outcome::Terminate;
            }
            broadcast_state(room_id, registry, state);
            Outcome::Continue
        },
        Command::Draw(turn) => {
            let Some(idx) = state.roster.iter().position(|&h| h == sender) else {
                registry.send_line(sender, "You are not seated in this room.");
                return Outcome::Continue;
            };
            if idx != state.current || turn != state.turn {
                registry.send_line(sender, format!("Current turn is {}.", state.turn));
                return Outcome::Continue;
            }
            do_draw(state);
            broadcast_state(room_id, registry, state);
            Outcome::Continue
        },
        Command::Grab(turn) => {
            let Some(idx) = state.roster.iter().position(|&h| h == sender) else {
                registry.send_line(sender, "You are not seated in this room.");
                return Outcome::Continue;
            };
            if turn != state.turn {
                registry.send_line(sender, format!("Current turn is {}.", state.turn));
                return Outcome::Continue;
            }
            let outcome = resolve_grab(registry, state, idx);
            if matches!(outcome, Outcome::Continue) {
                broadcast_state(room_id, registry, state);
            }
            outcome
        },
        Command::List | Command::Create(_) | Command::Join(_) | Command::Start => {
            tracing::warn!(room_id, ?command, "lobby command reached the room bus");
            Outcome::Continue
        },
    }
}

/// Moves the current player's top hand card onto their table pile (if they
/// have any cards), then unconditionally advances turn/current/timer.
fn do_draw(state: &mut MatchState) {
    if let Some(card) = state.hands[state.current].pop() {
        state.tables[state.current].push(card);
    }
    state.turn += 1;
    state.current = (state.current + 1) % state.roster.len();
}

fn resolve_grab(registry: &Arc<Registry>, state: &mut MatchState, grabber_idx: usize) -> Outcome {
    let grabber_top = state.tables[grabber_idx].last().copied();

    let opponents: Vec<usize> = match grabber_top {
        None => Vec::new(),
        Some(top) => (0..state.roster.len())
            .filter(|&i| i != grabber_idx)
            .filter(|&i| state.tables[i].last().is_some_and(|c| c.matches_shape(&top)))
            .collect(),
    };

    if opponents.is_empty() {
        mis_grab(registry, state, grabber_idx);
        return Outcome::Continue;
    }

    winning_grab(registry, state, grabber_idx, &opponents)
}

fn mis_grab(registry: &Arc<Registry>, state: &mut MatchState, grabber_idx: usize) {
    for i in 0..state.roster.len() {
        let mut cards = std::mem::take(&mut state.tables[i]);
        state.hands[grabber_idx].append(&mut cards);
    }
    let mut public = std::mem::take(&mut state.public_pile);
    state.hands[grabber_idx].append(&mut public);

    registry.send_line(state.roster[grabber_idx], "You made a mistake. Take all the cards :)");
}

fn winning_grab(registry: &Arc<Registry>, state: &mut MatchState, grabber_idx: usize, opponents: &[usize]) -> Outcome {
    let grabber_cards = std::mem::take(&mut state.tables[grabber_idx]);
    for (i, card) in grabber_cards.into_iter().enumerate() {
        let opp_idx = opponents[i % opponents.len()];
        state.hands[opp_idx].push(card);
    }
    for &opp_idx in opponents {
        let mut absorbed = std::mem::take(&mut state.tables[opp_idx]);
        state.hands[opp_idx].append(&mut absorbed);
    }

    registry.send_line(state.roster[grabber_idx], "You win the fight.");
    for &opp_idx in opponents {
        registry.send_line(state.roster[opp_idx], "You lost a fight- take cards from the winner.");
    }

    if state.hands[grabber_idx].is_empty() && state.tables[grabber_idx].is_empty() {
        registry.send_line(state.roster[grabber_idx], "You won the game!");
        for (i, &handle) in state.roster.iter().enumerate() {
            if i != grabber_idx {
                registry.send_line(handle, "You lost the game.");
            }
        }
        return Outcome::Terminate;
    }
    Outcome::Continue
}

/// Re-reads the seated roster from the registry and reconciles any
/// departures: orphaned hands/tables move to the public pile, the seat is
/// dropped, and the current-player index is adjusted to preserve whose
/// turn it is. Returns `None` if the room no longer exists.
fn sync_roster(room_id: RoomId, registry: &Arc<Registry>, state: &mut MatchState) -> Option<()> {
    let seats = registry.room_seats(room_id)?;
    let still_seated: Vec<ClientHandle> = seats.iter().filter_map(|s| s.occupant).collect();

    let departed: Vec<usize> = state
        .roster
        .iter()
        .enumerate()
        .filter(|(_, h)| !still_seated.contains(h))
        .map(|(i, _)| i)
        .collect();

    for idx in departed.into_iter().rev() {
        let mut hand = std::mem::take(&mut state.hands[idx]);
        let mut table = std::mem::take(&mut state.tables[idx]);
        state.public_pile.append(&mut hand);
        state.public_pile.append(&mut table);
        state.hands.remove(idx);
        state.tables.remove(idx);
        state.roster.remove(idx);

        if state.roster.is_empty() {
            return Some(());
        }
        if state.current >= state.roster.len() {
            state.current = 0;
        } else if state.current > idx {
            state.current -= 1;
        }
    }
    Some(())
}

fn snapshot_text(room_id: RoomId, registry: &Arc<Registry>, state: &MatchState) -> String {
    let current_nick = registry.client_nickname(state.roster[state.current]).unwrap_or_else(|| "?".to_string());
    let spectators = registry.room_spectator_count(room_id).unwrap_or(0);

    let mut out = format!("Turn {}\n", state.turn);
    out.push_str(&format!("Current player: {current_nick}\n"));
    for (i, &handle) in state.roster.iter().enumerate() {
        let nick = registry.client_nickname(handle).unwrap_or_else(|| "?".to_string());
        let top = state.tables[i]
            .last()
            .map(|c| format!(" top=shape{} color{}", c.shape, c.color))
            .unwrap_or_default();
        out.push_str(&format!("{nick}: hand={} table={}{top}\n", state.hands[i].len(), state.tables[i].len()));
    }
    out.push_str(&format!("Spectators: {spectators}\n"));
    out
}

fn broadcast_state(room_id: RoomId, registry: &Arc<Registry>, state: &MatchState) {
    let text = snapshot_text(room_id, registry, state);
    for &handle in &state.roster {
        registry.send_line(handle, text.clone());
    }
}
