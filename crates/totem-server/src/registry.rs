//! Shared Registry: the authoritative in-memory store of connected clients
//! and rooms. Guarded by two independent mutexes (client-mutex, room-mutex);
//! every caller that must touch both acquires client-mutex first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use totem_core::{ClientHandle, Room, RoomId, RoomState, Seat, MAX_SEATS};

use crate::command_bus::Envelope;

/// A connected client as tracked by the registry.
pub struct ClientRecord {
    pub handle: ClientHandle,
    pub nickname: String,
    pub room_id: Option<RoomId>,
    outbox: mpsc::UnboundedSender<String>,
}

/// A room plus the plumbing needed to reach its Game Runner, if any.
pub struct RoomRecord {
    pub room: Room,
    pub room_bus: Option<mpsc::Sender<Envelope>>,
    pub game_task: Option<JoinHandle<()>>,
}

impl RoomRecord {
    fn new(id: RoomId) -> Self {
        Self { room: Room::new(id), room_bus: None, game_task: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetNicknameError {
    AlreadySet,
    Taken,
}

/// The Shared Registry. Cheap to clone behind an `Arc` -- the collections
/// themselves are the shared state.
pub struct Registry {
    clients: Mutex<Vec<ClientRecord>>,
    rooms: Mutex<Vec<RoomRecord>>,
    next_handle: AtomicU64,
    next_join_seq: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(Vec::new()),
            rooms: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(0),
            next_join_seq: AtomicU64::new(0),
        }
    }

    /// Allocates a fresh, never-reused client handle.
    pub fn allocate_handle(&self) -> ClientHandle {
        ClientHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocates a strictly increasing seat join sequence number. Used in
    /// place of a wall-clock timestamp to rank seats by join order -- the
    /// ordering is all the dealer-selection rule needs.
    pub fn allocate_join_seq(&self) -> u64 {
        self.next_join_seq.fetch_add(1, Ordering::Relaxed)
    }

    // --- client-mutex only -------------------------------------------------

    pub fn insert_client(&self, handle: ClientHandle, outbox: mpsc::UnboundedSender<String>) {
        let mut clients = self.clients.lock().unwrap();
        clients.push(ClientRecord { handle, nickname: String::new(), room_id: None, outbox });
    }

    pub fn remove_client(&self, handle: ClientHandle) {
        let mut clients = self.clients.lock().unwrap();
        clients.retain(|c| c.handle != handle);
    }

    pub fn nickname_taken(&self, nickname: &str) -> bool {
        let clients = self.clients.lock().unwrap();
        clients.iter().any(|c| c.nickname == nickname)
    }

    /// Assigns a nickname to a client whose nickname slot is currently
    /// empty, provided no other live client already holds it. The check
    /// and the assignment happen under one lock acquisition so concurrent
    /// nickname races are resolved by mutual exclusion, not by a
    /// check-then-act race.
    pub fn set_nickname(&self, handle: ClientHandle, nickname: &str) -> Result<(), SetNicknameError> {
        let mut clients = self.clients.lock().unwrap();
        if clients.iter().any(|c| c.handle == handle && !c.nickname.is_empty()) {
            return Err(SetNicknameError::AlreadySet);
        }
        if clients.iter().any(|c| c.nickname == nickname) {
            return Err(SetNicknameError::Taken);
        }
        if let Some(client) = clients.iter_mut().find(|c| c.handle == handle) {
            client.nickname = nickname.to_string();
        }
        Ok(())
    }

    pub fn client_nickname(&self, handle: ClientHandle) -> Option<String> {
        let clients = self.clients.lock().unwrap();
        clients.iter().find(|c| c.handle == handle).map(|c| c.nickname.clone())
    }

    pub fn client_room(&self, handle: ClientHandle) -> Option<RoomId> {
        let clients = self.clients.lock().unwrap();
        clients.iter().find(|c| c.handle == handle).and_then(|c| c.room_id)
    }

    pub fn set_client_room(&self, handle: ClientHandle, room_id: Option<RoomId>) {
        let mut clients = self.clients.lock().unwrap();
        if let Some(client) = clients.iter_mut().find(|c| c.handle == handle) {
            client.room_id = room_id;
        }
    }

    pub fn send_line(&self, handle: ClientHandle, line: impl Into<String>) {
        let clients = self.clients.lock().unwrap();
        if let Some(client) = clients.iter().find(|c| c.handle == handle) {
            let _ = client.outbox.send(line.into());
        }
    }

    // --- room-mutex only -----------------------------------------------

    pub fn room_exists(&self, id: RoomId) -> bool {
        let rooms = self.rooms.lock().unwrap();
        rooms.iter().any(|r| r.room.id == id)
    }

    /// Inserts a room with `founder` already seated at seat 0. Returns
    /// `false` without mutating anything if the id is already in use.
    pub fn insert_room(&self, id: RoomId, founder: ClientHandle, founder_joined_at: u64) -> bool {
        let mut rooms = self.rooms.lock().unwrap();
        if rooms.iter().any(|r| r.room.id == id) {
            return false;
        }
        let mut record = RoomRecord::new(id);
        record.room.seats[0] = Seat { occupant: Some(founder), joined_at: founder_joined_at };
        rooms.push(record);
        true
    }

    pub fn remove_room(&self, id: RoomId) {
        let mut rooms = self.rooms.lock().unwrap();
        rooms.retain(|r| r.room.id != id);
    }

    /// Runs `f` against the room record for `id` while holding room-mutex.
    /// `f` MUST NOT perform a blocking socket write.
    pub fn with_room<R>(&self, id: RoomId, f: impl FnOnce(&mut RoomRecord) -> R) -> Option<R> {
        let mut rooms = self.rooms.lock().unwrap();
        rooms.iter_mut().find(|r| r.room.id == id).map(f)
    }

    pub fn room_state(&self, id: RoomId) -> Option<RoomState> {
        let rooms = self.rooms.lock().unwrap();
        rooms.iter().find(|r| r.room.id == id).map(|r| r.room.state)
    }

    pub fn room_bus(&self, id: RoomId) -> Option<mpsc::Sender<Envelope>> {
        let rooms = self.rooms.lock().unwrap();
        rooms.iter().find(|r| r.room.id == id).and_then(|r| r.room_bus.clone())
    }

    /// A copy of the room's seat array, or `None` if the room no longer
    /// exists. Used by the Game Runner on setup and whenever it re-syncs
    /// its roster against a departed player.
    pub fn room_seats(&self, id: RoomId) -> Option<[Seat; MAX_SEATS]> {
        self.with_room(id, |r| r.room.seats)
    }

    pub fn room_spectator_count(&self, id: RoomId) -> Option<u32> {
        self.with_room(id, |r| r.room.spectator_count)
    }

    // --- both mutexes, client-mutex first -------------------------------

    fn describe_room(clients: &[ClientRecord], record: &RoomRecord) -> String {
        let mut out = format!("Room {}:\n", record.room.id);
        for seat in record.room.seats.iter() {
            if let Some(handle) = seat.occupant {
                let nick = clients
                    .iter()
                    .find(|c| c.handle == handle)
                    .map(|c| c.nickname.as_str())
                    .unwrap_or("?");
                out.push_str(&format!("  {nick}\n"));
            }
        }
        out.push_str(&format!("  Spectators: {}\n", record.room.spectator_count));
        out.push_str(match record.room.state {
            RoomState::Idle => "  Waiting to start the match.\n",
            RoomState::InProgress => "  Match in progress.\n",
        });
        out
    }

    /// Renders the `list` command's reply: one description block per room,
    /// with seat occupants resolved to their current nickname.
    pub fn list_rooms_text(&self) -> String {
        let clients = self.clients.lock().unwrap();
        let rooms = self.rooms.lock().unwrap();

        if rooms.is_empty() {
            return "No rooms.".to_string();
        }

        let mut out = String::new();
        for record in rooms.iter() {
            out.push_str(&Self::describe_room(&clients, record));
        }
        out
    }

    /// Renders a single room's description block, as used by `refresh`
    /// replies issued against a room that has not yet started its match.
    pub fn room_description(&self, id: RoomId) -> Option<String> {
        let clients = self.clients.lock().unwrap();
        let rooms = self.rooms.lock().unwrap();
        rooms.iter().find(|r| r.room.id == id).map(|record| Self::describe_room(&clients, record))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
