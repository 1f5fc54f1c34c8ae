use serde::{Deserialize, Serialize};

/// Maximum number of seated players in a room.
pub const MAX_SEATS: usize = 8;

/// Opaque handle identifying a connected client. Assigned by the registry
/// when the connection is accepted; never reused while the client is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientHandle(pub u64);

/// Numeric room identifier, as supplied by the client on `create`/`join`/`spectate`.
pub type RoomId = i64;

/// Lifecycle state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    Idle,
    InProgress,
}

/// One seat in a room's fixed-capacity seat array.
///
/// Stores only the occupant's handle (never a copy of the client record) so
/// a nickname change is always resolved against the registry at use-time.
#[derive(Debug, Clone, Copy)]
pub struct Seat {
    pub occupant: Option<ClientHandle>,
    pub joined_at: u64,
}

impl Seat {
    pub const fn empty() -> Self {
        Self { occupant: None, joined_at: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }
}

impl Default for Seat {
    fn default() -> Self {
        Self::empty()
    }
}

/// A room as tracked by the shared registry. Card/hand/table state lives
/// exclusively inside the room's Game Runner task, never here.
pub struct Room {
    pub id: RoomId,
    pub seats: [Seat; MAX_SEATS],
    pub spectator_count: u32,
    pub state: RoomState,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            seats: [Seat::empty(); MAX_SEATS],
            spectator_count: 0,
            state: RoomState::Idle,
        }
    }

    pub fn seated_count(&self) -> usize {
        self.seats.iter().filter(|s| !s.is_empty()).count()
    }

    pub fn is_empty_room(&self) -> bool {
        self.seated_count() == 0 && self.spectator_count == 0
    }

    /// Index of the first empty seat, if any.
    pub fn first_empty_seat(&self) -> Option<usize> {
        self.seats.iter().position(|s| s.is_empty())
    }

    /// Seat occupied by the given client, if seated here.
    pub fn seat_of(&self, handle: ClientHandle) -> Option<usize> {
        self.seats
            .iter()
            .position(|s| s.occupant == Some(handle))
    }

    /// Index of the seat with the smallest `joined_at` among occupied seats
    /// -- the room's dealer. `None` if the room has no seated players.
    pub fn dealer_seat(&self) -> Option<usize> {
        self.seats
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .min_by_key(|(_, s)| s.joined_at)
            .map(|(i, _)| i)
    }

    /// Remove an occupant from whichever seat holds them, freeing the seat.
    /// Returns `true` if a seat was freed.
    pub fn remove_occupant(&mut self, handle: ClientHandle) -> bool {
        if let Some(idx) = self.seat_of(handle) {
            self.seats[idx] = Seat::empty();
            true
        } else {
            false
        }
    }
}
