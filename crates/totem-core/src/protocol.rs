use std::time::Duration;

/// Minimum accepted nickname length, in bytes.
pub const NICK_MIN_LEN: usize = 3;
/// Maximum accepted nickname length, in bytes.
pub const NICK_MAX_LEN: usize = 16;

/// Capacity of each priority band on the Command Bus and every Room Bus.
pub const BUS_CAPACITY: usize = 100;

/// Minimum seated players required for `start` to succeed.
pub const MIN_PLAYERS_TO_START: usize = 2;

/// Interval the Game Runner polls its Room Bus at.
pub const GAME_RUNNER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Wall-clock time with no Room Bus activity before the Game Runner forces
/// a draw for the current player.
pub const TURN_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on how long `start` retries opening the freshly spawned room's bus
/// before giving up.
pub const ROOM_BUS_OPEN_RETRY_BUDGET: Duration = Duration::from_secs(1);
