use crate::room::RoomId;

/// Maximum length, in bytes, of a client command line (not counting the
/// terminator).
pub const MAX_COMMAND_LEN: usize = 49;

/// The closed set of commands a client connection may issue once past the
/// nickname-negotiation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    List,
    Create(RoomId),
    Join(RoomId),
    Spectate(RoomId),
    Start,
    Leave,
    Draw(u64),
    Grab(u64),
    Refresh,
}

/// Priority band a command travels on once handed to the Command Bus.
/// `List` never reaches the bus -- it is served directly by the connection
/// handler against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Lobby = 0,
    Gameplay = 1,
}

impl Command {
    /// Bus priority for commands that travel through the Command Bus.
    /// Returns `None` for `List`, which is handled locally by the connection.
    pub fn priority(&self) -> Option<Priority> {
        match self {
            Command::List => None,
            Command::Create(_) | Command::Join(_) | Command::Spectate(_) | Command::Start | Command::Leave => {
                Some(Priority::Lobby)
            },
            Command::Draw(_) | Command::Grab(_) | Command::Refresh => Some(Priority::Gameplay),
        }
    }
}

/// Reason a line failed to parse into a `Command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandParseError {
    /// The verb is not one of the known commands.
    Unrecognized,
    /// The verb was recognised but its required argument was missing or
    /// not a valid non-negative integer.
    InvalidArgument,
}

impl CommandParseError {
    /// The single-line, user-facing reply text for this error.
    pub fn reply(&self) -> &'static str {
        match self {
            CommandParseError::Unrecognized => "Unrecognized command.",
            CommandParseError::InvalidArgument => "Invalid argument.",
        }
    }
}

fn parse_room_id(arg: Option<&str>) -> Result<RoomId, CommandParseError> {
    let arg = arg.ok_or(CommandParseError::InvalidArgument)?;
    let id: i64 = arg.parse().map_err(|_| CommandParseError::InvalidArgument)?;
    if id < 0 {
        return Err(CommandParseError::InvalidArgument);
    }
    Ok(id)
}

fn parse_turn(arg: Option<&str>) -> Result<u64, CommandParseError> {
    let arg = arg.ok_or(CommandParseError::InvalidArgument)?;
    arg.parse().map_err(|_| CommandParseError::InvalidArgument)
}

impl Command {
    /// Parses one whitespace-delimited command line. Splitting on any
    /// run of whitespace means a verb glued to its argument (`create1`)
    /// simply fails to match any known verb, which is how the separating
    /// space ends up mandatory for every verb uniformly.
    pub fn parse(line: &str) -> Result<Command, CommandParseError> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or(CommandParseError::Unrecognized)?;
        match verb {
            "list" => Ok(Command::List),
            "create" => parse_room_id(parts.next()).map(Command::Create),
            "join" => parse_room_id(parts.next()).map(Command::Join),
            "spectate" => parse_room_id(parts.next()).map(Command::Spectate),
            "start" => Ok(Command::Start),
            "leave" => Ok(Command::Leave),
            "draw" => parse_turn(parts.next()).map(Command::Draw),
            "grab" => parse_turn(parts.next()).map(Command::Grab),
            "refresh" => Ok(Command::Refresh),
            _ => Err(CommandParseError::Unrecognized),
        }
    }
}
