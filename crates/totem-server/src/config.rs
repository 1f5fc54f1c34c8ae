use serde::Deserialize;

/// Top-level server configuration, loaded from `totem.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub rooms: RoomsConfig,
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { rooms: RoomsConfig::default(), limits: LimitsConfig::default() }
    }
}

/// Room / match lifecycle tunables. Seat capacity is not among them: it is
/// baked into `totem_core::Room` as a fixed `[Seat; MAX_SEATS]` array, per
/// spec's data-model invariant, not a runtime-adjustable quantity.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub min_players_to_start: usize,
    pub turn_idle_timeout_secs: u64,
    pub game_runner_poll_interval_ms: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            min_players_to_start: totem_core::protocol::MIN_PLAYERS_TO_START,
            turn_idle_timeout_secs: totem_core::protocol::TURN_IDLE_TIMEOUT.as_secs(),
            game_runner_poll_interval_ms: totem_core::protocol::GAME_RUNNER_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

/// Connection and protocol limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub nickname_min_len: usize,
    pub nickname_max_len: usize,
    pub max_command_len: usize,
    pub command_bus_capacity: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            nickname_min_len: totem_core::protocol::NICK_MIN_LEN,
            nickname_max_len: totem_core::protocol::NICK_MAX_LEN,
            max_command_len: totem_core::command::MAX_COMMAND_LEN,
            command_bus_capacity: totem_core::protocol::BUS_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Validates configuration, logging and exiting the process on values
    /// that would make the server unable to function.
    pub fn validate(&self) {
        if self.rooms.min_players_to_start < 2 || self.rooms.min_players_to_start > totem_core::MAX_SEATS {
            tracing::error!("rooms.min_players_to_start must be between 2 and {}", totem_core::MAX_SEATS);
            std::process::exit(1);
        }
        if self.rooms.turn_idle_timeout_secs == 0 {
            tracing::error!("rooms.turn_idle_timeout_secs must be > 0");
            std::process::exit(1);
        }
        if self.rooms.game_runner_poll_interval_ms == 0 {
            tracing::error!("rooms.game_runner_poll_interval_ms must be > 0");
            std::process::exit(1);
        }
        if self.limits.nickname_min_len == 0 || self.limits.nickname_min_len > self.limits.nickname_max_len {
            tracing::error!("limits.nickname_min_len must be > 0 and <= nickname_max_len");
            std::process::exit(1);
        }
        if self.limits.max_command_len == 0 {
            tracing::error!("limits.max_command_len must be > 0");
            std::process::exit(1);
        }
        if self.limits.command_bus_capacity == 0 {
            tracing::error!("limits.command_bus_capacity must be > 0");
            std::process::exit(1);
        }
    }

    /// Loads config from `totem.toml` if present, then applies environment
    /// variable overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("totem.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from totem.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse totem.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No totem.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(val) = std::env::var("TOTEM_MIN_PLAYERS_TO_START")
            && let Ok(n) = val.parse::<usize>()
        {
            config.rooms.min_players_to_start = n;
        }
        if let Ok(val) = std::env::var("TOTEM_TURN_IDLE_TIMEOUT_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.rooms.turn_idle_timeout_secs = n;
        }
        if let Ok(val) = std::env::var("TOTEM_COMMAND_BUS_CAPACITY")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.command_bus_capacity = n;
        }

        config
    }
}
