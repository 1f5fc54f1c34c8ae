//! Errors fatal to the process. Recoverable per-connection failures are
//! represented as plain reply strings, not `std::error::Error` values --
//! they are wire content, never propagated past the connection handler.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to resolve bind address: {0}")]
    AddressResolution(std::io::Error),

    #[error("failed to bind listening socket: {0}")]
    Bind(std::io::Error),
}

impl AppError {
    /// Process exit code for this error, per the server's documented CLI
    /// contract. Port-10 (missing port) is handled by `clap` directly, and
    /// invalid configuration values exit directly from `ServerConfig::validate`
    /// -- neither reaches this type.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::AddressResolution(_) => 1,
            AppError::Bind(e) => e.raw_os_error().unwrap_or(1),
        }
    }
}
