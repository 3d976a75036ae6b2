use thiserror::Error;

use crate::platform::PlatformError;

/// Everything that can go wrong while handling a bump, a poll or a command.
#[derive(Error, Debug)]
pub enum Error {
    /// The database could not be reached or the statement failed.
    /// Never papered over with a default value.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    /// A user or channel could not be resolved on the chat platform.
    #[error("External lookup failed: {0}")]
    ExternalLookup(#[from] PlatformError),

    /// Malformed command input.
    #[error("Invalid input: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
