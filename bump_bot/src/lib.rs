//! Source code for the bump bot: it counts DISBOARD bumps on a Discord
//! server, thanks whoever bumped, and reminds everyone when the next bump
//! is possible.

/// Application context shared by handlers.
mod app;
pub use app::App;

/// Environment configuration.
pub mod config;

/// The database.
pub mod database;

/// Error type used throughout.
pub mod error;

/// Chat platform capabilities the core relies on.
pub mod platform;

/// Detecting successful bumps.
pub mod matcher;

/// Recording bumps and thanking for them.
pub mod ledger;

/// The "bump again" reminder.
pub mod reminder;

/// One-time history scan.
pub mod backfill;

/// Slash command definitions and answers.
pub mod commands;

/// Functions that handle events from Discord.
pub mod handlers;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;

#[cfg(test)]
mod test_utils;
