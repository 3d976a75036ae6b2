//! Boilerplate shared by the bots in this workspace: logging setup,
//! the async runtime, and the keep-alive web responder.

use std::future::Future;

pub mod keep_alive;

/// Initialize logging and run `closure` to completion in a multi-threaded
/// async runtime, returning whatever it returns.
///
/// Logging is enabled on level `info` unless overridden by the environment
/// variable `RUST_LOG`. This uses the crate [pretty_env_logger][] internally,
/// see its documentation for the filter syntax.
///
/// # Panics
///
/// Panics if the tokio runtime can't be built, which means the process has
/// nothing useful it could do anyway.
///
/// [pretty_env_logger]: https://docs.rs/pretty_env_logger
pub fn start_everything<T>(closure: impl Future<Output = T>) -> T {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| String::from("info"));

    // journald timestamps lines by itself.
    let mut builder = match std::env::var_os("JOURNAL_STREAM").is_some() {
        true => pretty_env_logger::formatted_builder(),
        false => pretty_env_logger::formatted_timed_builder(),
    };

    builder.parse_filters(&log_level);

    if builder.try_init().is_err() {
        log::error!("Tried to init logger twice!");
    }

    log::debug!("Logger is up, starting the runtime.");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build the tokio runtime!")
        .block_on(closure)
}
