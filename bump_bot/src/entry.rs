use std::sync::Arc;

use bot_commons::keep_alive;
use serenity::all::{Client, GatewayIntents};

use crate::{
    app::App, config::Config, database::Database, handlers::Handler, platform::DiscordPlatform,
    reminder,
};

fn fatal(what: &str) -> ! {
    log::error!("!!! FATAL: {what}");
    std::process::exit(1);
}

/// Start everything and run until the gateway connection ends.
///
/// Exits the process if the configuration is incomplete or the database
/// can't be opened.
pub async fn entry() {
    let config = Config::from_env().unwrap_or_else(|e| fatal(&e));

    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = keep_alive::serve(port).await {
            log::error!("Keep-alive responder died: {e}");
        }
    });

    log::info!("Connecting to database...");
    let database = match Database::new(&config.database_url).await {
        Ok(database) => Arc::new(database),
        Err(e) => fatal(&format!("Could not open the database: {e}")),
    };
    log::info!("Database ready.");

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let app = Arc::new(App::new(database.clone()));

    let mut client = match Client::builder(&config.discord_token, intents)
        .event_handler(Handler::new(app))
        .await
    {
        Ok(client) => client,
        Err(e) => fatal(&format!("Could not create the Discord client: {e}")),
    };

    tokio::spawn(reminder::reminder_loop(
        Arc::downgrade(&database),
        DiscordPlatform::new(client.http.clone()),
        config.reminder_poll_interval,
    ));
    log::info!("Reminder loop started.");

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Got Ctrl+C, shutting down.");
            shard_manager.shutdown_all().await;
        }
    });

    log::info!("Connecting to Discord!");

    if let Err(e) = client.start().await {
        log::error!("Discord client error: {e}");
    }

    database.close().await;

    log::info!("it appears we have been bonked.");
}
