//! Functions that handle events from Discord.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serenity::{
    all::{
        ChannelId, Colour, Command, CommandDataOptionValue, CommandInteraction, Context,
        CreateEmbed, CreateInteractionResponseFollowup, EventHandler, Interaction, Message, Ready,
    },
    async_trait,
};

use crate::{
    app::App,
    commands::{self, Caller, CommandSpec, OptionValue, Reply, RANKING_TITLE},
    ledger::{self, BumpReceipt, APOLOGY},
    matcher::extract_bumper,
    platform::{ChatPlatform, DiscordPlatform, InboundMessage},
};

/// Record a bump if `message` announces one. Store failures get an apology
/// posted to `channel` instead.
pub async fn handle_message(
    app: &App,
    platform: &impl ChatPlatform,
    channel: ChannelId,
    message: &InboundMessage,
    now: DateTime<Utc>,
) -> Option<BumpReceipt> {
    let user = extract_bumper(message)?;
    log::info!("Bump success message detected.");

    match ledger::apply_bump(&app.database, platform, channel, user, now).await {
        Ok(receipt) => Some(receipt),
        Err(e) => {
            log::error!("Error processing bump by {user}: {e}");
            if let Err(e) = platform.send_message(channel, APOLOGY).await {
                log::error!("Couldn't even apologize: {e}");
            }
            None
        }
    }
}

fn option_values(command: &CommandInteraction) -> Vec<(&str, OptionValue)> {
    command
        .data
        .options
        .iter()
        .filter_map(|option| {
            let value = match &option.value {
                CommandDataOptionValue::User(user) => OptionValue::User(*user),
                CommandDataOptionValue::Integer(x) => OptionValue::Integer(*x),
                other => {
                    log::warn!("Ignoring unexpected option {}: {other:?}", option.name);
                    return None;
                }
            };
            Some((option.name.as_str(), value))
        })
        .collect()
}

async fn handle_command(app: &App, ctx: &Context, command: &CommandInteraction) {
    let ephemeral = CommandSpec::find(&command.data.name).is_some_and(CommandSpec::ephemeral);

    let deferred = match ephemeral {
        true => command.defer_ephemeral(&ctx.http).await,
        false => command.defer(&ctx.http).await,
    };
    if let Err(e) = deferred {
        log::error!("Failed to defer /{}: {e}", command.data.name);
        return;
    }

    let is_admin = command
        .member
        .as_ref()
        .and_then(|member| member.permissions)
        .is_some_and(|permissions| permissions.administrator());

    let caller = Caller {
        name: &command.user.name,
        channel: command.channel_id,
        is_admin,
    };

    let platform = DiscordPlatform::new(ctx.http.clone());
    let reply = commands::respond(
        app,
        &platform,
        &command.data.name,
        &option_values(command),
        caller,
    )
    .await;

    let followup = match reply {
        Reply::Text(text) => CreateInteractionResponseFollowup::new().content(text),
        Reply::Ranking(text) => CreateInteractionResponseFollowup::new().embed(
            CreateEmbed::new()
                .title(RANKING_TITLE)
                .description(text)
                .colour(Colour::GOLD),
        ),
    };

    if let Err(e) = command
        .create_followup(&ctx.http, followup.ephemeral(ephemeral))
        .await
    {
        log::error!("Failed to answer /{}: {e}", command.data.name);
    }
}

pub struct Handler {
    app: Arc<App>,
}

impl Handler {
    pub fn new(app: Arc<App>) -> Self {
        Handler { app }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        log::info!("Logged in as {}", ready.user.name);

        match Command::set_global_commands(&ctx.http, commands::generate_discord_commands()).await
        {
            Ok(registered) => log::info!("Synchronized {} slash commands.", registered.len()),
            Err(e) => log::error!("Failed to register slash commands: {e}"),
        }
    }

    async fn message(&self, ctx: Context, message: Message) {
        let platform = DiscordPlatform::new(ctx.http.clone());
        handle_message(
            &self.app,
            &platform,
            message.channel_id,
            &InboundMessage::from(&message),
            Utc::now(),
        )
        .await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            handle_command(&self.app, &ctx, &command).await;
        }
    }
}
