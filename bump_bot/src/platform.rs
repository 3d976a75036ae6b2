//! The bits of the chat platform the core needs, behind a trait so the core
//! can be driven by something other than a live Discord connection.

use std::{future::Future, sync::Arc};

use futures::StreamExt;
use serenity::{
    http::Http,
    model::{
        channel::Message,
        id::{ChannelId, UserId},
    },
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Not found")]
    NotFound,
    #[error("Discord error: {0}")]
    Discord(#[from] serenity::Error),
}

/// A chat message reduced to what the bump matcher looks at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub author_id: UserId,
    /// Description of the first embed, if there is one and it has a description.
    pub embed_description: Option<String>,
}

impl From<&Message> for InboundMessage {
    fn from(message: &Message) -> Self {
        InboundMessage {
            author_id: message.author.id,
            embed_description: message
                .embeds
                .first()
                .and_then(|embed| embed.description.clone()),
        }
    }
}

pub trait ChatPlatform: Send + Sync {
    fn send_message(
        &self,
        channel: ChannelId,
        text: &str,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Make sure the channel exists and we can see it.
    fn resolve_channel(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    fn fetch_user_name(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<String, PlatformError>> + Send;

    /// Up to `limit` most recent messages of the channel, newest first.
    fn recent_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<InboundMessage>, PlatformError>> + Send;
}

/// [`ChatPlatform`] over Discord's REST API.
#[derive(Clone)]
pub struct DiscordPlatform {
    http: Arc<Http>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        DiscordPlatform { http }
    }
}

/// Turn a 404 from Discord into [`PlatformError::NotFound`].
fn classify(error: serenity::Error) -> PlatformError {
    if let serenity::Error::Http(http_error) = &error {
        if http_error.status_code().map(|code| code.as_u16()) == Some(404) {
            return PlatformError::NotFound;
        }
    }
    PlatformError::Discord(error)
}

impl ChatPlatform for DiscordPlatform {
    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<(), PlatformError> {
        channel.say(&self.http, text).await.map_err(classify)?;
        Ok(())
    }

    async fn resolve_channel(&self, channel: ChannelId) -> Result<(), PlatformError> {
        self.http.get_channel(channel).await.map_err(classify)?;
        Ok(())
    }

    async fn fetch_user_name(&self, user: UserId) -> Result<String, PlatformError> {
        let user = self.http.get_user(user).await.map_err(classify)?;
        Ok(user.display_name().to_owned())
    }

    async fn recent_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, PlatformError> {
        let mut stream = Box::pin(channel.messages_iter(self.http.clone()).take(limit));
        let mut messages = Vec::with_capacity(limit.min(1024));
        while let Some(message) = stream.next().await {
            messages.push(InboundMessage::from(&message.map_err(classify)?));
        }
        Ok(messages)
    }
}
