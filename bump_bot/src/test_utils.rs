//! Helpers for tests: a throwaway database and a chat platform that only
//! writes down what it was asked to do.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use serenity::model::id::{ChannelId, UserId};
use tempfile::TempDir;

use crate::{
    database::Database,
    matcher::DISBOARD_BOT_ID,
    platform::{ChatPlatform, InboundMessage, PlatformError},
};

/// The directory has to outlive the database, so keep both.
pub struct TestDatabase {
    pub database: Database,
    pub dir: TempDir,
}

impl TestDatabase {
    pub async fn new() -> TestDatabase {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::new(&Self::url_in(&dir)).await.unwrap();
        TestDatabase { database, dir }
    }

    pub fn url_in(dir: &TempDir) -> String {
        format!("sqlite:{}", dir.path().join("bumps.sqlite").display())
    }
}

#[derive(Default)]
pub struct FakePlatform {
    pub sent: Mutex<Vec<(ChannelId, String)>>,
    pub missing_channels: Vec<ChannelId>,
    pub user_names: HashMap<UserId, String>,
    pub history: Vec<InboundMessage>,
    pub fail_sends: bool,
    /// How long each send takes before it lands.
    pub send_delay: Option<Duration>,
}

impl FakePlatform {
    pub fn sent(&self) -> Vec<(ChannelId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl ChatPlatform for FakePlatform {
    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<(), PlatformError> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_sends || self.missing_channels.contains(&channel) {
            return Err(PlatformError::NotFound);
        }
        self.sent.lock().unwrap().push((channel, text.to_string()));
        Ok(())
    }

    async fn resolve_channel(&self, channel: ChannelId) -> Result<(), PlatformError> {
        match self.missing_channels.contains(&channel) {
            true => Err(PlatformError::NotFound),
            false => Ok(()),
        }
    }

    async fn fetch_user_name(&self, user: UserId) -> Result<String, PlatformError> {
        self.user_names
            .get(&user)
            .cloned()
            .ok_or(PlatformError::NotFound)
    }

    async fn recent_messages(
        &self,
        _channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, PlatformError> {
        Ok(self.history.iter().take(limit).cloned().collect())
    }
}

/// For handing to something that keeps the platform, while still being
/// able to look at what was sent.
impl ChatPlatform for Arc<FakePlatform> {
    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<(), PlatformError> {
        self.as_ref().send_message(channel, text).await
    }

    async fn resolve_channel(&self, channel: ChannelId) -> Result<(), PlatformError> {
        self.as_ref().resolve_channel(channel).await
    }

    async fn fetch_user_name(&self, user: UserId) -> Result<String, PlatformError> {
        self.as_ref().fetch_user_name(user).await
    }

    async fn recent_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, PlatformError> {
        self.as_ref().recent_messages(channel, limit).await
    }
}

/// What DISBOARD posts after a successful bump by `user`.
pub fn bump_message(user: u64) -> InboundMessage {
    InboundMessage {
        author_id: DISBOARD_BOT_ID,
        embed_description: Some(format!("<@{user}> さんが表示順をアップしたよ :thumbsup:")),
    }
}

/// Some unrelated chatter.
pub fn chatter(author: u64) -> InboundMessage {
    InboundMessage {
        author_id: UserId::new(author),
        embed_description: None,
    }
}
