use chrono::{DateTime, Utc};
use serenity::model::id::{ChannelId, UserId};

/// How many times a user has bumped, as stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UserBumpCount {
    pub user_id: UserId,
    pub count: u64,
}

/// The single pending reminder: where to post it, and from when on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReminderSlot {
    pub channel_id: ChannelId,
    pub remind_at: DateTime<Utc>,
}
