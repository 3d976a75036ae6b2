//! Turning a detected bump into a stored count, replies, and the next reminder.

use chrono::{DateTime, TimeDelta, Utc};
use rand::seq::IndexedRandom;
use serenity::model::id::{ChannelId, UserId};

use crate::{database::Database, error::Result, platform::ChatPlatform};

/// Totals worth an extra celebration.
pub const MILESTONES: &[u64] = &[10, 50, 100, 150, 200];

/// DISBOARD lets a server bump once every two hours.
pub const REMINDER_DELAY: TimeDelta = TimeDelta::hours(2);

/// Posted when a bump was seen but couldn't be recorded.
pub const APOLOGY: &str = "おっと、Bumpの記録中にエラーが起きたみたい…ごめんね！";

static THANKS: &[&str] = &[
    "ありがとう！サーバーが盛り上がるね！",
    "ナイスBump！君はヒーローだ！",
    "サンキュー！次も頼んだよ！",
    "お疲れ様！ゆっくり休んでね！",
];

/// What [`apply_bump`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BumpReceipt {
    pub user: UserId,
    /// Total after this bump.
    pub count: u64,
    pub milestone: bool,
    pub remind_at: DateTime<Utc>,
}

pub fn is_milestone(count: u64) -> bool {
    MILESTONES.contains(&count)
}

fn thanks_text(user: UserId, count: u64) -> String {
    let thanks = THANKS
        .choose(&mut rand::rng())
        .expect("There is always multiple possible responses");
    format!("<@{user}> {thanks} (累計 **{count}** 回)")
}

fn milestone_text(user: UserId, count: u64) -> String {
    format!(
        "🎉🎉Congratulation!!🎉🎉 <@{user}> なんと累計 **{count}回** のBumpを達成しました！本当にありがとう！"
    )
}

/// Count a bump by `user` seen in `channel` at `now`.
///
/// The count and the next reminder are stored first, together in one
/// transaction. If that fails, the error is returned and nothing was changed.
/// Replies are sent afterwards; if those fail, it's only logged, since the
/// bump itself is already recorded.
pub async fn apply_bump(
    database: &Database,
    platform: &impl ChatPlatform,
    channel: ChannelId,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<BumpReceipt> {
    let remind_at = now + REMINDER_DELAY;
    let count = database
        .record_bump_and_set_reminder(user, channel, remind_at)
        .await?;
    let milestone = is_milestone(count);
    log::info!("Recorded a bump by {user}. Total bumps: {count}");
    log::info!("Reminder set for {}", remind_at.format("%Y-%m-%d %H:%M:%S UTC"));

    if let Err(e) = platform
        .send_message(channel, &thanks_text(user, count))
        .await
    {
        log::warn!("Failed to thank {user} for bumping: {e}");
    }

    if milestone {
        if let Err(e) = platform
            .send_message(channel, &milestone_text(user, count))
            .await
        {
            log::warn!("Failed to congratulate {user} on {count} bumps: {e}");
        }
    }

    Ok(BumpReceipt {
        user,
        count,
        milestone,
        remind_at,
    })
}
