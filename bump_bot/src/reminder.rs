//! The single "bump again" reminder.
//!
//! There is at most one pending reminder, living in the database. A bump
//! sets (or overwrites) it, the polling loop fires and clears it once it's
//! due. Nothing about it is kept in memory, so the loop and the event
//! handlers never need to coordinate with each other.

use std::{sync::Weak, time::Duration};

use chrono::{DateTime, Utc};
use serenity::model::id::ChannelId;
use tokio::time::{interval, MissedTickBehavior};

use crate::{
    database::{Database, ReminderSlot},
    error::Result,
    platform::ChatPlatform,
};

pub const REMINDER_TEXT: &str = "⏰ そろそろBumpの時間だよ！`/bump` をお願いします！";

/// Result of a single [`poll`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// No reminder pending.
    Empty,
    /// Pending, but not yet.
    NotDue(ReminderSlot),
    /// Was due, got sent and cleared.
    Fired(ReminderSlot),
    /// Was due, but the channel couldn't be reached. Cleared anyway.
    Dropped(ReminderSlot),
}

/// Schedule the reminder, replacing whatever was pending.
pub async fn set(database: &Database, channel: ChannelId, remind_at: DateTime<Utc>) -> Result<()> {
    database.set_reminder(channel, remind_at).await?;
    Ok(())
}

/// The pending reminder, if any.
pub async fn current(database: &Database) -> Result<Option<ReminderSlot>> {
    Ok(database.get_reminder().await?)
}

/// Forget the pending reminder, if any.
pub async fn clear(database: &Database) -> Result<()> {
    database.clear_reminder().await?;
    Ok(())
}

/// Fire the pending reminder if it's due as of `now`.
///
/// A reminder whose channel can't be resolved or posted to is dropped, not
/// retried.
pub async fn poll(
    database: &Database,
    platform: &impl ChatPlatform,
    now: DateTime<Utc>,
) -> Result<PollOutcome> {
    let Some(slot) = database.get_reminder().await? else {
        return Ok(PollOutcome::Empty);
    };

    if now < slot.remind_at {
        return Ok(PollOutcome::NotDue(slot));
    }

    let delivered = match platform.resolve_channel(slot.channel_id).await {
        Ok(()) => platform.send_message(slot.channel_id, REMINDER_TEXT).await,
        Err(e) => Err(e),
    };

    // If a bump overwrote the slot while we were sending, leave the new one be.
    if !database.clear_reminder_if_unchanged(&slot).await? {
        log::debug!("Reminder got replaced while firing; keeping the new one.");
    }

    match delivered {
        Ok(()) => {
            log::info!("Reminder message sent to channel {}.", slot.channel_id);
            Ok(PollOutcome::Fired(slot))
        }
        Err(e) => {
            log::warn!(
                "Dropping reminder for channel {}, could not deliver it: {e}",
                slot.channel_id
            );
            Ok(PollOutcome::Dropped(slot))
        }
    }
}

/// Poll for due reminders every `period` for as long as the database lives.
///
/// Each poll is awaited before the next tick is taken, and ticks missed
/// meanwhile are skipped, so polls never overlap.
pub async fn reminder_loop(
    database: Weak<Database>,
    platform: impl ChatPlatform,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(database) = database.upgrade() else {
            // No more database!
            log::info!("Database is gone, stopping the reminder loop.");
            return;
        };

        if let Err(e) = poll(&database, &platform, Utc::now()).await {
            log::error!("Error in reminder loop: {e}");
        }

        // Don't keep the database alive while sleeping.
        drop(database);
    }
}
