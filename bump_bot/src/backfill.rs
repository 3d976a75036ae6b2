//! One-time scan of the channel's history for bumps made before the bot
//! was around.
//!
//! It's a migration, not a feature: once a scan has written anything, the
//! latch in the database is set and every later scan is refused. Runs in
//! this process are serialized by a mutex, and across processes the latch
//! is claimed in the same transaction that writes the counts.

use std::{collections::HashMap, ops::RangeInclusive};

use serenity::model::id::{ChannelId, UserId};
use tokio::sync::Mutex;

use crate::{
    database::{Database, UserBumpCount},
    error::{Error, Result},
    matcher::extract_bumper,
    platform::{ChatPlatform, InboundMessage},
};

pub const SCAN_LIMIT_RANGE: RangeInclusive<i64> = 1..=10000;
pub const DEFAULT_SCAN_LIMIT: i64 = 1000;

/// What a finished scan found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackfillReport {
    /// Per-user bumps found, most first; equal counts by user ID.
    pub per_user: Vec<UserBumpCount>,
    pub total: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackfillOutcome {
    /// A scan already went through. Nothing was read or written.
    AlreadyCompleted,
    /// No bumps among the `scanned` messages. The latch stays unset, so a
    /// scan with a bigger limit can still be done.
    NothingFound { scanned: usize },
    /// Counts were added and the latch is now set.
    Completed(BackfillReport),
}

/// Count bumps per user among `messages`, without touching anything.
pub fn tally<'a>(messages: impl IntoIterator<Item = &'a InboundMessage>) -> BackfillReport {
    let mut counts: HashMap<UserId, u64> = HashMap::new();
    for message in messages {
        if let Some(user) = extract_bumper(message) {
            *counts.entry(user).or_default() += 1;
        }
    }

    let mut per_user: Vec<UserBumpCount> = counts
        .into_iter()
        .map(|(user_id, count)| UserBumpCount { user_id, count })
        .collect();
    per_user.sort_by(|a, b| b.count.cmp(&a.count).then(a.user_id.cmp(&b.user_id)));

    let total = per_user.iter().map(|x| x.count).sum();
    BackfillReport { per_user, total }
}

/// Guard around the history scan. Keep exactly one per process.
#[derive(Default)]
pub struct HistoryScan {
    running: Mutex<()>,
}

impl HistoryScan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan up to `limit` most recent messages of `channel` and add the bumps
    /// found to the counts. Doesn't send any thank-yous or set reminders.
    pub async fn run(
        &self,
        database: &Database,
        platform: &impl ChatPlatform,
        channel: ChannelId,
        limit: i64,
    ) -> Result<BackfillOutcome> {
        if !SCAN_LIMIT_RANGE.contains(&limit) {
            return Err(Error::Validation(format!(
                "limit must be between {} and {}, got {limit}",
                SCAN_LIMIT_RANGE.start(),
                SCAN_LIMIT_RANGE.end()
            )));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let limit = limit as usize;

        // Held until we're done, so a second run waits and then sees the latch.
        let _running = self.running.lock().await;

        if database.is_scan_completed().await? {
            log::warn!("History scan requested, but it was already completed.");
            return Ok(BackfillOutcome::AlreadyCompleted);
        }

        log::info!("Scanning up to {limit} messages in channel {channel}...");
        let messages = platform.recent_messages(channel, limit).await?;
        let report = tally(&messages);

        if report.per_user.is_empty() {
            log::info!(
                "Scanned {} messages, found no bumps. Not setting the latch.",
                messages.len()
            );
            return Ok(BackfillOutcome::NothingFound {
                scanned: messages.len(),
            });
        }

        if !database.apply_backfill(&report.per_user).await? {
            log::warn!("Another history scan finished first; discarding this one.");
            return Ok(BackfillOutcome::AlreadyCompleted);
        }

        log::info!(
            "Scan complete. Found {} bumps from {} users, marked history scan as completed.",
            report.total,
            report.per_user.len()
        );
        Ok(BackfillOutcome::Completed(report))
    }
}
