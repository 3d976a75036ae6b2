mod types;

pub use types::*;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serenity::model::id::{ChannelId, UserId};
pub use sqlx::Error;
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Executor, Row, Sqlite,
};

type Pool = sqlx::Pool<Sqlite>;

/// Default amount of entries in the bump ranking.
pub const TOP_USERS_LIMIT: u32 = 5;

// SQLite has no unsigned 64 bit integers, and Discord snowflakes fit in 63 bits.
#[allow(clippy::cast_possible_wrap)]
fn snowflake_to_db(id: u64) -> i64 {
    id as i64
}

#[allow(clippy::cast_sign_loss)]
fn count_from_db(count: i64) -> u64 {
    // Table has a CHECK for this, but don't wrap around if someone edits it by hand.
    count.max(0) as u64
}

#[allow(clippy::cast_sign_loss)]
fn user_from_row(row: &SqliteRow) -> UserBumpCount {
    UserBumpCount {
        user_id: UserId::new(row.get::<i64, _>("user_id") as u64),
        count: count_from_db(row.get("count")),
    }
}

pub struct Database {
    pool: Pool,
}

impl Database {
    /// Open (and create, if needed) the database at `url`, like
    /// `sqlite:bump_bot.sqlite`, and make sure all the tables exist.
    pub async fn new(url: &str) -> Result<Database, Error> {
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?;
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(
                SqliteConnectOptions::from_str(url)?
                    .busy_timeout(std::time::Duration::from_secs(5)),
            )
            .await?;

        let database = Database { pool };
        database.init_schema().await?;
        Ok(database)
    }

    /// Let in-flight queries finish and close all connections.
    /// Everything after this fails with [`Error::PoolClosed`].
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create whatever is missing. Safe to run on every start, never drops anything.
    async fn init_schema(&self) -> Result<(), Error> {
        // BUMP_COUNTS:
        // seq (key, insertion order; ranking tie-break)
        // user_id (unique, i64 because sqlite doesn't support u64)
        // count (non-negative, only ever goes up)
        self.pool
            .execute(sqlx::query(
                "CREATE TABLE IF NOT EXISTS bump_counts (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL UNIQUE,
                    count INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0)
                ) STRICT;",
            ))
            .await?;

        // BOT_STATE (always exactly one row, id 1):
        // reminder_channel_id (i64, NULL if no reminder pending)
        // remind_at (date+time in UTC, NULL if no reminder pending)
        // scan_completed (0 for no, 1 for yes; never goes back to 0)
        self.pool
            .execute(sqlx::query(
                "CREATE TABLE IF NOT EXISTS bot_state (
                    id INTEGER PRIMARY KEY NOT NULL CHECK (id = 1),
                    reminder_channel_id INTEGER NULL,
                    remind_at TEXT NULL,
                    scan_completed INTEGER NOT NULL DEFAULT 0
                ) STRICT;",
            ))
            .await?;

        self.pool
            .execute(sqlx::query("INSERT OR IGNORE INTO bot_state (id) VALUES (1);"))
            .await?;

        Ok(())
    }

    /// Count one bump for this user and return their new total.
    /// Done as a single statement, so concurrent calls can't lose updates.
    pub async fn record_bump(&self, user: UserId) -> Result<u64, Error> {
        self.record_bumps(user, 1).await
    }

    /// Same as [`Self::record_bump`] `amount` times over.
    pub async fn record_bumps(&self, user: UserId, amount: u64) -> Result<u64, Error> {
        sqlx::query(
            "INSERT INTO bump_counts (user_id, count) VALUES (?, ?)
            ON CONFLICT (user_id) DO
                UPDATE SET count = count + excluded.count
            RETURNING count;",
        )
        .bind(snowflake_to_db(user.get()))
        .bind(snowflake_to_db(amount))
        .map(|row: SqliteRow| count_from_db(row.get("count")))
        .fetch_one(&self.pool)
        .await
    }

    /// Returns 0 for users that never bumped.
    pub async fn get_user_count(&self, user: UserId) -> Result<u64, Error> {
        let count = sqlx::query("SELECT count FROM bump_counts WHERE user_id = ?;")
            .bind(snowflake_to_db(user.get()))
            .map(|row: SqliteRow| count_from_db(row.get("count")))
            .fetch_optional(&self.pool)
            .await?;
        Ok(count.unwrap_or(0))
    }

    /// Users with the most bumps, most first. Users with equal counts are
    /// ordered by who got recorded first.
    pub async fn get_top_users(&self, limit: u32) -> Result<Vec<UserBumpCount>, Error> {
        sqlx::query(
            "SELECT user_id, count FROM bump_counts
            ORDER BY count DESC, seq ASC
            LIMIT ?;",
        )
        .bind(limit)
        .map(|row: SqliteRow| user_from_row(&row))
        .fetch_all(&self.pool)
        .await
    }

    /// Replace the pending reminder, if any, with this one.
    pub async fn set_reminder(
        &self,
        channel: ChannelId,
        remind_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE bot_state SET reminder_channel_id = ?, remind_at = ? WHERE id = 1;")
            .bind(snowflake_to_db(channel.get()))
            .bind(remind_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// In one transaction: count one bump for this user, and replace the
    /// pending reminder with one for `channel` at `remind_at`.
    ///
    /// Returns the user's new total. If either write fails, neither is kept.
    pub async fn record_bump_and_set_reminder(
        &self,
        user: UserId,
        channel: ChannelId,
        remind_at: DateTime<Utc>,
    ) -> Result<u64, Error> {
        let mut transaction = self.pool.begin().await?;

        let count = sqlx::query(
            "INSERT INTO bump_counts (user_id, count) VALUES (?, 1)
            ON CONFLICT (user_id) DO
                UPDATE SET count = count + 1
            RETURNING count;",
        )
        .bind(snowflake_to_db(user.get()))
        .map(|row: SqliteRow| count_from_db(row.get("count")))
        .fetch_one(&mut *transaction)
        .await?;

        sqlx::query("UPDATE bot_state SET reminder_channel_id = ?, remind_at = ? WHERE id = 1;")
            .bind(snowflake_to_db(channel.get()))
            .bind(remind_at)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;
        Ok(count)
    }

    /// Run raw SQL against the database, for setting up odd states in tests.
    #[cfg(test)]
    pub(crate) async fn execute_raw(&self, sql: &str) -> Result<(), Error> {
        sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(())
    }

    #[allow(clippy::cast_sign_loss)]
    pub async fn get_reminder(&self) -> Result<Option<ReminderSlot>, Error> {
        let row = sqlx::query("SELECT reminder_channel_id, remind_at FROM bot_state WHERE id = 1;")
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let channel_id: Option<i64> = row.try_get("reminder_channel_id")?;
        let remind_at: Option<DateTime<Utc>> = row.try_get("remind_at")?;

        Ok(match (channel_id, remind_at) {
            (Some(channel_id), Some(remind_at)) => Some(ReminderSlot {
                channel_id: ChannelId::new(channel_id as u64),
                remind_at,
            }),
            _ => None,
        })
    }

    /// Drop the pending reminder. Fine to call when there is none.
    pub async fn clear_reminder(&self) -> Result<(), Error> {
        sqlx::query(
            "UPDATE bot_state SET reminder_channel_id = NULL, remind_at = NULL WHERE id = 1;",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drop the pending reminder only if it's still exactly `slot`.
    /// Returns `true` if it was dropped.
    pub async fn clear_reminder_if_unchanged(&self, slot: &ReminderSlot) -> Result<bool, Error> {
        let result = sqlx::query(
            "UPDATE bot_state SET reminder_channel_id = NULL, remind_at = NULL
            WHERE id = 1 AND reminder_channel_id = ? AND remind_at = ?;",
        )
        .bind(snowflake_to_db(slot.channel_id.get()))
        .bind(slot.remind_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn is_scan_completed(&self) -> Result<bool, Error> {
        sqlx::query("SELECT scan_completed FROM bot_state WHERE id = 1;")
            .map(|row: SqliteRow| row.get::<i64, _>("scan_completed") != 0)
            .fetch_one(&self.pool)
            .await
    }

    /// Set the history scan latch. Does nothing if it's already set.
    pub async fn mark_scan_completed(&self) -> Result<(), Error> {
        sqlx::query("UPDATE bot_state SET scan_completed = 1 WHERE id = 1;")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// In one transaction: set the history scan latch, and add the
    /// given amount of bumps to each given user.
    ///
    /// If the latch was already set, nothing is written and `false` is
    /// returned. This is the only way two racing history scans can't
    /// both apply their counts.
    pub async fn apply_backfill(&self, counts: &[UserBumpCount]) -> Result<bool, Error> {
        let mut transaction = self.pool.begin().await?;

        let claimed = sqlx::query(
            "UPDATE bot_state SET scan_completed = 1 WHERE id = 1 AND scan_completed = 0;",
        )
        .execute(&mut *transaction)
        .await?
        .rows_affected()
            == 1;

        if !claimed {
            transaction.rollback().await?;
            return Ok(false);
        }

        for entry in counts {
            sqlx::query(
                "INSERT INTO bump_counts (user_id, count) VALUES (?, ?)
                ON CONFLICT (user_id) DO
                    UPDATE SET count = count + excluded.count;",
            )
            .bind(snowflake_to_db(entry.user_id.get()))
            .bind(snowflake_to_db(entry.count))
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeDelta;

    use super::*;
    use crate::test_utils::TestDatabase;

    #[tokio::test]
    async fn counts_follow_calls() {
        let db = TestDatabase::new().await;
        let (a, b) = (UserId::new(1), UserId::new(2));

        assert_eq!(db.database.get_user_count(a).await.unwrap(), 0);

        let mut last_a = 0;
        for (i, user) in [a, b, a, a, b, a].into_iter().enumerate() {
            let count = db.database.record_bump(user).await.unwrap();
            if user == a {
                assert!(count > last_a, "count went from {last_a} to {count} at {i}");
                last_a = count;
            }
        }

        assert_eq!(db.database.get_user_count(a).await.unwrap(), 4);
        assert_eq!(db.database.get_user_count(b).await.unwrap(), 2);
        assert_eq!(db.database.record_bumps(b, 5).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn concurrent_bumps_are_not_lost() {
        let db = TestDatabase::new().await;
        let database = Arc::new(db.database);
        let user = UserId::new(123);

        let handles: Vec<_> = (0..40)
            .map(|i| {
                let database = database.clone();
                tokio::spawn(async move {
                    let who = if i % 4 == 0 { UserId::new(456) } else { user };
                    database.record_bump(who).await.unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(database.get_user_count(user).await.unwrap(), 30);
        assert_eq!(database.get_user_count(UserId::new(456)).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn top_users_order_and_ties() {
        let db = TestDatabase::new().await;
        // Recorded in this order; 3, 5 and 6 tie at 2.
        for (user, amount) in [(3, 2), (1, 4), (5, 2), (2, 1), (6, 2), (4, 7), (7, 1)] {
            db.database
                .record_bumps(UserId::new(user), amount)
                .await
                .unwrap();
        }

        let top = db.database.get_top_users(TOP_USERS_LIMIT).await.unwrap();
        let top: Vec<(u64, u64)> = top.iter().map(|x| (x.user_id.get(), x.count)).collect();
        assert_eq!(top, vec![(4, 7), (1, 4), (3, 2), (5, 2), (6, 2)]);

        let all = db.database.get_top_users(100).await.unwrap();
        assert_eq!(all.len(), 7);
        assert!(all.windows(2).all(|w| w[0].count >= w[1].count));
    }

    #[tokio::test]
    async fn top_users_empty() {
        let db = TestDatabase::new().await;
        assert!(db.database.get_top_users(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopening_keeps_everything() {
        let db = TestDatabase::new().await;
        let remind_at = Utc::now() + TimeDelta::hours(2);
        db.database.record_bump(UserId::new(1)).await.unwrap();
        db.database
            .set_reminder(ChannelId::new(10), remind_at)
            .await
            .unwrap();
        db.database.mark_scan_completed().await.unwrap();

        let url = TestDatabase::url_in(&db.dir);
        drop(db.database);
        let database = Database::new(&url).await.unwrap();

        assert_eq!(database.get_user_count(UserId::new(1)).await.unwrap(), 1);
        assert_eq!(
            database.get_reminder().await.unwrap(),
            Some(ReminderSlot {
                channel_id: ChannelId::new(10),
                remind_at,
            })
        );
        assert!(database.is_scan_completed().await.unwrap());
    }

    #[tokio::test]
    async fn reminder_last_write_wins() {
        let db = TestDatabase::new().await;
        let now = Utc::now();

        db.database.set_reminder(ChannelId::new(1), now).await.unwrap();
        db.database
            .set_reminder(ChannelId::new(2), now + TimeDelta::minutes(5))
            .await
            .unwrap();

        let slot = db.database.get_reminder().await.unwrap().unwrap();
        assert_eq!(slot.channel_id, ChannelId::new(2));
        assert_eq!(slot.remind_at, now + TimeDelta::minutes(5));

        db.database.clear_reminder().await.unwrap();
        assert_eq!(db.database.get_reminder().await.unwrap(), None);
    }

    #[tokio::test]
    async fn bump_with_reminder_is_all_or_nothing() {
        let db = TestDatabase::new().await;
        let user = UserId::new(123);
        let channel = ChannelId::new(10);
        let remind_at = Utc::now() + TimeDelta::hours(2);

        let count = db
            .database
            .record_bump_and_set_reminder(user, channel, remind_at)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            db.database.get_reminder().await.unwrap(),
            Some(ReminderSlot {
                channel_id: channel,
                remind_at,
            })
        );

        db.database
            .execute_raw(
                "CREATE TRIGGER refuse_reminders BEFORE UPDATE ON bot_state
                BEGIN SELECT RAISE(ABORT, 'reminders are off'); END;",
            )
            .await
            .unwrap();

        assert!(db
            .database
            .record_bump_and_set_reminder(user, ChannelId::new(20), remind_at)
            .await
            .is_err());
        assert_eq!(db.database.get_user_count(user).await.unwrap(), 1);
        assert_eq!(
            db.database.get_reminder().await.unwrap().unwrap().channel_id,
            channel
        );
    }

    #[tokio::test]
    async fn conditional_clear_spares_newer_slot() {
        let db = TestDatabase::new().await;
        let now = Utc::now();
        let old = ReminderSlot {
            channel_id: ChannelId::new(1),
            remind_at: now,
        };

        db.database
            .set_reminder(old.channel_id, old.remind_at)
            .await
            .unwrap();
        db.database
            .set_reminder(ChannelId::new(1), now + TimeDelta::hours(2))
            .await
            .unwrap();

        assert!(!db.database.clear_reminder_if_unchanged(&old).await.unwrap());
        assert!(db.database.get_reminder().await.unwrap().is_some());

        let current = db.database.get_reminder().await.unwrap().unwrap();
        assert!(db
            .database
            .clear_reminder_if_unchanged(&current)
            .await
            .unwrap());
        assert_eq!(db.database.get_reminder().await.unwrap(), None);
    }

    #[tokio::test]
    async fn scan_latch_is_one_way() {
        let db = TestDatabase::new().await;
        assert!(!db.database.is_scan_completed().await.unwrap());

        db.database.mark_scan_completed().await.unwrap();
        db.database.mark_scan_completed().await.unwrap();
        assert!(db.database.is_scan_completed().await.unwrap());

        let counts = [UserBumpCount {
            user_id: UserId::new(1),
            count: 3,
        }];
        assert!(!db.database.apply_backfill(&counts).await.unwrap());
        assert!(db.database.is_scan_completed().await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_database_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!(
            "sqlite:{}",
            dir.path().join("no/such/dir/bumps.sqlite").display()
        );
        assert!(Database::new(&url).await.is_err());
    }
}
