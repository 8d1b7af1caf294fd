//! Passive bot liveness
//!
//! Connection tasks publish a [`Touch`] for every event that names a bot.
//! The sweeper task owns the last-seen table, folds touches into it as they
//! arrive and, on every tick, sets `online = false` on today's row of bots
//! that have been silent longer than the timeout. A bot with no row today is
//! left without one.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::core::config::LivenessConfig;
use crate::data::sqlite::repositories::bot_status;
use crate::domain::events::SubjectId;
use crate::utils::time::{Calendar, format_date};

/// A bot was heard from
#[derive(Debug, Clone)]
pub struct Touch {
    pub self_id: SubjectId,
    pub at: Instant,
}

/// Cheap cloneable sender side, held by every connection
#[derive(Clone)]
pub struct LivenessHandle {
    tx: mpsc::Sender<Touch>,
}

impl LivenessHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Touch>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Record activity for `self_id` without waiting
    pub fn touch(&self, self_id: &SubjectId) {
        let touch = Touch {
            self_id: self_id.clone(),
            at: Instant::now(),
        };
        match self.tx.try_send(touch) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(t)) => {
                tracing::warn!(self_id = %t.self_id, "Liveness channel full, touch dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::trace!("Liveness sweeper stopped");
            }
        }
    }
}

#[derive(Debug)]
struct Entry {
    last_seen: Instant,
    /// Day the bot was last written offline; cleared by the next touch
    offline_marked_on: Option<NaiveDate>,
}

/// Last time each bot was heard from
///
/// Bots never heard from are absent, so no claim is made about them.
#[derive(Debug, Default)]
pub struct LastSeenTable {
    entries: HashMap<SubjectId, Entry>,
}

impl LastSeenTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, touch: Touch) {
        match self.entries.get_mut(&touch.self_id) {
            Some(entry) => {
                entry.last_seen = entry.last_seen.max(touch.at);
                entry.offline_marked_on = None;
            }
            None => {
                self.entries.insert(
                    touch.self_id,
                    Entry {
                        last_seen: touch.at,
                        offline_marked_on: None,
                    },
                );
            }
        }
    }

    /// Bots silent for longer than `timeout` and not yet marked offline on `today`
    pub fn expired(&self, now: Instant, timeout: Duration, today: NaiveDate) -> Vec<SubjectId> {
        let mut ids: Vec<SubjectId> = self
            .entries
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.last_seen) > timeout)
            .filter(|(_, e)| e.offline_marked_on != Some(today))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn mark_offline(&mut self, self_id: &SubjectId, today: NaiveDate) {
        if let Some(entry) = self.entries.get_mut(self_id) {
            entry.offline_marked_on = Some(today);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Background task that turns silence into `online = false`
pub struct LivenessSweeper {
    pool: SqlitePool,
    calendar: Calendar,
    config: LivenessConfig,
    table: LastSeenTable,
}

impl LivenessSweeper {
    pub fn new(pool: SqlitePool, calendar: Calendar, config: LivenessConfig) -> Self {
        Self {
            pool,
            calendar,
            config,
            table: LastSeenTable::new(),
        }
    }

    pub fn record(&mut self, touch: Touch) {
        self.table.record(touch);
    }

    /// Mark every expired bot offline for today; returns how many rows were flipped
    ///
    /// Only an existing day row is updated. A failed write is logged and
    /// leaves that bot eligible for the next sweep while the rest proceed.
    pub async fn sweep(&mut self, now: Instant) -> usize {
        let today = self.calendar.today();
        let date = format_date(today);
        let mut marked = 0;

        for self_id in self.table.expired(now, self.config.timeout, today) {
            match bot_status::mark_offline(&self.pool, self_id.as_str(), &date).await {
                Ok(rows) => {
                    self.table.mark_offline(&self_id, today);
                    if rows > 0 {
                        tracing::info!(self_id = %self_id, date = %date, "Bot marked offline");
                        marked += 1;
                    } else {
                        tracing::debug!(self_id = %self_id, date = %date, "Silent bot has no row today");
                    }
                }
                Err(e) => {
                    tracing::error!(self_id = %self_id, error = %e, "Failed to mark bot offline");
                }
            }
        }
        marked
    }

    /// Start the sweep loop; returns when shutdown is signalled
    pub fn start(
        mut self,
        mut touches: mpsc::Receiver<Touch>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.sweep_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;

            tracing::debug!(
                interval_secs = self.config.sweep_interval.as_secs(),
                timeout_secs = self.config.timeout.as_secs(),
                "Liveness sweeper started"
            );

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.changed() => {
                        tracing::debug!(tracked = self.table.len(), "Liveness sweeper shutting down");
                        break;
                    }
                    touch = touches.recv() => {
                        match touch {
                            Some(touch) => self.record(touch),
                            None => {
                                tracing::debug!("Liveness channel closed");
                                break;
                            }
                        }
                    }
                    _ = interval.tick() => {
                        let marked = self.sweep(Instant::now()).await;
                        if marked > 0 {
                            tracing::debug!(marked, "Liveness sweep complete");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::test_pool;

    const TIMEOUT: Duration = Duration::from_secs(60);

    fn touch(id: &str, at: Instant) -> Touch {
        Touch {
            self_id: SubjectId::from(id),
            at,
        }
    }

    fn day(s: &str) -> NaiveDate {
        crate::utils::time::parse_date(s).unwrap()
    }

    fn sweeper(pool: SqlitePool) -> LivenessSweeper {
        LivenessSweeper::new(
            pool,
            Calendar::utc(),
            LivenessConfig {
                sweep_interval: Duration::from_millis(20),
                timeout: TIMEOUT,
            },
        )
    }

    #[test]
    fn test_expired_only_after_timeout() {
        let start = Instant::now();
        let today = day("2024-01-10");
        let mut table = LastSeenTable::new();
        assert!(table.is_empty());
        table.record(touch("1", start));

        assert!(table.expired(start + TIMEOUT, TIMEOUT, today).is_empty());
        let ids = table.expired(start + TIMEOUT + Duration::from_secs(1), TIMEOUT, today);
        assert_eq!(ids, vec![SubjectId::from("1")]);
    }

    #[test]
    fn test_marked_bot_skipped_until_touched_or_next_day() {
        let start = Instant::now();
        let later = start + Duration::from_secs(120);
        let today = day("2024-01-10");
        let mut table = LastSeenTable::new();
        table.record(touch("1", start));
        table.mark_offline(&SubjectId::from("1"), today);

        assert!(table.expired(later, TIMEOUT, today).is_empty());
        assert_eq!(table.expired(later, TIMEOUT, day("2024-01-11")).len(), 1);

        table.record(touch("1", later));
        assert!(table.expired(later, TIMEOUT, today).is_empty());
        let much_later = later + Duration::from_secs(120);
        assert_eq!(table.expired(much_later, TIMEOUT, today).len(), 1);
    }

    #[test]
    fn test_older_touch_does_not_rewind() {
        let start = Instant::now();
        let mut table = LastSeenTable::new();
        table.record(touch("1", start + Duration::from_secs(30)));
        table.record(touch("1", start));
        assert_eq!(table.len(), 1);

        let now = start + Duration::from_secs(80);
        assert!(table.expired(now, TIMEOUT, day("2024-01-10")).is_empty());
    }

    #[tokio::test]
    async fn test_sweep_marks_silent_bots_only() {
        let pool = test_pool().await;
        let mut sweeper = sweeper(pool.clone());
        let start = Instant::now();
        let date = format_date(Calendar::utc().today());

        sweeper.record(touch("quiet", start));
        sweeper.record(touch("chatty", start + Duration::from_secs(50)));
        bot_status::set_online(&pool, "quiet", &date, true).await.unwrap();
        bot_status::set_online(&pool, "chatty", &date, true).await.unwrap();

        let now = start + Duration::from_secs(90);
        assert_eq!(sweeper.sweep(now).await, 1);

        let quiet = bot_status::get_bot_day(&pool, "quiet", &date).await.unwrap().unwrap();
        let chatty = bot_status::get_bot_day(&pool, "chatty", &date).await.unwrap().unwrap();
        assert!(!quiet.online);
        assert!(chatty.online);

        assert_eq!(sweeper.sweep(now).await, 0);
    }

    #[tokio::test]
    async fn test_sweep_without_row_writes_nothing() {
        let pool = test_pool().await;
        let mut sweeper = sweeper(pool.clone());
        let start = Instant::now();
        let today = Calendar::utc().today();
        let date = format_date(today);
        sweeper.record(touch("B1", start));

        let now = start + Duration::from_secs(61);
        assert_eq!(sweeper.sweep(now).await, 0);
        assert!(bot_status::get_bot_day(&pool, "B1", &date).await.unwrap().is_none());
        assert_eq!(bot_status::increment_invites(&pool, "B1", &date).await.unwrap(), 0);

        // Settled for today, no further writes until touched
        assert!(sweeper.table.expired(now, TIMEOUT, today).is_empty());
    }

    #[tokio::test]
    async fn test_sweep_error_keeps_bots_eligible() {
        let pool = test_pool().await;
        let mut sweeper = sweeper(pool.clone());
        let start = Instant::now();
        sweeper.record(touch("1", start));
        sweeper.record(touch("2", start));

        sqlx::query("DROP TABLE robot_status").execute(&pool).await.unwrap();
        let now = start + Duration::from_secs(61);
        assert_eq!(sweeper.sweep(now).await, 0);

        // Both writes were attempted and both stay pending
        let today = Calendar::utc().today();
        assert_eq!(sweeper.table.expired(now, TIMEOUT, today).len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_continues_past_failed_write() {
        let pool = test_pool().await;
        let mut sweeper = sweeper(pool.clone());
        let start = Instant::now();
        let today = Calendar::utc().today();
        let date = format_date(today);
        sweeper.record(touch("a", start));
        sweeper.record(touch("b", start));
        bot_status::set_online(&pool, "b", &date, true).await.unwrap();

        // Reject writes for bot "a" only
        sqlx::query(
            "CREATE TRIGGER reject_a BEFORE UPDATE ON robot_status \
             WHEN old.self_id = 'a' BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO robot_status (self_id, date, online) VALUES ('a', ?, 1)")
            .bind(&date)
            .execute(&pool)
            .await
            .unwrap();

        let now = start + Duration::from_secs(61);
        assert_eq!(sweeper.sweep(now).await, 1);

        let b = bot_status::get_bot_day(&pool, "b", &date).await.unwrap().unwrap();
        assert!(!b.online);
        assert_eq!(
            sweeper.table.expired(now, TIMEOUT, today),
            vec![SubjectId::from("a")]
        );
    }

    #[tokio::test]
    async fn test_touch_on_full_channel_is_dropped() {
        let (handle, mut rx) = LivenessHandle::channel(1);
        handle.touch(&SubjectId::from("1"));
        handle.touch(&SubjectId::from("2"));

        assert_eq!(rx.recv().await.unwrap().self_id.as_str(), "1");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_task_stops_on_shutdown() {
        let pool = test_pool().await;
        let (handle, rx) = LivenessHandle::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = sweeper(pool).start(rx, shutdown_rx);
        handle.touch(&SubjectId::from("1"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
