//! Daily and lifetime aggregation
//!
//! Applies one decoded event to the aggregate tables. Every counter moves
//! through a single insert-or-increment statement, so concurrent events for
//! the same key never lose updates. For a message, the user rows are written
//! first as standalone statements and everything else commits together in
//! one transaction.


use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::sqlite::repositories::{
    BotSnapshot, MessageRecord, UserActivity, bot_status, command_stats, group_stats, messages,
    user_stats,
};
use crate::domain::events::{MessageEvent, MetaEvent, NoticeAction, NoticeEvent};
use crate::utils::time::{Calendar, format_date, previous_day};

/// Result of applying a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageOutcome {
    /// The message was its sender's first of the day
    pub first_of_day: bool,
}

#[derive(Clone)]
pub struct Aggregator {
    pool: SqlitePool,
    calendar: Calendar,
}

impl Aggregator {
    pub fn new(pool: SqlitePool, calendar: Calendar) -> Self {
        Self { pool, calendar }
    }

    /// Apply a chat message to user, command, group and bot aggregates
    pub async fn apply_message(&self, event: &MessageEvent) -> Result<MessageOutcome, SqliteError> {
        let day = self.calendar.date_of(event.time);
        let date = format_date(day);
        let previous = format_date(previous_day(day));

        let self_id = event.self_id.as_str();
        let user_id = event.user_id.as_str();
        let group_id = event.group_id.as_str();

        let activity = UserActivity {
            user_id,
            self_id,
            nickname: &event.sender.nickname,
            role: &event.sender.role,
            time: event.time,
            date: &date,
        };
        let first_of_day = user_stats::upsert_daily_user(&self.pool, &activity).await?;
        user_stats::upsert_user_totals(&self.pool, &activity, &previous).await?;

        let mut tx = self.pool.begin().await?;

        let record = MessageRecord {
            message_id: event.message_id.as_str(),
            message_type: &event.message_type,
            time: event.time,
            self_id,
            user_id,
            group_id,
            raw_message: &event.raw_message,
            date: &date,
        };
        messages::upsert_message(&mut *tx, &record).await?;

        let command = event.command_token();
        command_stats::upsert_command_totals(&mut *tx, command, self_id, event.time).await?;
        command_stats::upsert_daily_command(&mut *tx, command, self_id, &date, event.time).await?;

        if event.is_group() {
            group_stats::increment_daily_messages(&mut *tx, group_id, self_id, &date).await?;
            group_stats::upsert_group_totals(&mut *tx, group_id, self_id, event.time).await?;
        }

        if first_of_day {
            if event.is_group() {
                group_stats::increment_active_members(&mut *tx, group_id, self_id, &date).await?;
                group_stats::advance_group_streak(&mut *tx, group_id, &date, &previous).await?;
            }
            bot_status::record_active_user(&mut *tx, self_id, &date, event.time).await?;
            user_stats::clear_first_of_day(&mut *tx, user_id, &date).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            self_id,
            user_id,
            group_id,
            date = %date,
            first_of_day,
            "Message aggregated"
        );
        Ok(MessageOutcome { first_of_day })
    }

    /// Write a bot's self-reported status for today
    ///
    /// A status block replaces the snapshot fields. A lifecycle event without
    /// one only moves the online flag.
    pub async fn apply_meta(&self, event: &MetaEvent) -> Result<(), SqliteError> {
        let self_id = event.self_id.as_str();
        if self_id.is_empty() {
            tracing::debug!(meta_event_type = %event.meta_event_type, "Meta event without self_id");
            return Ok(());
        }
        let date = format_date(self.calendar.today());

        if let Some(status) = &event.status {
            let snapshot = BotSnapshot {
                online: status.online,
                message_received: status.stat.message_received,
                message_sent: status.stat.message_sent,
                last_message_time: status.stat.last_message_time,
            };
            bot_status::upsert_snapshot(&self.pool, self_id, &date, &snapshot).await?;
            tracing::trace!(self_id, online = snapshot.online, "Bot snapshot written");
        } else if let Some(online) = event.lifecycle_online() {
            bot_status::set_online(&self.pool, self_id, &date, online).await?;
            tracing::info!(self_id, online, sub_type = %event.sub_type, "Bot lifecycle");
        }
        Ok(())
    }

    /// Count an invite or a kick against today's bot row
    ///
    /// Returns whether a counter moved. A bot with no row for today, or a
    /// notice that means nothing for the counters, is not an error.
    pub async fn apply_notice(&self, event: &NoticeEvent) -> Result<bool, SqliteError> {
        let action = event.action();
        if action == NoticeAction::Ignored {
            return Ok(false);
        }

        let self_id = event.self_id.as_str();
        let date = format_date(self.calendar.today());
        let touched = match action {
            NoticeAction::Invited => bot_status::increment_invites(&self.pool, self_id, &date).await?,
            NoticeAction::Kicked => bot_status::increment_kicks(&self.pool, self_id, &date).await?,
            NoticeAction::Ignored => 0,
        };

        if touched == 0 {
            tracing::debug!(self_id, ?action, date = %date, "No bot row for notice");
        } else {
            tracing::info!(self_id, ?action, group_id = %event.group_id, "Bot membership changed");
        }
        Ok(touched > 0)
    }
}
