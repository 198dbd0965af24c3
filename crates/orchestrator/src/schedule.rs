//! Reminder schedule registry.
//!
//! A thin facade over the one-shot schedules table. Schedules are keyed by
//! the canonical id `event-{event}-sub-{subscription}-reminder-{offset}s`,
//! which makes per-subscription and per-event prefix deletes possible.
//! Creating an id that already exists and deleting one that doesn't are
//! both successes.

use chrono::{DateTime, Duration, Utc};
use eventcast_store::{ScheduleRow, StoreGateway};

use crate::error::OrchestratorError;

pub fn schedule_id(event_id: &str, subscription_id: &str, offset_seconds: i64) -> String {
    format!("event-{event_id}-sub-{subscription_id}-reminder-{offset_seconds}s")
}

/// Prefix matching every schedule of an event.
pub fn event_prefix(event_id: &str) -> String {
    format!("event-{event_id}-")
}

/// Prefix matching every schedule of one subscription.
pub fn subscription_prefix(event_id: &str, subscription_id: &str) -> String {
    format!("event-{event_id}-sub-{subscription_id}-reminder-")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScheduleId {
    pub event_id: String,
    pub subscription_id: String,
    pub offset_seconds: i64,
}

/// Parse a canonical schedule id back into its parts.
pub fn parse_schedule_id(id: &str) -> Option<ParsedScheduleId> {
    let rest = id.strip_prefix("event-")?;
    let (event_id, rest) = rest.split_once("-sub-")?;
    let (subscription_id, offset) = rest.split_once("-reminder-")?;
    let offset_seconds: i64 = offset.strip_suffix('s')?.parse().ok()?;
    if event_id.is_empty() || subscription_id.is_empty() || offset_seconds < 0 {
        return None;
    }
    Some(ParsedScheduleId {
        event_id: event_id.to_string(),
        subscription_id: subscription_id.to_string(),
        offset_seconds,
    })
}

#[derive(Clone)]
pub struct ScheduleRegistry {
    store: StoreGateway,
}

impl ScheduleRegistry {
    pub fn new(store: StoreGateway) -> Self {
        Self { store }
    }

    /// Create one schedule per offset whose firing instant `start − offset`
    /// is still in the future. Past instants are silently skipped; existing
    /// ids are left alone. Returns how many rows were inserted.
    pub async fn create_subscription_schedules(
        &self,
        event_id: &str,
        start_date: DateTime<Utc>,
        subscription_id: &str,
        offsets: &[i64],
    ) -> Result<usize, OrchestratorError> {
        let now = Utc::now();
        let mut created = 0;
        let mut scope = self.store.scope().await?;
        for &offset in offsets {
            if offset < 0 {
                tracing::warn!(event_id, subscription_id, offset, "negative offset skipped");
                continue;
            }
            let fire_at = start_date - Duration::seconds(offset);
            if fire_at <= now {
                tracing::debug!(event_id, subscription_id, offset, "past reminder skipped");
                continue;
            }
            let row = ScheduleRow {
                id: schedule_id(event_id, subscription_id, offset),
                event_id: event_id.to_string(),
                subscription_id: subscription_id.to_string(),
                offset_seconds: offset,
                fire_at,
            };
            if scope.insert_schedule(&row).await? {
                created += 1;
            }
        }
        scope.commit().await?;
        if created > 0 {
            tracing::info!(event_id, subscription_id, created, "reminder schedules created");
        }
        Ok(created)
    }

    /// Create schedules for every subscription of an event, per its own
    /// reminder preferences.
    pub async fn create_event_schedules(
        &self,
        event_id: &str,
        start_date: DateTime<Utc>,
    ) -> Result<usize, OrchestratorError> {
        let bundles = self.store.subscribers_for_event(event_id).await?;
        let mut created = 0;
        for bundle in &bundles {
            created += self
                .create_subscription_schedules(
                    event_id,
                    start_date,
                    &bundle.subscription.id,
                    &bundle.reminder_offsets,
                )
                .await?;
        }
        Ok(created)
    }

    pub async fn delete_subscription_schedules(
        &self,
        event_id: &str,
        subscription_id: &str,
    ) -> Result<u64, OrchestratorError> {
        let mut scope = self.store.scope().await?;
        let removed = scope
            .delete_schedules_by_prefix(&subscription_prefix(event_id, subscription_id))
            .await?;
        scope.commit().await?;
        Ok(removed)
    }

    pub async fn delete_event_schedules(&self, event_id: &str) -> Result<u64, OrchestratorError> {
        let mut scope = self.store.scope().await?;
        let removed = scope
            .delete_schedules_by_prefix(&event_prefix(event_id))
            .await?;
        scope.commit().await?;
        if removed > 0 {
            tracing::info!(event_id, removed, "event schedules deleted");
        }
        Ok(removed)
    }

    pub async fn schedule_exists(&self, id: &str) -> Result<bool, OrchestratorError> {
        let mut scope = self.store.scope().await?;
        let exists = scope.schedule_exists(id).await?;
        scope.commit().await?;
        Ok(exists)
    }
}
