//! The per-event orchestrator: one long-lived task per event, driven by a
//! serialized signal mailbox.
//!
//! The loop itself performs no I/O and reads no wall clock beyond timer
//! arming; every side effect runs through an activity with its own retry
//! policy. Activity failures after retry exhaustion are logged and the
//! orchestrator proceeds.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use eventcast_delivery::Severity;
use eventcast_store::{Event, StoreGateway};
use tokio::sync::mpsc;

use crate::activity::{
    run_activity, ActivityError, DELIVERY_POLICY, SCHEDULE_POLICY, VALIDATION_POLICY,
};
use crate::broadcast::{broadcast, BroadcastInput};
use crate::context::AppContext;
use crate::schedule::ScheduleRegistry;
use crate::signal::{EventPatch, ManualNotification, Signal};

/// Wake at least daily while idle so the completion deadline is re-checked
/// without arming a multi-year timer.
const MAX_IDLE_SLEEP: StdDuration = StdDuration::from_secs(24 * 60 * 60);

/// When an event without an end date is considered over.
pub(crate) fn completion_deadline(event: &Event, grace: chrono::Duration) -> DateTime<Utc> {
    event.end_date.unwrap_or(event.start_date + grace)
}

/// Why the signal loop ended.
enum Exit {
    /// Completed or cancelled: clean up schedules.
    Terminate,
    /// Mailbox closed by runtime shutdown: leave schedules for resume.
    Detached,
}

pub(crate) async fn run_orchestrator(
    ctx: Arc<AppContext>,
    event_id: String,
    workflow_id: String,
    mut signals: mpsc::Receiver<Signal>,
) {
    let ctx = ctx.as_ref();
    let registry = ScheduleRegistry::new(ctx.store.clone());
    let registry = &registry;
    let event_id = event_id.as_str();
    let workflow_id = workflow_id.as_str();
    let store = &ctx.store;

    // Initial phase: the event must exist before any schedules are created.
    let event = run_activity("validate-event", VALIDATION_POLICY, || {
        load_event(store, event_id)
    })
    .await;
    let event = match event {
        Ok(Some(event)) => event,
        Ok(None) => {
            tracing::warn!(workflow_id, event_id, "event missing at start, terminating");
            return;
        }
        Err(err) => {
            tracing::error!(workflow_id, event_id, err = %err, "event validation failed, terminating");
            return;
        }
    };

    let start = event.start_date;
    let created = run_activity("create-event-schedules", SCHEDULE_POLICY, || {
        create_all_schedules(registry, event_id, start)
    })
    .await;
    if let Err(err) = created {
        tracing::error!(workflow_id, err = %err, "initial schedule creation failed");
    }

    let mut last_start_date = event.start_date;
    let mut event_name = event.name.clone();
    let mut deadline = completion_deadline(&event, ctx.completion_grace);

    tracing::info!(
        workflow_id,
        event_id,
        start_date = %last_start_date,
        "orchestrator running"
    );

    let exit = loop {
        let now = Utc::now();
        if now >= deadline {
            tracing::info!(workflow_id, "event is over, completing");
            break Exit::Terminate;
        }
        let until_deadline = (deadline - now)
            .to_std()
            .unwrap_or(StdDuration::ZERO)
            .min(MAX_IDLE_SLEEP);

        tokio::select! {
            received = signals.recv() => match received {
                None => break Exit::Detached,
                Some(Signal::ParticipantAdded { subscription_id }) => {
                    participant_added(ctx, registry, event_id, &subscription_id, last_start_date)
                        .await;
                }
                Some(Signal::ParticipantRemoved { subscription_id }) => {
                    participant_removed(registry, event_id, &subscription_id).await;
                }
                Some(Signal::EventUpdated(patch)) => {
                    match event_updated(ctx, registry, event_id, &patch, last_start_date).await {
                        Some(fresh) => {
                            last_start_date = fresh.start_date;
                            event_name = fresh.name.clone();
                            deadline = completion_deadline(&fresh, ctx.completion_grace);
                        }
                        // Event row gone: nothing left to orchestrate.
                        None => break Exit::Terminate,
                    }
                }
                Some(Signal::CancelEvent) => {
                    cancelled(ctx, event_id, &event_name).await;
                    break Exit::Terminate;
                }
                Some(Signal::ManualNotification(notification)) => {
                    manual_notification(ctx, event_id, notification).await;
                }
            },
            _ = tokio::time::sleep(until_deadline) => {
                // Deadline re-checked at the top of the loop.
            }
        }
    };

    match exit {
        Exit::Terminate => {
            // Completion guarantees schedule cleanup.
            let cleaned = run_activity("delete-event-schedules", SCHEDULE_POLICY, || {
                delete_all_schedules(registry, event_id)
            })
            .await;
            if let Err(err) = cleaned {
                tracing::error!(workflow_id, err = %err, "schedule cleanup failed on completion");
            }
            tracing::info!(workflow_id, event_id, "orchestrator terminated");
        }
        Exit::Detached => {
            tracing::info!(workflow_id, event_id, "orchestrator detached, schedules kept");
        }
    }
}

async fn load_event(store: &StoreGateway, event_id: &str) -> Result<Option<Event>, ActivityError> {
    store.event_by_id(event_id).await.map_err(Into::into)
}

async fn create_all_schedules(
    registry: &ScheduleRegistry,
    event_id: &str,
    start_date: DateTime<Utc>,
) -> Result<usize, ActivityError> {
    registry
        .create_event_schedules(event_id, start_date)
        .await
        .map_err(Into::into)
}

async fn delete_all_schedules(
    registry: &ScheduleRegistry,
    event_id: &str,
) -> Result<u64, ActivityError> {
    registry.delete_event_schedules(event_id).await.map_err(Into::into)
}

async fn add_subscription_schedules(
    ctx: &AppContext,
    registry: &ScheduleRegistry,
    event_id: &str,
    subscription_id: &str,
    start_date: DateTime<Utc>,
) -> Result<usize, ActivityError> {
    match ctx.store.subscription_by_id(subscription_id).await? {
        Some(bundle) => registry
            .create_subscription_schedules(
                event_id,
                start_date,
                &bundle.subscription.id,
                &bundle.reminder_offsets,
            )
            .await
            .map_err(Into::into),
        None => {
            // The subscription was removed before we got here; the matching
            // removal signal is behind us in the mailbox.
            tracing::warn!(event_id, subscription_id, "added subscription already gone");
            Ok(0)
        }
    }
}

async fn drop_subscription_schedules(
    registry: &ScheduleRegistry,
    event_id: &str,
    subscription_id: &str,
) -> Result<u64, ActivityError> {
    registry
        .delete_subscription_schedules(event_id, subscription_id)
        .await
        .map_err(Into::into)
}

async fn participant_added(
    ctx: &AppContext,
    registry: &ScheduleRegistry,
    event_id: &str,
    subscription_id: &str,
    start_date: DateTime<Utc>,
) {
    let result = run_activity("participant-added", SCHEDULE_POLICY, || {
        add_subscription_schedules(ctx, registry, event_id, subscription_id, start_date)
    })
    .await;
    if let Err(err) = result {
        tracing::error!(event_id, subscription_id, err = %err, "participant_added handling failed");
    }
}

async fn participant_removed(registry: &ScheduleRegistry, event_id: &str, subscription_id: &str) {
    let result = run_activity("participant-removed", SCHEDULE_POLICY, || {
        drop_subscription_schedules(registry, event_id, subscription_id)
    })
    .await;
    if let Err(err) = result {
        tracing::error!(event_id, subscription_id, err = %err, "participant_removed handling failed");
    }
}

async fn retarget_schedules(
    registry: &ScheduleRegistry,
    event_id: &str,
    start_date: DateTime<Utc>,
) -> Result<usize, ActivityError> {
    registry.delete_event_schedules(event_id).await?;
    registry
        .create_event_schedules(event_id, start_date)
        .await
        .map_err(Into::into)
}

/// Handle `event_updated`: broadcast the change, then re-target schedules if
/// the start moved. Returns the freshly-read event, or `None` if the row is
/// gone.
async fn event_updated(
    ctx: &AppContext,
    registry: &ScheduleRegistry,
    event_id: &str,
    patch: &EventPatch,
    last_start_date: DateTime<Utc>,
) -> Option<Event> {
    // The edge committed before signaling, so a fresh read sees the update.
    let store = &ctx.store;
    let fresh = run_activity("reload-event", VALIDATION_POLICY, || {
        load_event(store, event_id)
    })
    .await;
    let fresh = match fresh {
        Ok(Some(event)) => event,
        Ok(None) => {
            tracing::warn!(event_id, "event gone on update, terminating");
            return None;
        }
        Err(err) => {
            tracing::error!(event_id, err = %err, "event reload failed, update dropped");
            return None;
        }
    };

    let mut body = format!("{} starts at {}", fresh.name, fresh.start_date.to_rfc3339());
    if patch.location.is_some() {
        if let Some(location) = &fresh.location {
            body.push_str("\nNew location: ");
            body.push_str(location);
        }
    }

    deliver_broadcast(
        ctx,
        BroadcastInput {
            event_id: event_id.to_string(),
            title: format!("{} was updated", fresh.name),
            body,
            severity: Severity::Info,
            subscription_ids: None,
            selector_tag_filter: None,
        },
    )
    .await;

    if fresh.start_date != last_start_date {
        let start = fresh.start_date;
        let retargeted = run_activity("retarget-schedules", SCHEDULE_POLICY, || {
            retarget_schedules(registry, event_id, start)
        })
        .await;
        match retargeted {
            Ok(created) => tracing::info!(
                event_id,
                start_date = %fresh.start_date,
                created,
                "schedules re-targeted"
            ),
            Err(err) => {
                tracing::error!(event_id, err = %err, "schedule re-targeting failed")
            }
        }
    }

    Some(fresh)
}

async fn cancelled(ctx: &AppContext, event_id: &str, event_name: &str) {
    deliver_broadcast(
        ctx,
        BroadcastInput {
            event_id: event_id.to_string(),
            title: format!("{event_name} was cancelled"),
            body: "The event has been cancelled.".to_string(),
            severity: Severity::Critical,
            subscription_ids: None,
            selector_tag_filter: None,
        },
    )
    .await;
}

async fn manual_notification(ctx: &AppContext, event_id: &str, notification: ManualNotification) {
    deliver_broadcast(
        ctx,
        BroadcastInput {
            event_id: event_id.to_string(),
            title: notification.title,
            body: notification.body,
            severity: notification.severity,
            subscription_ids: notification.subscription_ids,
            selector_tag_filter: notification.tag_filter,
        },
    )
    .await;
}

async fn deliver_broadcast(ctx: &AppContext, input: BroadcastInput) {
    let input_ref = &input;
    let result = run_activity("broadcast", DELIVERY_POLICY, || broadcast(ctx, input_ref)).await;
    if let Err(err) = result {
        tracing::error!(event_id = %input.event_id, err = %err, "broadcast failed after retries");
    }
}
