//! What the request edge calls.
//!
//! Every helper here obeys the ordering contract: database writes are
//! committed before the orchestrator is signaled, because activities re-read
//! state in a fresh work scope. An edge that signals before its own commit
//! has a bug this core neither detects nor compensates for.

use chrono::{DateTime, Utc};
use eventcast_store::{Event, NewSelector, NewSubscription, AUTOSUB_PREFIX};
use ulid::Ulid;

use crate::context::AppContext;
use crate::error::OrchestratorError;
use crate::runtime::Runtime;
use crate::signal::{EventPatch, ManualNotification, Signal};

/// Fields of an event-creation request.
#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub public: bool,
    pub organizer_id: Option<String>,
    pub organization_id: Option<String>,
    /// Auto-subscription tags; matched against `autosub:{tag}` channels.
    pub tags: Vec<String>,
}

/// Insert the event row, commit, then enroll tagged channels and launch the
/// orchestrator.
pub async fn create_event(
    runtime: &Runtime,
    draft: EventDraft,
) -> Result<Event, OrchestratorError> {
    let id = Ulid::new().to_string();
    let event = Event {
        workflow_id: format!("event-orchestrator-{id}"),
        id,
        name: draft.name,
        start_date: draft.start_date,
        end_date: draft.end_date,
        description: draft.description,
        location: draft.location,
        public: draft.public,
        organizer_id: draft.organizer_id,
        organization_id: draft.organization_id,
    };

    let ctx = runtime.context();
    let mut scope = ctx.store.scope().await?;
    scope.insert_event(&event).await?;
    scope.commit().await?;

    start_event_orchestrator(runtime, &event.id, &draft.tags).await?;
    Ok(event)
}

/// Launch the orchestrator for an already-committed event row, running
/// tag-based auto-subscription first so the initial schedule pass sees the
/// enrolled subscriptions.
pub async fn start_event_orchestrator(
    runtime: &Runtime,
    event_id: &str,
    tags: &[String],
) -> Result<bool, OrchestratorError> {
    let ctx = runtime.context();
    let event = ctx
        .store
        .event_by_id(event_id)
        .await?
        .ok_or_else(|| OrchestratorError::EventNotFound(event_id.to_string()))?;

    let enrolled = auto_subscribe(ctx, &event, tags).await?;
    if enrolled > 0 {
        tracing::info!(event_id, enrolled, "subscribers auto-enrolled by tag");
    }

    runtime.start_workflow(event_id).await
}

/// Enroll owners of `autosub:{tag}` channels within the event's audience
/// scope. Existing subscriptions are left untouched.
async fn auto_subscribe(
    ctx: &AppContext,
    event: &Event,
    tags: &[String],
) -> Result<usize, OrchestratorError> {
    if tags.is_empty() {
        return Ok(0);
    }
    let Some(scope_kind) = event.scope() else {
        tracing::debug!(event_id = %event.id, "private personal event, no auto-subscription");
        return Ok(0);
    };

    let mut enrolled = 0;
    let mut scope = ctx.store.scope().await?;
    for tag in tags {
        let autosub_tag = format!("{AUTOSUB_PREFIX}{}", tag.to_lowercase());
        let channels = scope.channels_for_event_scope(&autosub_tag, &scope_kind).await?;

        for channel in channels {
            if let Some(owner) = channel.subscriber_id.clone() {
                scope
                    .create_subscription(
                        &event.id,
                        &owner,
                        enrollment(&channel.id, &ctx.default_reminder_offsets),
                    )
                    .await?;
                enrolled += 1;
            } else if let Some(org_id) = channel.organization_id.clone() {
                for member in scope.organization_members(&org_id).await? {
                    scope
                        .create_subscription(
                            &event.id,
                            &member.id,
                            enrollment(&channel.id, &ctx.default_reminder_offsets),
                        )
                        .await?;
                    enrolled += 1;
                }
            }
        }
    }
    scope.commit().await?;
    Ok(enrolled)
}

fn enrollment(channel_id: &str, offsets: &[i64]) -> NewSubscription {
    NewSubscription {
        selectors: vec![NewSelector::Channel(channel_id.to_string())],
        reminder_offsets: offsets.to_vec(),
        auto_subscribed: true,
    }
}

/// Result of adding a participant: the subscription and its single-use
/// unsubscribe token.
#[derive(Debug, Clone)]
pub struct ParticipantAdded {
    pub subscription_id: String,
    pub unsubscribe_token: String,
}

pub async fn add_participant(
    runtime: &Runtime,
    event_id: &str,
    subscriber_id: &str,
    selectors: Vec<NewSelector>,
    reminder_offsets: Vec<i64>,
) -> Result<ParticipantAdded, OrchestratorError> {
    let ctx = runtime.context();
    let event = ctx
        .store
        .event_by_id(event_id)
        .await?
        .ok_or_else(|| OrchestratorError::EventNotFound(event_id.to_string()))?;

    let mut scope = ctx.store.scope().await?;
    let subscription_id = scope
        .create_subscription(
            event_id,
            subscriber_id,
            NewSubscription {
                selectors,
                reminder_offsets,
                auto_subscribed: false,
            },
        )
        .await?;
    let token = scope.create_unsubscribe_token(&subscription_id).await?;
    scope.commit().await?;

    runtime
        .send_signal(
            &event.workflow_id,
            Signal::ParticipantAdded {
                subscription_id: subscription_id.clone(),
            },
        )
        .await?;

    Ok(ParticipantAdded {
        subscription_id,
        unsubscribe_token: token.token,
    })
}

pub async fn remove_participant(
    runtime: &Runtime,
    subscription_id: &str,
) -> Result<bool, OrchestratorError> {
    let ctx = runtime.context();
    let Some(bundle) = ctx.store.subscription_by_id(subscription_id).await? else {
        return Ok(false);
    };
    let event = ctx
        .store
        .event_by_id(&bundle.subscription.event_id)
        .await?
        .ok_or_else(|| OrchestratorError::EventNotFound(bundle.subscription.event_id.clone()))?;

    let mut scope = ctx.store.scope().await?;
    scope.delete_subscription(subscription_id).await?;
    scope.commit().await?;

    signal_or_log(
        runtime,
        &event.workflow_id,
        Signal::ParticipantRemoved {
            subscription_id: subscription_id.to_string(),
        },
    )
    .await;
    Ok(true)
}

/// Apply a partial update to the event row, commit, then notify the
/// orchestrator.
pub async fn update_event(
    runtime: &Runtime,
    event_id: &str,
    patch: EventPatch,
) -> Result<(), OrchestratorError> {
    let ctx = runtime.context();
    let event = ctx
        .store
        .event_by_id(event_id)
        .await?
        .ok_or_else(|| OrchestratorError::EventNotFound(event_id.to_string()))?;

    let mut scope = ctx.store.scope().await?;
    scope
        .update_event_fields(
            event_id,
            patch.name.as_deref(),
            patch.description.as_deref(),
            patch.location.as_deref(),
            patch.start_date,
            patch.end_date,
        )
        .await?;
    scope.commit().await?;

    runtime
        .send_signal(&event.workflow_id, Signal::EventUpdated(patch))
        .await
}

pub async fn cancel_event(runtime: &Runtime, event_id: &str) -> Result<(), OrchestratorError> {
    let workflow_id = workflow_id_for(runtime, event_id).await?;
    runtime.send_signal(&workflow_id, Signal::CancelEvent).await
}

pub async fn notify_manual(
    runtime: &Runtime,
    event_id: &str,
    notification: ManualNotification,
) -> Result<(), OrchestratorError> {
    let workflow_id = workflow_id_for(runtime, event_id).await?;
    runtime
        .send_signal(&workflow_id, Signal::ManualNotification(notification))
        .await
}

/// Consume an unsubscribe token: mark it used, delete the subscription,
/// commit, then signal the orchestrator. Returns the removed subscription
/// id.
pub async fn unsubscribe_with_token(
    runtime: &Runtime,
    token_value: &str,
) -> Result<String, OrchestratorError> {
    let ctx = runtime.context();

    let mut scope = ctx.store.scope().await?;
    let Some(token) = scope.unsubscribe_token_by_value(token_value).await? else {
        return Err(OrchestratorError::TokenInvalid);
    };
    if !token.usable_at(Utc::now()) {
        return Err(OrchestratorError::TokenInvalid);
    }
    let Some(bundle) = scope.subscription_by_id(&token.subscription_id).await? else {
        return Err(OrchestratorError::TokenInvalid);
    };
    let event = scope
        .event_by_id(&bundle.subscription.event_id)
        .await?
        .ok_or_else(|| OrchestratorError::EventNotFound(bundle.subscription.event_id.clone()))?;

    scope.mark_token_used(token_value).await?;
    scope.delete_subscription(&token.subscription_id).await?;
    scope.commit().await?;

    signal_or_log(
        runtime,
        &event.workflow_id,
        Signal::ParticipantRemoved {
            subscription_id: token.subscription_id.clone(),
        },
    )
    .await;
    Ok(token.subscription_id)
}

async fn workflow_id_for(runtime: &Runtime, event_id: &str) -> Result<String, OrchestratorError> {
    runtime
        .context()
        .store
        .event_by_id(event_id)
        .await?
        .map(|event| event.workflow_id)
        .ok_or_else(|| OrchestratorError::EventNotFound(event_id.to_string()))
}

/// For removals the row change is the durable part; a completed orchestrator
/// has already cleaned its schedules, so a missing workflow is only logged.
async fn signal_or_log(runtime: &Runtime, workflow_id: &str, signal: Signal) {
    if let Err(err) = runtime.send_signal(workflow_id, signal).await {
        tracing::warn!(workflow_id, err = %err, "signal skipped, orchestrator not live");
    }
}
