//! Personal-reminder activity and the reminder task entry point fired by
//! the schedule worker.

use eventcast_delivery::{resolve_channels, Severity};

use crate::activity::{run_activity, ActivityError, DELIVERY_POLICY};
use crate::broadcast::{
    load_channels, BroadcastOutcome, SubscriptionDelivery, SubscriptionStatus,
};
use crate::context::AppContext;

/// Largest-whole-unit rendering of a reminder offset: `1 day`, `2 hours`,
/// `15 minutes`, `45 seconds`.
pub fn humanize_offset(seconds: i64) -> String {
    const UNITS: [(i64, &str); 4] = [
        (86_400, "day"),
        (3_600, "hour"),
        (60, "minute"),
        (1, "second"),
    ];
    for (size, unit) in UNITS {
        if seconds >= size {
            let count = seconds / size;
            let plural = if count == 1 { "" } else { "s" };
            return format!("{count} {unit}{plural}");
        }
    }
    "0 seconds".to_string()
}

/// Deliver one reminder for a single subscription at a given offset before
/// start. A subscription (or event) that has vanished since scheduling is a
/// successful no-op.
pub async fn personal_reminder(
    ctx: &AppContext,
    event_id: &str,
    subscription_id: &str,
    offset_seconds: i64,
) -> Result<BroadcastOutcome, ActivityError> {
    let mut scope = ctx.store.scope().await.map_err(ActivityError::from)?;

    let Some(event) = scope.event_by_id(event_id).await? else {
        scope.commit().await.map_err(ActivityError::from)?;
        tracing::warn!(event_id, subscription_id, "event gone, reminder skipped");
        return Ok(BroadcastOutcome::default());
    };
    let Some(bundle) = scope.subscription_by_id(subscription_id).await? else {
        scope.commit().await.map_err(ActivityError::from)?;
        tracing::info!(event_id, subscription_id, "subscription gone, reminder skipped");
        return Ok(BroadcastOutcome::default());
    };
    let channels = load_channels(&mut scope, &bundle).await?;
    scope.commit().await.map_err(ActivityError::from)?;

    let mut body = format!("{} starts in {}", event.name, humanize_offset(offset_seconds));
    if let Some(location) = &event.location {
        body.push_str("\nLocation: ");
        body.push_str(location);
    }

    let resolution = resolve_channels(
        &bundle,
        &channels,
        ctx.store.cipher(),
        ctx.smtp_fallback.as_ref(),
        None,
    )?;

    let mut outcome = BroadcastOutcome {
        total: 1,
        ..Default::default()
    };

    if resolution.pending {
        outcome.pending = 1;
        outcome.per_subscription.push(SubscriptionDelivery {
            subscription_id: subscription_id.to_string(),
            status: SubscriptionStatus::Pending,
            endpoints: 0,
            failed_endpoints: 0,
        });
        return Ok(outcome);
    }

    let report = ctx
        .deliver
        .dispatch(&resolution.endpoints, &event.name, &body, Severity::Info)
        .await;

    let status = if report.success > 0 {
        outcome.delivered = 1;
        SubscriptionStatus::Delivered
    } else {
        outcome.failed = 1;
        SubscriptionStatus::Failed
    };
    outcome.per_subscription.push(SubscriptionDelivery {
        subscription_id: subscription_id.to_string(),
        status,
        endpoints: report.total,
        failed_endpoints: report.failed,
    });
    Ok(outcome)
}

/// Entry point for a schedule firing: run the personal-reminder activity
/// under the delivery retry policy and complete.
pub async fn run_reminder_task(
    ctx: &AppContext,
    event_id: &str,
    subscription_id: &str,
    offset_seconds: i64,
) -> Result<BroadcastOutcome, ActivityError> {
    run_activity("personal-reminder", DELIVERY_POLICY, || {
        personal_reminder(ctx, event_id, subscription_id, offset_seconds)
    })
    .await
}
