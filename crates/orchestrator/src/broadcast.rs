//! Broadcast activity: notify every subscription of an event.

use eventcast_delivery::{resolve_channels, Severity};
use eventcast_store::{Channel, ChannelFilter, SubscriptionBundle, WorkScope};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityError;
use crate::context::AppContext;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastInput {
    pub event_id: String,
    pub title: String,
    pub body: String,
    pub severity: Severity,
    /// Restrict the broadcast to these subscriptions of the event.
    #[serde(default)]
    pub subscription_ids: Option<Vec<String>>,
    /// Restrict each subscription's selectors to these tags.
    #[serde(default)]
    pub selector_tag_filter: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// At least one endpoint accepted the notification.
    Delivered,
    /// Nothing resolved, nothing attempted; not retried.
    Pending,
    /// Endpoints existed but every delivery failed.
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDelivery {
    pub subscription_id: String,
    pub status: SubscriptionStatus,
    pub endpoints: usize,
    pub failed_endpoints: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BroadcastOutcome {
    pub total: usize,
    pub delivered: usize,
    pub pending: usize,
    pub failed: usize,
    pub per_subscription: Vec<SubscriptionDelivery>,
}

impl BroadcastOutcome {
    fn record(&mut self, delivery: SubscriptionDelivery) {
        self.total += 1;
        match delivery.status {
            SubscriptionStatus::Delivered => self.delivered += 1,
            SubscriptionStatus::Pending => self.pending += 1,
            SubscriptionStatus::Failed => self.failed += 1,
        }
        self.per_subscription.push(delivery);
    }
}

/// The subscriber's active channels, plus any active channels referenced by
/// explicit selectors that the subscriber doesn't own (organization feeds).
pub(crate) async fn load_channels(
    scope: &mut WorkScope<'_>,
    bundle: &SubscriptionBundle,
) -> Result<Vec<Channel>, ActivityError> {
    let mut channels = scope
        .channels_for_subscriber(&bundle.subscriber.id, true, &ChannelFilter::default())
        .await?;

    let explicit: Vec<String> = bundle
        .selectors
        .iter()
        .filter_map(|selector| selector.channel_id.clone())
        .filter(|id| channels.iter().all(|c| &c.id != id))
        .collect();
    for channel in scope.channels_by_ids(&explicit).await? {
        channels.push(channel);
    }
    Ok(channels)
}

/// Notify the event's subscriptions (or the requested subset). One work
/// scope loads everything eagerly; resolution and dispatch happen after it
/// is committed, so no transaction is held across network I/O.
pub async fn broadcast(
    ctx: &AppContext,
    input: &BroadcastInput,
) -> Result<BroadcastOutcome, ActivityError> {
    let mut scope = ctx.store.scope().await.map_err(ActivityError::from)?;

    let bundles = match &input.subscription_ids {
        Some(ids) => {
            let mut bundles = Vec::with_capacity(ids.len());
            for id in ids {
                match scope.subscription_by_id(id).await? {
                    Some(bundle) if bundle.subscription.event_id == input.event_id => {
                        bundles.push(bundle)
                    }
                    Some(_) => {
                        tracing::warn!(
                            subscription_id = %id,
                            event_id = %input.event_id,
                            "subscription belongs to a different event, skipped"
                        );
                    }
                    None => {
                        tracing::warn!(subscription_id = %id, "subscription gone, skipped");
                    }
                }
            }
            bundles
        }
        None => scope.subscribers_for_event(&input.event_id).await?,
    };

    let mut loaded = Vec::with_capacity(bundles.len());
    for bundle in bundles {
        let channels = load_channels(&mut scope, &bundle).await?;
        loaded.push((bundle, channels));
    }
    scope.commit().await.map_err(ActivityError::from)?;

    let mut outcome = BroadcastOutcome::default();
    for (bundle, channels) in &loaded {
        let delivery = notify_subscription(ctx, input, bundle, channels).await;
        outcome.record(delivery);
    }

    tracing::info!(
        event_id = %input.event_id,
        severity = %input.severity,
        total = outcome.total,
        delivered = outcome.delivered,
        pending = outcome.pending,
        failed = outcome.failed,
        "broadcast complete"
    );
    Ok(outcome)
}

async fn notify_subscription(
    ctx: &AppContext,
    input: &BroadcastInput,
    bundle: &SubscriptionBundle,
    channels: &[Channel],
) -> SubscriptionDelivery {
    let subscription_id = bundle.subscription.id.clone();

    let resolution = match resolve_channels(
        bundle,
        channels,
        ctx.store.cipher(),
        ctx.smtp_fallback.as_ref(),
        input.selector_tag_filter.as_deref(),
    ) {
        Ok(resolution) => resolution,
        Err(err) => {
            tracing::error!(subscription_id = %subscription_id, err = %err, "channel resolution failed");
            return SubscriptionDelivery {
                subscription_id,
                status: SubscriptionStatus::Failed,
                endpoints: 0,
                failed_endpoints: 0,
            };
        }
    };

    if resolution.pending {
        return SubscriptionDelivery {
            subscription_id,
            status: SubscriptionStatus::Pending,
            endpoints: 0,
            failed_endpoints: 0,
        };
    }

    let report = ctx
        .deliver
        .dispatch(&resolution.endpoints, &input.title, &input.body, input.severity)
        .await;

    // Partial endpoint failure still counts as delivered for the
    // subscription; the at-least-once guarantee is per subscription.
    let status = if report.success > 0 {
        SubscriptionStatus::Delivered
    } else {
        SubscriptionStatus::Failed
    };

    SubscriptionDelivery {
        subscription_id,
        status,
        endpoints: report.total,
        failed_endpoints: report.failed,
    }
}
