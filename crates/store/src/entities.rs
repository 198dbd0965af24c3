//! Plain data records produced by the storage gateway.
//!
//! Everything here is a value: relations a caller needs later are loaded
//! eagerly inside the work scope that produced them. Nothing holds a live
//! database session.

use chrono::{DateTime, Utc};

use crate::crypto::CipherUrl;

#[derive(Debug, Clone)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub public: bool,
    pub organizer_id: Option<String>,
    pub organization_id: Option<String>,
    /// Globally unique id of this event's orchestrator execution.
    pub workflow_id: String,
}

impl Event {
    /// Audience scope used by auto-subscription lookups. Private personal
    /// events have no enrollable audience and return `None`.
    pub fn scope(&self) -> Option<EventScope> {
        if let Some(org) = &self.organization_id {
            Some(EventScope::Organization(org.clone()))
        } else if self.public {
            Some(EventScope::PublicPersonal)
        } else {
            None
        }
    }
}

/// Which channels an event's `autosub:` tag lookup may reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventScope {
    /// Personal channels of any subscriber.
    PublicPersonal,
    /// Channels owned by the organization itself or by any of its members.
    Organization(String),
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Subscriber {
    pub id: String,
    pub email: String,
    pub verified: bool,
}

/// A single named delivery endpoint. The delivery URL is sensitive: it is
/// carried encrypted and only decrypted for channels that will actually be
/// delivered to.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: String,
    pub subscriber_id: Option<String>,
    pub organization_id: Option<String>,
    pub name: String,
    pub url: CipherUrl,
    pub tag: Option<String>,
    pub active: bool,
}

/// Channel tags carrying this prefix enroll their owner into events tagged
/// with the matching unprefixed tag.
pub const AUTOSUB_PREFIX: &str = "autosub:";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Subscription {
    pub id: String,
    pub event_id: String,
    pub subscriber_id: String,
    pub auto_subscribed: bool,
}

/// Exactly one of `channel_id` / `tag` is set.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoutingSelector {
    pub id: String,
    pub subscription_id: String,
    pub channel_id: Option<String>,
    pub tag: Option<String>,
}

/// A subscription with everything its consumers need, eagerly loaded.
#[derive(Debug, Clone)]
pub struct SubscriptionBundle {
    pub subscription: Subscription,
    pub subscriber: Subscriber,
    pub selectors: Vec<RoutingSelector>,
    pub reminder_offsets: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct UnsubscribeToken {
    pub token: String,
    pub subscription_id: String,
    pub used: bool,
    pub expires_at: DateTime<Utc>,
}

impl UnsubscribeToken {
    pub fn usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && now < self.expires_at
    }
}

/// Input to `create_subscription`. Selector and offset lists may be empty.
#[derive(Debug, Clone, Default)]
pub struct NewSubscription {
    pub selectors: Vec<NewSelector>,
    pub reminder_offsets: Vec<i64>,
    pub auto_subscribed: bool,
}

#[derive(Debug, Clone)]
pub enum NewSelector {
    Channel(String),
    Tag(String),
}

/// A row in the one-shot schedules table.
#[derive(Debug, Clone)]
pub struct ScheduleRow {
    pub id: String,
    pub event_id: String,
    pub subscription_id: String,
    pub offset_seconds: i64,
    pub fire_at: DateTime<Utc>,
}
