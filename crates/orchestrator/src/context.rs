//! Explicit application context threaded through constructors.
//!
//! One value built at startup holds everything the activities and the
//! orchestrator need; tests construct an isolated context with a recording
//! deliverer. There is no process-wide mutable state.

use std::sync::Arc;

use chrono::Duration;
use eventcast_delivery::{Deliver, SmtpFallback};
use eventcast_store::StoreGateway;

/// Default reminder offsets applied to auto-subscriptions: one day and one
/// hour before start.
pub const DEFAULT_REMINDER_OFFSETS: [i64; 2] = [86_400, 3_600];

/// How long after `start_date` an event without an `end_date` is considered
/// over, at which point its orchestrator completes and cleans up.
pub const DEFAULT_COMPLETION_GRACE_HOURS: i64 = 24;

pub struct AppContext {
    pub store: StoreGateway,
    pub deliver: Arc<dyn Deliver>,
    pub smtp_fallback: Option<SmtpFallback>,
    pub default_reminder_offsets: Vec<i64>,
    pub completion_grace: Duration,
}

impl AppContext {
    pub fn new(store: StoreGateway, deliver: Arc<dyn Deliver>) -> Self {
        Self {
            store,
            deliver,
            smtp_fallback: None,
            default_reminder_offsets: DEFAULT_REMINDER_OFFSETS.to_vec(),
            completion_grace: Duration::hours(DEFAULT_COMPLETION_GRACE_HOURS),
        }
    }

    pub fn with_smtp_fallback(mut self, smtp: Option<SmtpFallback>) -> Self {
        self.smtp_fallback = smtp;
        self
    }

    pub fn with_default_reminder_offsets(mut self, offsets: Vec<i64>) -> Self {
        self.default_reminder_offsets = offsets;
        self
    }

    pub fn with_completion_grace(mut self, grace: Duration) -> Self {
        self.completion_grace = grace;
        self
    }
}
