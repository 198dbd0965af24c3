//! Event lifecycle orchestration: per-event durable tasks, reminder
//! schedules, and the broadcast/reminder activities that drive delivery.

pub mod activity;
pub mod broadcast;
pub mod context;
pub mod edge;
pub mod error;
pub mod reminder;
pub mod runtime;
pub mod schedule;
pub mod signal;
mod workflow;

pub use activity::{
    run_activity, ActivityError, RetryPolicy, DELIVERY_POLICY, SCHEDULE_POLICY, VALIDATION_POLICY,
};
pub use broadcast::{
    broadcast, BroadcastInput, BroadcastOutcome, SubscriptionDelivery, SubscriptionStatus,
};
pub use context::{AppContext, DEFAULT_COMPLETION_GRACE_HOURS, DEFAULT_REMINDER_OFFSETS};
pub use edge::{
    add_participant, cancel_event, create_event, notify_manual, remove_participant,
    start_event_orchestrator, unsubscribe_with_token, update_event, EventDraft, ParticipantAdded,
};
pub use error::OrchestratorError;
pub use reminder::{humanize_offset, personal_reminder, run_reminder_task};
pub use runtime::{Runtime, ScheduleWorker};
pub use schedule::{
    event_prefix, parse_schedule_id, schedule_id, subscription_prefix, ParsedScheduleId,
    ScheduleRegistry,
};
pub use signal::{EventPatch, ManualNotification, Signal, SignalParseError};
