//! The orchestrator's signal surface.
//!
//! Signals cross the runtime boundary as `(name, JSON payload)` pairs and
//! are shape-checked into [`Signal`] before entering an orchestrator's
//! mailbox. A payload that fails validation is logged and dropped.

use chrono::{DateTime, Utc};
use eventcast_delivery::Severity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PARTICIPANT_ADDED: &str = "participant_added";
pub const PARTICIPANT_REMOVED: &str = "participant_removed";
pub const EVENT_UPDATED: &str = "event_updated";
pub const CANCEL_EVENT: &str = "cancel_event";
pub const MANUAL_NOTIFICATION: &str = "manual_notification";

/// Field bag carried by `event_updated`. `None` means unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualNotification {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub subscription_ids: Option<Vec<String>>,
    #[serde(default)]
    pub tag_filter: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ParticipantPayload {
    subscription_id: String,
}

#[derive(Debug, Clone)]
pub enum Signal {
    ParticipantAdded { subscription_id: String },
    ParticipantRemoved { subscription_id: String },
    EventUpdated(EventPatch),
    CancelEvent,
    ManualNotification(ManualNotification),
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::ParticipantAdded { .. } => PARTICIPANT_ADDED,
            Signal::ParticipantRemoved { .. } => PARTICIPANT_REMOVED,
            Signal::EventUpdated(_) => EVENT_UPDATED,
            Signal::CancelEvent => CANCEL_EVENT,
            Signal::ManualNotification(_) => MANUAL_NOTIFICATION,
        }
    }

    /// Shape-check a raw signal. Unknown names and malformed payloads are
    /// errors; the caller logs and drops them.
    pub fn parse(name: &str, payload: serde_json::Value) -> Result<Self, SignalParseError> {
        let invalid = |err: serde_json::Error| SignalParseError {
            signal: name.to_string(),
            reason: err.to_string(),
        };

        match name {
            PARTICIPANT_ADDED => {
                let payload: ParticipantPayload =
                    serde_json::from_value(payload).map_err(invalid)?;
                Ok(Signal::ParticipantAdded {
                    subscription_id: payload.subscription_id,
                })
            }
            PARTICIPANT_REMOVED => {
                let payload: ParticipantPayload =
                    serde_json::from_value(payload).map_err(invalid)?;
                Ok(Signal::ParticipantRemoved {
                    subscription_id: payload.subscription_id,
                })
            }
            EVENT_UPDATED => {
                if payload.is_null() {
                    return Ok(Signal::EventUpdated(EventPatch::default()));
                }
                let patch: EventPatch = serde_json::from_value(payload).map_err(invalid)?;
                Ok(Signal::EventUpdated(patch))
            }
            CANCEL_EVENT => Ok(Signal::CancelEvent),
            MANUAL_NOTIFICATION => {
                let notification: ManualNotification =
                    serde_json::from_value(payload).map_err(invalid)?;
                Ok(Signal::ManualNotification(notification))
            }
            other => Err(SignalParseError {
                signal: other.to_string(),
                reason: "unknown signal name".to_string(),
            }),
        }
    }
}

#[derive(Debug, Error)]
#[error("signal {signal} rejected: {reason}")]
pub struct SignalParseError {
    pub signal: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn participant_signals_require_a_subscription_id() {
        let parsed = Signal::parse(PARTICIPANT_ADDED, json!({"subscription_id": "s7"})).unwrap();
        assert!(matches!(
            parsed,
            Signal::ParticipantAdded { subscription_id } if subscription_id == "s7"
        ));

        let err = Signal::parse(PARTICIPANT_REMOVED, json!({"sub": "s7"})).unwrap_err();
        assert_eq!(err.signal, PARTICIPANT_REMOVED);
    }

    #[test]
    fn event_updated_accepts_partial_field_bags() {
        let parsed = Signal::parse(
            EVENT_UPDATED,
            json!({"start_date": "2030-01-01T11:00:00Z"}),
        )
        .unwrap();
        match parsed {
            Signal::EventUpdated(patch) => {
                assert!(patch.start_date.is_some());
                assert!(patch.name.is_none());
            }
            _ => panic!("expected event_updated"),
        }

        assert!(Signal::parse(EVENT_UPDATED, serde_json::Value::Null).is_ok());
    }

    #[test]
    fn manual_notification_defaults_severity_to_info() {
        let parsed = Signal::parse(
            MANUAL_NOTIFICATION,
            json!({"title": "Heads up", "body": "Doors open early"}),
        )
        .unwrap();
        match parsed {
            Signal::ManualNotification(n) => assert_eq!(n.severity, Severity::Info),
            _ => panic!("expected manual_notification"),
        }
    }

    #[test]
    fn unknown_signal_names_are_rejected() {
        let err = Signal::parse("defragment", serde_json::Value::Null).unwrap_err();
        assert_eq!(err.reason, "unknown signal name");
    }
}
