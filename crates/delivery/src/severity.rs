use serde::{Deserialize, Serialize};
use strum::Display;

/// Notification severity, mapped per backend (ntfy priority header, gotify
/// numeric priority, plain field for webhooks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn ntfy_priority(self) -> &'static str {
        match self {
            Severity::Info => "default",
            Severity::Warning => "high",
            Severity::Critical => "urgent",
        }
    }

    pub fn gotify_priority(self) -> u8 {
        match self {
            Severity::Info => 4,
            Severity::Warning => 7,
            Severity::Critical => 10,
        }
    }
}
