use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionSnapshot;

/// Category of a monitored occurrence, as it appears on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    ClipboardCopy,
    ClipboardPaste,
    FocusLost,
    WindowMinimized,
    WindowResized,
    SettingsBlocked,
    SuspiciousProcess,
    SessionVoided,
    SessionEnded,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ClipboardCopy => "CLIPBOARD_COPY",
            EventKind::ClipboardPaste => "CLIPBOARD_PASTE",
            EventKind::FocusLost => "FOCUS_LOST",
            EventKind::WindowMinimized => "WINDOW_MINIMIZED",
            EventKind::WindowResized => "WINDOW_RESIZED",
            EventKind::SettingsBlocked => "SETTINGS_BLOCKED",
            EventKind::SuspiciousProcess => "SUSPICIOUS_PROCESS",
            EventKind::SessionVoided => "SESSION_VOIDED",
            EventKind::SessionEnded => "SESSION_ENDED",
        }
    }
}

/// One monitored occurrence. Built by exactly one monitor, handed to the
/// reporter, then discarded; identity fields are copied from the session
/// snapshot at construction time, not read live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub event_id: String,
    pub kind: EventKind,
    pub session_id: String,
    pub client_name: String,
    pub roll_number: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub payload: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_count: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn new(kind: EventKind, session: &SessionSnapshot) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            kind,
            session_id: session.session_id.clone().unwrap_or_default(),
            client_name: session.client_name.clone().unwrap_or_default(),
            roll_number: session.roll_number.clone().unwrap_or_default(),
            payload: BTreeMap::new(),
            warning_count: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_payload(mut self, key: &str, value: &str) -> Self {
        self.payload.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_warning_count(mut self, count: u32) -> Self {
        self.warning_count = Some(count);
        self
    }

    /// "name (roll)" as it appears in the audit log.
    pub fn user_label(&self) -> String {
        format!("{} ({})", self.client_name, self.roll_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            session_id: Some("42".into()),
            client_name: Some("Alice".into()),
            roll_number: Some("R001".into()),
            expires_at: None,
            started_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_event_copies_identity_from_snapshot() {
        let event = SecurityEvent::new(EventKind::FocusLost, &snapshot());
        assert_eq!(event.session_id, "42");
        assert_eq!(event.client_name, "Alice");
        assert_eq!(event.roll_number, "R001");
        assert_eq!(event.user_label(), "Alice (R001)");
    }

    #[test]
    fn test_kind_serializes_screaming_snake_case() {
        let event = SecurityEvent::new(EventKind::WindowMinimized, &snapshot())
            .with_warning_count(2)
            .with_payload("reason", "iconified");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"WINDOW_MINIMIZED\""));
        assert!(json.contains("\"warningCount\":2"));
        assert!(json.contains("\"sessionId\":\"42\""));
    }

    #[test]
    fn test_empty_payload_and_count_are_omitted() {
        let event = SecurityEvent::new(EventKind::SessionEnded, &snapshot());
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("payload"));
        assert!(!json.contains("warningCount"));
    }

    #[test]
    fn test_wire_name_matches_serde_rename() {
        for kind in [
            EventKind::ClipboardCopy,
            EventKind::SuspiciousProcess,
            EventKind::SessionVoided,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
