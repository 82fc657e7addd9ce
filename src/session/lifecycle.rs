use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::{info, warn};

use crate::db::Database;
use crate::escalation::ViolationCategory;
use crate::events::{EventKind, SecurityEvent};
use crate::report::{AuditLevel, AuditLog, CollectorClient, RegistrationError, Reporter};
use crate::session::{SessionContext, SessionSnapshot};

/// Why a session stopped. Voluntary ends report as SESSION_ENDED, counter
/// overflows as SESSION_VOIDED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateReason {
    /// The user confirmed the close-window dialog.
    VoluntaryExit,
    /// The user chose "End Session" at the repeated-violation prompt.
    ViolationPromptEnd,
    /// A violation counter crossed the maximum.
    Voided(ViolationCategory),
}

impl TerminateReason {
    pub fn as_str(&self) -> String {
        match self {
            TerminateReason::VoluntaryExit => "voluntary-exit".to_string(),
            TerminateReason::ViolationPromptEnd => {
                "voluntary-end-on-repeated-violation".to_string()
            }
            TerminateReason::Voided(category) => format!("voided:{}", category.as_str()),
        }
    }

    fn event_kind(&self) -> EventKind {
        match self {
            TerminateReason::VoluntaryExit | TerminateReason::ViolationPromptEnd => {
                EventKind::SessionEnded
            }
            TerminateReason::Voided(_) => EventKind::SessionVoided,
        }
    }
}

/// Registration and termination; the only writer of [`SessionContext`].
#[derive(Clone)]
pub struct SessionLifecycle {
    context: SessionContext,
    collector: CollectorClient,
    reporter: Reporter,
    db: Database,
    audit: Arc<AuditLog>,
}

impl SessionLifecycle {
    pub fn new(
        context: SessionContext,
        collector: CollectorClient,
        reporter: Reporter,
        db: Database,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            context,
            collector,
            reporter,
            db,
            audit,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Validate `candidate_id` against the collector and, on success, bind
    /// the session to the given identity. The context and the durable
    /// record are only touched on the success path.
    pub async fn register(
        &self,
        candidate_id: &str,
        client_name: &str,
        roll_number: &str,
    ) -> Result<(), RegistrationError> {
        let descriptor = self.collector.validate_session(candidate_id).await?;

        let snapshot = SessionSnapshot {
            session_id: Some(descriptor.id.clone()),
            client_name: Some(client_name.to_string()),
            roll_number: Some(roll_number.to_string()),
            expires_at: descriptor.ends_at.as_deref().and_then(parse_ends_at),
            started_at: Some(Utc::now()),
        };

        self.context.begin(snapshot.clone());

        // The durable record is ambient: losing it costs restart recovery,
        // not the session itself.
        if let Err(err) = self.db.save_record(&snapshot).await {
            warn!("failed to persist session record: {err:#}");
        }

        self.audit.append(
            AuditLevel::Info,
            "Session registered",
            &descriptor.id,
            &format!("{client_name} ({roll_number})"),
        );
        info!("session {} registered for {client_name}", descriptor.id);

        Ok(())
    }

    /// Reload a previously persisted session after a host restart. Returns
    /// true when an active session was restored; an expired record is
    /// discarded instead.
    pub async fn restore(&self) -> anyhow::Result<bool> {
        let Some(record) = self.db.load_record().await? else {
            return Ok(false);
        };

        if !record.is_active_at(Utc::now()) {
            info!("discarding expired session record");
            self.db.clear_record_detached();
            return Ok(false);
        }

        info!(
            "restored session {} from durable record",
            record.session_id.as_deref().unwrap_or_default()
        );
        self.context.begin(record);
        Ok(true)
    }

    /// Clear the session. Idempotent: only the call that actually clears a
    /// live session emits an event; repeats are no-ops.
    pub fn terminate(&self, reason: TerminateReason) {
        let previous = self.context.clear();
        if previous.session_id.is_none() {
            return;
        }

        let event = SecurityEvent::new(reason.event_kind(), &previous)
            .with_payload("reason", &reason.as_str());
        self.reporter.report(event);
        self.db.clear_record_detached();

        info!(
            "session {} terminated ({})",
            previous.session_id.as_deref().unwrap_or_default(),
            reason.as_str()
        );
    }
}

/// The collector reports `endsAt` without a timezone offset; accept both
/// RFC 3339 and the bare form, treating the latter as UTC.
fn parse_ends_at(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
        return Some(with_offset.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
