use std::sync::Arc;

use crate::escalation::{Escalator, Verdict, ViolationCategory, WarningCounter};
use crate::events::{EventKind, SecurityEvent};
use crate::host::Notifier;
use crate::report::Reporter;
use crate::session::{SessionLifecycle, TerminateReason};

const VIOLATION_TITLE: &str = "Exam Session Violation";

const ESCALATION_PROMPT: &str = "You have repeatedly violated exam rules by switching away from the editor.\n\
     Your session may be terminated. Do you want to continue with the exam?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusState {
    Focused,
    Unfocused,
}

/// Watches application-level activate/deactivate transitions. Each loss of
/// focus while a session is active is counted and reported immediately, but
/// the warning dialog is held until the user returns; surfacing UI while
/// the host is backgrounded would go unseen.
pub struct FocusMonitor {
    lifecycle: SessionLifecycle,
    reporter: Reporter,
    notifier: Arc<dyn Notifier>,
    escalator: Escalator,
    counter: WarningCounter,
    state: FocusState,
    pending: Option<Verdict>,
}

impl FocusMonitor {
    pub fn new(
        lifecycle: SessionLifecycle,
        reporter: Reporter,
        notifier: Arc<dyn Notifier>,
        escalator: Escalator,
    ) -> Self {
        Self {
            lifecycle,
            reporter,
            notifier,
            escalator,
            counter: WarningCounter::new(),
            state: FocusState::Focused,
            pending: None,
        }
    }

    pub fn on_app_deactivated(&mut self) {
        if self.state == FocusState::Unfocused {
            // Hosts can re-deliver deactivation; one loss, one count.
            return;
        }
        self.state = FocusState::Unfocused;

        let context = self.lifecycle.context();
        if !context.is_active() {
            return;
        }

        let verdict = self
            .escalator
            .decide(ViolationCategory::FocusLoss, &mut self.counter);

        let event = SecurityEvent::new(EventKind::FocusLost, &context.snapshot())
            .with_warning_count(self.counter.count());
        self.reporter.report(event);

        self.pending = Some(verdict);
    }

    pub fn on_app_activated(&mut self) {
        self.state = FocusState::Focused;

        let Some(verdict) = self.pending.take() else {
            return;
        };

        match verdict {
            Verdict::Continue { message } => {
                self.notifier.show_warning(VIOLATION_TITLE, &message);
            }
            Verdict::Escalate { message } => {
                self.notifier.show_warning(VIOLATION_TITLE, &message);
                let keep_going = self.notifier.confirm(
                    VIOLATION_TITLE,
                    ESCALATION_PROMPT,
                    "Continue Exam",
                    "End Session",
                );
                if !keep_going {
                    self.lifecycle.terminate(TerminateReason::ViolationPromptEnd);
                    self.notifier
                        .show_notice("Session Ended", "Your exam session has been terminated.");
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn warning_count(&self) -> u32 {
        self.counter.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::host::mock::RecordingNotifier;
    use crate::report::{testing, AuditLog, CollectorClient};
    use crate::session::{SessionContext, SessionSnapshot};
    use std::time::Duration;

    fn lifecycle(
        context: SessionContext,
        reporter: Reporter,
    ) -> SessionLifecycle {
        let db = Database::new(
            std::env::temp_dir()
                .join(format!("examguard-focus-{}", uuid::Uuid::new_v4()))
                .join("examguard.sqlite3"),
        )
        .unwrap();
        let audit = Arc::new(
            AuditLog::create(
                &std::env::temp_dir().join(format!("examguard-focus-audit-{}", uuid::Uuid::new_v4())),
            )
            .unwrap(),
        );
        // The collector is never contacted by these tests.
        let collector =
            CollectorClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        SessionLifecycle::new(context, collector, reporter, db, audit)
    }

    fn active_context() -> SessionContext {
        let context = SessionContext::new();
        context.begin(SessionSnapshot {
            session_id: Some("42".into()),
            client_name: Some("Alice".into()),
            roll_number: Some("R001".into()),
            ..Default::default()
        });
        context
    }

    fn monitor_with(
        context: SessionContext,
        notifier: Arc<RecordingNotifier>,
    ) -> (FocusMonitor, tokio::sync::mpsc::UnboundedReceiver<SecurityEvent>) {
        let (reporter, rx) = testing::capture_pair();
        let lifecycle = lifecycle(context, reporter.clone());
        (
            FocusMonitor::new(lifecycle, reporter, notifier, Escalator::new(3)),
            rx,
        )
    }

    #[tokio::test]
    async fn test_focus_loss_reports_and_defers_warning() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (mut monitor, mut rx) = monitor_with(active_context(), notifier.clone());

        monitor.on_app_deactivated();

        let events = testing::drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::FocusLost);
        assert_eq!(events[0].warning_count, Some(1));
        // Nothing shown while the host is backgrounded.
        assert_eq!(notifier.message_count(), 0);

        monitor.on_app_activated();
        assert_eq!(notifier.message_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_deactivation_counts_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (mut monitor, mut rx) = monitor_with(active_context(), notifier);

        monitor.on_app_deactivated();
        monitor.on_app_deactivated();

        assert_eq!(monitor.warning_count(), 1);
        assert_eq!(testing::drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_session_sees_nothing() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (mut monitor, mut rx) = monitor_with(SessionContext::new(), notifier.clone());

        monitor.on_app_deactivated();
        monitor.on_app_activated();

        assert!(testing::drain(&mut rx).is_empty());
        assert_eq!(notifier.message_count(), 0);
        assert_eq!(monitor.warning_count(), 0);
    }

    #[tokio::test]
    async fn test_escalation_prompt_continue_keeps_session() {
        let notifier = Arc::new(RecordingNotifier::answering(true));
        let context = active_context();
        let (mut monitor, mut rx) = monitor_with(context.clone(), notifier);

        for _ in 0..4 {
            monitor.on_app_deactivated();
            monitor.on_app_activated();
        }

        assert!(context.is_active());
        let events = testing::drain(&mut rx);
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|event| event.kind == EventKind::FocusLost));
    }

    #[tokio::test]
    async fn test_escalation_prompt_end_terminates_session() {
        let notifier = Arc::new(RecordingNotifier::answering(false));
        let context = active_context();
        let (mut monitor, mut rx) = monitor_with(context.clone(), notifier);

        for _ in 0..4 {
            monitor.on_app_deactivated();
            monitor.on_app_activated();
        }

        assert!(!context.is_active());
        let events = testing::drain(&mut rx);
        let ended: Vec<_> = events
            .iter()
            .filter(|event| event.kind == EventKind::SessionEnded)
            .collect();
        assert_eq!(ended.len(), 1);
        assert_eq!(
            ended[0].payload.get("reason").map(String::as_str),
            Some("voluntary-end-on-repeated-violation")
        );
    }
}
