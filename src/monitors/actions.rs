use std::collections::BTreeMap;
use std::sync::Arc;

use log::warn;

use crate::events::{EventKind, SecurityEvent};
use crate::host::Notifier;
use crate::report::Reporter;
use crate::session::SessionContext;

/// Verdict returned to the host's pre-dispatch hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionDecision {
    Allow,
    Deny,
}

/// Blocks a configured set of menu/keyboard actions while a session is
/// active, deciding by action id before the host dispatches the action.
pub struct ActionInterceptor {
    context: SessionContext,
    reporter: Reporter,
    notifier: Arc<dyn Notifier>,
    restricted: BTreeMap<String, String>,
    blocked_attempts: u32,
}

impl ActionInterceptor {
    pub fn new(
        context: SessionContext,
        reporter: Reporter,
        notifier: Arc<dyn Notifier>,
        restricted: BTreeMap<String, String>,
    ) -> Self {
        Self {
            context,
            reporter,
            notifier,
            restricted,
            blocked_attempts: 0,
        }
    }

    pub fn before_action(&mut self, action_id: &str) -> ActionDecision {
        if !self.context.is_active() {
            return ActionDecision::Allow;
        }
        let Some(label) = self.restricted.get(action_id).cloned() else {
            return ActionDecision::Allow;
        };

        self.blocked_attempts += 1;

        let event = SecurityEvent::new(EventKind::SettingsBlocked, &self.context.snapshot())
            .with_payload("actionId", action_id)
            .with_payload("label", &label)
            .with_warning_count(self.blocked_attempts);
        self.reporter.report(event);

        self.notifier.show_warning(
            "Restricted Action",
            &format!(
                "The action you attempted ({label}) is restricted during the exam.\n\n\
                 This activity has been logged."
            ),
        );

        ActionDecision::Deny
    }

    /// Best-effort shortcut watch. A literal comma commonly precedes the
    /// settings shortcut; warn when it is typed. The host hook cannot
    /// reliably consume global shortcut keystrokes, so this is advisory
    /// only and returns nothing.
    pub fn before_keystroke(&self, character: char) {
        if !self.context.is_active() || character != ',' {
            return;
        }

        warn!("settings shortcut keystroke observed during active session");
        self.notifier.show_warning(
            "Restricted Action",
            "Access to settings is restricted during the exam.\n\nThis activity has been logged.",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProctorConfig;
    use crate::report::testing;
    use crate::host::mock::RecordingNotifier;
    use crate::session::SessionSnapshot;

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

    fn interceptor_with(
        context: SessionContext,
        notifier: Arc<RecordingNotifier>,
    ) -> (
        ActionInterceptor,
        tokio::sync::mpsc::UnboundedReceiver<SecurityEvent>,
    ) {
        let (reporter, rx) = testing::capture_pair();
        let restricted = ProctorConfig::default().restricted_actions;
        (
            ActionInterceptor::new(context, reporter, notifier, restricted),
            rx,
        )
    }

    #[test]
    fn test_restricted_action_is_denied_and_reported() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (mut interceptor, mut rx) = interceptor_with(active_context(), notifier.clone());

        assert_eq!(interceptor.before_action("ShowSettings"), ActionDecision::Deny);

        let events = testing::drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::SettingsBlocked);
        assert_eq!(
            events[0].payload.get("actionId").map(String::as_str),
            Some("ShowSettings")
        );
        assert_eq!(notifier.message_count(), 1);
    }

    #[test]
    fn test_unrestricted_action_is_allowed() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (mut interceptor, mut rx) = interceptor_with(active_context(), notifier.clone());

        assert_eq!(interceptor.before_action("EditorPaste"), ActionDecision::Allow);
        assert!(testing::drain(&mut rx).is_empty());
        assert_eq!(notifier.message_count(), 0);
    }

    #[test]
    fn test_everything_allowed_without_session() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (mut interceptor, mut rx) = interceptor_with(SessionContext::new(), notifier.clone());

        assert_eq!(interceptor.before_action("ShowSettings"), ActionDecision::Allow);
        interceptor.before_keystroke(',');

        assert!(testing::drain(&mut rx).is_empty());
        assert_eq!(notifier.message_count(), 0);
    }

    #[test]
    fn test_blocked_attempts_accumulate() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (mut interceptor, mut rx) = interceptor_with(active_context(), notifier);

        interceptor.before_action("ShowSettings");
        interceptor.before_action("ConfigurePlugins");

        let events = testing::drain(&mut rx);
        assert_eq!(events[0].warning_count, Some(1));
        assert_eq!(events[1].warning_count, Some(2));
    }

    #[test]
    fn test_comma_keystroke_warns_but_emits_no_event() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (interceptor, mut rx) = interceptor_with(active_context(), notifier.clone());

        interceptor.before_keystroke(',');
        interceptor.before_keystroke('a');

        assert!(testing::drain(&mut rx).is_empty());
        assert_eq!(notifier.message_count(), 1);
    }
}
