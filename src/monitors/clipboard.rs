use crate::events::{EventKind, SecurityEvent};
use crate::report::Reporter;
use crate::session::SessionContext;

/// Intercepts the host's copy/paste pre-processing hooks. Strictly
/// pass-through: the transferred text is returned unchanged and reporting
/// is a channel send, so the clipboard operation itself is never delayed.
///
/// Content is reported whenever a session is active, empty strings
/// included, so the audit stream is complete.
pub struct ClipboardMonitor {
    context: SessionContext,
    reporter: Reporter,
}

impl ClipboardMonitor {
    pub fn new(context: SessionContext, reporter: Reporter) -> Self {
        Self { context, reporter }
    }

    pub fn on_copy(&self, text: &str) -> String {
        self.observe(EventKind::ClipboardCopy, text);
        text.to_string()
    }

    pub fn on_paste(&self, text: &str) -> String {
        self.observe(EventKind::ClipboardPaste, text);
        text.to_string()
    }

    fn observe(&self, kind: EventKind, text: &str) {
        if !self.context.is_active() {
            return;
        }

        let event =
            SecurityEvent::new(kind, &self.context.snapshot()).with_payload("content", text);
        self.reporter.report(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::testing;
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

    #[test]
    fn test_pass_through_is_identity() {
        let (reporter, _rx) = testing::capture_pair();
        let monitor = ClipboardMonitor::new(active_context(), reporter);

        for input in ["fn main() {}", "", "line\nbreak\tand\u{7}control"] {
            assert_eq!(monitor.on_copy(input), input);
            assert_eq!(monitor.on_paste(input), input);
        }
    }

    #[test]
    fn test_pass_through_holds_without_session() {
        let (reporter, _rx) = testing::capture_pair();
        let monitor = ClipboardMonitor::new(SessionContext::new(), reporter);
        assert_eq!(monitor.on_copy("x"), "x");
        assert_eq!(monitor.on_paste("x"), "x");
    }

    #[test]
    fn test_no_events_without_active_session() {
        let (reporter, mut rx) = testing::capture_pair();
        let monitor = ClipboardMonitor::new(SessionContext::new(), reporter);

        monitor.on_copy("secret");
        monitor.on_paste("secret");

        assert!(testing::drain(&mut rx).is_empty());
    }

    #[test]
    fn test_copy_and_paste_report_with_direction() {
        let (reporter, mut rx) = testing::capture_pair();
        let monitor = ClipboardMonitor::new(active_context(), reporter);

        monitor.on_copy("copied text");
        monitor.on_paste("pasted text");

        let events = testing::drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::ClipboardCopy);
        assert_eq!(
            events[0].payload.get("content").map(String::as_str),
            Some("copied text")
        );
        assert_eq!(events[1].kind, EventKind::ClipboardPaste);
        assert_eq!(
            events[1].payload.get("content").map(String::as_str),
            Some("pasted text")
        );
    }

    #[test]
    fn test_empty_copy_is_still_reported_while_active() {
        let (reporter, mut rx) = testing::capture_pair();
        let monitor = ClipboardMonitor::new(active_context(), reporter);

        monitor.on_copy("");

        let events = testing::drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].payload.get("content").map(String::as_str),
            Some("")
        );
    }
}
