use std::sync::Arc;

use log::{info, warn};

use crate::escalation::{Escalator, Verdict, ViolationCategory, WarningCounter};
use crate::events::{EventKind, SecurityEvent};
use crate::host::{Notifier, WindowControl};
use crate::report::Reporter;
use crate::session::{SessionLifecycle, TerminateReason};

const MONITORING_NOTICE: &str = "EXAM SESSION STARTED\n\n\
     Please be aware that your activities are being monitored during this exam:\n\n\
     \u{2022} Copy-paste operations are tracked\n\
     \u{2022} Window minimizing is not allowed\n\
     \u{2022} Window resizing is not allowed\n\
     \u{2022} Closing the application will void your exam\n\n\
     The window will now enter presentation mode. Please focus on your exam\n\
     and avoid any actions that could be considered cheating.";

const CLOSE_PROMPT: &str = "WARNING: You are attempting to close the exam window.\n\n\
     If you close this window, your exam will be considered null and void.\n\
     This action cannot be undone.\n\n\
     Are you sure you want to exit the exam?";

/// What the host should do with an intercepted close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    Proceed,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowState {
    Locked,
    Minimized,
    Closing,
}

/// Enforces the presentation lock and counts minimize/resize violations on
/// independent counters. The lock is re-asserted after every disruptive
/// transition so repeated toggling cannot be used to linger outside the
/// monitored full-screen state.
pub struct WindowStateMonitor {
    lifecycle: SessionLifecycle,
    reporter: Reporter,
    notifier: Arc<dyn Notifier>,
    window: Arc<dyn WindowControl>,
    escalator: Escalator,
    minimize_counter: WarningCounter,
    resize_counter: WarningCounter,
    state: WindowState,
    last_size: Option<(u32, u32)>,
    ignore_next_resize: bool,
    resize_threshold_px: u32,
}

impl WindowStateMonitor {
    pub fn new(
        lifecycle: SessionLifecycle,
        reporter: Reporter,
        notifier: Arc<dyn Notifier>,
        window: Arc<dyn WindowControl>,
        escalator: Escalator,
        resize_threshold_px: u32,
    ) -> Self {
        Self {
            lifecycle,
            reporter,
            notifier,
            window,
            escalator,
            minimize_counter: WarningCounter::new(),
            resize_counter: WarningCounter::new(),
            state: WindowState::Locked,
            last_size: None,
            ignore_next_resize: false,
            resize_threshold_px,
        }
    }

    /// Entry point once a session is registered: announce monitoring and
    /// take the window into the locked state.
    pub fn activate(&mut self) {
        if !self.lifecycle.context().is_active() {
            return;
        }
        self.notifier
            .show_warning("Exam Monitoring Active", MONITORING_NOTICE);
        self.assert_lock();
    }

    /// Maximize, then enter presentation mode; a host without the
    /// presentation capability degrades to maximize-only. The geometry
    /// change this causes must not count as a manual resize.
    fn assert_lock(&mut self) {
        self.ignore_next_resize = true;
        self.state = WindowState::Locked;

        self.window.maximize();
        if let Err(err) = self.window.enter_presentation() {
            warn!("presentation lock degraded to maximize: {err}");
        }
    }

    pub fn on_iconified(&mut self) {
        if !self.lifecycle.context().is_active() {
            return;
        }
        if self.state == WindowState::Minimized {
            // One minimize action, one count, however many times the host
            // re-delivers the transition.
            return;
        }
        self.state = WindowState::Minimized;

        self.handle_violation(ViolationCategory::Minimize, EventKind::WindowMinimized, None);
    }

    pub fn on_deiconified(&mut self) {
        if !self.lifecycle.context().is_active() {
            return;
        }
        // Recovery, not a violation.
        info!("window restored from minimized state");
        self.assert_lock();
    }

    pub fn on_resized(&mut self, width: u32, height: u32) {
        if !self.lifecycle.context().is_active() {
            return;
        }

        if self.ignore_next_resize {
            self.ignore_next_resize = false;
            self.last_size = Some((width, height));
            return;
        }

        let Some((last_width, last_height)) = self.last_size else {
            self.last_size = Some((width, height));
            return;
        };

        let width_delta = last_width.abs_diff(width);
        let height_delta = last_height.abs_diff(height);
        self.last_size = Some((width, height));

        if width_delta <= self.resize_threshold_px && height_delta <= self.resize_threshold_px {
            // OS-driven layout jitter.
            return;
        }

        self.handle_violation(
            ViolationCategory::Resize,
            EventKind::WindowResized,
            Some((width_delta, height_delta)),
        );
    }

    /// Always intercept close while a session is active. Confirming voids
    /// the exam and lets the close proceed; declining swallows it.
    pub fn on_close_requested(&mut self) -> CloseDecision {
        if !self.lifecycle.context().is_active() {
            return CloseDecision::Proceed;
        }

        self.state = WindowState::Closing;
        let exit = self.notifier.confirm(
            "Exit Exam Confirmation",
            CLOSE_PROMPT,
            "Exit Exam (Void Results)",
            "Continue Exam",
        );

        if exit {
            self.lifecycle.terminate(TerminateReason::VoluntaryExit);
            CloseDecision::Proceed
        } else {
            self.state = WindowState::Locked;
            CloseDecision::Cancel
        }
    }

    fn handle_violation(
        &mut self,
        category: ViolationCategory,
        kind: EventKind,
        deltas: Option<(u32, u32)>,
    ) {
        let escalator = self.escalator;
        let counter = match category {
            ViolationCategory::Resize => &mut self.resize_counter,
            _ => &mut self.minimize_counter,
        };
        let verdict = escalator.decide(category, counter);
        let count = counter.count();

        let mut event = SecurityEvent::new(kind, &self.lifecycle.context().snapshot())
            .with_warning_count(count);
        if let Some((width_delta, height_delta)) = deltas {
            event = event
                .with_payload("widthDelta", &width_delta.to_string())
                .with_payload("heightDelta", &height_delta.to_string());
        }
        self.reporter.report(event);

        match verdict {
            Verdict::Continue { message } => {
                let title = match kind {
                    EventKind::WindowResized => "Exam Window Resized",
                    _ => "Exam Window Minimized",
                };
                self.notifier.show_warning(title, &message);
                self.assert_lock();
            }
            Verdict::Escalate { message } => {
                self.notifier.show_error("Exam Voided", &message);
                // Terminating clears the session, which also releases the
                // lock: with no active session every handler above is inert.
                self.lifecycle.terminate(TerminateReason::Voided(category));
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn counts(&self) -> (u32, u32) {
        (self.minimize_counter.count(), self.resize_counter.count())
    }
}
