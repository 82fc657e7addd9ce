mod config;
mod db;
mod escalation;
mod events;
mod host;
mod monitors;
mod report;
mod session;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::warn;

pub use config::{ConfigStore, ProctorConfig};
pub use db::Database;
pub use escalation::{Escalator, Verdict, ViolationCategory, WarningCounter, DEFAULT_MAX_WARNINGS};
pub use events::{EventKind, SecurityEvent};
pub use host::{HostError, Notifier, WindowControl};
pub use monitors::{
    ActionDecision, ActionInterceptor, ClipboardMonitor, CloseDecision, FocusMonitor,
    ProcessWatchConfig, ProcessWatchController, WindowStateMonitor,
};
pub use report::{
    spawn_reporter, AuditLevel, AuditLog, CollectorClient, RegistrationError, Reporter,
    ReporterController, SessionDescriptor, SnippetPayload, SnippetType,
};
pub use session::{SessionContext, SessionLifecycle, SessionSnapshot, TerminateReason};

/// Initialize logging from `RUST_LOG`, defaulting to info. Hosts call this
/// once at startup; repeat calls are harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// The proctoring agent. Owns the shared session context, the reporter,
/// and one instance of each monitor, and exposes the callback surface the
/// host wires its own events into.
///
/// All callback methods are expected on one logical event thread (the
/// host's UI/event dispatch); the process watcher and the reporter run on
/// background tasks and only read the session context. Construction must
/// happen inside a tokio runtime so those tasks can be spawned.
pub struct ProctorEngine {
    config: ProctorConfig,
    context: SessionContext,
    lifecycle: SessionLifecycle,
    reporter: Reporter,
    reporter_controller: ReporterController,
    notifier: Arc<dyn Notifier>,
    window_control: Arc<dyn WindowControl>,
    clipboard_monitor: ClipboardMonitor,
    focus_monitor: FocusMonitor,
    window_monitor: WindowStateMonitor,
    action_interceptor: ActionInterceptor,
    process_watch: ProcessWatchController,
}

impl ProctorEngine {
    pub fn new(
        config: ProctorConfig,
        notifier: Arc<dyn Notifier>,
        window_control: Arc<dyn WindowControl>,
    ) -> Result<Self> {
        let database = Database::new(config.data_dir.join("examguard.sqlite3"))?;
        let audit = Arc::new(AuditLog::create(&config.data_dir.join("logs"))?);
        let collector = CollectorClient::new(
            &config.collector_url,
            Duration::from_secs(config.report_timeout_secs),
        )?;

        let (reporter, reporter_controller) = spawn_reporter(collector.clone(), audit.clone());

        let context = SessionContext::new();
        let lifecycle = SessionLifecycle::new(
            context.clone(),
            collector,
            reporter.clone(),
            database,
            audit,
        );

        let escalator = Escalator::new(config.max_warnings);
        let clipboard_monitor = ClipboardMonitor::new(context.clone(), reporter.clone());
        let focus_monitor = FocusMonitor::new(
            lifecycle.clone(),
            reporter.clone(),
            notifier.clone(),
            escalator,
        );
        let window_monitor = WindowStateMonitor::new(
            lifecycle.clone(),
            reporter.clone(),
            notifier.clone(),
            window_control.clone(),
            escalator,
            config.resize_threshold_px,
        );
        let action_interceptor = ActionInterceptor::new(
            context.clone(),
            reporter.clone(),
            notifier.clone(),
            config.restricted_actions.clone(),
        );

        Ok(Self {
            config,
            context,
            lifecycle,
            reporter,
            reporter_controller,
            notifier,
            window_control,
            clipboard_monitor,
            focus_monitor,
            window_monitor,
            action_interceptor,
            process_watch: ProcessWatchController::new(),
        })
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Validate and bind a session, then arm every monitor against it.
    pub async fn register(
        &mut self,
        candidate_id: &str,
        client_name: &str,
        roll_number: &str,
    ) -> Result<(), RegistrationError> {
        self.lifecycle
            .register(candidate_id, client_name, roll_number)
            .await?;
        self.arm_session();
        Ok(())
    }

    /// Resume a session persisted before a host restart, if one exists and
    /// has not expired.
    pub async fn restore(&mut self) -> Result<bool> {
        let restored = self.lifecycle.restore().await?;
        if restored {
            self.arm_session();
        }
        Ok(restored)
    }

    fn arm_session(&mut self) {
        // Fresh monitor state per session: counters start at zero because
        // the monitors themselves are rebuilt, not reset in place.
        let escalator = Escalator::new(self.config.max_warnings);
        self.clipboard_monitor =
            ClipboardMonitor::new(self.context.clone(), self.reporter.clone());
        self.focus_monitor = FocusMonitor::new(
            self.lifecycle.clone(),
            self.reporter.clone(),
            self.notifier.clone(),
            escalator,
        );
        self.window_monitor = WindowStateMonitor::new(
            self.lifecycle.clone(),
            self.reporter.clone(),
            self.notifier.clone(),
            self.window_control.clone(),
            escalator,
            self.config.resize_threshold_px,
        );
        self.action_interceptor = ActionInterceptor::new(
            self.context.clone(),
            self.reporter.clone(),
            self.notifier.clone(),
            self.config.restricted_actions.clone(),
        );

        self.window_monitor.activate();

        if !self.process_watch.is_running() {
            let watch_config = ProcessWatchConfig {
                initial_delay: Duration::from_secs(self.config.process_check_initial_delay_secs),
                interval: Duration::from_secs(self.config.process_check_interval_secs),
                denylist: self.config.suspicious_apps.clone(),
            };
            if let Err(err) = self.process_watch.start(
                self.context.clone(),
                self.reporter.clone(),
                self.notifier.clone(),
                watch_config,
            ) {
                warn!("failed to start process watcher: {err:#}");
            }
        }
    }

    /// Stop the background workers. The session itself, if still active,
    /// stays registered; monitors simply stop observing.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.process_watch.stop().await?;
        self.reporter_controller.shutdown().await?;
        Ok(())
    }

    // --- host callback surface ---------------------------------------

    pub fn on_copy(&self, text: &str) -> String {
        self.clipboard_monitor.on_copy(text)
    }

    pub fn on_paste(&self, text: &str) -> String {
        self.clipboard_monitor.on_paste(text)
    }

    pub fn on_app_activated(&mut self) {
        self.focus_monitor.on_app_activated();
    }

    pub fn on_app_deactivated(&mut self) {
        self.focus_monitor.on_app_deactivated();
    }

    pub fn on_window_iconified(&mut self) {
        self.window_monitor.on_iconified();
    }

    pub fn on_window_deiconified(&mut self) {
        self.window_monitor.on_deiconified();
    }

    pub fn on_window_resized(&mut self, width: u32, height: u32) {
        self.window_monitor.on_resized(width, height);
    }

    pub fn on_close_requested(&mut self) -> CloseDecision {
        self.window_monitor.on_close_requested()
    }

    pub fn before_action(&mut self, action_id: &str) -> ActionDecision {
        self.action_interceptor.before_action(action_id)
    }

    pub fn before_keystroke(&self, character: char) {
        self.action_interceptor.before_keystroke(character);
    }
}
