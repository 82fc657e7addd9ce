use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use sysinfo::{ProcessesToUpdate, System};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::events::{EventKind, SecurityEvent};
use crate::host::Notifier;
use crate::report::Reporter;
use crate::session::SessionContext;

#[derive(Debug, Clone)]
pub struct ProcessWatchConfig {
    pub initial_delay: Duration,
    pub interval: Duration,
    /// Lowercased at scan time; matched as substrings of process names.
    pub denylist: Vec<String>,
}

/// Start/stop handle for the background process scan.
pub struct ProcessWatchController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl ProcessWatchController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(
        &mut self,
        context: SessionContext,
        reporter: Reporter,
        notifier: Arc<dyn Notifier>,
        config: ProcessWatchConfig,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("process watcher already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(watch_loop(context, reporter, notifier, config, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("process watch task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for ProcessWatchController {
    fn default() -> Self {
        Self::new()
    }
}

async fn watch_loop(
    context: SessionContext,
    reporter: Reporter,
    notifier: Arc<dyn Notifier>,
    config: ProcessWatchConfig,
    cancel_token: CancellationToken,
) {
    let start = tokio::time::Instant::now() + config.initial_delay;
    let mut ticker = tokio::time::interval_at(start, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut scanner = ProcessScanner::new(config.denylist);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !context.is_active() {
                    continue;
                }

                let matches = scanner.scan();
                if matches.is_empty() {
                    continue;
                }

                warn!("suspicious applications detected: {}", matches.join(", "));

                let event = SecurityEvent::new(
                    EventKind::SuspiciousProcess,
                    &context.snapshot(),
                )
                .with_payload("applications", &matches.join(", "));
                reporter.report(event);

                // Informational only: one notice, no counter, no voiding.
                notifier.show_notice(
                    "External Applications Detected",
                    &format!(
                        "The following applications have been detected running:\n\n{}\n\n\
                         Using external applications during the exam may be considered cheating.\n\
                         This activity has been logged.",
                        matches.join("\n")
                    ),
                );
            }
            _ = cancel_token.cancelled() => {
                info!("process watcher shutting down");
                break;
            }
        }
    }
}

struct ProcessScanner {
    system: System,
    denylist: Vec<String>,
}

impl ProcessScanner {
    fn new(denylist: Vec<String>) -> Self {
        Self {
            system: System::new(),
            denylist: denylist
                .into_iter()
                .map(|entry| entry.to_lowercase())
                .collect(),
        }
    }

    fn scan(&mut self) -> Vec<String> {
        self.system.refresh_processes(ProcessesToUpdate::All);

        let names = self
            .system
            .processes()
            .values()
            .map(|process| process.name().to_string_lossy().into_owned());
        match_denylist(names, &self.denylist)
    }
}

/// Denylist entries that appear, case-insensitively, as a substring of any
/// running process name. Sorted and deduplicated so multiple processes of
/// one application report once.
fn match_denylist(names: impl Iterator<Item = String>, denylist: &[String]) -> Vec<String> {
    let mut hits = Vec::new();
    for name in names {
        let name = name.to_lowercase();
        for entry in denylist {
            if name.contains(entry.as_str()) {
                hits.push(entry.clone());
            }
        }
    }
    hits.sort();
    hits.dedup();
    hits
}
