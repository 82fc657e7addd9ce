//! Fire-and-forget delivery of security events.
//!
//! Monitors call [`Reporter::report`], which appends to the local audit log
//! and queues the event on an unbounded channel; a background worker drains
//! the channel and posts to the collector. Delivery failures cost one log
//! line and are otherwise swallowed: reporting is a side channel, never a
//! dependency of the enforcement state machines.

mod audit;
mod collector;

pub use audit::{AuditLevel, AuditLog};
pub use collector::{
    CollectorClient, RegistrationError, SessionDescriptor, SnippetPayload, SnippetType,
};

#[cfg(test)]
pub(crate) use collector::stub_server;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{EventKind, SecurityEvent};

#[derive(Clone)]
pub struct Reporter {
    tx: mpsc::UnboundedSender<SecurityEvent>,
    audit: Arc<AuditLog>,
}

impl Reporter {
    /// Audit locally and queue for delivery. Never blocks and never fails
    /// toward the caller.
    pub fn report(&self, event: SecurityEvent) {
        self.audit.append(
            audit_level(event.kind),
            event.kind.as_str(),
            &event.session_id,
            &event.user_label(),
        );

        if self.tx.send(event).is_err() {
            warn!("event reporter is stopped; event dropped after audit");
        }
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }
}

fn audit_level(kind: EventKind) -> AuditLevel {
    match kind {
        EventKind::ClipboardCopy | EventKind::ClipboardPaste | EventKind::SessionEnded => {
            AuditLevel::Info
        }
        EventKind::FocusLost
        | EventKind::WindowMinimized
        | EventKind::WindowResized
        | EventKind::SettingsBlocked
        | EventKind::SuspiciousProcess => AuditLevel::Warning,
        EventKind::SessionVoided => AuditLevel::Critical,
    }
}

/// Owns the background delivery task: a start/stop pair around a
/// cancellation token.
pub struct ReporterController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

/// Spawn the delivery worker. Must be called within a tokio runtime.
pub fn spawn_reporter(
    collector: CollectorClient,
    audit: Arc<AuditLog>,
) -> (Reporter, ReporterController) {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel_token = CancellationToken::new();
    let handle = tokio::spawn(report_loop(rx, collector, cancel_token.clone()));

    (
        Reporter { tx, audit },
        ReporterController {
            handle: Some(handle),
            cancel_token: Some(cancel_token),
        },
    )
}

impl ReporterController {
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.handle.is_none() {
            bail!("reporter not running");
        }

        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("reporter task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

async fn report_loop(
    mut rx: mpsc::UnboundedReceiver<SecurityEvent>,
    collector: CollectorClient,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(event) = received else { break };
                deliver(&collector, event).await;
            }
            _ = cancel_token.cancelled() => {
                info!("event reporter shutting down");
                break;
            }
        }
    }
}

/// Clipboard events feed the collector's dedicated snippet channel in
/// addition to the unified event stream; everything else posts to the
/// event endpoint only.
fn snippet_type_for(kind: EventKind) -> Option<SnippetType> {
    match kind {
        EventKind::ClipboardCopy => Some(SnippetType::Copied),
        EventKind::ClipboardPaste => Some(SnippetType::Pasted),
        _ => None,
    }
}

async fn deliver(collector: &CollectorClient, event: SecurityEvent) {
    if let Some(snippet_type) = snippet_type_for(event.kind) {
        let payload = SnippetPayload {
            session: event.session_id.clone(),
            client_name: event.client_name.clone(),
            content: event.payload.get("content").cloned().unwrap_or_default(),
            snippet_type,
            created_at: event.timestamp,
        };
        match collector.post_snippet(&payload).await {
            Ok(status) => debug!("snippet delivered, status {status}"),
            Err(err) => warn!("snippet delivery failed: {err}"),
        }
    }

    match collector.post_event(&event).await {
        Ok(status) if status.is_success() => {
            debug!("{} event delivered", event.kind.as_str());
        }
        Ok(status) => warn!("{} event rejected, status {status}", event.kind.as_str()),
        Err(err) => warn!("{} event delivery failed: {err}", event.kind.as_str()),
    }
}
