//! Seam between the engine and the editor host.
//!
//! The host delivers its callbacks (focus, window, action, keystroke,
//! clipboard) by calling engine methods on one logical event thread; these
//! traits are the opposite direction, the handful of capabilities the
//! monitors need back from the host.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("presentation mode is not available on this host")]
    PresentationUnavailable,
}

/// User-facing notices. `show_warning`/`show_error`/`confirm` are modal;
/// `show_notice` must not block the caller.
pub trait Notifier: Send + Sync {
    fn show_warning(&self, title: &str, message: &str);

    fn show_error(&self, title: &str, message: &str);

    fn show_notice(&self, title: &str, message: &str);

    /// Modal yes/no prompt. Returns true when the user picks `yes_label`.
    fn confirm(&self, title: &str, message: &str, yes_label: &str, no_label: &str) -> bool;
}

/// Control over the host's main window, used to assert the presentation
/// lock. `maximize` is assumed always available; `enter_presentation` may
/// be missing on a given host, in which case enforcement degrades to
/// maximize-only.
pub trait WindowControl: Send + Sync {
    fn maximize(&self);

    fn enter_presentation(&self) -> Result<(), HostError>;
}
