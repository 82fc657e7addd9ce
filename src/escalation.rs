use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_WARNINGS: u32 = 3;

/// Named class of monitored behavior. Each category gets its own counter,
/// owned by the monitor that watches for it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ViolationCategory {
    FocusLoss,
    Minimize,
    Resize,
    SettingsAccess,
    Clipboard,
}

impl ViolationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCategory::FocusLoss => "focus",
            ViolationCategory::Minimize => "minimize",
            ViolationCategory::Resize => "resize",
            ViolationCategory::SettingsAccess => "settings",
            ViolationCategory::Clipboard => "clipboard",
        }
    }

    /// Sentence-initial phrase used in warning dialogs.
    fn label(&self) -> &'static str {
        match self {
            ViolationCategory::FocusLoss => "Switching away from the editor",
            ViolationCategory::Minimize => "Minimizing the exam window",
            ViolationCategory::Resize => "Resizing the exam window",
            ViolationCategory::SettingsAccess => "Accessing restricted settings",
            ViolationCategory::Clipboard => "Clipboard activity",
        }
    }
}

/// Per-category violation counter. Monotonic within a session; fresh
/// monitor state (and therefore a zero counter) is built when a new
/// session is registered.
#[derive(Debug, Clone, Default)]
pub struct WarningCounter {
    count: u32,
}

impl WarningCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Warn the user and carry on; `message` names the current and
    /// remaining counts.
    Continue { message: String },
    /// The counter has crossed the maximum; the owning monitor decides
    /// what termination looks like for its category.
    Escalate { message: String },
}

/// Uniform warning-escalation policy shared by all monitors, so thresholds
/// and wording stay consistent. Pure decision logic, no I/O.
///
/// `decide` is the single counting authority: it increments the counter
/// exactly once per call, and monitors must not increment independently.
/// Debouncing duplicate host callbacks is the monitor's job.
#[derive(Debug, Clone, Copy)]
pub struct Escalator {
    max: u32,
}

impl Escalator {
    pub fn new(max: u32) -> Self {
        Self { max }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn decide(&self, category: ViolationCategory, counter: &mut WarningCounter) -> Verdict {
        counter.count += 1;
        let count = counter.count;

        if count > self.max {
            Verdict::Escalate {
                message: format!(
                    "{} was detected {} times.\n\n\
                     This exceeds the maximum allowed warnings ({}).\n\
                     Your exam is now considered null and void.",
                    category.label(),
                    count,
                    self.max
                ),
            }
        } else {
            let remaining = self.max - count;
            Verdict::Continue {
                message: format!(
                    "WARNING: {} may be considered cheating.\n\n\
                     This is warning {} of {}.\n\
                     You have {} warnings remaining.\n\n\
                     If you exceed {} warnings, your exam will be voided.",
                    category.label(),
                    count,
                    self.max,
                    remaining,
                    self.max
                ),
            }
        }
    }
}

impl Default for Escalator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WARNINGS)
    }
}
