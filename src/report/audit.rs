use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use chrono::Local;
use log::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLevel {
    Info,
    Warning,
    Critical,
}

impl AuditLevel {
    fn as_str(&self) -> &'static str {
        match self {
            AuditLevel::Info => "INFO",
            AuditLevel::Warning => "WARNING",
            AuditLevel::Critical => "CRITICAL",
        }
    }
}

/// Append-only local security log, one file per process start. Never
/// rewritten; appends are serialized because both the host event thread and
/// the background process watcher write here.
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLog {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create audit log directory {}", dir.display()))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("exam_security_log_{stamp}.txt"));

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open audit log {}", path.display()))?;

        writeln!(file, "Exam Security Log")
            .and_then(|_| {
                writeln!(
                    file,
                    "Started: {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S")
                )
            })
            .and_then(|_| writeln!(file, "----------------------------------------\n"))
            .context("failed to write audit log header")?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. Failures are logged and swallowed: the audit log
    /// is a side channel and must never break the monitor that called it.
    pub fn append(&self, level: AuditLevel, event: &str, session_id: &str, user: &str) {
        let entry = format!(
            "[{}] {}\n  Time: {}\n  Session ID: {}\n  User: {}\n----------------------------------------\n",
            level.as_str(),
            event,
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            session_id,
            user,
        );

        let mut guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = guard.write_all(entry.as_bytes()) {
            error!("failed to append to audit log {}: {err}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("examguard-audit-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_creates_file_with_header() {
        let dir = temp_dir();
        let audit = AuditLog::create(&dir).unwrap();

        let contents = fs::read_to_string(audit.path()).unwrap();
        assert!(contents.starts_with("Exam Security Log\n"));
        assert!(contents.contains("Started: "));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_append_writes_structured_entry() {
        let dir = temp_dir();
        let audit = AuditLog::create(&dir).unwrap();

        audit.append(AuditLevel::Warning, "Focus loss detected", "42", "Alice (R001)");
        audit.append(AuditLevel::Critical, "Exam voided", "42", "Alice (R001)");

        let contents = fs::read_to_string(audit.path()).unwrap();
        assert!(contents.contains("[WARNING] Focus loss detected"));
        assert!(contents.contains("  Session ID: 42"));
        assert!(contents.contains("  User: Alice (R001)"));
        assert!(contents.contains("[CRITICAL] Exam voided"));

        // Entries accumulate, never replace.
        let warning_index = contents.find("[WARNING]").unwrap();
        let critical_index = contents.find("[CRITICAL]").unwrap();
        assert!(warning_index < critical_index);

        let _ = fs::remove_dir_all(dir);
    }
}
