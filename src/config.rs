use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::PathBuf, sync::RwLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProctorConfig {
    /// Base URL of the remote collector.
    pub collector_url: String,
    /// Warnings tolerated per violation category before the session is voided.
    pub max_warnings: u32,
    /// Manual resizes below this many pixels on both axes are treated as
    /// OS-driven layout jitter and ignored.
    pub resize_threshold_px: u32,
    /// Per-request timeout for collector calls.
    pub report_timeout_secs: u64,
    pub process_check_initial_delay_secs: u64,
    pub process_check_interval_secs: u64,
    /// Case-insensitive substrings matched against running process names.
    pub suspicious_apps: Vec<String>,
    /// Menu/keyboard action ids blocked while a session is active, with the
    /// human label shown in the warning dialog.
    pub restricted_actions: BTreeMap<String, String>,
    /// Directory holding the SQLite session record and the audit logs.
    pub data_dir: PathBuf,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            collector_url: "http://localhost:8080".into(),
            max_warnings: 3,
            resize_threshold_px: 20,
            report_timeout_secs: 5,
            process_check_initial_delay_secs: 10,
            process_check_interval_secs: 30,
            suspicious_apps: default_suspicious_apps(),
            restricted_actions: default_restricted_actions(),
            data_dir: PathBuf::from(".examguard"),
        }
    }
}

fn default_suspicious_apps() -> Vec<String> {
    [
        // Browsers
        "chrome", "firefox", "safari", "edge",
        // Messaging
        "telegram", "whatsapp", "slack", "discord",
        // Text editors
        "notepad", "textedit", "word", "excel",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_restricted_actions() -> BTreeMap<String, String> {
    [
        ("ShowSettings", "Settings"),
        ("WelcomeScreen.Settings", "Settings"),
        ("ShowProjectStructureSettings", "Project Structure Settings"),
        ("ShowApplicationSettings", "Application Settings"),
        ("PluginSettings", "Plugin Settings"),
        ("ConfigurePlugins", "Plugin Management"),
        ("Plugins.InstallPlugin", "Plugin Management"),
        ("Plugins.UninstallPlugin", "Plugin Management"),
        ("Plugins.DisablePlugins", "Plugin Management"),
        ("ExternalTools", "External Tools"),
        ("ExternalToolsGroup", "External Tools"),
        ("Terminal.OpenInTerminal", "Terminal"),
        ("OpenInBrowser", "Browser"),
        ("ExportSettings", "Settings Export"),
        ("ImportSettings", "Settings Import"),
        ("SearchEverywhere", "Search Everywhere"),
        ("GotoAction", "Find Action"),
        ("TogglePresentationMode", "Presentation Mode Toggle"),
        ("ToggleFullScreen", "Full Screen Toggle"),
        ("RestartIde", "Restart"),
        ("Exit", "Exit"),
    ]
    .into_iter()
    .map(|(id, label)| (id.to_string(), label.to_string()))
    .collect()
}

/// On-disk configuration store: loads once at startup, falls back to
/// defaults when the file is missing or unreadable, persists on update.
pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<ProctorConfig>,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            ProctorConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> ProctorConfig {
        self.data.read().unwrap().clone()
    }

    pub fn update(&self, config: ProctorConfig) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        *guard = config;
        self.persist(&guard)
    }

    fn persist(&self, data: &ProctorConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write config to {}", self.path.display()))
    }
}
