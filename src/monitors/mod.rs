pub mod actions;
pub mod clipboard;
pub mod focus;
pub mod processes;
pub mod window;

pub use actions::{ActionDecision, ActionInterceptor};
pub use clipboard::ClipboardMonitor;
pub use focus::FocusMonitor;
pub use processes::{ProcessWatchConfig, ProcessWatchController};
pub use window::{CloseDecision, WindowStateMonitor};
