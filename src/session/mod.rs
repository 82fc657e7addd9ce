pub mod context;
pub mod lifecycle;

pub use context::{SessionContext, SessionSnapshot};
pub use lifecycle::{SessionLifecycle, TerminateReason};
