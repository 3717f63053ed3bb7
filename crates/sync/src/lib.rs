pub mod context;
pub mod engine;
pub mod notify;
pub mod projector;
pub mod render;
pub mod scheduler;
pub mod summary;

pub use context::{RunContext, RunStats};
pub use engine::{RunOutcome, RunReport, SyncEngine};
pub use notify::{Notice, Notifier, TracingNotifier};
pub use projector::Projector;
pub use render::Clock;
pub use scheduler::{SyncRunner, spawn_sync_task};
pub use summary::RunSummary;
