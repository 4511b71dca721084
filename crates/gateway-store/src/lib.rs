//! Task persistence (C6): tasks, their ordered steps (normal/reevaluate),
//! and a per-task cost ledger, backed by Postgres through `sqlx`.

pub mod api_keys;
pub mod chat;
pub mod files;
pub mod store;

pub use api_keys::ApiKeyStore;
pub use chat::ChatStore;
pub use files::FileStore;
pub use store::{StepUpdate, TaskStore};

/// Embedded migrations, applied at process startup (spec §6's
/// `sqlx::migrate!` mismatch-handling paragraph).
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();
