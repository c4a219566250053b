//! Database models, schema and the SQLite backend

pub mod init;
pub mod models;
pub mod poller;
pub mod sqlite;

pub use init::*;
pub use models::*;
pub use poller::ChangePoller;
pub use sqlite::SqliteBackend;
