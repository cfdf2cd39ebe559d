pub mod agent_queries;
pub mod connection;
pub mod event_log_queries;
pub mod memory_queries;
pub mod migrations;
pub mod scope;
pub mod task_queries;
pub mod utils;

pub use connection::DatabaseConnection;
pub use scope::{ReadScope, ScopeFactory, WriteScope};
