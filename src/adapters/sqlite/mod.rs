//! SQLite persistence.

pub mod checkpoint_store;
pub mod connection;
pub mod migrations;

pub use checkpoint_store::SqliteCheckpointStore;
pub use connection::{create_pool, create_test_pool, ConnectionError};
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
