//! Local key-value persistence on this device.

pub mod connection;
pub mod local_store;
pub mod migration;

pub use connection::DbConnection;
pub use local_store::LocalStore;
pub use migration::MigrationReport;
