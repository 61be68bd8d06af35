//! Shared cloud persistence through a PostgREST endpoint.

pub mod remote_store;

pub use remote_store::RemoteStore;
