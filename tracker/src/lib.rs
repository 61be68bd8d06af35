//! Household tracker for dog feedings, toilet events and the family diary.
//!
//! All non-UI logic lives in [`backend`]; the binary in `main.rs` wires it to
//! a command line and to the embedded REST server.

pub mod backend;

pub use backend::{create_router, initialize_backend, AppState};
