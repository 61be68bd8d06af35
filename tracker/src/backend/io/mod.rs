//! # IO Module
//!
//! Interface layer exposing the domain services to clients. Currently the
//! REST API used by the web client; the command line lives in `main.rs`.

pub mod rest;
