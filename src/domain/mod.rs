//! Pure domain layer: entities, ports, and error types. No I/O, no framework
//! dependency — everything here should be understandable without knowing
//! SQLite or axum exist.

pub mod error;
pub mod models;
pub mod ports;
