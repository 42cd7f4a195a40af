//! Adapters: everything that talks to the outside world. SQLite persistence,
//! the HTTP/SSE transport, external tool clients, and randomness sources.
//! The `services` layer only ever depends on the `domain::ports` traits these
//! modules implement, never on the modules directly.

pub mod http;
pub mod rng;
pub mod sqlite;
pub mod tools;
