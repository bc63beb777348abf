//! `PairChat` relay server library.
//!
//! Pairs anonymous WebSocket clients into two-party rooms through a shared
//! waiting queue, and relays chat messages between server processes over a
//! shared pub/sub channel. Exposed as a library for tests and embedding.

pub mod config;
pub mod groups;
pub mod matchmaker;
pub mod redis_store;
pub mod relay;
pub mod server;
pub mod session;
pub mod store;
