//! Shared protocol definitions for the `PairChat` wire format.

pub mod codec;
pub mod event;
pub mod relay;
pub mod room;
