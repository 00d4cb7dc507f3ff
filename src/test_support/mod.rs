//! Shared helpers for unit tests.

pub mod memory_sink;
pub mod socket_guard;
