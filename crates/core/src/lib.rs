//! Domain types and pure rules shared by the SwapDeck server and client.
//!
//! Nothing in here performs I/O. The admission counter is the only piece of
//! shared mutable state and it is lock-free.

pub mod accounts;
pub mod admission;
pub mod dimensions;
pub mod error;
pub mod generation;
pub mod types;
pub mod uploads;
