//! SwapDeck batch client.
//!
//! Talks to the SwapDeck server, keeps the signed-in session, and runs the
//! batch queue: one task per target image, each issuing its variations in
//! order. The binary entrypoint in `main.rs` drives a headless run.

pub mod api;
pub mod blob;
pub mod config;
pub mod download;
pub mod engine;
pub mod error;
pub mod queue;
pub mod session;
