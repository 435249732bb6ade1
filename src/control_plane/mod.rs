//! Execution Control Plane — §4.8.

pub mod client;
pub mod events;
pub mod server;

pub use client::ExecutionClient;
pub use events::WsEvent;
pub use server::{serve, AppState};
