//! HTTP surface: router assembly and stand-in handlers.

pub mod handlers;
pub mod server;

pub use server::{AppState, GuardServer};
