//! Tendazilla network layer
//!
//! Everything that touches a tender portal goes through here:
//! - HTTP client collaborator with rotating desktop user agents
//! - Per-host rate limiter and bounded exponential-backoff retry
//! - [`ThrottledClient`], which puts every request behind both
//! - Headless-browser collaborator (Chromium behind the `chromium` feature)

pub mod client;
pub mod limiter;
pub mod render;
pub mod retry;
pub mod throttled;

pub use client::*;
pub use limiter::*;
pub use render::*;
pub use retry::*;
pub use throttled::*;
