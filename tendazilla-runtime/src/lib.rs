//! Tendazilla Runtime
//!
//! Wires the agents into a run: configuration loading, discovery across
//! sites with strategy fallback, and scoring into a [`RunReport`].

pub mod config;
pub mod discovery;
pub mod pipeline;

pub use config::*;
pub use discovery::*;
pub use pipeline::*;
