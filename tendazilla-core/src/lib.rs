//! Tendazilla Core - domain model for tender discovery and qualification
//!
//! This crate provides the shared types every other crate works with:
//! - Tender records produced by the acquisition strategies
//! - Company profiles used as scoring reference data
//! - Score results and per-criterion breakdowns
//! - Industry keyword inference and synthetic sample data

pub mod error;
pub mod industry;
pub mod profile;
pub mod sample;
pub mod score;
pub mod site;
pub mod tender;
pub mod text;

pub use error::*;
pub use industry::*;
pub use profile::*;
pub use sample::*;
pub use score::*;
pub use site::*;
pub use tender::*;
pub use text::*;

/// Default qualification threshold on the 0-100 scale
pub const DEFAULT_THRESHOLD: u8 = 50;

/// Neutral sub-score used when a tender leaves a criterion unspecified
pub const NEUTRAL_SCORE: u8 = 50;

/// Maximum description length kept on a record
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Minimum title length for a record to be kept
pub const MIN_TITLE_CHARS: usize = 5;
