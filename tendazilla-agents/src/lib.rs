//! Tendazilla Agents
//!
//! The working parts of a run:
//! - **Acquisition strategies**: RSS feeds, API probing, static markup, rendered pages
//! - **Listing extraction**: tables, repeated cards, JSON-LD, data attributes and
//!   embedded script data into records
//! - **Completion backends**: OpenAI-compatible and Anthropic
//! - **AI assessor**: asks a backend for a fit score and rationale
//! - **Rule and hybrid scorers**: the weighted breakdown and the blended result

pub mod api_probe;
pub mod assessor;
pub mod backend;
pub mod fields;
pub mod hybrid;
pub mod listing;
pub mod rendered;
pub mod rss;
pub mod rule;
pub mod static_markup;
pub mod strategy;
pub mod weights;

#[cfg(test)]
mod testing;

pub use api_probe::*;
pub use assessor::*;
pub use backend::*;
pub use hybrid::*;
pub use listing::*;
pub use rendered::*;
pub use rss::*;
pub use rule::*;
pub use static_markup::*;
pub use strategy::*;
pub use weights::*;
