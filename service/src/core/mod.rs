//! TruthGen Core Engine
//!
//! Content analysis pipeline, settings and filesystem helpers.

pub mod analysis;
pub mod fs;
pub mod settings;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
