//! # stash-core
//!
//! Core types, traits, and abstractions for the stash content-processing
//! engine.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other stash crates depend on: capture and analysis models, the
//! job queue contract, repository traits, inference backend traits, and the
//! degraded-path [`Outcome`] type used by every capability-calling function.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod outcome;
pub mod similarity;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, ExtractionFailure, Result};
pub use models::*;
pub use outcome::Outcome;
pub use similarity::{cosine_similarity, find_most_similar};
pub use traits::*;
pub use uuid_utils::new_v7;
