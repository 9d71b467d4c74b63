//! Core data models for council.
//!
//! Epistemic mapping:
//! - K_i (Knowledge): Concrete types with compile-time guarantees
//! - B_i (Beliefs): Wrapped in Result/Option
//! - I^R (Resolvable): Config parameters
//! - I^B (Bounded): Error variants with fallback strategies

mod config;
mod conversation;
mod error;
mod probe;
mod tier;

pub use config::*;
pub use conversation::*;
pub use error::*;
pub use probe::*;
pub use tier::*;
