//! Completion clients.

mod completion;
mod llm_client;
mod rate_limiter;

pub use completion::*;
pub use llm_client::*;
pub use rate_limiter::*;
