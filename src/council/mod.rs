//! Council module - roster selection, probe fan-out and judge synthesis.

mod fanout;
mod judge;
mod orchestrator;
mod roster;

pub use fanout::*;
pub use judge::*;
pub use orchestrator::*;
pub use roster::*;
