//! Built-in stage implementations.

mod delay;
mod log;
mod passthrough;

pub use delay::{DelayStage, DelayStats};
pub use log::LogStage;
pub use passthrough::PassThrough;
