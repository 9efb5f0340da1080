//! Data models for rollcall

pub mod command;
pub mod configuration;
pub mod poll;
pub mod schedule;

pub use command::*;
pub use configuration::*;
pub use poll::*;
pub use schedule::*;
