//! CLI command handling

pub mod handlers;
