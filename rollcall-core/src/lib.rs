//! # Rollcall Core Library
//!
//! Daily poll dispatch for a Telegram chat: the poll action, the daily trigger,
//! the command router, the supervisor that runs them side by side, and the
//! Bot API transport.

pub mod dispatch;
pub mod models;
pub mod router;
pub mod scheduler;
pub mod services;
pub mod supervisor;
pub mod transport;
