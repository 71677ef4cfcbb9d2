//! Armitage, a Docker container watchdog.
//!
//! Single Rust binary. Watches the Docker event stream for abnormal
//! container exits and tails selected container logs for error patterns,
//! then delivers deduplicated, rate-limited alerts to one Telegram chat.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod compose;
pub mod config;
pub mod cooldown;
pub mod dispatch;
pub mod docker;
pub mod events;
pub mod logging;
pub mod logs;
pub mod matcher;
pub mod registry;

pub mod telegram;
