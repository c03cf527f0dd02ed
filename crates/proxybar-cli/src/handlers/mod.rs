//! One-shot subcommand handlers.

pub mod check;
pub mod config;
