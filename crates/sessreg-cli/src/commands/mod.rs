//! CLI subcommand implementations.

pub mod parties;
pub mod sessions;
