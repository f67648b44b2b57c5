//! CLI subcommands.

pub mod config;
pub mod normalize;
pub mod query;
