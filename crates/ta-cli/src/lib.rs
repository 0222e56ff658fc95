//! Time and attendance CLI library.
//!
//! This crate provides the CLI interface for the time and attendance engine.

mod cli;
pub mod commands;
mod config;

pub use cli::{ActorArgs, Cli, Commands, JobsAction, WhenArgs};
pub use config::Config;
