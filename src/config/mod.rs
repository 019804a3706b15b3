//! Configuration management for the tool router

pub mod config;

pub use config::{NudgeRule, RouterConfig};
