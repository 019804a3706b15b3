//! Error types and handling for the tool router

pub mod error;

pub use error::{Result, RouterError};
