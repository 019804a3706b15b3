//! Bounded LRU cache of active server bindings

pub mod tool_cache;

pub use tool_cache::{ActiveBinding, ToolCache};
