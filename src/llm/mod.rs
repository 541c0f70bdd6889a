//! LLM provider abstraction layer
//!
//! Provider-agnostic interface for chat completions with tool use.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
