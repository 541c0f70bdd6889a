//! Builtin tools available to the chat agent

pub mod web_search;

pub use web_search::WebSearchTool;
