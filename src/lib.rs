//! Demo chat service with an LLM agent, web search, and content guardrails
//!
//! The service exposes a small HTTP API: clients log in with shared
//! credentials to get a bearer token, then post chat messages. Each turn
//! runs through a topic guardrail, an LLM agent with an optional web
//! search tool, and a reading-time guardrail. Replies carry a `source`
//! provenance label and a `monitored` flag reflecting whether the turn
//! reached the trace backend.
//!
//! Without an LLM API key the agent degrades to canned rule-based
//! replies, so the service stays usable offline.

pub mod agent;
pub mod auth;
pub mod config;
pub mod error;
pub mod guardrails;
pub mod llm;
pub mod observability;
pub mod server;
pub mod testing;
pub mod tools;
pub mod trace;

pub use agent::{AgentReply, AgentSettings, ChatAgent};
pub use auth::TokenStore;
pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};
pub use server::{AppState, ChatRequest, ChatResponse, LoginRequest, LoginResponse};
pub use tools::{Tool, ToolDescription, ToolError, ToolRegistry};
pub use trace::TraceClient;
