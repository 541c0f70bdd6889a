//! Observability infrastructure
//!
//! Structured logging configuration for the service.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
