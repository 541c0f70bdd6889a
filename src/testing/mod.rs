//! Testing utilities and mock implementations

pub mod mocks;

pub use mocks::MockLlmProvider;
