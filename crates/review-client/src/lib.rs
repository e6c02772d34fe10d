//! # Review Client
//!
//! Request layer between the review console and the evaluation backend.
//! The gateway holds no state: every call is a single request whose result
//! is returned to the caller, failures included. Nothing is retried.

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;

pub use config::ClientConfig;
pub use error::{ErrorSeverity, GatewayError, Result};
pub use gateway::TestCaseGateway;
pub use http::HttpGateway;
