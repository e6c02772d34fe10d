//! Constants for the review console
//!
//! This crate provides centralized constants that can be used across
//! multiple crates without creating circular dependencies.

/// Base URL of the evaluation backend when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:9000";

/// Environment variable holding the backend base URL
pub const ENV_API_URL: &str = "REVIEW_API_URL";

/// Environment variable toggling a collection reload after each mutation
pub const ENV_RELOAD_AFTER_MUTATION: &str = "REVIEW_RELOAD_AFTER_MUTATION";

/// User agent sent with every gateway request
pub const DEFAULT_USER_AGENT: &str = concat!("review-console/", env!("CARGO_PKG_VERSION"));

/// Prompt collection resource
pub const PROMPTS_PATH: &str = "prompts";

/// Test case collection resource nested under a prompt
pub const TEST_CASES_SEGMENT: &str = "testcases";

/// Prompt improvement resource nested under a prompt
pub const IMPROVE_SEGMENT: &str = "improve";

/// Single test case resource (create/update/delete)
pub const TEST_CASE_PATH: &str = "testcase";

/// Default tracing filter for the console binary
pub const DEFAULT_LOG_FILTER: &str = "review=info,review_core=info,review_client=info";
