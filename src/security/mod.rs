//! Response hardening and request throttling.

pub mod headers;
pub mod rate_limit;

pub use headers::{content_security_policy, csp_layer};
pub use rate_limit::{AppRateLimiter, rate_limit_middleware};
