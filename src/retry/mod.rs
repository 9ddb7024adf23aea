//! Retry configuration and error types.
//!
//! This module follows the "pure core, imperative shell" split:
//!
//! - **Pure Core**: `RetryPolicy` is just data - a fixed delay and a resend budget
//! - **Declarative**: Describe *what* retry behavior you want; the
//!   [`RetryController`](crate::RetryController) decides *when* to act on it
//!
//! # Quick Start
//!
//! ```rust
//! use reinforced_send::RetryPolicy;
//! use std::time::Duration;
//!
//! // Wait 30 seconds for a response, resend up to 3 times
//! let policy = RetryPolicy::fixed(Duration::from_secs(30))
//!     .with_max_retries(3);
//!
//! assert!(policy.allows(3));
//! assert!(!policy.allows(4));
//! ```
//!
//! # Error Types
//!
//! - [`StartError`]: A start request was rejected (blank message)
//! - [`SendError`]: The host failed to send; logged, never fatal
//! - [`RetryExhausted`]: The session used its whole resend budget

mod error;
mod policy;

pub use error::{RetryExhausted, SendError, StartError};
pub use policy::RetryPolicy;
