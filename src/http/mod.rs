//! HTTP transport shared by both inventory clients.

pub mod client;
pub mod request;
pub mod retry;

pub use client::ClientSession;
pub use request::{ApiRequest, Method};
pub use retry::{ApiError, AttemptOutcome, RetryPolicy};
