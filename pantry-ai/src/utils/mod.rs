//! Shared helpers for pantry-ai

pub mod retry;

pub use retry::{retry_with_backoff, RetryPolicy};
