//! API interaction layer: the HTTP generation client and the retry policy.
//!
//! These modules handle everything between the
//! [`StorylinePipeline`](crate::plan::pipeline::StorylinePipeline) loop and
//! the chat-completions API:
//!
//! - [`client`] — [`GenerationClient`](client::GenerationClient), the
//!   reference [`Generator`](crate::Generator) implementation. Posts
//!   JSON-mode requests for plan batches, extracts a JSON object from fenced
//!   or prose-wrapped model output, surfaces failures as classifiable error
//!   strings.
//! - [`retry`] — error-class detection (rate-limit / transient / permanent)
//!   with per-class exponential backoff. Backoff delays are computed by a
//!   pure function so the policy is testable without real sleeps; only
//!   [`with_retry`](retry::with_retry) actually waits.

pub mod client;
pub mod retry;

// Re-export commonly used items at the module level.
pub use client::GenerationClient;
pub use retry::{ErrorClass, RetryPolicy, with_retry};
