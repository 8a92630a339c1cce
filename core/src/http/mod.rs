//! Shared HTTP plumbing. Every call to an MDM or to Snipe-IT goes through a
//! [`RetryingClient`], which owns pacing, backoff and the per-run counters.

mod client;
mod retry;

pub use client::HttpStats;
pub use client::RetryingClient;
pub use retry::RetryPolicy;
pub use retry::parse_retry_after;
