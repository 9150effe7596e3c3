//! Root of the `wangr-core` library.

// Prevent accidental direct writes to stdout/stderr in library code. All
// user-visible output must go through the appropriate abstraction (e.g.,
// the TUI or the tracing stack).
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod categorize;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod operation;
pub mod preview;
pub mod resolver;
pub mod sandbox;
pub mod session;

pub use client::AgentClient;
pub use client::StreamingContinuation;
pub use executor::LocalToolExecutor;
pub use resolver::PendingResolver;
pub use session::ApprovalSession;
pub use wangr_protocol::protocol;
