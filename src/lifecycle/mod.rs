//! # Service Lifecycle
//!
//! Runs the engine behind a channel and tears it down cleanly.
//!
//! ## Main Components
//!
//! - [`TransletService`] - Receive loop; one activity per request on the blocking pool
//! - [`TransletSystem`] - Starts the service and owns its task handle
//! - [`setup_tracing`] - Initializes the tracing/logging infrastructure
//!
//! ## Graceful Shutdown
//!
//! 1. **Drop all clients** - Closes the sender side of the channel
//! 2. **Service detects closure** - `receiver.recv()` returns `None`
//! 3. **In-flight activities finish** - Their responders still get answered
//! 4. **Await completion** - [`TransletSystem::shutdown`] joins the service task
//!
//! Client clones held elsewhere keep the channel open, so drop them before
//! shutting down.
//!
//! **Usage:**
//! ```bash
//! RUST_LOG=info cargo run      # Service lifecycle and resolved errors
//! RUST_LOG=debug cargo run     # Phases, advice, actions, forwards
//! ```

pub mod service;
pub mod tracing;
pub mod translet_system;

pub use service::*;
pub use tracing::*;
pub use translet_system::*;
