//! # Observability & Tracing
//!
//! [`setup_tracing`] initializes structured logging with the `tracing` crate.
//! The compact format hides the module prefix (`with_target(false)`); the
//! structured fields carry the context instead.
//!
//! ## What Gets Traced
//!
//! - **Service lifecycle** at `info`: start, every translated request, shutdown
//! - **Resolved exceptions** at `info`, with the error, its root cause and the
//!   response chosen for the active content type
//! - **Swallowed failures** at `warn`: finally advice, failed requests, depth limits
//! - **Engine flow** at `debug`: phase entry, advice, actions, forwards, includes
//!
//! ## Usage Examples
//!
//! ```bash
//! RUST_LOG=info cargo run
//! RUST_LOG=debug cargo run
//! RUST_LOG=activity_engine::framework=debug cargo run
//! ```
//!
//! ## Trace Example
//!
//! A `checkout` request whose content fails and is answered by an exception
//! rule, with `RUST_LOG=debug`:
//!
//! ```text
//! DEBUG Preparing activity translet=checkout method=POST carried=false
//! DEBUG Entering phase joinpoint=request
//! DEBUG Entering phase joinpoint=content
//! DEBUG Executing action action=bean[cart.total]#total
//! DEBUG Exception raised error=Failed to execute action bean[cart.total]#total cause=...
//! INFO Responding to raised exception error=... content_type=Some("application/json") response="transform"
//! DEBUG Activity ended translet=Some("checkout")
//! INFO Translated translet=checkout performed=checkout ended=true
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
