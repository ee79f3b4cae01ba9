//! # Activity Engine
//!
//! > **A request-processing pipeline driven by declarative rules.**
//!
//! A *translet* is a named rule describing how one request is handled: what to
//! check in the request, which actions produce content, and how the response
//! is rendered. An [`Activity`](framework::Activity) executes a translet through
//! four nested phases, with aspect advice wrapped around each of them.
//!
//! ```text
//! TRANSLET
//!   ├─ REQUEST   attributes, mandatory parameters, request hook
//!   ├─ CONTENT   action lists  ──▶  ProcessResult
//!   └─ RESPONSE  transform | dispatch | redirect | forward
//! ```
//!
//! ## 🏗️ Design Notes
//!
//! ### 1. Advice around every phase
//! Aspects bind BEFORE, AFTER, AROUND and FINALLY advice to a joinpoint. The
//! registries are baked once per translet when the context is built and shared
//! read-only; aspects registered while an activity runs go into a private
//! overlay and never leak into other activities.
//!
//! ### 2. Errors become responses
//! An error escaping a phase is recorded (the first one wins) and offered to
//! the exception rules of that phase. A rule that has a response for the
//! active content type discards partial output and answers instead. Errors
//! nobody handles are wrapped per phase and returned from `perform()`.
//!
//! ### 3. Forward is re-entry
//! A forward response prepares the target translet inside the same activity
//! and carries the current result tree along, so the target sees everything
//! produced so far. Hops are bounded by
//! [`EngineConfig::max_forward_depth`](framework::EngineConfig::max_forward_depth).
//!
//! ### 4. Observability
//! `tracing` everywhere with structured fields. See the
//! [`lifecycle::tracing`] module for levels and a sample trace.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Rules ([`model`])
//! - **Role**: Declarative, immutable descriptions of translets and aspects.
//! - **Key items**: [`TransletRule`](model::TransletRule), [`AspectRule`](model::AspectRule),
//!   [`ExceptionHandlingRule`](model::ExceptionHandlingRule).
//!
//! ### 2. The Engine ([`framework`])
//! - **Role**: Executes rules. Owns the result tree, advice, actions and responses.
//! - **Key items**: [`ActivityContext`](framework::ActivityContext),
//!   [`Activity`](framework::Activity), [`Translet`](framework::Translet),
//!   [`Bean`](framework::Bean).
//!
//! ### 3. The Service ([`lifecycle`])
//! - **Role**: Runs one activity per request behind a channel and shuts down cleanly.
//! - **Key items**: [`TransletSystem`](lifecycle::TransletSystem),
//!   [`TransletService`](lifecycle::TransletService).
//!
//! ### 4. The Interface ([`clients`])
//! - **Role**: Typed handles for callers of the service.
//! - **Key items**: [`TransletClient`](clients::TransletClient), [`Translator`](clients::Translator).
//!
//! ## 🚀 Quick Start
//!
//! ```
//! use activity_engine::framework::{ActivityContext, Executable, Response};
//! use activity_engine::model::TransletRule;
//! use serde_json::json;
//!
//! let context = ActivityContext::builder()
//!     .translet(
//!         TransletRule::new("greet")
//!             .action(Executable::echo("msg", json!("hi")))
//!             .response(Response::json()),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let mut activity = context.new_activity();
//! activity.ready("greet").unwrap();
//! activity.perform().unwrap();
//! assert_eq!(activity.response_adapter().body(), Some(r#"{"msg":"hi"}"#));
//! ```
//!
//! ### Running the Demo
//!
//! ```bash
//! RUST_LOG=info cargo run
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod clients;
pub mod framework;
pub mod lifecycle;
pub mod model;
