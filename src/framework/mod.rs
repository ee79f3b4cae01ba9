//! The activity engine and everything it executes.
//!
//! # Main Components
//!
//! - [`Activity`] - Runs one translet through its phases
//! - [`ActivityContext`] - Shared rules, beans and renderers, built with [`ContextBuilder`]
//! - [`Translet`] - The view beans get of the running activity
//! - [`Executable`] - Bean, echo, header and include actions
//! - [`Response`] - Transform, dispatch, redirect and forward
//! - [`ProcessResult`] - The tree of action results
//!
//! # Testing
//!
//! See [`mock`] module for a scripted bean and a mock service client.

pub mod action;
pub mod activity;
pub mod adapter;
pub mod advice;
pub mod config;
pub mod context;
pub mod error;
pub mod mock;
pub mod response;
pub mod result;
pub mod token;
pub mod translet;

pub use action::{Bean, BeanAction, BeanRef, EchoAction, Executable, HeaderAction, IncludeAction};
pub use activity::Activity;
pub use adapter::{RequestAdapter, RequestScope, ResponseAdapter};
pub use advice::{AdviceType, AspectAdviceRule, AspectAdviceRuleRegistry, Joinpoint, TransletAdvice};
pub use config::EngineConfig;
pub use context::{ActivityContext, BeanRegistry, ContextBuilder, RequestHandler};
pub use error::{ActivityError, BeanError};
pub use response::{
    DispatchResponse, ForwardResponse, RedirectResponse, Renderer, Response, TransformFormat,
    TransformResponse, ViewDispatcher, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT,
};
pub use result::{ActionOutcome, ActionResult, ContentResult, ProcessResult};
pub use token::TokenResolver;
pub use translet::{Translet, TransletScope};
