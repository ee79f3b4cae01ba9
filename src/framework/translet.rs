//! # Translet
//!
//! The request-scoped view handed to beans and request handlers.
//!
//! A [`Translet`] borrows the running [`Activity`] mutably, so everything a
//! bean does (reading parameters, recording results, reserving a response,
//! registering an aspect) goes straight to the activity that owns the state.
//! The per-translet data itself lives in [`TransletScope`], which the
//! activity recreates on every forward hop.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::framework::action::{Bean, BeanRef};
use crate::framework::activity::Activity;
use crate::framework::adapter::ResponseAdapter;
use crate::framework::advice::{AdviceType, Joinpoint};
use crate::framework::error::ActivityError;
use crate::framework::response::{Response, TransformResponse};
use crate::framework::result::ProcessResult;
use crate::model::{AspectRule, MethodType};

macro_rules! advice_result_getters {
    ($($kind:ident),+) => {
        paste::paste! {
            $(
                pub fn [<$kind _advice_result>](&self, aspect_id: &str) -> Option<&Value> {
                    self.[<$kind _results>].get(aspect_id)
                }
            )+
        }
    };
}

macro_rules! advice_result_delegates {
    ($($kind:ident),+) => {
        paste::paste! {
            $(
                pub fn [<$kind _advice_result>](&self, aspect_id: &str) -> Option<&Value> {
                    self.activity.translet_scope().[<$kind _advice_result>](aspect_id)
                }
            )+
        }
    };
}

/// Data of one translet execution.
#[derive(Default)]
pub struct TransletScope {
    name: String,
    process_result: Option<ProcessResult>,
    advice_beans: HashMap<String, Arc<dyn Bean>>,
    before_results: HashMap<String, Value>,
    after_results: HashMap<String, Value>,
    finally_results: HashMap<String, Value>,
}

impl TransletScope {
    pub(crate) fn new(name: &str, carried: Option<ProcessResult>) -> Self {
        Self {
            name: name.to_string(),
            process_result: carried,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn process_result(&self) -> Option<&ProcessResult> {
        self.process_result.as_ref()
    }

    pub(crate) fn process_result_mut(&mut self) -> Option<&mut ProcessResult> {
        self.process_result.as_mut()
    }

    pub(crate) fn set_process_result(&mut self, result: Option<ProcessResult>) {
        self.process_result = result;
    }

    pub(crate) fn take_process_result(&mut self) -> Option<ProcessResult> {
        self.process_result.take()
    }

    /// Existing result, or a new one carrying `name` as its root name.
    pub(crate) fn touch_process_result(&mut self, name: Option<&str>) -> &mut ProcessResult {
        self.process_result
            .get_or_insert_with(|| ProcessResult::new(name.map(str::to_string)))
    }

    pub fn advice_bean(&self, aspect_id: &str) -> Option<Arc<dyn Bean>> {
        self.advice_beans.get(aspect_id).cloned()
    }

    pub(crate) fn put_advice_bean(&mut self, aspect_id: &str, bean: Arc<dyn Bean>) {
        self.advice_beans.insert(aspect_id.to_string(), bean);
    }

    pub(crate) fn put_advice_result(&mut self, advice_type: AdviceType, aspect_id: &str, value: Value) {
        let results = match advice_type {
            AdviceType::Before | AdviceType::Around => &mut self.before_results,
            AdviceType::After => &mut self.after_results,
            AdviceType::Finally => &mut self.finally_results,
        };
        results.insert(aspect_id.to_string(), value);
    }

    advice_result_getters!(before, after, finally);
}

impl fmt::Debug for TransletScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransletScope")
            .field("name", &self.name)
            .field("process_result", &self.process_result)
            .field("advice_beans", &self.advice_beans.keys().collect::<Vec<_>>())
            .field("before_results", &self.before_results)
            .field("after_results", &self.after_results)
            .field("finally_results", &self.finally_results)
            .finish()
    }
}

/// Facade over the running activity.
pub struct Translet<'a> {
    activity: &'a mut Activity,
}

impl<'a> Translet<'a> {
    pub(crate) fn new(activity: &'a mut Activity) -> Self {
        Self { activity }
    }

    pub fn name(&self) -> &str {
        self.activity.translet_scope().name()
    }

    pub fn request_method(&self) -> MethodType {
        self.activity.request().method()
    }

    pub fn joinpoint(&self) -> Joinpoint {
        self.activity.joinpoint()
    }

    /// Name of the translet that included this one, if any.
    pub fn outer_translet_name(&self) -> Option<&str> {
        self.activity.outer_translet_name()
    }

    // --- Request data ---

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.activity.request().parameter(name)
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        self.activity.request().parameters()
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.activity.request_mut().set_parameter(name, value);
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.activity.request().attribute(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        self.activity.request().attributes()
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.activity.request_mut().set_attribute(name, value);
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.activity.request_mut().remove_attribute(name)
    }

    // --- Results ---

    pub fn process_result(&self) -> Option<&ProcessResult> {
        self.activity.process_result()
    }

    pub fn touch_process_result(&mut self, name: Option<&str>) -> &mut ProcessResult {
        self.activity.translet_scope_mut().touch_process_result(name)
    }

    pub fn set_process_result(&mut self, result: Option<ProcessResult>) {
        self.activity.translet_scope_mut().set_process_result(result);
    }

    /// Value recorded by the action with the given id.
    pub fn result_value(&self, action_id: &str) -> Option<&Value> {
        self.activity.result_value(action_id)
    }

    pub fn aspect_advice_bean(&self, aspect_id: &str) -> Option<Arc<dyn Bean>> {
        self.activity.translet_scope().advice_bean(aspect_id)
    }

    advice_result_delegates!(before, after, finally);

    // --- Environment ---

    pub fn setting(&self, name: &str) -> Option<Value> {
        self.activity.setting(name)
    }

    pub fn bean(&self, bean: &BeanRef) -> Result<Arc<dyn Bean>, ActivityError> {
        self.activity.context().beans().resolve(bean)
    }

    pub fn bean_of<B: Bean>(&self) -> Result<Arc<B>, ActivityError> {
        self.activity.context().beans().bean_of::<B>()
    }

    pub fn response_adapter(&self) -> &ResponseAdapter {
        self.activity.response_adapter()
    }

    pub fn response_adapter_mut(&mut self) -> &mut ResponseAdapter {
        self.activity.response_adapter_mut()
    }

    /// Registers a hook run when the request scope is torn down.
    pub fn on_request_destroy(&mut self, name: impl Into<String>, hook: impl FnOnce() + Send + 'static) {
        self.activity.request_scope_mut().on_destroy(name, hook);
    }

    // --- Responses ---

    /// Reserves `response`; remaining request and content work is skipped
    /// and the RESPONSE phase commits it instead of the declared one.
    pub fn response(&mut self, response: Response) {
        self.activity.reserve_response(response);
    }

    pub fn transform(&mut self, rule: TransformResponse) {
        self.response(Response::Transform(rule));
    }

    pub fn dispatch(&mut self, view: &str, immediately: bool) {
        let response = self.replicate_or(Response::dispatch(view), view, immediately);
        self.response(response);
    }

    pub fn redirect(&mut self, target: &str, immediately: bool) {
        let response = self.replicate_or(Response::redirect(target), target, immediately);
        self.response(response);
    }

    /// Redirect with extra query parameters.
    pub fn redirect_with_parameters<I, K, V>(&mut self, target: &str, parameters: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let response = parameters
            .into_iter()
            .fold(Response::redirect(target), |r, (k, v)| r.with_parameter(k, v));
        self.response(response);
    }

    pub fn forward(&mut self, translet: &str, immediately: bool) {
        let response = self.replicate_or(Response::forward(translet), translet, immediately);
        self.response(response);
    }

    /// Reuses the declared response of the same variant with a new target,
    /// keeping its parameters and attributes.
    fn replicate_or(&self, fresh: Response, target: &str, immediately: bool) -> Response {
        if !immediately {
            if let Some(declared) = self.activity.declared_response() {
                if declared.is_same_type(&fresh) {
                    return declared.replicate_with_target(target);
                }
            }
        }
        fresh
    }

    pub fn is_response_reserved(&self) -> bool {
        self.activity.is_response_reserved()
    }

    // --- Engine ---

    /// Runs another translet in a nested activity and returns its result.
    pub fn include(&mut self, translet: &str) -> Result<Value, ActivityError> {
        self.activity.include(translet, None, Vec::new())
    }

    /// See [`Activity::register_aspect_rule`].
    pub fn register_aspect_rule(&mut self, aspect: AspectRule) -> Result<bool, ActivityError> {
        self.activity.register_aspect_rule(aspect)
    }

    pub fn is_exception_raised(&self) -> bool {
        self.activity.is_exception_raised()
    }

    pub fn raised_exception(&self) -> Option<&ActivityError> {
        self.activity.raised_exception()
    }
}
