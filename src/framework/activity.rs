//! # Activity Engine
//!
//! An [`Activity`] runs one translet through four nested phases:
//!
//! ```text
//! TRANSLET ─┬─ REQUEST   request hook
//!           ├─ CONTENT   action lists → ProcessResult
//!           └─ RESPONSE  transform | dispatch | redirect | forward
//! ```
//!
//! Every phase runs BEFORE advice, its core work, AFTER advice, and then,
//! no matter what happened, FINALLY advice. Errors escaping a phase are
//! first offered to the exception rules of that phase's registry. A rule
//! that finds a response for the active content type replaces the output
//! and ends the activity; otherwise the error is wrapped and travels to
//! the next outer phase.
//!
//! A forward response does not end the activity. Once the TRANSLET phase
//! has unwound, the engine prepares the target translet, carries the
//! current [`ProcessResult`] over, and performs again.
//!
//! ## Lifecycle
//!
//! ```
//! use activity_engine::framework::{ActivityContext, Executable, Response};
//! use activity_engine::model::TransletRule;
//!
//! let context = ActivityContext::builder()
//!     .translet(
//!         TransletRule::new("hello")
//!             .action(Executable::echo("who", "${name:world}"))
//!             .response(Response::text("hello @{who}")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let mut activity = context.new_activity();
//! activity.request_mut().set_parameter("name", "kim");
//! activity.ready("hello").unwrap();
//! activity.perform().unwrap();
//! activity.finish();
//!
//! assert!(activity.is_activity_ended());
//! assert_eq!(activity.response_adapter().body(), Some("hello kim"));
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::framework::action::{Bean, BeanRef, EchoAction, Executable};
use crate::framework::adapter::{RequestAdapter, RequestScope, ResponseAdapter};
use crate::framework::advice::{AdviceType, AspectAdviceRule, Joinpoint, JoinpointRegistries};
use crate::framework::context::ActivityContext;
use crate::framework::error::{ActivityError, BeanError};
use crate::framework::response::{Response, TransformFormat, TransformResponse};
use crate::framework::result::{ActionOutcome, ProcessResult};
use crate::framework::token::{self, TokenResolver};
use crate::framework::translet::{Translet, TransletScope};
use crate::model::{
    ActionList, AspectRule, ContentList, ExceptionHandlingRule, MethodType, ResponseRule, TransletRule,
};

#[derive(Debug, Clone)]
struct ForwardTarget {
    name: String,
    method: MethodType,
}

/// One execution of a translet.
pub struct Activity {
    context: Arc<ActivityContext>,
    trail: Vec<String>,
    request: RequestAdapter,
    response: ResponseAdapter,
    request_scope: RequestScope,
    rule: Option<Arc<TransletRule>>,
    response_rule: Option<Arc<ResponseRule>>,
    scope: TransletScope,
    advice: JoinpointRegistries,
    joinpoint: Joinpoint,
    raised: Option<ActivityError>,
    ended: bool,
    reserved: Option<Response>,
    pending_forward: Option<ForwardTarget>,
    without_response: bool,
    forward_depth: usize,
}

impl Activity {
    pub fn new(context: Arc<ActivityContext>) -> Self {
        let method = context.config().default_request_method;
        Self::with_trail(context, Vec::new(), RequestAdapter::new(method))
    }

    fn with_trail(context: Arc<ActivityContext>, trail: Vec<String>, request: RequestAdapter) -> Self {
        Self {
            context,
            trail,
            request,
            response: ResponseAdapter::default(),
            request_scope: RequestScope::default(),
            rule: None,
            response_rule: None,
            scope: TransletScope::default(),
            advice: JoinpointRegistries::default(),
            joinpoint: Joinpoint::Translet,
            raised: None,
            ended: false,
            reserved: None,
            pending_forward: None,
            without_response: false,
            forward_depth: 0,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn context(&self) -> &Arc<ActivityContext> {
        &self.context
    }

    pub fn request(&self) -> &RequestAdapter {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut RequestAdapter {
        &mut self.request
    }

    pub fn response_adapter(&self) -> &ResponseAdapter {
        &self.response
    }

    pub fn response_adapter_mut(&mut self) -> &mut ResponseAdapter {
        &mut self.response
    }

    pub fn request_scope_mut(&mut self) -> &mut RequestScope {
        &mut self.request_scope
    }

    pub fn translet_rule(&self) -> Option<&Arc<TransletRule>> {
        self.rule.as_ref()
    }

    /// Name the current translet was requested under.
    pub fn translet_name(&self) -> Option<&str> {
        self.rule.as_ref().map(|_| self.scope.name())
    }

    pub fn translet_scope(&self) -> &TransletScope {
        &self.scope
    }

    pub(crate) fn translet_scope_mut(&mut self) -> &mut TransletScope {
        &mut self.scope
    }

    pub fn joinpoint(&self) -> Joinpoint {
        self.joinpoint
    }

    /// Names of the enclosing translets, outermost first.
    pub fn trail(&self) -> &[String] {
        &self.trail
    }

    pub fn outer_translet_name(&self) -> Option<&str> {
        self.trail.last().map(String::as_str)
    }

    pub fn process_result(&self) -> Option<&ProcessResult> {
        self.scope.process_result()
    }

    pub fn result_value(&self, action_id: &str) -> Option<&Value> {
        self.scope
            .process_result()
            .and_then(|r| r.result_value(action_id))
    }

    pub fn is_activity_ended(&self) -> bool {
        self.ended
    }

    pub fn is_response_reserved(&self) -> bool {
        self.reserved.is_some()
    }

    pub fn is_exception_raised(&self) -> bool {
        self.raised.is_some()
    }

    pub fn raised_exception(&self) -> Option<&ActivityError> {
        self.raised.as_ref()
    }

    /// Keeps the first error; later ones are only logged.
    pub fn set_raised_exception(&mut self, err: &ActivityError) {
        match &self.raised {
            None => {
                debug!(error = %err, cause = %err.root_cause(), "Exception raised");
                self.raised = Some(err.clone());
            }
            Some(first) => {
                debug!(error = %err, first = %first, "Secondary exception ignored");
            }
        }
    }

    /// Translet registry, then the current joinpoint's registry, then the
    /// context-wide defaults.
    pub fn setting(&self, name: &str) -> Option<Value> {
        self.advice
            .get(Joinpoint::Translet)
            .setting(name)
            .or_else(|| self.advice.get(self.joinpoint).setting(name))
            .or_else(|| self.context.config().setting(name))
            .cloned()
    }

    pub(crate) fn declared_response(&self) -> Option<&Response> {
        self.response_rule.as_deref().and_then(ResponseRule::response)
    }

    pub(crate) fn reserve_response(&mut self, response: Response) {
        debug!(response = response.response_type(), target = ?response.target(), "Response reserved");
        self.reserved = Some(response);
    }

    fn is_finished(&self) -> bool {
        self.ended || self.pending_forward.is_some()
    }

    fn activity_end(&mut self) {
        if !self.ended {
            debug!(translet = ?self.translet_name(), "Activity ended");
            self.ended = true;
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Resolves the translet for the request's current method.
    pub fn ready(&mut self, translet_name: &str) -> Result<(), ActivityError> {
        let method = self.request.method();
        self.prepare(translet_name, method, None)
    }

    pub fn ready_with_method(&mut self, translet_name: &str, method: MethodType) -> Result<(), ActivityError> {
        self.request.set_method(method);
        self.prepare(translet_name, method, None)
    }

    fn prepare(
        &mut self,
        name: &str,
        method: MethodType,
        carried: Option<ProcessResult>,
    ) -> Result<(), ActivityError> {
        let resolved = self.context.translets().resolve(name, method)?;
        let rule = resolved.rule;
        debug!(translet = %name, %method, carried = carried.is_some(), "Preparing activity");

        self.advice = match rule.advice() {
            Some(advice) => JoinpointRegistries::from_advice(advice),
            None => JoinpointRegistries::from_advice(&self.context.aspects().advice_for(name)),
        };
        for (key, value) in resolved.variables.parameters {
            self.request.set_parameter(key, value);
        }
        for (key, value) in resolved.variables.attributes {
            self.request.set_attribute(key, Value::String(value));
        }
        self.scope = TransletScope::new(name, carried);
        self.response_rule = Some(Arc::clone(rule.response_rule()));
        self.rule = Some(rule);
        self.joinpoint = Joinpoint::Translet;
        self.reserved = None;
        Ok(())
    }

    pub fn perform(&mut self) -> Result<(), ActivityError> {
        let outcome = self.perform_translet();
        self.request_scope.destroy();
        outcome
    }

    /// Runs the REQUEST and CONTENT phases only.
    pub fn perform_without_response(&mut self) -> Result<(), ActivityError> {
        self.without_response = true;
        self.perform()
    }

    /// Releases request-scoped resources. Safe to call more than once.
    pub fn finish(&mut self) {
        if !self.request_scope.is_destroyed() {
            self.request_scope.destroy();
        }
        debug!(translet = ?self.translet_name(), ended = self.ended, "Activity finished");
    }

    /// A nested activity sharing this context.
    pub fn new_activity(&self) -> Result<Activity, ActivityError> {
        let target = self.translet_name().unwrap_or_default().to_string();
        self.nested_activity(&target)
    }

    fn nested_activity(&self, target: &str) -> Result<Activity, ActivityError> {
        let max = self.context.config().max_include_depth;
        if self.trail.len() >= max {
            warn!(target = %target, max, "Include depth exceeded");
            return Err(ActivityError::IncludeDepthExceeded {
                target: target.to_string(),
                max,
            });
        }
        let mut trail = self.trail.clone();
        trail.push(self.translet_name().unwrap_or_default().to_string());
        Ok(Activity::with_trail(
            Arc::clone(&self.context),
            trail,
            self.request.clone(),
        ))
    }

    /// Performs `name` without response in a nested activity and returns
    /// its result tree as JSON.
    pub fn include(
        &mut self,
        name: &str,
        method: Option<MethodType>,
        attributes: Vec<(String, Value)>,
    ) -> Result<Value, ActivityError> {
        let mut inner = self.nested_activity(name)?;
        for (key, value) in attributes {
            inner.request.set_attribute(key, value);
        }
        debug!(from = ?self.translet_name(), translet = %name, depth = inner.trail.len(), "Including translet");

        inner.ready_with_method(name, method.unwrap_or(self.request.method()))?;
        let outcome = inner.perform_without_response();
        inner.finish();
        match outcome {
            Ok(()) => {}
            Err(err) if err.is_terminated() => debug!(translet = %name, "Included activity terminated"),
            Err(err) => return Err(err),
        }
        Ok(inner
            .process_result()
            .map(ProcessResult::to_value)
            .unwrap_or(Value::Null))
    }

    /// Registers an aspect for the rest of this activity.
    ///
    /// Accepted only while the TRANSLET phase is current or the aspect's
    /// joinpoint is the current one. The aspect's before advice runs right
    /// away; everything else joins the joinpoint's overlay.
    pub fn register_aspect_rule(&mut self, aspect: AspectRule) -> Result<bool, ActivityError> {
        let target = aspect.joinpoint();
        if self.joinpoint != Joinpoint::Translet && self.joinpoint != target {
            debug!(aspect = %aspect.id(), %target, current = %self.joinpoint, "Aspect ignored; joinpoint not active");
            return Ok(false);
        }
        debug!(aspect = %aspect.id(), %target, "Registering aspect");
        self.advice.get_mut(target).register_dynamically(&aspect);

        let immediate: Vec<Arc<AspectAdviceRule>> = aspect
            .advice_rules()
            .filter(|r| matches!(r.advice_type(), AdviceType::Before | AdviceType::Around))
            .map(Arc::new)
            .collect();
        self.execute_advice(&immediate, AdviceType::Before)?;
        Ok(true)
    }

    // =========================================================================
    // PHASES
    // =========================================================================

    fn perform_translet(&mut self) -> Result<(), ActivityError> {
        let rule = self.rule.clone().ok_or(ActivityError::NotReady)?;
        debug!(translet = %self.scope.name(), "Performing translet");

        self.joinpoint = Joinpoint::Translet;
        let outcome = self.run_advised(Joinpoint::Translet, |activity| activity.run_phases(&rule));
        self.joinpoint = Joinpoint::Translet;
        self.execute_finally_advice(Joinpoint::Translet);

        if let Err(err) = outcome {
            if err.is_terminated() {
                self.activity_end();
                return Err(err);
            }
            self.set_raised_exception(&err);
            let registry_rules = self.advice.get(Joinpoint::Translet).exception_rules();
            let rules = rule.exception_rules().iter().chain(&registry_rules);
            self.handle_exception(&err, rules)
                .map_err(|e| translet_error(rule.name(), e))?;
            if !self.is_finished() {
                return Err(translet_error(rule.name(), err));
            }
        }

        match self.pending_forward.take() {
            Some(target) => self.forward(target),
            None => Ok(()),
        }
    }

    fn run_phases(&mut self, rule: &TransletRule) -> Result<(), ActivityError> {
        self.run_phase(Joinpoint::Request, ActivityError::Request, |a| a.request_phase(rule))?;
        if self.is_finished() {
            return Ok(());
        }

        if let Some(content) = rule.content_list() {
            if self.reserved.is_none() {
                self.run_phase(Joinpoint::Content, ActivityError::Content, |a| a.produce(content))?;
            }
        }
        if self.is_finished() || self.without_response {
            return Ok(());
        }

        self.run_phase(Joinpoint::Response, ActivityError::Response, |a| a.response())
    }

    fn run_phase<F>(
        &mut self,
        joinpoint: Joinpoint,
        wrap: fn(Box<ActivityError>) -> ActivityError,
        core: F,
    ) -> Result<(), ActivityError>
    where
        F: FnOnce(&mut Self) -> Result<(), ActivityError>,
    {
        self.joinpoint = joinpoint;
        debug!(%joinpoint, "Entering phase");
        let outcome = self.run_advised(joinpoint, core);
        self.execute_finally_advice(joinpoint);

        let result = match outcome {
            Ok(()) => Ok(()),
            Err(err) if err.is_terminated() => Err(err),
            Err(err) => {
                self.set_raised_exception(&err);
                let rules = self.advice.get(joinpoint).exception_rules();
                match self.handle_exception(&err, &rules) {
                    Ok(()) if self.is_finished() => Ok(()),
                    Ok(()) => Err(wrap(Box::new(err))),
                    Err(failure) => Err(wrap(Box::new(failure))),
                }
            }
        };
        self.joinpoint = Joinpoint::Translet;
        result
    }

    /// BEFORE advice, core work, AFTER advice. The core is skipped when
    /// before advice finished the activity.
    fn run_advised<F>(&mut self, joinpoint: Joinpoint, core: F) -> Result<(), ActivityError>
    where
        F: FnOnce(&mut Self) -> Result<(), ActivityError>,
    {
        let before = self.advice.get(joinpoint).before_advice_rules();
        self.execute_advice(&before, AdviceType::Before)?;
        if self.is_finished() {
            return Ok(());
        }
        core(self)?;
        let after = self.advice.get(joinpoint).after_advice_rules();
        self.execute_advice(&after, AdviceType::After)
    }

    fn request_phase(&mut self, rule: &TransletRule) -> Result<(), ActivityError> {
        let request_rule = rule.request_rule();
        for (name, expression) in request_rule.attributes() {
            let value = token::evaluate(expression, &*self);
            self.request.set_attribute(name.clone(), value);
        }

        let missing: Vec<String> = request_rule
            .mandatory_parameters()
            .iter()
            .filter(|p| self.request.parameter(p).map_or(true, str::is_empty))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ActivityError::MissingParameters(missing));
        }

        if let Some(handler) = self.context.request_handler().cloned() {
            let outcome = {
                let mut translet = Translet::new(self);
                handler.handle(&mut translet)
            };
            outcome.map_err(|e| self.bean_failure("request-handler".to_string(), e))?;
        }
        Ok(())
    }

    fn produce(&mut self, content: &ContentList) -> Result<(), ActivityError> {
        let result = self.scope.touch_process_result(content.name());
        if content.is_omittable() {
            result.set_omittable(true);
        }
        for list in content.action_lists() {
            self.execute_action_list(list)?;
            if self.is_finished() || self.reserved.is_some() {
                break;
            }
        }
        Ok(())
    }

    fn response(&mut self) -> Result<(), ActivityError> {
        if let Some(reserved) = self.reserved.take() {
            return self.commit_response(&reserved);
        }
        let rule = self.response_rule.clone();
        match rule.as_deref().and_then(ResponseRule::response) {
            Some(response) => self.commit_response(response),
            None => {
                debug!(translet = ?self.translet_name(), "No response declared");
                Ok(())
            }
        }
    }

    fn commit_response(&mut self, response: &Response) -> Result<(), ActivityError> {
        if let Some(list) = response.action_list() {
            self.execute_action_list(list)?;
        }
        debug!(response = response.response_type(), target = ?response.target(), "Committing response");

        match response {
            Response::Transform(rule) => {
                let body = self.render(rule)?;
                if let Some(content_type) = rule.content_type() {
                    self.response.set_content_type(content_type);
                }
                if let Some(encoding) = self.response_rule.as_deref().and_then(ResponseRule::encoding) {
                    self.response.set_encoding(encoding);
                }
                self.response.write_body(body);
            }
            Response::Dispatch(rule) => {
                let dispatcher = self.context.dispatcher()?;
                dispatcher
                    .dispatch(rule, self.scope.process_result(), &self.request, &mut self.response)
                    .map_err(|e| ActivityError::Render {
                        name: rule.name().to_string(),
                        source: Box::new(e),
                    })?;
                self.response.set_dispatched_view(rule.name());
            }
            Response::Redirect(rule) => {
                let location = rule.location(&*self);
                self.response.set_redirect_location(location);
            }
            Response::Forward(rule) => {
                for (name, value) in rule.attributes() {
                    let value = token::evaluate_value(value, &*self);
                    self.request.set_attribute(name.clone(), value);
                }
                let name = token::evaluate_string(rule.translet(), &*self);
                let method = rule.method().unwrap_or(self.request.method());
                debug!(to = %name, %method, "Forward pending");
                self.pending_forward = Some(ForwardTarget { name, method });
                return Ok(());
            }
        }
        self.activity_end();
        Ok(())
    }

    fn render(&self, rule: &TransformResponse) -> Result<String, ActivityError> {
        let result = self.scope.process_result();
        match rule.format() {
            TransformFormat::Json => rule.render_json(result).map_err(|e| ActivityError::Render {
                name: "json".to_string(),
                source: Box::new(e),
            }),
            TransformFormat::Text => Ok(rule.render_text(result, self)),
            TransformFormat::Custom(name) => {
                let renderer = self.context.renderer(name)?;
                renderer
                    .render(rule, result, &self.request)
                    .map_err(|e| ActivityError::Render {
                        name: name.clone(),
                        source: Box::new(e),
                    })
            }
        }
    }

    fn forward(&mut self, target: ForwardTarget) -> Result<(), ActivityError> {
        let max = self.context.config().max_forward_depth;
        if self.forward_depth >= max {
            warn!(target = %target.name, max, "Forward depth exceeded");
            return Err(ActivityError::ForwardDepthExceeded {
                target: target.name,
                max,
            });
        }
        self.forward_depth += 1;
        debug!(from = ?self.translet_name(), to = %target.name, hop = self.forward_depth, "Forwarding");

        let carried = self.scope.take_process_result().map(|mut result| {
            result.begin_hop();
            result
        });
        self.request.set_method(target.method);
        self.prepare(&target.name, target.method, carried)?;
        self.perform_translet()
    }

    // =========================================================================
    // EXCEPTION RESOLUTION
    // =========================================================================

    /// Offers `raised` to `rules`. The first rule with a response for the
    /// active content type takes over the output.
    fn handle_exception<'r>(
        &mut self,
        raised: &ActivityError,
        rules: impl IntoIterator<Item = &'r Arc<ExceptionHandlingRule>>,
    ) -> Result<(), ActivityError> {
        let names = raised.chain_names();

        for rule in rules.into_iter().filter(|r| r.matches(&names)) {
            if let Some(action) = rule.get_action() {
                if let Err(err) = action.execute(self, None) {
                    return Err(self.action_failed(action, err));
                }
            }
            let content_type = self
                .response_rule
                .as_deref()
                .and_then(ResponseRule::content_type)
                .map(str::to_string);
            if let Some(response) = rule.response_for(content_type.as_deref()).cloned() {
                info!(
                    error = %raised,
                    cause = %raised.root_cause(),
                    content_type = ?content_type,
                    response = response.response_type(),
                    "Responding to raised exception"
                );
                return self.respond_urgently(response);
            }
        }
        Ok(())
    }

    fn respond_urgently(&mut self, response: Response) -> Result<(), ActivityError> {
        let encoding = self
            .response_rule
            .as_deref()
            .and_then(ResponseRule::encoding)
            .map(str::to_string);
        self.response_rule = Some(Arc::new(ResponseRule::urgent(response.clone(), encoding)));
        self.reserved = None;
        self.pending_forward = None;
        self.response.reset();
        self.scope.set_process_result(None);
        self.scope.touch_process_result(None).set_omittable(true);
        self.commit_response(&response)
    }

    // =========================================================================
    // EXECUTION
    // =========================================================================

    fn execute_action_list(&mut self, list: &ActionList) -> Result<(), ActivityError> {
        let index = self.scope.touch_process_result(None).add_content(
            list.name().map(str::to_string),
            list.is_omittable(),
            list.is_hidden(),
        );
        for action in list.actions() {
            debug!(%action, "Executing action");
            match action.execute(self, None) {
                Ok(ActionOutcome::Value(value)) => self.record_result(index, action, value),
                Ok(ActionOutcome::NoResult) => {}
                Err(err) => return Err(self.action_failed(action, err)),
            }
            if self.is_finished() || self.reserved.is_some() {
                break;
            }
        }
        Ok(())
    }

    fn record_result(&mut self, index: usize, action: &Executable, value: Value) {
        match self.scope.process_result_mut().and_then(|r| r.content_mut(index)) {
            Some(content) => content.put(action.action_id(), value, action.is_hidden()),
            None => debug!(%action, "Process result was replaced; result dropped"),
        }
    }

    fn execute_advice(&mut self, rules: &[Arc<AspectAdviceRule>], slot: AdviceType) -> Result<(), ActivityError> {
        for rule in rules {
            self.execute_advice_rule(rule, slot)?;
        }
        Ok(())
    }

    fn execute_finally_advice(&mut self, joinpoint: Joinpoint) {
        let rules = self.advice.get(joinpoint).finally_advice_rules();
        for rule in &rules {
            if let Err(err) = self.execute_advice_rule(rule, AdviceType::Finally) {
                warn!(aspect = %rule.aspect_id(), %joinpoint, error = %err, "Finally advice failed");
            }
        }
    }

    /// Failures of FINALLY advice are returned to the caller for logging
    /// and never enter the raised slot.
    fn execute_advice_rule(&mut self, rule: &AspectAdviceRule, slot: AdviceType) -> Result<(), ActivityError> {
        debug!(aspect = %rule.aspect_id(), advice = %slot, action = %rule.action(), "Executing advice");
        match self.invoke_advice(rule, slot) {
            Err(err) if slot != AdviceType::Finally && !err.is_terminated() => {
                self.set_raised_exception(&err);
                Err(err)
            }
            outcome => outcome,
        }
    }

    fn invoke_advice(&mut self, rule: &AspectAdviceRule, slot: AdviceType) -> Result<(), ActivityError> {
        let outcome = match rule.action() {
            Executable::Echo(echo) => {
                let items = echo.evaluate(self);
                for (name, value) in &items {
                    self.request.set_attribute(name.clone(), value.clone());
                }
                EchoAction::outcome(items)
            }
            action => {
                let advice_bean = match rule.advice_bean() {
                    Some(bean) if targets_advice_bean(action) => Some(self.advice_bean(rule.aspect_id(), bean)?),
                    _ => None,
                };
                action
                    .execute(self, advice_bean)
                    .map_err(|e| execution_error(action.to_string(), e))?
            }
        };
        if let ActionOutcome::Value(value) = outcome {
            if !value.is_null() {
                self.scope.put_advice_result(slot, rule.aspect_id(), value);
            }
        }
        Ok(())
    }

    /// Resolved once per aspect and cached on the translet scope.
    fn advice_bean(&mut self, aspect_id: &str, bean: &BeanRef) -> Result<Arc<dyn Bean>, ActivityError> {
        if let Some(cached) = self.scope.advice_bean(aspect_id) {
            return Ok(cached);
        }
        let resolved = self.context.beans().resolve(bean)?;
        self.scope.put_advice_bean(aspect_id, Arc::clone(&resolved));
        Ok(resolved)
    }

    fn action_failed(&mut self, action: &Executable, err: BeanError) -> ActivityError {
        self.bean_failure(action.to_string(), err)
    }

    fn bean_failure(&mut self, action: String, err: BeanError) -> ActivityError {
        let error = execution_error(action, err);
        if !error.is_terminated() {
            self.set_raised_exception(&error);
        }
        error
    }
}

/// Termination passes through unwrapped.
fn execution_error(action: String, err: BeanError) -> ActivityError {
    match err {
        BeanError::Terminated(reason) => ActivityError::Terminated(reason),
        BeanError::Activity(inner) if inner.is_terminated() => *inner,
        err => ActivityError::ActionExecution {
            action,
            source: Box::new(err),
        },
    }
}

fn targets_advice_bean(action: &Executable) -> bool {
    matches!(action, Executable::Bean(bean) if bean.target().is_none())
}

/// Phase errors and control signals pass through; anything else is
/// attributed to the translet.
fn translet_error(name: &str, err: ActivityError) -> ActivityError {
    match err {
        err if err.is_phase_error() || err.is_terminated() => err,
        err @ ActivityError::Perform { .. } => err,
        err => ActivityError::Perform {
            name: name.to_string(),
            source: Box::new(err),
        },
    }
}

impl TokenResolver for Activity {
    fn parameter(&self, name: &str) -> Option<String> {
        self.request.parameter(name).map(str::to_string)
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.request
            .attribute(name)
            .or_else(|| self.result_value(name))
            .cloned()
    }

    fn setting(&self, name: &str) -> Option<Value> {
        Activity::setting(self, name)
    }
}

impl fmt::Debug for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activity")
            .field("translet", &self.translet_name())
            .field("trail", &self.trail)
            .field("joinpoint", &self.joinpoint)
            .field("ended", &self.ended)
            .field("reserved", &self.reserved.as_ref().map(Response::response_type))
            .field("raised", &self.raised)
            .field("forward_depth", &self.forward_depth)
            .finish()
    }
}
