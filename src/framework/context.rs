//! # Activity Context
//!
//! The shared, read-only world every activity runs in: configuration,
//! translet and aspect rules, beans, renderers and the view dispatcher.
//! It is assembled once with [`ContextBuilder`] and shared through `Arc`.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::framework::action::{Bean, BeanRef, Executable};
use crate::framework::activity::Activity;
use crate::framework::advice::TransletAdvice;
use crate::framework::config::EngineConfig;
use crate::framework::error::{ActivityError, BeanError};
use crate::framework::response::{Renderer, ViewDispatcher};
use crate::framework::translet::Translet;
use crate::model::{AspectRule, MethodType, PathVariables, TransletRule};

/// Transport hook run as the core work of the REQUEST phase.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, translet: &mut Translet<'_>) -> Result<(), BeanError>;
}

// =============================================================================
// BEANS
// =============================================================================

struct BeanEntry {
    id: String,
    type_id: TypeId,
    type_name: &'static str,
    bean: Arc<dyn Bean>,
    instance: Arc<dyn Any + Send + Sync>,
}

/// Registered beans, addressable by id, by type, or by both.
#[derive(Default)]
pub struct BeanRegistry {
    entries: Vec<BeanEntry>,
}

impl BeanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a bean. A bean registered earlier under the same id is replaced.
    pub fn register<B: Bean>(&mut self, id: impl Into<String>, bean: B) {
        let id = id.into();
        let bean = Arc::new(bean);
        let entry = BeanEntry {
            id: id.clone(),
            type_id: TypeId::of::<B>(),
            type_name: type_name::<B>(),
            bean: Arc::clone(&bean) as Arc<dyn Bean>,
            instance: bean,
        };
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(existing) => {
                warn!(bean_id = %id, "Replacing bean registered under the same id");
                *existing = entry;
            }
            None => self.entries.push(entry),
        }
    }

    pub fn get_bean(&self, id: &str) -> Result<Arc<dyn Bean>, ActivityError> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| Arc::clone(&e.bean))
            .ok_or_else(|| ActivityError::BeanNotFound(id.to_string()))
    }

    pub fn get_bean_by_type(
        &self,
        type_id: TypeId,
        type_name: &str,
    ) -> Result<Arc<dyn Bean>, ActivityError> {
        self.unique_by_type(type_id, type_name)
            .map(|e| Arc::clone(&e.bean))
    }

    pub fn get_bean_typed(
        &self,
        type_id: TypeId,
        type_name: &str,
        id: &str,
    ) -> Result<Arc<dyn Bean>, ActivityError> {
        self.entries
            .iter()
            .find(|e| e.type_id == type_id && e.id == id)
            .map(|e| Arc::clone(&e.bean))
            .ok_or_else(|| ActivityError::BeanNotFound(format!("{type_name}#{id}")))
    }

    pub fn resolve(&self, bean: &BeanRef) -> Result<Arc<dyn Bean>, ActivityError> {
        match bean {
            BeanRef::Id(id) => self.get_bean(id),
            BeanRef::Type { type_id, type_name } => self.get_bean_by_type(*type_id, type_name),
            BeanRef::TypedId {
                type_id,
                type_name,
                id,
            } => self.get_bean_typed(*type_id, type_name, id),
        }
    }

    /// The unique bean of concrete type `B`.
    pub fn bean_of<B: Bean>(&self) -> Result<Arc<B>, ActivityError> {
        let entry = self.unique_by_type(TypeId::of::<B>(), type_name::<B>())?;
        Arc::clone(&entry.instance)
            .downcast::<B>()
            .map_err(|_| ActivityError::BeanNotFound(type_name::<B>().to_string()))
    }

    fn unique_by_type(&self, type_id: TypeId, type_name: &str) -> Result<&BeanEntry, ActivityError> {
        let mut candidates = self.entries.iter().filter(|e| e.type_id == type_id);
        match (candidates.next(), candidates.count()) {
            (None, _) => Err(ActivityError::BeanNotFound(type_name.to_string())),
            (Some(entry), 0) => Ok(entry),
            (Some(_), rest) => Err(ActivityError::BeanNotUnique {
                name: type_name.to_string(),
                count: rest + 1,
            }),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for BeanRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (&e.id, e.type_name)))
            .finish()
    }
}

// =============================================================================
// TRANSLET RULES
// =============================================================================

/// A translet rule matched for a concrete request name.
#[derive(Debug, Clone)]
pub struct ResolvedTranslet {
    pub rule: Arc<TransletRule>,
    pub variables: PathVariables,
}

#[derive(Debug, Default)]
pub struct TransletRuleRegistry {
    exact: HashMap<String, Vec<Arc<TransletRule>>>,
    patterns: Vec<Arc<TransletRule>>,
}

impl TransletRuleRegistry {
    fn add(&mut self, rule: Arc<TransletRule>) {
        if rule.is_pattern() {
            self.patterns.push(rule);
        } else {
            self.exact
                .entry(rule.name().to_string())
                .or_default()
                .push(rule);
        }
    }

    /// First rule registered under the exact name.
    pub fn get(&self, name: &str) -> Option<&Arc<TransletRule>> {
        self.exact.get(name).and_then(|rules| rules.first())
    }

    /// Exact name first, then REST-style patterns in registration order.
    pub fn resolve(&self, name: &str, method: MethodType) -> Result<ResolvedTranslet, ActivityError> {
        let mut method_mismatch = false;

        if let Some(rules) = self.exact.get(name) {
            match rules.iter().find(|r| r.request_rule().allows(method)) {
                Some(rule) => {
                    return Ok(ResolvedTranslet {
                        rule: Arc::clone(rule),
                        variables: PathVariables::default(),
                    })
                }
                None => method_mismatch = true,
            }
        }

        for rule in &self.patterns {
            let Some(variables) = rule.pattern().and_then(|p| p.matches(name)) else {
                continue;
            };
            if rule.request_rule().allows(method) {
                debug!(translet = %name, pattern = %rule.name(), "Matched translet pattern");
                return Ok(ResolvedTranslet {
                    rule: Arc::clone(rule),
                    variables,
                });
            }
            method_mismatch = true;
        }

        if method_mismatch {
            Err(ActivityError::MethodNotAllowed {
                name: name.to_string(),
                method,
            })
        } else {
            Err(ActivityError::TransletNotFound(name.to_string()))
        }
    }

    pub fn len(&self) -> usize {
        self.exact.values().map(Vec::len).sum::<usize>() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// ASPECT RULES
// =============================================================================

#[derive(Debug, Default)]
pub struct AspectRuleRegistry {
    aspects: Vec<Arc<AspectRule>>,
}

impl AspectRuleRegistry {
    pub fn get(&self, id: &str) -> Option<&Arc<AspectRule>> {
        self.aspects.iter().find(|a| a.id() == id)
    }

    /// Builds the advice registries for one concrete translet name.
    pub fn advice_for(&self, translet_name: &str) -> TransletAdvice {
        TransletAdvice::build(self.aspects.iter().map(Arc::as_ref), translet_name)
    }

    pub fn len(&self) -> usize {
        self.aspects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

pub struct ActivityContext {
    config: EngineConfig,
    translets: TransletRuleRegistry,
    aspects: AspectRuleRegistry,
    beans: BeanRegistry,
    renderers: HashMap<String, Arc<dyn Renderer>>,
    dispatcher: Option<Arc<dyn ViewDispatcher>>,
    request_handler: Option<Arc<dyn RequestHandler>>,
}

impl ActivityContext {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn translets(&self) -> &TransletRuleRegistry {
        &self.translets
    }

    pub fn aspects(&self) -> &AspectRuleRegistry {
        &self.aspects
    }

    pub fn beans(&self) -> &BeanRegistry {
        &self.beans
    }

    pub fn renderer(&self, name: &str) -> Result<Arc<dyn Renderer>, ActivityError> {
        self.renderers
            .get(name)
            .cloned()
            .ok_or_else(|| ActivityError::RendererNotFound(name.to_string()))
    }

    pub fn dispatcher(&self) -> Result<Arc<dyn ViewDispatcher>, ActivityError> {
        self.dispatcher
            .clone()
            .ok_or(ActivityError::DispatcherNotFound)
    }

    pub fn request_handler(&self) -> Option<&Arc<dyn RequestHandler>> {
        self.request_handler.as_ref()
    }

    /// A fresh top-level activity bound to this context.
    pub fn new_activity(self: &Arc<Self>) -> Activity {
        Activity::new(Arc::clone(self))
    }
}

impl fmt::Debug for ActivityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityContext")
            .field("config", &self.config)
            .field("translets", &self.translets.len())
            .field("aspects", &self.aspects.len())
            .field("beans", &self.beans)
            .field("renderers", &self.renderers.keys().collect::<Vec<_>>())
            .field("dispatcher", &self.dispatcher.is_some())
            .finish()
    }
}

/// Collects rules and components, then bakes them into an [`ActivityContext`].
///
/// ```
/// use activity_engine::framework::{ActivityContext, Executable, Response};
/// use activity_engine::model::TransletRule;
/// use serde_json::json;
///
/// let context = ActivityContext::builder()
///     .translet(
///         TransletRule::new("greet")
///             .action(Executable::echo("msg", json!("hi")))
///             .response(Response::json()),
///     )
///     .build()
///     .unwrap();
///
/// let mut activity = context.new_activity();
/// activity.ready("greet").unwrap();
/// activity.perform().unwrap();
/// assert_eq!(activity.response_adapter().body(), Some(r#"{"msg":"hi"}"#));
/// ```
#[derive(Default)]
pub struct ContextBuilder {
    config: EngineConfig,
    translets: Vec<TransletRule>,
    aspects: Vec<AspectRule>,
    beans: BeanRegistry,
    renderers: HashMap<String, Arc<dyn Renderer>>,
    dispatcher: Option<Arc<dyn ViewDispatcher>>,
    request_handler: Option<Arc<dyn RequestHandler>>,
}

impl ContextBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn translet(mut self, rule: TransletRule) -> Self {
        self.translets.push(rule);
        self
    }

    pub fn aspect(mut self, rule: AspectRule) -> Self {
        self.aspects.push(rule);
        self
    }

    pub fn bean<B: Bean>(mut self, id: impl Into<String>, bean: B) -> Self {
        self.beans.register(id, bean);
        self
    }

    pub fn renderer(mut self, name: impl Into<String>, renderer: impl Renderer + 'static) -> Self {
        self.renderers.insert(name.into(), Arc::new(renderer));
        self
    }

    pub fn dispatcher(mut self, dispatcher: impl ViewDispatcher + 'static) -> Self {
        self.dispatcher = Some(Arc::new(dispatcher));
        self
    }

    pub fn request_handler(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.request_handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<Arc<ActivityContext>, ActivityError> {
        if !self.config.nullable_action_id {
            for rule in &self.translets {
                if let Some(action) = rule.actions().into_iter().find(|a| requires_id(a)) {
                    return Err(ActivityError::InvalidRule(format!(
                        "translet '{}' declares {} without an action id",
                        rule.name(),
                        action
                    )));
                }
            }
        }

        let aspects = AspectRuleRegistry {
            aspects: self.aspects.into_iter().map(Arc::new).collect(),
        };

        let mut translets = TransletRuleRegistry::default();
        for rule in self.translets {
            let rule = if rule.is_pattern() {
                rule
            } else {
                let advice = aspects.advice_for(rule.name());
                rule.with_advice(advice)
            };
            translets.add(Arc::new(rule));
        }

        info!(
            translets = translets.len(),
            aspects = aspects.len(),
            beans = self.beans.len(),
            "Activity context built"
        );

        Ok(Arc::new(ActivityContext {
            config: self.config,
            translets,
            aspects,
            beans: self.beans,
            renderers: self.renderers,
            dispatcher: self.dispatcher,
            request_handler: self.request_handler,
        }))
    }
}

fn requires_id(action: &Executable) -> bool {
    action.action_id().is_none() && !matches!(action, Executable::Headers(_))
}
