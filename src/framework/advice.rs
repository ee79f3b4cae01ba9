//! # Aspect Advice
//!
//! Interceptors attached to the four joinpoints of an activity.
//!
//! Each translet owns one [`AspectAdviceRuleRegistry`] per joinpoint, baked
//! when the context is built and shared read-only through `Arc`. An activity
//! wraps each of them in a [`PhaseAdvice`], which adds a private overlay for
//! aspects registered while the activity runs. The shared registries are
//! never mutated.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::framework::action::{BeanRef, Executable};
use crate::model::{AspectRule, ExceptionHandlingRule};

/// The phase an advice is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Joinpoint {
    Translet,
    Request,
    Content,
    Response,
}

impl fmt::Display for Joinpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Joinpoint::Translet => "translet",
            Joinpoint::Request => "request",
            Joinpoint::Content => "content",
            Joinpoint::Response => "response",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceType {
    Before,
    After,
    /// Registered into both the before and the after list.
    Around,
    /// Always runs, errors are logged and swallowed.
    Finally,
}

impl fmt::Display for AdviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdviceType::Before => "before",
            AdviceType::After => "after",
            AdviceType::Around => "around",
            AdviceType::Finally => "finally",
        };
        f.write_str(name)
    }
}

/// One interceptor binding.
#[derive(Debug, Clone)]
pub struct AspectAdviceRule {
    aspect_id: String,
    advice_type: AdviceType,
    action: Executable,
    advice_bean: Option<BeanRef>,
}

impl AspectAdviceRule {
    pub fn new(aspect_id: impl Into<String>, advice_type: AdviceType, action: Executable) -> Self {
        Self {
            aspect_id: aspect_id.into(),
            advice_type,
            action,
            advice_bean: None,
        }
    }

    pub fn with_advice_bean(mut self, bean: BeanRef) -> Self {
        self.advice_bean = Some(bean);
        self
    }

    pub fn aspect_id(&self) -> &str {
        &self.aspect_id
    }

    pub fn advice_type(&self) -> AdviceType {
        self.advice_type
    }

    pub fn action(&self) -> &Executable {
        &self.action
    }

    pub fn advice_bean(&self) -> Option<&BeanRef> {
        self.advice_bean.as_ref()
    }
}

/// Ordered advice of one joinpoint, with its exception rules and settings.
#[derive(Debug, Clone, Default)]
pub struct AspectAdviceRuleRegistry {
    before: Vec<Arc<AspectAdviceRule>>,
    after: Vec<Arc<AspectAdviceRule>>,
    finally: Vec<Arc<AspectAdviceRule>>,
    exception_rules: Vec<Arc<ExceptionHandlingRule>>,
    settings: BTreeMap<String, Value>,
}

impl AspectAdviceRuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every advice of the aspect in declaration order.
    pub fn register(&mut self, aspect: &AspectRule) {
        self.register_filtered(aspect, None);
    }

    /// Adds the aspect except its `Before` advice, and only the after half
    /// of `Around` advice. The caller runs the before part itself.
    pub fn register_dynamically(&mut self, aspect: &AspectRule) {
        self.register_filtered(aspect, Some(AdviceType::Before));
    }

    fn register_filtered(&mut self, aspect: &AspectRule, excluded: Option<AdviceType>) {
        for rule in aspect.advice_rules() {
            let advice_type = rule.advice_type();
            if Some(advice_type) == excluded {
                continue;
            }
            let rule = Arc::new(rule);
            match advice_type {
                AdviceType::Before => self.before.push(rule),
                AdviceType::After => self.after.push(rule),
                AdviceType::Around => {
                    if excluded != Some(AdviceType::Before) {
                        self.before.push(Arc::clone(&rule));
                    }
                    self.after.push(rule);
                }
                AdviceType::Finally => self.finally.push(rule),
            }
        }
        self.exception_rules.extend(
            aspect
                .exception_rules()
                .iter()
                .cloned()
                .map(Arc::new),
        );
        self.settings.extend(
            aspect
                .settings()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    pub fn before_advice_rules(&self) -> &[Arc<AspectAdviceRule>] {
        &self.before
    }

    pub fn after_advice_rules(&self) -> &[Arc<AspectAdviceRule>] {
        &self.after
    }

    pub fn finally_advice_rules(&self) -> &[Arc<AspectAdviceRule>] {
        &self.finally
    }

    pub fn exception_rules(&self) -> &[Arc<ExceptionHandlingRule>] {
        &self.exception_rules
    }

    pub fn setting(&self, name: &str) -> Option<&Value> {
        self.settings.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty()
            && self.after.is_empty()
            && self.finally.is_empty()
            && self.exception_rules.is_empty()
            && self.settings.is_empty()
    }
}

/// The four registries baked into a translet rule.
#[derive(Debug, Clone, Default)]
pub struct TransletAdvice {
    translet: Option<Arc<AspectAdviceRuleRegistry>>,
    request: Option<Arc<AspectAdviceRuleRegistry>>,
    content: Option<Arc<AspectAdviceRuleRegistry>>,
    response: Option<Arc<AspectAdviceRuleRegistry>>,
}

impl TransletAdvice {
    /// Registers every aspect that applies to `translet_name` into the
    /// registry of its joinpoint. Empty registries are left out.
    pub fn build<'a>(aspects: impl IntoIterator<Item = &'a AspectRule>, translet_name: &str) -> Self {
        let mut registries: [AspectAdviceRuleRegistry; 4] = Default::default();
        for aspect in aspects.into_iter().filter(|a| a.applies_to(translet_name)) {
            registries[slot(aspect.joinpoint())].register(aspect);
        }
        let [translet, request, content, response] =
            registries.map(|r| (!r.is_empty()).then(|| Arc::new(r)));
        Self {
            translet,
            request,
            content,
            response,
        }
    }

    pub fn registry(&self, joinpoint: Joinpoint) -> Option<&Arc<AspectAdviceRuleRegistry>> {
        match joinpoint {
            Joinpoint::Translet => self.translet.as_ref(),
            Joinpoint::Request => self.request.as_ref(),
            Joinpoint::Content => self.content.as_ref(),
            Joinpoint::Response => self.response.as_ref(),
        }
    }
}

fn slot(joinpoint: Joinpoint) -> usize {
    match joinpoint {
        Joinpoint::Translet => 0,
        Joinpoint::Request => 1,
        Joinpoint::Content => 2,
        Joinpoint::Response => 3,
    }
}

macro_rules! merged_advice_rules {
    ($($kind:ident),+) => {
        paste::paste! {
            $(
                pub fn [<$kind _advice_rules>](&self) -> Vec<Arc<AspectAdviceRule>> {
                    let mut rules = Vec::new();
                    if let Some(base) = &self.base {
                        rules.extend(base.[<$kind _advice_rules>]().iter().cloned());
                    }
                    if let Some(overlay) = &self.overlay {
                        rules.extend(overlay.[<$kind _advice_rules>]().iter().cloned());
                    }
                    rules
                }
            )+
        }
    };
}

/// Shared registry of one joinpoint plus the activity's private overlay.
#[derive(Debug, Clone, Default)]
pub struct PhaseAdvice {
    base: Option<Arc<AspectAdviceRuleRegistry>>,
    overlay: Option<AspectAdviceRuleRegistry>,
}

impl PhaseAdvice {
    pub fn new(base: Option<Arc<AspectAdviceRuleRegistry>>) -> Self {
        Self {
            base,
            overlay: None,
        }
    }

    merged_advice_rules!(before, after, finally);

    pub fn exception_rules(&self) -> Vec<Arc<ExceptionHandlingRule>> {
        let mut rules = Vec::new();
        if let Some(base) = &self.base {
            rules.extend(base.exception_rules().iter().cloned());
        }
        if let Some(overlay) = &self.overlay {
            rules.extend(overlay.exception_rules().iter().cloned());
        }
        rules
    }

    /// Overlay settings shadow the shared ones.
    pub fn setting(&self, name: &str) -> Option<&Value> {
        self.overlay
            .as_ref()
            .and_then(|o| o.setting(name))
            .or_else(|| self.base.as_ref().and_then(|b| b.setting(name)))
    }

    pub fn register_dynamically(&mut self, aspect: &AspectRule) {
        self.overlay
            .get_or_insert_with(AspectAdviceRuleRegistry::new)
            .register_dynamically(aspect);
    }
}

/// Per-activity view of all four joinpoints.
#[derive(Debug, Clone, Default)]
pub struct JoinpointRegistries {
    translet: PhaseAdvice,
    request: PhaseAdvice,
    content: PhaseAdvice,
    response: PhaseAdvice,
}

impl JoinpointRegistries {
    pub fn from_advice(advice: &TransletAdvice) -> Self {
        let phase = |jp| PhaseAdvice::new(advice.registry(jp).cloned());
        Self {
            translet: phase(Joinpoint::Translet),
            request: phase(Joinpoint::Request),
            content: phase(Joinpoint::Content),
            response: phase(Joinpoint::Response),
        }
    }

    pub fn get(&self, joinpoint: Joinpoint) -> &PhaseAdvice {
        match joinpoint {
            Joinpoint::Translet => &self.translet,
            Joinpoint::Request => &self.request,
            Joinpoint::Content => &self.content,
            Joinpoint::Response => &self.response,
        }
    }

    pub fn get_mut(&mut self, joinpoint: Joinpoint) -> &mut PhaseAdvice {
        match joinpoint {
            Joinpoint::Translet => &mut self.translet,
            Joinpoint::Request => &mut self.request,
            Joinpoint::Content => &mut self.content,
            Joinpoint::Response => &mut self.response,
        }
    }
}
