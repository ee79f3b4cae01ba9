//! # Result Tree
//!
//! Every activity aggregates what its actions produce into a three-level tree:
//!
//! ```text
//! ProcessResult            one per translet (carried across forwards)
//! └── ContentResult        one per executed action list
//!     └── ActionResult     one per action that produced a value
//! ```
//!
//! The tree is append-only with one exception: writing a result whose action
//! id already exists inside the same content group overwrites the earlier
//! value. Id lookup is a flat search across all visible groups.
//!
//! A tree carried across a forward is split into hops. Lookup and the JSON
//! projection visit the latest hop first, so a forward target shadows ids the
//! earlier translets produced. Within one hop the first match wins.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// What an action produced.
///
/// `NoResult` is distinct from a JSON `null`: it is never recorded, while a
/// `null` value is.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Value(Value),
    NoResult,
}

impl ActionOutcome {
    pub fn value(value: impl Into<Value>) -> Self {
        ActionOutcome::Value(value.into())
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            ActionOutcome::Value(value) => Some(value),
            ActionOutcome::NoResult => None,
        }
    }
}

impl From<Value> for ActionOutcome {
    fn from(value: Value) -> Self {
        ActionOutcome::Value(value)
    }
}

/// The root of the result tree for one translet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessResult {
    name: Option<String>,
    omittable: bool,
    contents: Vec<ContentResult>,
    hop_starts: Vec<usize>,
}

impl ProcessResult {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            omittable: false,
            contents: Vec::new(),
            hop_starts: Vec::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_omittable(&self) -> bool {
        self.omittable
    }

    pub fn set_omittable(&mut self, omittable: bool) {
        self.omittable = omittable;
    }

    /// Creates a new content group owned by this result and returns its index.
    pub fn add_content(&mut self, name: Option<String>, omittable: bool, hidden: bool) -> usize {
        self.contents.push(ContentResult {
            name,
            omittable,
            hidden,
            actions: Vec::new(),
        });
        self.contents.len() - 1
    }

    pub fn content(&self, index: usize) -> Option<&ContentResult> {
        self.contents.get(index)
    }

    pub fn content_mut(&mut self, index: usize) -> Option<&mut ContentResult> {
        self.contents.get_mut(index)
    }

    pub fn contents(&self) -> &[ContentResult] {
        &self.contents
    }

    /// Finds a content group by name.
    pub fn content_named(&self, name: &str) -> Option<&ContentResult> {
        self.contents.iter().find(|c| c.name() == Some(name))
    }

    pub fn is_empty(&self) -> bool {
        self.contents.iter().all(|c| c.is_empty())
    }

    /// Starts a new hop. Groups added from now on shadow earlier ones.
    pub fn begin_hop(&mut self) {
        self.hop_starts.push(self.contents.len());
    }

    /// Number of hops this tree spans.
    pub fn hops(&self) -> usize {
        self.hop_starts.len() + 1
    }

    /// Content groups in lookup order: latest hop first, each hop in
    /// execution order.
    fn lookup_order(&self) -> impl Iterator<Item = &ContentResult> + '_ {
        let starts: Vec<usize> = std::iter::once(0).chain(self.hop_starts.iter().copied()).collect();
        starts
            .into_iter()
            .rev()
            .scan(self.contents.len(), |end, start| {
                let hop = &self.contents[start.min(*end)..*end];
                *end = start.min(*end);
                Some(hop)
            })
            .flatten()
    }

    /// Flat search for a visible action result with the given id.
    pub fn result_value(&self, action_id: &str) -> Option<&Value> {
        self.lookup_order()
            .filter(|c| !c.hidden)
            .find_map(|c| c.result_value(action_id))
    }

    /// JSON projection of the visible part of the tree. Colliding keys
    /// resolve the same way as [`result_value`](Self::result_value).
    pub fn to_value(&self) -> Value {
        let visible: Vec<&ContentResult> = self.lookup_order().filter(|c| !c.hidden).collect();
        if self.omittable && visible.len() == 1 {
            return visible[0].to_value();
        }

        let mut root = Map::new();
        for content in visible {
            match &content.name {
                Some(name) => {
                    root.entry(name.clone()).or_insert_with(|| content.to_value());
                }
                None => {
                    for (id, value) in content.entries() {
                        root.entry(id).or_insert_with(|| value.clone());
                    }
                }
            }
        }
        Value::Object(root)
    }
}

impl Serialize for ProcessResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Results of one executed action list.
///
/// Only a [`ProcessResult`] can create one (see [`ProcessResult::add_content`]).
#[derive(Debug, Clone, PartialEq)]
pub struct ContentResult {
    name: Option<String>,
    omittable: bool,
    hidden: bool,
    actions: Vec<ActionResult>,
}

impl ContentResult {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_omittable(&self) -> bool {
        self.omittable
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn actions(&self) -> &[ActionResult] {
        &self.actions
    }

    /// Records a value. An existing entry with the same id is overwritten;
    /// entries without an id are always appended.
    pub fn put(&mut self, action_id: Option<&str>, value: Value, hidden: bool) {
        if let Some(id) = action_id {
            if let Some(existing) = self
                .actions
                .iter_mut()
                .find(|a| a.action_id.as_deref() == Some(id))
            {
                existing.value = value;
                existing.hidden = hidden;
                return;
            }
        }
        self.actions.push(ActionResult {
            action_id: action_id.map(str::to_string),
            value,
            hidden,
        });
    }

    pub fn result_value(&self, action_id: &str) -> Option<&Value> {
        self.actions
            .iter()
            .find(|a| !a.hidden && a.action_id.as_deref() == Some(action_id))
            .map(|a| &a.value)
    }

    fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.actions
            .iter()
            .filter(|a| !a.hidden)
            .filter_map(|a| a.action_id.as_deref().map(|id| (id, &a.value)))
    }

    pub fn to_value(&self) -> Value {
        let visible: Vec<&ActionResult> = self.actions.iter().filter(|a| !a.hidden).collect();
        if self.omittable && visible.len() == 1 {
            return visible[0].value.clone();
        }
        Value::Object(
            self.entries()
                .map(|(id, value)| (id.to_string(), value.clone()))
                .collect(),
        )
    }
}

/// A single recorded action value.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    action_id: Option<String>,
    value: Value,
    hidden: bool,
}

impl ActionResult {
    pub fn action_id(&self) -> Option<&str> {
        self.action_id.as_deref()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}
