//! Engine configuration.
//!
//! Every field has a default, so a config can be loaded from a partial JSON
//! document:
//!
//! ```
//! use activity_engine::framework::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "max_forward_depth": 4 }"#).unwrap();
//! assert_eq!(config.max_forward_depth, 4);
//! assert_eq!(config.max_include_depth, 8);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::MethodType;

fn default_max_forward_depth() -> usize {
    16
}

fn default_max_include_depth() -> usize {
    8
}

fn default_nullable_action_id() -> bool {
    true
}

fn default_service_buffer() -> usize {
    32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Forward hops allowed within one activity.
    #[serde(default = "default_max_forward_depth")]
    pub max_forward_depth: usize,

    /// Nesting depth allowed for include actions.
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: usize,

    /// When false, every content and response action must carry an id.
    #[serde(default = "default_nullable_action_id")]
    pub nullable_action_id: bool,

    #[serde(default)]
    pub default_request_method: MethodType,

    /// Channel capacity of the translet service.
    #[serde(default = "default_service_buffer")]
    pub service_buffer: usize,

    /// Fallback for settings no advice registry defines.
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_forward_depth: default_max_forward_depth(),
            max_include_depth: default_max_include_depth(),
            nullable_action_id: default_nullable_action_id(),
            default_request_method: MethodType::default(),
            service_buffer: default_service_buffer(),
            settings: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn setting(&self, name: &str) -> Option<&Value> {
        self.settings.get(name)
    }
}
