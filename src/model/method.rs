use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Request method a translet accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MethodType {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl MethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodType::Get => "GET",
            MethodType::Post => "POST",
            MethodType::Put => "PUT",
            MethodType::Patch => "PATCH",
            MethodType::Delete => "DELETE",
            MethodType::Head => "HEAD",
            MethodType::Options => "OPTIONS",
            MethodType::Trace => "TRACE",
        }
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MethodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(MethodType::Get),
            "POST" => Ok(MethodType::Post),
            "PUT" => Ok(MethodType::Put),
            "PATCH" => Ok(MethodType::Patch),
            "DELETE" => Ok(MethodType::Delete),
            "HEAD" => Ok(MethodType::Head),
            "OPTIONS" => Ok(MethodType::Options),
            "TRACE" => Ok(MethodType::Trace),
            other => Err(format!("Unknown request method: {other}")),
        }
    }
}
