//! Secret declarations.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One entry of the ordered secrets list.
///
/// Order matters: generators match secrets against server environment
/// declarations first-match-wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Secret {
    /// Bare reference, value supplied at deploy time.
    Name(String),
    /// Name with an inline value.
    Value { name: String, value: String },
    /// Named group of key/value pairs (e.g. provider settings).
    Context {
        name: String,
        values: IndexMap<String, String>,
    },
}

impl Secret {
    pub fn name(&self) -> &str {
        match self {
            Secret::Name(name) => name,
            Secret::Value { name, .. } => name,
            Secret::Context { name, .. } => name,
        }
    }
}
