//! Entity kinds, the shared entity capability, and naming helpers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Agent and workflow kinds that can be marked as the default entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Agent,
    Router,
    Chain,
    Parallel,
    Orchestrator,
    EvaluatorOptimizer,
}

impl EntityKind {
    /// The Agentfile keyword that opens a block of this kind.
    pub fn keyword(self) -> &'static str {
        match self {
            EntityKind::Agent => "AGENT",
            EntityKind::Router => "ROUTER",
            EntityKind::Chain => "CHAIN",
            EntityKind::Parallel => "PARALLEL",
            EntityKind::Orchestrator => "ORCHESTRATOR",
            EntityKind::EvaluatorOptimizer => "EVALUATOR_OPTIMIZER",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Agent => "agent",
            EntityKind::Router => "router",
            EntityKind::Chain => "chain",
            EntityKind::Parallel => "parallel",
            EntityKind::Orchestrator => "orchestrator",
            EntityKind::EvaluatorOptimizer => "evaluator-optimizer",
        };
        f.write_str(s)
    }
}

/// Capability shared by agents and workflows.
///
/// Generators and the config assembler go through this trait rather than
/// matching on each concrete record type.
pub trait Entity {
    const KIND: EntityKind;

    fn name(&self) -> &str;
    fn is_default(&self) -> bool;
    fn set_default(&mut self, value: bool);
    /// Names of the agents, workflows or servers this entity points at.
    fn references(&self) -> Vec<&str>;
}

/// Convert an entity name into a PascalCase type name (`research-agent` -> `ResearchAgent`).
pub fn pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for word in name
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    out
}

/// Check for an environment-variable style identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
