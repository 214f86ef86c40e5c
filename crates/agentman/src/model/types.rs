use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::agent::Agent;
use super::naming::{Entity, EntityKind};
use super::secret::Secret;
use super::server::McpServer;
use super::workflow::{Chain, EvaluatorOptimizer, Orchestrator, Parallel, Router};

pub const DEFAULT_BASE_IMAGE: &str = "ghcr.io/o3-cloud/agentman/base:main";

/// Command used when the Agentfile has no `CMD`.
pub fn default_cmd() -> Vec<String> {
    vec!["python".to_string(), "agent.py".to_string()]
}

/// Target agent framework for generated sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Framework {
    #[default]
    #[serde(rename = "fast-agent")]
    FastAgent,
    #[serde(rename = "agno")]
    Agno,
}

impl Framework {
    pub fn as_str(self) -> &'static str {
        match self {
            Framework::FastAgent => "fast-agent",
            Framework::Agno => "agno",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast-agent" => Ok(Framework::FastAgent),
            "agno" => Ok(Framework::Agno),
            other => Err(format!(
                "unsupported framework '{other}' (supported: fast-agent, agno)"
            )),
        }
    }
}

/// Dockerfile instruction carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerfileInstruction {
    pub instruction: String,
    pub args: Vec<String>,
}

impl DockerfileInstruction {
    /// Render as a Dockerfile line; `CMD`/`ENTRYPOINT` always use exec form.
    pub fn to_dockerfile_line(&self) -> String {
        if matches!(self.instruction.as_str(), "CMD" | "ENTRYPOINT") {
            let argv = serde_json::to_string(&self.args).unwrap_or_else(|_| "[]".to_string());
            return format!("{} {}", self.instruction, argv);
        }
        if self.args.is_empty() {
            return self.instruction.clone();
        }
        format!("{} {}", self.instruction, self.args.join(" "))
    }
}

/// Complete configuration assembled from one Agentfile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentfileConfig {
    pub base_image: String,
    pub default_model: Option<String>,
    pub framework: Framework,
    pub servers: IndexMap<String, McpServer>,
    pub agents: IndexMap<String, Agent>,
    pub routers: IndexMap<String, Router>,
    pub chains: IndexMap<String, Chain>,
    pub parallels: IndexMap<String, Parallel>,
    pub orchestrators: IndexMap<String, Orchestrator>,
    pub evaluator_optimizers: IndexMap<String, EvaluatorOptimizer>,
    pub secrets: Vec<Secret>,
    pub expose_ports: Vec<u16>,
    pub cmd: Vec<String>,
    pub entrypoint: Vec<String>,
    pub dockerfile_instructions: Vec<DockerfileInstruction>,
}

impl Default for AgentfileConfig {
    fn default() -> Self {
        Self {
            base_image: DEFAULT_BASE_IMAGE.to_string(),
            default_model: None,
            framework: Framework::default(),
            servers: IndexMap::new(),
            agents: IndexMap::new(),
            routers: IndexMap::new(),
            chains: IndexMap::new(),
            parallels: IndexMap::new(),
            orchestrators: IndexMap::new(),
            evaluator_optimizers: IndexMap::new(),
            secrets: Vec::new(),
            expose_ports: Vec::new(),
            cmd: default_cmd(),
            entrypoint: Vec::new(),
            dockerfile_instructions: Vec::new(),
        }
    }
}

impl AgentfileConfig {
    /// Every agent or workflow currently flagged default, grouped by kind.
    pub fn default_entities(&self) -> Vec<(EntityKind, &str)> {
        let mut out = Vec::new();
        collect_defaults(&self.agents, &mut out);
        collect_defaults(&self.routers, &mut out);
        collect_defaults(&self.chains, &mut out);
        collect_defaults(&self.parallels, &mut out);
        collect_defaults(&self.orchestrators, &mut out);
        collect_defaults(&self.evaluator_optimizers, &mut out);
        out
    }

    pub fn is_default(&self, kind: EntityKind, name: &str) -> bool {
        match kind {
            EntityKind::Agent => self.agents.get(name).is_some_and(|e| e.is_default()),
            EntityKind::Router => self.routers.get(name).is_some_and(|e| e.is_default()),
            EntityKind::Chain => self.chains.get(name).is_some_and(|e| e.is_default()),
            EntityKind::Parallel => self.parallels.get(name).is_some_and(|e| e.is_default()),
            EntityKind::Orchestrator => self
                .orchestrators
                .get(name)
                .is_some_and(|e| e.is_default()),
            EntityKind::EvaluatorOptimizer => self
                .evaluator_optimizers
                .get(name)
                .is_some_and(|e| e.is_default()),
        }
    }

    /// Clear the default flag everywhere except on `keep`.
    pub fn clear_defaults_except(&mut self, keep: Option<(EntityKind, &str)>) {
        clear_defaults(&mut self.agents, keep);
        clear_defaults(&mut self.routers, keep);
        clear_defaults(&mut self.chains, keep);
        clear_defaults(&mut self.parallels, keep);
        clear_defaults(&mut self.orchestrators, keep);
        clear_defaults(&mut self.evaluator_optimizers, keep);
    }

    /// Whether `name` is defined as an agent or any workflow kind.
    pub fn has_agent_or_workflow(&self, name: &str) -> bool {
        self.agents.contains_key(name)
            || self.routers.contains_key(name)
            || self.chains.contains_key(name)
            || self.parallels.contains_key(name)
            || self.orchestrators.contains_key(name)
            || self.evaluator_optimizers.contains_key(name)
    }
}

fn collect_defaults<'a, T: Entity>(
    map: &'a IndexMap<String, T>,
    out: &mut Vec<(EntityKind, &'a str)>,
) {
    out.extend(
        map.values()
            .filter(|e| e.is_default())
            .map(|e| (T::KIND, e.name())),
    );
}

fn clear_defaults<T: Entity>(map: &mut IndexMap<String, T>, keep: Option<(EntityKind, &str)>) {
    for (name, entity) in map.iter_mut() {
        let kept = keep.is_some_and(|(kind, keep_name)| kind == T::KIND && keep_name == name.as_str());
        if !kept && entity.is_default() {
            entity.set_default(false);
        }
    }
}
