//! The single open block tracked by the parser.

use std::fmt;

use indexmap::IndexMap;

use crate::model::{
    Agent, Chain, EntityKind, EvaluatorOptimizer, McpServer, Orchestrator, Parallel, Router,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Agent,
    Router,
    Chain,
    Parallel,
    Orchestrator,
    EvaluatorOptimizer,
    Server,
    SecretContext,
}

impl BlockKind {
    pub fn keyword(self) -> &'static str {
        match self {
            BlockKind::Server => "SERVER",
            BlockKind::SecretContext => "SECRET_CONTEXT",
            other => other.entity_kind().map_or("", EntityKind::keyword),
        }
    }

    /// Agent/workflow kind, `None` for servers and secret contexts.
    pub fn entity_kind(self) -> Option<EntityKind> {
        match self {
            BlockKind::Agent => Some(EntityKind::Agent),
            BlockKind::Router => Some(EntityKind::Router),
            BlockKind::Chain => Some(EntityKind::Chain),
            BlockKind::Parallel => Some(EntityKind::Parallel),
            BlockKind::Orchestrator => Some(EntityKind::Orchestrator),
            BlockKind::EvaluatorOptimizer => Some(EntityKind::EvaluatorOptimizer),
            BlockKind::Server | BlockKind::SecretContext => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Server => f.write_str("server"),
            BlockKind::SecretContext => f.write_str("secret context"),
            other => match other.entity_kind() {
                Some(kind) => write!(f, "{kind}"),
                None => Ok(()),
            },
        }
    }
}

/// In-progress record owned by the open block until `END`.
#[derive(Debug, Clone)]
pub enum BlockRecord {
    Agent(Agent),
    Router(Router),
    Chain(Chain),
    Parallel(Parallel),
    Orchestrator(Orchestrator),
    EvaluatorOptimizer(EvaluatorOptimizer),
    Server(McpServer),
    SecretContext(IndexMap<String, String>),
}

impl BlockRecord {
    fn new(kind: BlockKind, name: &str) -> Self {
        match kind {
            BlockKind::Agent => BlockRecord::Agent(Agent::new(name)),
            BlockKind::Router => BlockRecord::Router(Router::new(name)),
            BlockKind::Chain => BlockRecord::Chain(Chain::new(name)),
            BlockKind::Parallel => BlockRecord::Parallel(Parallel::new(name)),
            BlockKind::Orchestrator => BlockRecord::Orchestrator(Orchestrator::new(name)),
            BlockKind::EvaluatorOptimizer => {
                BlockRecord::EvaluatorOptimizer(EvaluatorOptimizer::new(name))
            }
            BlockKind::Server => BlockRecord::Server(McpServer::new(name)),
            BlockKind::SecretContext => BlockRecord::SecretContext(IndexMap::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenBlock {
    pub kind: BlockKind,
    pub name: String,
    /// Line of the opening directive; cited by scope errors.
    pub start_line: usize,
    pub record: BlockRecord,
}

impl OpenBlock {
    pub fn new(kind: BlockKind, name: impl Into<String>, start_line: usize) -> Self {
        let name = name.into();
        let record = BlockRecord::new(kind, &name);
        Self {
            kind,
            name,
            start_line,
            record,
        }
    }

    /// Short description used in error messages (`agent block 'helper' opened on line 3`).
    pub fn describe(&self) -> String {
        format!(
            "{} block '{}' opened on line {}",
            self.kind, self.name, self.start_line
        )
    }
}
