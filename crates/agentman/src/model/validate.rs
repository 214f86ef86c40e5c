//! Consumer-side consistency checks.
//!
//! The parser accepts forward and dangling references; generators call
//! [`AgentfileConfig::validate`] when they need a resolved graph.

use thiserror::Error;

use super::naming::{Entity, EntityKind};
use super::secret::Secret;
use super::server::{McpServer, Transport};
use super::types::AgentfileConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("missing base image")]
    MissingBaseImage,
    #[error("no agents defined")]
    NoAgents,
    #[error("agent '{agent}' references undefined server '{server}'")]
    UndefinedServer { agent: String, server: String },
    #[error("{kind} '{workflow}' references unknown agent or workflow '{target}'")]
    UnknownTarget {
        kind: EntityKind,
        workflow: String,
        target: String,
    },
    #[error("server '{server}' uses {transport} but has no URL")]
    MissingUrl { server: String, transport: Transport },
    #[error("server '{server}' uses stdio but has no COMMAND")]
    MissingCommand { server: String },
    #[error("server '{server}' needs ENV {key} but no SECRET supplies it")]
    UnsuppliedEnv { server: String, key: String },
}

impl AgentfileConfig {
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.base_image.trim().is_empty() {
            issues.push(ValidationIssue::MissingBaseImage);
        }
        if self.agents.is_empty() {
            issues.push(ValidationIssue::NoAgents);
        }
        for agent in self.agents.values() {
            for server in agent.references() {
                if !self.servers.contains_key(server) {
                    issues.push(ValidationIssue::UndefinedServer {
                        agent: agent.name.clone(),
                        server: server.to_string(),
                    });
                }
            }
        }
        for server in self.servers.values() {
            self.check_server(server, &mut issues);
        }
        self.check_targets(self.routers.values(), &mut issues);
        self.check_targets(self.chains.values(), &mut issues);
        self.check_targets(self.parallels.values(), &mut issues);
        self.check_targets(self.orchestrators.values(), &mut issues);
        self.check_targets(self.evaluator_optimizers.values(), &mut issues);
        issues
    }

    /// Server whose environment receives a named secret: the first one
    /// declaring it. Secret contexts feed provider settings, not servers.
    pub fn secret_target(&self, secret: &Secret) -> Option<&McpServer> {
        if matches!(secret, Secret::Context { .. }) {
            return None;
        }
        self.servers
            .values()
            .find(|server| server.declares_env(secret.name()))
    }

    fn check_server(&self, server: &McpServer, issues: &mut Vec<ValidationIssue>) {
        if server.transport.is_networked() {
            if server.url.is_none() {
                issues.push(ValidationIssue::MissingUrl {
                    server: server.name.clone(),
                    transport: server.transport,
                });
            }
        } else if server.command.is_none() {
            issues.push(ValidationIssue::MissingCommand {
                server: server.name.clone(),
            });
        }
        for (key, value) in &server.env {
            if value.is_some() {
                continue;
            }
            let supplied = self.secrets.iter().any(|secret| {
                secret.name() == key
                    && self
                        .secret_target(secret)
                        .is_some_and(|target| target.name == server.name)
            });
            if !supplied {
                issues.push(ValidationIssue::UnsuppliedEnv {
                    server: server.name.clone(),
                    key: key.clone(),
                });
            }
        }
    }

    fn check_targets<'a, T: Entity + 'a>(
        &self,
        workflows: impl Iterator<Item = &'a T>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        for wf in workflows {
            for target in wf.references() {
                if !self.has_agent_or_workflow(target) {
                    issues.push(ValidationIssue::UnknownTarget {
                        kind: T::KIND,
                        workflow: wf.name().to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
    }
}
