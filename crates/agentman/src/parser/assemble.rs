//! Block finalization and end-of-document assembly.

use indexmap::IndexMap;

use crate::model::{AgentfileConfig, Entity, EntityKind, Secret};

use super::block::{BlockRecord, OpenBlock};
use super::error::{ParseError, ParseErrorKind};

/// Move a closed block's record into the config.
///
/// Returns the entity key for agents and workflows so the caller can track
/// finalization order.
pub fn finalize(
    config: &mut AgentfileConfig,
    block: OpenBlock,
    end_line: usize,
) -> Result<Option<(EntityKind, String)>, ParseError> {
    let OpenBlock { name, record, .. } = block;
    let closed = match record {
        BlockRecord::Agent(a) => insert_replacing(&mut config.agents, a),
        BlockRecord::Router(r) => insert_replacing(&mut config.routers, r),
        BlockRecord::Chain(c) => insert_replacing(&mut config.chains, c),
        BlockRecord::Parallel(p) => insert_replacing(&mut config.parallels, p),
        BlockRecord::Orchestrator(o) => insert_replacing(&mut config.orchestrators, o),
        BlockRecord::EvaluatorOptimizer(e) => {
            for (role, value) in [("GENERATOR", &e.generator), ("EVALUATOR", &e.evaluator)] {
                if value.is_empty() {
                    return Err(ParseError::new(
                        end_line,
                        "END",
                        ParseErrorKind::MissingRequiredArgument(format!(
                            "evaluator-optimizer '{name}' has no {role}"
                        )),
                    ));
                }
            }
            insert_replacing(&mut config.evaluator_optimizers, e)
        }
        BlockRecord::Server(s) => {
            if config.servers.shift_remove(&name).is_some() {
                tracing::warn!("server '{}' redefined; keeping the later definition", name);
            }
            config.servers.insert(name, s);
            return Ok(None);
        }
        BlockRecord::SecretContext(values) => {
            config.secrets.push(Secret::Context { name, values });
            return Ok(None);
        }
    };
    Ok(Some(closed))
}

/// Last definition wins and takes the later position.
fn insert_replacing<T: Entity>(map: &mut IndexMap<String, T>, entity: T) -> (EntityKind, String) {
    let name = entity.name().to_string();
    if map.shift_remove(&name).is_some() {
        tracing::warn!(
            "{} '{}' redefined; keeping the later definition",
            T::KIND,
            name
        );
    }
    map.insert(name.clone(), entity);
    (T::KIND, name)
}

/// End-of-document checks and default resolution.
pub fn finish(
    mut config: AgentfileConfig,
    open: Option<OpenBlock>,
    closed: &[(EntityKind, String)],
) -> Result<AgentfileConfig, ParseError> {
    if let Some(block) = open {
        return Err(ParseError::new(
            block.start_line,
            block.kind.keyword(),
            ParseErrorKind::UnterminatedBlock {
                kind: block.kind,
                name: block.name,
                start_line: block.start_line,
            },
        ));
    }
    resolve_default(&mut config, closed);
    Ok(config)
}

/// Keep only the default finalized last.
fn resolve_default(config: &mut AgentfileConfig, closed: &[(EntityKind, String)]) {
    let defaults = config.default_entities();
    if defaults.len() <= 1 {
        return;
    }
    let listed = defaults
        .iter()
        .map(|(kind, name)| format!("{kind} '{name}'"))
        .collect::<Vec<_>>()
        .join(", ");
    let Some((kind, name)) = closed
        .iter()
        .rev()
        .find(|(kind, name)| config.is_default(*kind, name))
        .cloned()
    else {
        return;
    };
    tracing::warn!(
        "multiple defaults declared ({}); {} '{}' is kept as the default",
        listed,
        kind,
        name
    );
    config.clear_defaults_except(Some((kind, &name)));
}
