//! Command-line prompt override for a single agent.

use std::path::{Path, PathBuf};

use crate::model::{Agent, AgentfileConfig, EntityKind};

/// Extensions that mark a prompt value as a file name even if it does not exist.
const PROMPT_FILE_EXTENSIONS: &[&str] = &[".txt", ".md", ".py", ".json", ".yaml", ".yml"];

/// Prompt values longer than this are always treated as literal text.
const MAX_PROMPT_PATH_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideOutcome {
    /// An existing agent had its instruction replaced.
    Replaced,
    /// A new agent was appended.
    Created,
}

/// Point `agent_name` at `prompt` and make it the only default entity.
///
/// `prompt` is either literal instruction text or a path to a prompt file
/// (see [`is_file_path`]). Returns `None` when either input is empty.
pub fn apply_prompt_override(
    config: &mut AgentfileConfig,
    agent_name: &str,
    prompt: &str,
    source_dir: &Path,
) -> Option<OverrideOutcome> {
    if agent_name.is_empty() || prompt.is_empty() {
        return None;
    }
    let instruction = if is_file_path(prompt, source_dir) {
        read_prompt(prompt, source_dir)
    } else {
        prompt.to_string()
    };

    let outcome = match config.agents.get_mut(agent_name) {
        Some(agent) => {
            agent.instruction = instruction;
            agent.default = true;
            tracing::info!("overriding agent '{}' with command-line prompt", agent_name);
            OverrideOutcome::Replaced
        }
        None => {
            let mut agent = Agent::new(agent_name);
            agent.instruction = instruction;
            agent.default = true;
            config.agents.insert(agent_name.to_string(), agent);
            tracing::info!("created agent '{}' from command-line prompt", agent_name);
            OverrideOutcome::Created
        }
    };
    config.clear_defaults_except(Some((EntityKind::Agent, agent_name)));
    Some(outcome)
}

/// Decide whether a prompt value names a file.
///
/// Existing files (absolute, or relative to `source_dir`) always count.
/// Otherwise short single-line values ending in a known extension count too.
pub fn is_file_path(value: &str, source_dir: &Path) -> bool {
    if locate(value, source_dir).is_some() {
        return true;
    }
    if value.contains('\n') || value.chars().count() > MAX_PROMPT_PATH_LEN {
        return false;
    }
    let lower = value.to_ascii_lowercase();
    PROMPT_FILE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn locate(value: &str, source_dir: &Path) -> Option<PathBuf> {
    let path = Path::new(value);
    if path.is_absolute() && path.exists() {
        return Some(path.to_path_buf());
    }
    let relative = source_dir.join(value);
    relative.exists().then_some(relative)
}

/// Read a prompt file, falling back to the literal value when it cannot be read.
fn read_prompt(value: &str, source_dir: &Path) -> String {
    let Some(path) = locate(value, source_dir) else {
        tracing::warn!("prompt file not found: {}, treating as text", value);
        return value.to_string();
    };
    match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(
                "failed to read prompt file {}: {}, treating as text",
                path.display(),
                e
            );
            value.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Router;

    #[test]
    fn extension_heuristic() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_file_path("missing.md", dir.path()));
        assert!(is_file_path("PROMPT.TXT", dir.path()));
        assert!(!is_file_path("Be concise.", dir.path()));
        assert!(!is_file_path("line one\nnotes.md", dir.path()));
        let long = format!("{}.txt", "x".repeat(MAX_PROMPT_PATH_LEN));
        assert!(!is_file_path(&long, dir.path()));
    }

    #[test]
    fn existing_relative_file_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("PROMPT"), "from file").unwrap();
        assert!(is_file_path("PROMPT", dir.path()));

        let mut cfg = AgentfileConfig::default();
        let outcome = apply_prompt_override(&mut cfg, "helper", "PROMPT", dir.path());
        assert_eq!(outcome, Some(OverrideOutcome::Created));
        assert_eq!(cfg.agents["helper"].instruction, "from file");
    }

    #[test]
    fn missing_file_falls_back_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AgentfileConfig::default();
        apply_prompt_override(&mut cfg, "helper", "nowhere.md", dir.path());
        assert_eq!(cfg.agents["helper"].instruction, "nowhere.md");
    }

    #[test]
    fn replaces_existing_and_clears_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AgentfileConfig::default();
        cfg.agents.insert("helper".into(), Agent::new("helper"));
        let mut other = Agent::new("other");
        other.default = true;
        cfg.agents.insert("other".into(), other);
        let mut router = Router::new("route");
        router.default = true;
        cfg.routers.insert("route".into(), router);

        let outcome = apply_prompt_override(&mut cfg, "helper", "Be brief.", dir.path());
        assert_eq!(outcome, Some(OverrideOutcome::Replaced));
        assert_eq!(cfg.agents["helper"].instruction, "Be brief.");
        assert_eq!(
            cfg.default_entities(),
            vec![(EntityKind::Agent, "helper")]
        );
    }

    #[test]
    fn empty_inputs_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AgentfileConfig::default();
        assert_eq!(apply_prompt_override(&mut cfg, "", "x", dir.path()), None);
        assert_eq!(apply_prompt_override(&mut cfg, "a", "", dir.path()), None);
        assert!(cfg.agents.is_empty());
    }
}
