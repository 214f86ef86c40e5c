use serde::Deserialize;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::parser::UnknownDirectivePolicy;

/// Optional `<AGENTMAN_HOME>/config.toml`. Environment flags win when set.
#[derive(Debug, Default, Deserialize)]
pub struct UserConfig {
    pub logging: Option<LoggingCfg>,
    pub parser: Option<ParserCfg>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingCfg {
    pub to_file: Option<bool>,
    pub dir: Option<String>,
    pub json: Option<bool>,
    pub compact: Option<bool>,
    pub pretty: Option<bool>,
    pub level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ParserCfg {
    pub unknown_directives: Option<UnknownDirectivePolicy>,
    /// Agentfile read when no path is given on the command line.
    pub agentfile: Option<String>,
}

/// `explicit` if non-empty, else `$HOME/.agentman`, else `./.agentman`.
pub fn resolve_home(explicit: &str) -> PathBuf {
    if !explicit.is_empty() {
        return expand_home(explicit);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".agentman");
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".agentman")
}

pub fn load_user_config(home: &Path) -> anyhow::Result<Option<UserConfig>> {
    let path = home.join("config.toml");
    if !path.exists() {
        return Ok(None);
    }
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: UserConfig =
        toml::from_str(&s).with_context(|| format!("invalid TOML in {}", path.display()))?;
    Ok(Some(cfg))
}

pub fn expand_home(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Ok(home) = std::env::var("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_user_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn reads_logging_and_parser_tables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
[logging]
level = "debug"
json = true

[parser]
unknown_directives = "passthrough"
agentfile = "deploy/Agentfile"
"#,
        )
        .unwrap();
        let cfg = load_user_config(dir.path()).unwrap().unwrap();
        let logging = cfg.logging.unwrap();
        assert_eq!(logging.level.as_deref(), Some("debug"));
        assert_eq!(logging.json, Some(true));
        assert!(logging.to_file.is_none());
        let parser = cfg.parser.unwrap();
        assert_eq!(
            parser.unknown_directives,
            Some(UnknownDirectivePolicy::Passthrough)
        );
        assert_eq!(parser.agentfile.as_deref(), Some("deploy/Agentfile"));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[parser\n").unwrap();
        let err = load_user_config(dir.path()).unwrap_err();
        assert!(err.to_string().contains("invalid TOML"));
    }

    #[test]
    fn explicit_home_wins() {
        assert_eq!(resolve_home("/opt/agentman"), PathBuf::from("/opt/agentman"));
    }
}
