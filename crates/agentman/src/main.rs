use std::path::{Path, PathBuf};

use anyhow::Context as _;
use env_flags::env_flags;
use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, prelude::*};

use agentman::config::{LoggingCfg, UserConfig, load_user_config, resolve_home};
use agentman::overrides::apply_prompt_override;
use agentman::parser::{
    AgentfileParser, ConfigParser, Environment, ParseOptions, UnknownDirectivePolicy,
};
use agentman::render::to_agentfile;

#[derive(Debug, Clone, Copy)]
enum LogStyle {
    Json,
    Compact,
    Pretty,
    Full,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn fmt_layer<W>(writer: W, style: LogStyle, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = tracing_subscriber::fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_target(true)
        .with_ansi(ansi)
        .with_writer(writer);
    match style {
        LogStyle::Json => base.json().boxed(),
        LogStyle::Compact => base.compact().boxed(),
        LogStyle::Pretty => base.pretty().boxed(),
        LogStyle::Full => base.boxed(),
    }
}

fn init_tracing(home: &Path, logging: Option<&LoggingCfg>) {
    env_flags! {
        /// Tracing filter, e.g. "info", "debug", or targets format.
        RUST_LOG: &str = "warn";
        /// Preferred filter env (alias). If set, overrides RUST_LOG.
        TRACING_FILTER: &str = "";
        /// Pretty formatting for logs (ignored if TRACING_JSON=true).
        TRACING_PRETTY: bool = false;
        /// Compact single-line formatting for logs (ignored if TRACING_JSON=true)
        TRACING_COMPACT: bool = true;
        /// JSON formatting for logs
        TRACING_JSON: bool = false;
        /// If true, also log to file under <AGENTMAN_HOME>/logs or LOG_DIR
        LOG_TO_FILE: bool = false;
        /// Optional explicit log directory (absolute). Defaults to <AGENTMAN_HOME>/logs
        LOG_DIR: &str = "";
    }

    let env_set = |k: &str| std::env::var_os(k).is_some();

    // TRACING_FILTER first, then RUST_LOG, then the user config.
    let mut rust_log = if !(*TRACING_FILTER).is_empty() {
        (*TRACING_FILTER).to_string()
    } else {
        (*RUST_LOG).to_string()
    };
    let mut tracing_json = *TRACING_JSON;
    let mut tracing_compact = *TRACING_COMPACT;
    let mut tracing_pretty = *TRACING_PRETTY;
    let mut log_to_file = *LOG_TO_FILE;
    let mut log_dir: Option<PathBuf> = if !(*LOG_DIR).is_empty() {
        Some(PathBuf::from((*LOG_DIR).to_string()))
    } else {
        None
    };

    if let Some(cfg) = logging {
        if !(env_set("TRACING_FILTER") || env_set("RUST_LOG"))
            && let Some(level) = cfg.level.as_ref()
        {
            rust_log = level.clone();
        }
        if !env_set("TRACING_JSON")
            && let Some(v) = cfg.json
        {
            tracing_json = v;
        }
        if !env_set("TRACING_COMPACT")
            && let Some(v) = cfg.compact
        {
            tracing_compact = v;
        }
        if !env_set("TRACING_PRETTY")
            && let Some(v) = cfg.pretty
        {
            tracing_pretty = v;
        }
        if !env_set("LOG_TO_FILE")
            && let Some(v) = cfg.to_file
        {
            log_to_file = v;
        }
        if !env_set("LOG_DIR")
            && let Some(dir) = cfg.dir.as_ref()
        {
            log_dir = Some(agentman::config::expand_home(dir));
        }
    }

    let filter = EnvFilter::try_new(rust_log).unwrap_or_else(|_| EnvFilter::new("warn"));
    let style = if tracing_json {
        LogStyle::Json
    } else if tracing_compact {
        LogStyle::Compact
    } else if tracing_pretty {
        LogStyle::Pretty
    } else {
        LogStyle::Full
    };

    // Logs go to stderr; stdout carries the parsed config.
    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(std::io::stderr, style, true)];

    static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();
    let mut dir_error = None;
    if log_to_file {
        let dir = log_dir.unwrap_or_else(|| home.join("logs"));
        match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, "agentman.log");
                let (nb, guard) = tracing_appender::non_blocking(appender);
                let _ = FILE_GUARD.set(guard);
                layers.push(fmt_layer(nb, style, false));
            }
            Err(e) => dir_error = Some((dir, e)),
        }
    }

    let subscriber = tracing_subscriber::registry().with(layers).with(filter);
    if let Err(e) = subscriber.try_init() {
        tracing::debug!("tracing already set: {:?}", e);
    }
    if let Some((dir, e)) = dir_error {
        tracing::warn!("failed to create log dir {}: {}", dir.display(), e);
    }
}

/// Environment snapshot used for `$NAME` expansion; non-UTF-8 entries are skipped.
fn process_environment() -> Environment {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

fn main() -> anyhow::Result<()> {
    env_flags! {
        /// Agentman home directory (absolute). Defaults to $HOME/.agentman
        AGENTMAN_HOME: &str = "";
        /// Agentfile to parse when no path argument is given. Defaults to ./Agentfile
        AGENTFILE: &str = "";
        /// Agent whose instruction is replaced by AGENT_PROMPT
        AGENT_NAME: &str = "";
        /// Prompt text, or a path to a prompt file, for AGENT_NAME
        AGENT_PROMPT: &str = "";
        /// Unknown directive policy: "reject" or "passthrough"
        AGENTMAN_UNKNOWN_DIRECTIVES: &str = "";
        /// Output: "json" (default) or "agentfile"
        AGENTMAN_OUTPUT: &str = "json";
    }

    let home = resolve_home(*AGENTMAN_HOME);
    let loaded = load_user_config(&home);
    let user_cfg: Option<&UserConfig> = loaded.as_ref().ok().and_then(Option::as_ref);
    init_tracing(&home, user_cfg.and_then(|c| c.logging.as_ref()));
    if let Err(e) = &loaded {
        tracing::warn!("ignoring user config: {:#}", e);
    }
    let parser_cfg = user_cfg.and_then(|c| c.parser.as_ref());

    let path = std::env::args()
        .nth(1)
        .or_else(|| (!(*AGENTFILE).is_empty()).then(|| (*AGENTFILE).to_string()))
        .or_else(|| parser_cfg.and_then(|p| p.agentfile.clone()))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Agentfile"));
    if !AgentfileParser::supports(&path) {
        anyhow::bail!(
            "{} looks like a YAML agent definition; only Agentfile syntax is supported",
            path.display()
        );
    }

    let unknown_directives = if !(*AGENTMAN_UNKNOWN_DIRECTIVES).is_empty() {
        (*AGENTMAN_UNKNOWN_DIRECTIVES)
            .parse::<UnknownDirectivePolicy>()
            .map_err(anyhow::Error::msg)
            .context("invalid AGENTMAN_UNKNOWN_DIRECTIVES")?
    } else {
        parser_cfg
            .and_then(|p| p.unknown_directives)
            .unwrap_or_default()
    };

    let env = process_environment();
    let parser = AgentfileParser::new(ParseOptions { unknown_directives });
    let mut config = parser
        .parse_file(&path, &env)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    tracing::info!(
        "parsed {} ({} agents, {} servers)",
        path.display(),
        config.agents.len(),
        config.servers.len()
    );

    let source_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if let Some(outcome) = apply_prompt_override(&mut config, *AGENT_NAME, *AGENT_PROMPT, &source_dir)
    {
        tracing::debug!("prompt override for '{}': {:?}", *AGENT_NAME, outcome);
    }

    for issue in config.validate() {
        tracing::warn!("{}", issue);
    }

    match (*AGENTMAN_OUTPUT).to_ascii_lowercase().as_str() {
        "agentfile" => print!("{}", to_agentfile(&config)),
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        other => anyhow::bail!("unknown AGENTMAN_OUTPUT '{}' (expected json or agentfile)", other),
    }
    Ok(())
}
