//! Agentfile parser.
//!
//! Logical lines are classified by their leading keyword and routed either to
//! the top-level handlers or to the single open block. Closing a block moves
//! its record into the config; the end of the document resolves defaults.

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::model::{AgentfileConfig, DockerfileInstruction, EntityKind};

pub mod assemble;
pub mod block;
pub mod directive;
pub mod error;
pub mod expand;
pub mod handlers;
pub mod lines;
pub mod tokens;

pub use error::{AgentfileError, ParseError, ParseErrorKind};
pub use expand::{Environment, expand_env_vars};

use block::{BlockRecord, OpenBlock};
use directive::{Classified, Directive, Scope, classify};
use handlers::DirectiveArgs;
use lines::{LogicalLine, LogicalLines};

/// Front-end for one agent description format.
pub trait ConfigParser {
    fn supports(path: &Path) -> bool;
    fn parse(&self, content: &str, env: &Environment) -> Result<AgentfileConfig, ParseError>;
}

/// What to do with keywords that are not `[A-Z][A-Z0-9_]*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownDirectivePolicy {
    #[default]
    #[serde(alias = "error")]
    Reject,
    /// Record as a Dockerfile instruction with the keyword upper-cased.
    Passthrough,
}

impl FromStr for UnknownDirectivePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" | "error" => Ok(UnknownDirectivePolicy::Reject),
            "passthrough" => Ok(UnknownDirectivePolicy::Passthrough),
            other => Err(format!(
                "unknown directive policy '{other}' (expected reject or passthrough)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub unknown_directives: UnknownDirectivePolicy,
}

#[derive(Debug, Clone, Default)]
pub struct AgentfileParser {
    options: ParseOptions,
}

impl AgentfileParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn parse_file(
        &self,
        path: &Path,
        env: &Environment,
    ) -> Result<AgentfileConfig, AgentfileError> {
        let content = std::fs::read_to_string(path).map_err(|source| AgentfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("parsing Agentfile {}", path.display());
        Ok(self.parse(&content, env)?)
    }
}

impl ConfigParser for AgentfileParser {
    /// Anything except YAML; `.yml`/`.yaml` belong to the YAML front-end.
    fn supports(path: &Path) -> bool {
        !path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"))
            .unwrap_or(false)
    }

    fn parse(&self, content: &str, env: &Environment) -> Result<AgentfileConfig, ParseError> {
        let mut state = ParseState {
            config: AgentfileConfig::default(),
            open: None,
            closed: Vec::new(),
            env,
            policy: self.options.unknown_directives,
        };
        for line in LogicalLines::new(content) {
            state.feed(&line)?;
        }
        assemble::finish(state.config, state.open, &state.closed)
    }
}

/// Parse Agentfile text with default options.
pub fn parse_str(content: &str, env: &Environment) -> Result<AgentfileConfig, ParseError> {
    AgentfileParser::default().parse(content, env)
}

/// Read and parse an Agentfile with default options.
pub fn parse_file(path: &Path, env: &Environment) -> Result<AgentfileConfig, AgentfileError> {
    AgentfileParser::default().parse_file(path, env)
}

struct ParseState<'e> {
    config: AgentfileConfig,
    open: Option<OpenBlock>,
    /// Agents and workflows in the order their blocks closed.
    closed: Vec<(EntityKind, String)>,
    env: &'e Environment,
    policy: UnknownDirectivePolicy,
}

impl ParseState<'_> {
    fn feed(&mut self, line: &LogicalLine) -> Result<(), ParseError> {
        let (keyword, text) = line.split_keyword();
        let args = DirectiveArgs {
            line: line.number,
            keyword,
            text,
            env: self.env,
        };
        match self.open.take() {
            Some(block) => self.in_block(block, &args),
            None => self.top_level(&args),
        }
    }

    fn top_level(&mut self, args: &DirectiveArgs<'_>) -> Result<(), ParseError> {
        match classify(args.keyword) {
            Classified::Known(Directive::End) => Err(args.error(
                ParseErrorKind::UnexpectedDirective("END without an open block".to_string()),
            )),
            Classified::Known(d) => {
                if let Some(kind) = d.opens_block() {
                    let name = args.single("block name")?;
                    tracing::debug!("line {}: opening {} block '{}'", args.line, kind, name);
                    self.open = Some(OpenBlock::new(kind, name, args.line));
                    Ok(())
                } else if d.allowed_in(Scope::TopLevel) {
                    handlers::top_level(&mut self.config, d, args)
                } else if d.is_dockerfile_instruction() {
                    self.passthrough(args.keyword, args);
                    Ok(())
                } else {
                    Err(args.error(ParseErrorKind::UnexpectedDirective(format!(
                        "{} is only valid inside a block",
                        args.keyword
                    ))))
                }
            }
            Classified::Passthrough(keyword) => {
                self.passthrough(keyword, args);
                Ok(())
            }
            Classified::Unknown(keyword) => match self.policy {
                UnknownDirectivePolicy::Reject => Err(args.error(
                    ParseErrorKind::UnknownDirective(keyword.to_string()),
                )),
                UnknownDirectivePolicy::Passthrough => {
                    tracing::warn!(
                        "line {}: passing unknown directive '{}' through",
                        args.line,
                        keyword
                    );
                    self.passthrough(&keyword.to_ascii_uppercase(), args);
                    Ok(())
                }
            },
        }
    }

    fn in_block(&mut self, mut block: OpenBlock, args: &DirectiveArgs<'_>) -> Result<(), ParseError> {
        if args.keyword == "END" {
            args.no_arguments()?;
            tracing::debug!("line {}: closing {}", args.line, block.describe());
            if let Some(key) = assemble::finalize(&mut self.config, block, args.line)? {
                self.closed.push(key);
            }
            return Ok(());
        }

        let scope = Scope::Block(block.kind);
        let result = if let BlockRecord::SecretContext(values) = &mut block.record {
            // Keys may look like keywords, but block openers and top-level
            // directives mean the context was never closed.
            let key = args.keyword.split('=').next().unwrap_or_default();
            match classify(key) {
                Classified::Known(d)
                    if d.opens_block().is_some() || d.allowed_in(Scope::TopLevel) =>
                {
                    Err(args.error(ParseErrorKind::UnexpectedDirective(format!(
                        "{} is not allowed inside {} block '{}' opened on line {}",
                        key, block.kind, block.name, block.start_line
                    ))))
                }
                _ => handlers::secret_context_line(values, args),
            }
        } else {
            match classify(args.keyword) {
                Classified::Known(d) if d.allowed_in(scope) => {
                    handlers::block(&mut block.record, d, args)
                }
                Classified::Known(_) | Classified::Passthrough(_) => {
                    Err(args.error(ParseErrorKind::UnexpectedDirective(format!(
                        "{} is not allowed inside {}",
                        args.keyword,
                        block.describe()
                    ))))
                }
                Classified::Unknown(keyword) => Err(args.error(
                    ParseErrorKind::UnknownDirective(keyword.to_string()),
                )),
            }
        };
        self.open = Some(block);
        result
    }

    fn passthrough(&mut self, keyword: &str, args: &DirectiveArgs<'_>) {
        self.config.dockerfile_instructions.push(DockerfileInstruction {
            instruction: keyword.to_string(),
            args: tokens::split_words(args.text),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<AgentfileConfig, ParseError> {
        parse_str(src, &Environment::new())
    }

    #[test]
    fn supports_everything_but_yaml() {
        assert!(AgentfileParser::supports(Path::new("Agentfile")));
        assert!(AgentfileParser::supports(Path::new("prod.agentfile")));
        assert!(!AgentfileParser::supports(Path::new("agent.YAML")));
        assert!(!AgentfileParser::supports(Path::new("agent.yml")));
    }

    #[test]
    fn policy_from_str() {
        assert_eq!(
            "Passthrough".parse::<UnknownDirectivePolicy>().unwrap(),
            UnknownDirectivePolicy::Passthrough
        );
        assert_eq!(
            "error".parse::<UnknownDirectivePolicy>().unwrap(),
            UnknownDirectivePolicy::Reject
        );
        assert!("ignore".parse::<UnknownDirectivePolicy>().is_err());
    }

    #[test]
    fn end_at_top_level_is_unexpected() {
        let err = parse("FROM x\nEND\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedDirective(_)));
    }

    #[test]
    fn nested_opener_cites_open_block() {
        let err = parse("AGENT a\nAGENT b\nEND\n").unwrap_err();
        assert_eq!(err.line, 2);
        let ParseErrorKind::UnexpectedDirective(msg) = &err.kind else {
            panic!("unexpected error kind: {err}");
        };
        assert!(msg.contains("agent block 'a' opened on line 1"), "{msg}");
    }

    #[test]
    fn block_only_directive_at_top_level() {
        let err = parse("INSTRUCTION hi\n").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedDirective(_)));
    }

    #[test]
    fn env_is_passthrough_outside_server_blocks() {
        let cfg = parse("ENV LANG=C.UTF-8\nSERVER fs\nENV ROOT /data\nEND\n").unwrap();
        assert_eq!(cfg.dockerfile_instructions.len(), 1);
        assert_eq!(cfg.dockerfile_instructions[0].instruction, "ENV");
        assert_eq!(cfg.servers["fs"].env["ROOT"].as_deref(), Some("/data"));
    }

    #[test]
    fn passthrough_keyword_inside_block_is_rejected() {
        let err = parse("AGENT a\nRUN ls\nEND\n").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedDirective(_)));
    }

    #[test]
    fn unknown_directive_policy() {
        let err = parse("frobnicate now\n").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UnknownDirective("frobnicate".to_string())
        );

        let parser = AgentfileParser::new(ParseOptions {
            unknown_directives: UnknownDirectivePolicy::Passthrough,
        });
        let cfg = parser
            .parse("run echo hi\n", &Environment::new())
            .unwrap();
        assert_eq!(cfg.dockerfile_instructions[0].instruction, "RUN");
        assert_eq!(cfg.dockerfile_instructions[0].args, vec!["echo", "hi"]);

        let err = parser
            .parse("AGENT a\nfoo bar\nEND\n", &Environment::new())
            .unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnknownDirective(_)));
    }

    #[test]
    fn block_opener_needs_one_name() {
        let err = parse("AGENT\n").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MissingRequiredArgument(_)));
        let err = parse("AGENT a b\nEND\n").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidValue(_)));
    }

    #[test]
    fn secret_context_block() {
        let src = "SECRET_CONTEXT generic\napi_key ${KEY}\nbase_url=http://localhost\nEND\n";
        let env = Environment::from([("KEY".to_string(), "sk-1".to_string())]);
        let cfg = parse_str(src, &env).unwrap();
        let crate::model::Secret::Context { name, values } = &cfg.secrets[0] else {
            panic!("expected a secret context");
        };
        assert_eq!(name, "generic");
        assert_eq!(values["api_key"], "sk-1");
        assert_eq!(values["base_url"], "http://localhost");
    }

    #[test]
    fn secret_context_rejects_openers_and_top_level_directives() {
        let err = parse("SECRET_CONTEXT c\nk v\nAGENT a\nEND\n").unwrap_err();
        assert_eq!(err.line, 3);
        let ParseErrorKind::UnexpectedDirective(msg) = &err.kind else {
            panic!("unexpected error kind: {err}");
        };
        assert!(msg.contains("secret context block 'c' opened on line 1"), "{msg}");

        let err = parse("SECRET_CONTEXT c\nFROM evil\nEND\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedDirective(_)));

        let err = parse("SECRET_CONTEXT c\nMODEL=gpt-4\nEND\n").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedDirective(_)));

        // Ordinary upper-case keys are still secrets.
        let cfg = parse("SECRET_CONTEXT c\nOPENAI_API_KEY sk\nURL=http://x\nEND\n").unwrap();
        let crate::model::Secret::Context { values, .. } = &cfg.secrets[0] else {
            panic!("expected a secret context");
        };
        assert_eq!(values["OPENAI_API_KEY"], "sk");
        assert_eq!(values["URL"], "http://x");
    }

    #[test]
    fn passthrough_keeps_quoted_runs() {
        let cfg = parse("RUN echo \"a   b\" && \\\n    ls\n").unwrap();
        assert_eq!(
            cfg.dockerfile_instructions[0].to_dockerfile_line(),
            "RUN echo \"a   b\" && ls"
        );
    }

    #[test]
    fn mcp_server_alias_and_command_args() {
        let src = "MCP_SERVER fetch\nCOMMAND uvx mcp-server-fetch\nARGS --verbose\nTRANSPORT stdio\nEND\n";
        let cfg = parse(src).unwrap();
        let server = &cfg.servers["fetch"];
        assert_eq!(server.command.as_deref(), Some("uvx"));
        assert_eq!(server.args, vec!["mcp-server-fetch", "--verbose"]);
    }
}
