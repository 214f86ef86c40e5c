//! Per-directive handlers.
//!
//! Each handler mutates either the root config (top level) or the record of
//! the open block. Scope checks happen before dispatch, so a handler only sees
//! directives that are valid for its record.

use std::path::PathBuf;
use std::str::FromStr;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::model::naming::is_identifier;
use crate::model::{
    Agent, AgentfileConfig, Chain, EvaluatorOptimizer, Framework, McpServer, MinRating,
    Orchestrator, OutputFormat, Parallel, PlanType, Router, Secret, Transport,
};

use super::block::BlockRecord;
use super::directive::Directive;
use super::error::{ParseError, ParseErrorKind};
use super::expand::{Environment, expand_env_vars};
use super::tokens::{parse_argv, parse_bool, split_args, split_list, unquote};

type Result<T> = std::result::Result<T, ParseError>;

/// One logical line split into keyword and argument text, plus what the
/// handlers need to report errors and expand values.
pub struct DirectiveArgs<'a> {
    pub line: usize,
    pub keyword: &'a str,
    pub text: &'a str,
    pub env: &'a Environment,
}

impl<'a> DirectiveArgs<'a> {
    pub fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.line, self.keyword, kind)
    }

    fn missing(&self, what: &str) -> ParseError {
        self.error(ParseErrorKind::MissingRequiredArgument(what.to_string()))
    }

    fn invalid(&self, reason: impl Into<String>) -> ParseError {
        self.error(ParseErrorKind::InvalidValue(reason.into()))
    }

    fn required(&self, what: &str) -> Result<&'a str> {
        if self.text.is_empty() {
            return Err(self.missing(what));
        }
        Ok(self.text)
    }

    pub fn tokens(&self) -> Result<Vec<String>> {
        split_args(self.text).map_err(|e| self.invalid(e))
    }

    /// Exactly one token.
    pub fn single(&self, what: &str) -> Result<String> {
        let mut tokens = self.tokens()?;
        match tokens.len() {
            0 => Err(self.missing(what)),
            1 => Ok(tokens.remove(0)),
            n => Err(self.invalid(format!("expected a single {what}, found {n} values"))),
        }
    }

    pub fn no_arguments(&self) -> Result<()> {
        if self.text.is_empty() {
            Ok(())
        } else {
            Err(self.invalid(format!("{} takes no arguments", self.keyword)))
        }
    }

    fn list(&self, what: &str) -> Result<Vec<String>> {
        let items = split_list(self.text).map_err(|e| self.invalid(e))?;
        if items.is_empty() {
            return Err(self.missing(what));
        }
        Ok(items)
    }

    fn boolean(&self) -> Result<bool> {
        let raw = self.single("boolean value")?;
        parse_bool(&raw).ok_or_else(|| self.invalid(format!("'{raw}' is not a boolean")))
    }

    /// `DEFAULT` style flag: bare keyword means true.
    fn flag(&self) -> Result<bool> {
        if self.text.is_empty() {
            return Ok(true);
        }
        self.boolean()
    }

    fn parsed<T>(&self, what: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.single(what)?;
        raw.parse::<T>()
            .map_err(|e| self.invalid(format!("{what} '{raw}': {e}")))
    }

    fn instruction(&self) -> Result<String> {
        let text = unquote(self.required("instruction text")?).map_err(|e| self.invalid(e))?;
        Ok(expand_env_vars(&text, self.env))
    }
}

pub fn top_level(config: &mut AgentfileConfig, d: Directive, args: &DirectiveArgs<'_>) -> Result<()> {
    match d {
        Directive::From => config.base_image = args.single("base image")?,
        Directive::Framework => config.framework = args.parsed::<Framework>("framework")?,
        Directive::Model => config.default_model = Some(args.single("model name")?),
        Directive::Secret => config.secrets.push(secret(args)?),
        Directive::Secrets => {
            let entries = args.tokens()?;
            if entries.is_empty() {
                return Err(args.missing("secret names"));
            }
            for entry in &entries {
                config.secrets.push(secret_entry(args, entry, None)?);
            }
        }
        Directive::Expose => {
            let ports = args.tokens()?;
            if ports.is_empty() {
                return Err(args.missing("port"));
            }
            for raw in &ports {
                let number = port(args, raw)?;
                if !config.expose_ports.contains(&number) {
                    config.expose_ports.push(number);
                }
            }
        }
        Directive::Cmd => config.cmd = argv(args)?,
        Directive::Entrypoint => config.entrypoint = argv(args)?,
        _ => return Err(misplaced(args)),
    }
    Ok(())
}

pub fn block(record: &mut BlockRecord, d: Directive, args: &DirectiveArgs<'_>) -> Result<()> {
    match record {
        BlockRecord::Agent(a) => agent(a, d, args),
        BlockRecord::Router(r) => router(r, d, args),
        BlockRecord::Chain(c) => chain(c, d, args),
        BlockRecord::Parallel(p) => parallel(p, d, args),
        BlockRecord::Orchestrator(o) => orchestrator(o, d, args),
        BlockRecord::EvaluatorOptimizer(e) => evaluator_optimizer(e, d, args),
        BlockRecord::Server(s) => server(s, d, args),
        BlockRecord::SecretContext(_) => Err(misplaced(args)),
    }
}

fn misplaced(args: &DirectiveArgs<'_>) -> ParseError {
    args.error(ParseErrorKind::UnexpectedDirective(format!(
        "{} is not valid here",
        args.keyword
    )))
}

fn agent(a: &mut Agent, d: Directive, args: &DirectiveArgs<'_>) -> Result<()> {
    match d {
        Directive::Instruction => a.instruction = args.instruction()?,
        Directive::Servers => a.servers.extend(args.list("server names")?),
        Directive::Model => a.model = Some(args.single("model name")?),
        Directive::UseHistory => a.use_history = args.boolean()?,
        Directive::HumanInput => a.human_input = args.boolean()?,
        Directive::Default => a.default = args.flag()?,
        Directive::OutputFormat => a.output_format = Some(output_format(args)?),
        _ => return Err(misplaced(args)),
    }
    Ok(())
}

fn router(r: &mut Router, d: Directive, args: &DirectiveArgs<'_>) -> Result<()> {
    match d {
        Directive::Agents => r.agents.extend(args.list("agent names")?),
        Directive::Model => r.model = Some(args.single("model name")?),
        Directive::Instruction => r.instruction = Some(args.instruction()?),
        Directive::Default => r.default = args.flag()?,
        _ => return Err(misplaced(args)),
    }
    Ok(())
}

fn chain(c: &mut Chain, d: Directive, args: &DirectiveArgs<'_>) -> Result<()> {
    match d {
        Directive::Sequence => c.sequence.extend(args.list("agent names")?),
        Directive::Instruction => c.instruction = Some(args.instruction()?),
        Directive::Cumulative => c.cumulative = args.boolean()?,
        Directive::ContinueWithFinal => c.continue_with_final = args.boolean()?,
        Directive::Default => c.default = args.flag()?,
        _ => return Err(misplaced(args)),
    }
    Ok(())
}

fn parallel(p: &mut Parallel, d: Directive, args: &DirectiveArgs<'_>) -> Result<()> {
    match d {
        Directive::FanOut => p.fan_out.extend(args.list("agent names")?),
        Directive::FanIn => p.fan_in = Some(args.single("agent name")?),
        Directive::Instruction => p.instruction = Some(args.instruction()?),
        Directive::IncludeRequest => p.include_request = args.boolean()?,
        Directive::Default => p.default = args.flag()?,
        _ => return Err(misplaced(args)),
    }
    Ok(())
}

fn orchestrator(o: &mut Orchestrator, d: Directive, args: &DirectiveArgs<'_>) -> Result<()> {
    match d {
        Directive::Agents => o.agents.extend(args.list("agent names")?),
        Directive::Model => o.model = Some(args.single("model name")?),
        Directive::Instruction => o.instruction = Some(args.instruction()?),
        Directive::PlanType => o.plan_type = args.parsed::<PlanType>("plan type")?,
        Directive::PlanIterations => o.plan_iterations = args.parsed::<u32>("plan iterations")?,
        Directive::HumanInput => o.human_input = args.boolean()?,
        Directive::Default => o.default = args.flag()?,
        _ => return Err(misplaced(args)),
    }
    Ok(())
}

fn evaluator_optimizer(
    e: &mut EvaluatorOptimizer,
    d: Directive,
    args: &DirectiveArgs<'_>,
) -> Result<()> {
    match d {
        Directive::Generator => e.generator = args.single("generator agent")?,
        Directive::Evaluator => e.evaluator = args.single("evaluator agent")?,
        Directive::MinRating => e.min_rating = args.parsed::<MinRating>("minimum rating")?,
        Directive::MaxRefinements => {
            e.max_refinements = args.parsed::<u32>("maximum refinements")?
        }
        Directive::IncludeRequest => e.include_request = args.boolean()?,
        Directive::Instruction => e.instruction = Some(args.instruction()?),
        Directive::Default => e.default = args.flag()?,
        _ => return Err(misplaced(args)),
    }
    Ok(())
}

fn server(s: &mut McpServer, d: Directive, args: &DirectiveArgs<'_>) -> Result<()> {
    match d {
        Directive::Command => {
            let mut tokens = args.tokens()?.into_iter();
            let command = tokens.next().ok_or_else(|| args.missing("command"))?;
            s.command = Some(command);
            s.args.extend(tokens);
        }
        Directive::Args => s.args.extend(args.tokens()?),
        Directive::Transport => s.transport = args.parsed::<Transport>("transport")?,
        Directive::Url => s.url = Some(args.single("url")?),
        Directive::Env => env_entries(s, args)?,
        _ => return Err(misplaced(args)),
    }
    Ok(())
}

/// `ENV KEY`, `ENV KEY value...`, or `ENV A=1 B=2`.
fn env_entries(s: &mut McpServer, args: &DirectiveArgs<'_>) -> Result<()> {
    let tokens = args.tokens()?;
    let Some(first) = tokens.first() else {
        return Err(args.missing("environment variable name"));
    };
    let check = |key: &str| {
        if is_identifier(key) {
            Ok(())
        } else {
            Err(args.invalid(format!("'{key}' is not a valid environment variable name")))
        }
    };

    if first.contains('=') {
        for token in &tokens {
            let Some((key, value)) = token.split_once('=') else {
                return Err(args.invalid(format!("expected KEY=VALUE, found '{token}'")));
            };
            check(key)?;
            s.env
                .insert(key.to_string(), Some(expand_env_vars(value, args.env)));
        }
        return Ok(());
    }

    check(first)?;
    let value = (tokens.len() > 1).then(|| expand_env_vars(&tokens[1..].join(" "), args.env));
    s.env.insert(first.clone(), value);
    Ok(())
}

fn secret(args: &DirectiveArgs<'_>) -> Result<Secret> {
    let tokens = args.tokens()?;
    match tokens.as_slice() {
        [] => Err(args.missing("secret name")),
        [entry] => secret_entry(args, entry, None),
        [name, value] if !name.contains('=') => secret_entry(args, name, Some(value)),
        _ => Err(args.error(ParseErrorKind::MalformedSecret(
            "expected NAME, NAME VALUE or NAME=VALUE".to_string(),
        ))),
    }
}

fn secret_entry(args: &DirectiveArgs<'_>, entry: &str, value: Option<&String>) -> Result<Secret> {
    let (name, value) = match (entry.split_once('='), value) {
        (Some((name, inline)), None) => (name, Some(inline)),
        (_, value) => (entry, value.map(String::as_str)),
    };
    if !is_identifier(name) {
        return Err(args.error(ParseErrorKind::MalformedSecret(format!(
            "'{name}' is not a valid secret name"
        ))));
    }
    Ok(match value {
        None => Secret::Name(name.to_string()),
        Some(value) => Secret::Value {
            name: name.to_string(),
            value: expand_env_vars(value, args.env),
        },
    })
}

/// One `KEY VALUE` / `KEY=VALUE` line of a secret context.
pub fn secret_context_line(
    values: &mut IndexMap<String, String>,
    args: &DirectiveArgs<'_>,
) -> Result<()> {
    let malformed = |reason: String| args.error(ParseErrorKind::MalformedSecret(reason));
    let (key, raw) = match args.keyword.split_once('=') {
        Some((key, head)) if args.text.is_empty() => (key, head.to_string()),
        Some((key, head)) => (key, format!("{head} {}", args.text)),
        None if args.text.is_empty() => {
            return Err(malformed(format!("'{}' has no value", args.keyword)));
        }
        None => (args.keyword, args.text.to_string()),
    };
    if !is_identifier(key) {
        return Err(malformed(format!("'{key}' is not a valid key")));
    }
    let value = unquote(raw.trim()).map_err(|e| args.invalid(e))?;
    values.insert(key.to_string(), expand_env_vars(&value, args.env));
    Ok(())
}

fn port(args: &DirectiveArgs<'_>, raw: &str) -> Result<u16> {
    let (number, protocol) = match raw.split_once('/') {
        Some((n, p)) => (n, Some(p)),
        None => (raw, None),
    };
    if let Some(p) = protocol
        && !matches!(p.to_ascii_lowercase().as_str(), "tcp" | "udp")
    {
        return Err(args.invalid(format!("unknown protocol in port '{raw}'")));
    }
    match number.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(args.invalid(format!("'{raw}' is not a valid port"))),
    }
}

fn argv(args: &DirectiveArgs<'_>) -> Result<Vec<String>> {
    let text = args.required("command")?;
    parse_argv(text).map_err(|e| args.invalid(e))
}

/// `OUTPUT_FORMAT json_schema <yaml or json>` or `OUTPUT_FORMAT schema_file <path>`.
fn output_format(args: &DirectiveArgs<'_>) -> Result<OutputFormat> {
    let text = args.required("output format type")?;
    let (kind, rest) = match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], text[idx..].trim_start_matches([' ', '\t'])),
        None => (text, ""),
    };
    match kind {
        "json_schema" => {
            let doc = dedent(rest);
            if doc.trim().is_empty() {
                return Err(args.missing("inline schema"));
            }
            let schema: JsonValue = serde_yaml::from_str(&doc)
                .map_err(|e| args.invalid(format!("inline schema: {e}")))?;
            if !schema.is_object() {
                return Err(args.invalid("inline schema must be a mapping"));
            }
            Ok(OutputFormat::JsonSchema { schema })
        }
        "schema_file" => {
            let nested = DirectiveArgs {
                text: rest.trim(),
                ..*args
            };
            Ok(OutputFormat::SchemaFile {
                file: PathBuf::from(nested.single("schema file path")?),
            })
        }
        other => Err(args.invalid(format!(
            "unknown output format '{other}' (expected json_schema or schema_file)"
        ))),
    }
}

/// Strip the indentation shared by continuation lines so an inline YAML body
/// reads the same whether or not it starts on the directive line.
fn dedent(text: &str) -> String {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or_default().trim();
    let rest: Vec<&str> = lines.collect();
    let indent = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    let mut out = String::from(first);
    for line in rest {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line.get(indent..).unwrap_or(line.trim_start()).trim_end());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args<'a>(keyword: &'a str, text: &'a str, env: &'a Environment) -> DirectiveArgs<'a> {
        DirectiveArgs {
            line: 1,
            keyword,
            text,
            env,
        }
    }

    #[test]
    fn secret_forms() {
        let env = Environment::from([("TOKEN".to_string(), "abc".to_string())]);
        assert_eq!(
            secret(&args("SECRET", "API_KEY", &env)).unwrap(),
            Secret::Name("API_KEY".into())
        );
        assert_eq!(
            secret(&args("SECRET", "API_KEY=${TOKEN}", &env)).unwrap(),
            Secret::Value {
                name: "API_KEY".into(),
                value: "abc".into()
            }
        );
        assert_eq!(
            secret(&args("SECRET", "API_KEY \"two words\"", &env)).unwrap(),
            Secret::Value {
                name: "API_KEY".into(),
                value: "two words".into()
            }
        );
        let err = secret(&args("SECRET", "A B C", &env)).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MalformedSecret(_)));
        let err = secret(&args("SECRET", "bad-name", &env)).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MalformedSecret(_)));
        let err = secret(&args("SECRET", "", &env)).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MissingRequiredArgument(_)));
    }

    #[test]
    fn env_forms() {
        let env = Environment::from([("HOME".to_string(), "/root".to_string())]);
        let mut s = McpServer::new("fs");
        env_entries(&mut s, &args("ENV", "API_KEY", &env)).unwrap();
        env_entries(&mut s, &args("ENV", "ROOT ${HOME}/data", &env)).unwrap();
        env_entries(&mut s, &args("ENV", "A=1 B=two", &env)).unwrap();
        assert_eq!(s.env.get("API_KEY"), Some(&None));
        assert_eq!(s.env.get("ROOT"), Some(&Some("/root/data".to_string())));
        assert_eq!(s.env.get("B"), Some(&Some("two".to_string())));
        assert!(env_entries(&mut s, &args("ENV", "A=1 oops", &env)).is_err());
    }

    #[test]
    fn ports() {
        let env = Environment::new();
        let a = args("EXPOSE", "", &env);
        assert_eq!(port(&a, "8080/tcp").unwrap(), 8080);
        assert!(port(&a, "0").is_err());
        assert!(port(&a, "70000").is_err());
        assert!(port(&a, "53/sctp").is_err());
    }

    #[test]
    fn inline_schema_accepts_json_and_indented_yaml() {
        let env = Environment::new();
        let json = output_format(&args(
            "OUTPUT_FORMAT",
            r#"json_schema {"type": "object"}"#,
            &env,
        ))
        .unwrap();
        assert_eq!(
            json,
            OutputFormat::JsonSchema {
                schema: serde_json::json!({"type": "object"})
            }
        );

        let yaml = output_format(&args(
            "OUTPUT_FORMAT",
            "json_schema \n    type: object\n    properties:\n      name:\n        type: string",
            &env,
        ))
        .unwrap();
        let OutputFormat::JsonSchema { schema } = yaml else {
            panic!("expected inline schema");
        };
        assert_eq!(schema["properties"]["name"]["type"], "string");

        let err = output_format(&args("OUTPUT_FORMAT", "json_schema [1, 2]", &env)).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidValue(_)));
        let err = output_format(&args("OUTPUT_FORMAT", "xml foo", &env)).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidValue(_)));
    }

    #[test]
    fn secret_context_lines() {
        let env = Environment::new();
        let mut values = IndexMap::new();
        secret_context_line(&mut values, &args("api_key", "\"sk 1\"", &env)).unwrap();
        secret_context_line(&mut values, &args("BASE_URL=https://x", "", &env)).unwrap();
        assert_eq!(values["api_key"], "sk 1");
        assert_eq!(values["BASE_URL"], "https://x");
        assert!(secret_context_line(&mut values, &args("lonely", "", &env)).is_err());
    }

    #[test]
    fn flags_and_booleans() {
        let env = Environment::new();
        assert!(args("DEFAULT", "", &env).flag().unwrap());
        assert!(!args("DEFAULT", "no", &env).flag().unwrap());
        assert!(args("USE_HISTORY", "", &env).boolean().is_err());
        assert!(args("USE_HISTORY", "perhaps", &env).boolean().is_err());
    }
}
