//! Print a configuration back in Agentfile syntax.
//!
//! Output parses back to an equal config as long as expandable values do not
//! reference variables present in the parse environment. Settings equal to
//! their defaults are omitted.

use crate::model::{
    Agent, AgentfileConfig, Chain, EvaluatorOptimizer, Framework, McpServer, Orchestrator,
    OutputFormat, Parallel, PlanType, Router, Secret, Transport, default_cmd,
};
use crate::parser::tokens::quote;

const DEFAULT_PLAN_ITERATIONS: u32 = 5;
const DEFAULT_MAX_REFINEMENTS: u32 = 3;

pub fn to_agentfile(config: &AgentfileConfig) -> String {
    let mut out = Lines::default();

    out.push(format!("FROM {}", word(&config.base_image)));
    if config.framework != Framework::default() {
        out.push(format!("FRAMEWORK {}", config.framework));
    }
    if let Some(model) = &config.default_model {
        out.push(format!("MODEL {}", word(model)));
    }
    for instr in &config.dockerfile_instructions {
        out.push(instr.to_dockerfile_line());
    }

    if !config.secrets.is_empty() {
        out.blank();
    }
    for secret in &config.secrets {
        render_secret(&mut out, secret);
    }
    for server in config.servers.values() {
        render_server(&mut out, server);
    }
    for agent in config.agents.values() {
        render_agent(&mut out, agent);
    }
    for router in config.routers.values() {
        render_router(&mut out, router);
    }
    for chain in config.chains.values() {
        render_chain(&mut out, chain);
    }
    for parallel in config.parallels.values() {
        render_parallel(&mut out, parallel);
    }
    for orch in config.orchestrators.values() {
        render_orchestrator(&mut out, orch);
    }
    for eo in config.evaluator_optimizers.values() {
        render_evaluator_optimizer(&mut out, eo);
    }

    let mut tail = Vec::new();
    if !config.expose_ports.is_empty() {
        let ports: Vec<String> = config.expose_ports.iter().map(u16::to_string).collect();
        tail.push(format!("EXPOSE {}", ports.join(" ")));
    }
    if !config.entrypoint.is_empty() {
        tail.push(format!("ENTRYPOINT {}", exec_form(&config.entrypoint)));
    }
    if config.cmd != default_cmd() {
        tail.push(format!("CMD {}", exec_form(&config.cmd)));
    }
    if !tail.is_empty() {
        out.blank();
        tail.into_iter().for_each(|l| out.push(l));
    }
    out.finish()
}

#[derive(Default)]
struct Lines(Vec<String>);

impl Lines {
    fn push(&mut self, line: impl Into<String>) {
        self.0.push(line.into());
    }

    fn blank(&mut self) {
        if self.0.last().is_some_and(|l| !l.is_empty()) {
            self.0.push(String::new());
        }
    }

    fn open(&mut self, keyword: &str, name: &str) {
        self.blank();
        self.push(format!("{keyword} {}", word(name)));
    }

    fn body(&mut self, line: impl AsRef<str>) {
        self.push(format!("    {}", line.as_ref()));
    }

    fn close(&mut self) {
        self.push("END");
    }

    fn finish(self) -> String {
        let mut s = self.0.join("\n");
        s.push('\n');
        s
    }
}

/// Token as written: bare when safe, quoted otherwise.
fn word(s: &str) -> String {
    let needs_quotes = s.is_empty()
        || s
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | ','));
    if needs_quotes { quote(s) } else { s.to_string() }
}

fn list(names: &[String]) -> String {
    names.iter().map(|n| word(n)).collect::<Vec<_>>().join(", ")
}

fn exec_form(argv: &[String]) -> String {
    serde_json::to_string(argv).unwrap_or_else(|_| "[]".to_string())
}

fn flag_lines(out: &mut Lines, instruction: Option<&str>, default: bool) {
    if let Some(text) = instruction {
        out.body(format!("INSTRUCTION {}", quote(text)));
    }
    if default {
        out.body("DEFAULT");
    }
}

fn render_secret(out: &mut Lines, secret: &Secret) {
    match secret {
        Secret::Name(name) => out.push(format!("SECRET {}", name)),
        Secret::Value { name, value } => out.push(format!("SECRET {} {}", name, quote(value))),
        Secret::Context { name, values } => {
            out.open("SECRET_CONTEXT", name);
            for (key, value) in values {
                out.body(format!("{key} {}", quote(value)));
            }
            out.close();
            out.blank();
        }
    }
}

fn render_server(out: &mut Lines, server: &McpServer) {
    out.open("SERVER", &server.name);
    if server.transport != Transport::default() {
        out.body(format!("TRANSPORT {}", server.transport));
    }
    if let Some(command) = &server.command {
        out.body(format!("COMMAND {}", word(command)));
    }
    if !server.args.is_empty() {
        let args: Vec<String> = server.args.iter().map(|a| word(a)).collect();
        out.body(format!("ARGS {}", args.join(" ")));
    }
    if let Some(url) = &server.url {
        out.body(format!("URL {}", word(url)));
    }
    for (key, value) in &server.env {
        match value {
            Some(v) => out.body(format!("ENV {key} {}", quote(v))),
            None => out.body(format!("ENV {key}")),
        }
    }
    out.close();
}

fn render_agent(out: &mut Lines, agent: &Agent) {
    out.open("AGENT", &agent.name);
    out.body(format!("INSTRUCTION {}", quote(&agent.instruction)));
    if !agent.servers.is_empty() {
        out.body(format!("SERVERS {}", list(&agent.servers)));
    }
    if let Some(model) = &agent.model {
        out.body(format!("MODEL {}", word(model)));
    }
    if !agent.use_history {
        out.body("USE_HISTORY false");
    }
    if agent.human_input {
        out.body("HUMAN_INPUT true");
    }
    match &agent.output_format {
        Some(OutputFormat::JsonSchema { schema }) => {
            let pretty = serde_json::to_string_pretty(schema).unwrap_or_else(|_| "{}".into());
            out.body("OUTPUT_FORMAT json_schema \\");
            let mut lines = pretty.lines().peekable();
            while let Some(line) = lines.next() {
                let cont = if lines.peek().is_some() { " \\" } else { "" };
                out.body(format!("    {line}{cont}"));
            }
        }
        Some(OutputFormat::SchemaFile { file }) => {
            out.body(format!(
                "OUTPUT_FORMAT schema_file {}",
                word(&file.to_string_lossy())
            ));
        }
        None => {}
    }
    flag_lines(out, None, agent.default);
    out.close();
}

fn render_router(out: &mut Lines, router: &Router) {
    out.open("ROUTER", &router.name);
    if !router.agents.is_empty() {
        out.body(format!("AGENTS {}", list(&router.agents)));
    }
    if let Some(model) = &router.model {
        out.body(format!("MODEL {}", word(model)));
    }
    flag_lines(out, router.instruction.as_deref(), router.default);
    out.close();
}

fn render_chain(out: &mut Lines, chain: &Chain) {
    out.open("CHAIN", &chain.name);
    if !chain.sequence.is_empty() {
        out.body(format!("SEQUENCE {}", list(&chain.sequence)));
    }
    if chain.cumulative {
        out.body("CUMULATIVE true");
    }
    if !chain.continue_with_final {
        out.body("CONTINUE_WITH_FINAL false");
    }
    flag_lines(out, chain.instruction.as_deref(), chain.default);
    out.close();
}

fn render_parallel(out: &mut Lines, parallel: &Parallel) {
    out.open("PARALLEL", &parallel.name);
    if !parallel.fan_out.is_empty() {
        out.body(format!("FAN_OUT {}", list(&parallel.fan_out)));
    }
    if let Some(fan_in) = &parallel.fan_in {
        out.body(format!("FAN_IN {}", word(fan_in)));
    }
    if !parallel.include_request {
        out.body("INCLUDE_REQUEST false");
    }
    flag_lines(out, parallel.instruction.as_deref(), parallel.default);
    out.close();
}

fn render_orchestrator(out: &mut Lines, orch: &Orchestrator) {
    out.open("ORCHESTRATOR", &orch.name);
    if !orch.agents.is_empty() {
        out.body(format!("AGENTS {}", list(&orch.agents)));
    }
    if let Some(model) = &orch.model {
        out.body(format!("MODEL {}", word(model)));
    }
    if orch.plan_type != PlanType::default() {
        out.body(format!("PLAN_TYPE {}", orch.plan_type.as_str()));
    }
    if orch.plan_iterations != DEFAULT_PLAN_ITERATIONS {
        out.body(format!("PLAN_ITERATIONS {}", orch.plan_iterations));
    }
    if orch.human_input {
        out.body("HUMAN_INPUT true");
    }
    flag_lines(out, orch.instruction.as_deref(), orch.default);
    out.close();
}

fn render_evaluator_optimizer(out: &mut Lines, eo: &EvaluatorOptimizer) {
    out.open("EVALUATOR_OPTIMIZER", &eo.name);
    out.body(format!("GENERATOR {}", word(&eo.generator)));
    out.body(format!("EVALUATOR {}", word(&eo.evaluator)));
    out.body(format!("MIN_RATING {}", eo.min_rating));
    if eo.max_refinements != DEFAULT_MAX_REFINEMENTS {
        out.body(format!("MAX_REFINEMENTS {}", eo.max_refinements));
    }
    if !eo.include_request {
        out.body("INCLUDE_REQUEST false");
    }
    flag_lines(out, eo.instruction.as_deref(), eo.default);
    out.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DockerfileInstruction, MinRating};
    use crate::parser::{Environment, parse_str};
    use indexmap::IndexMap;
    use proptest::prelude::*;
    use serde_json::json;

    fn reparse(cfg: &AgentfileConfig) -> AgentfileConfig {
        let text = to_agentfile(cfg);
        parse_str(&text, &Environment::new())
            .unwrap_or_else(|e| panic!("rendered Agentfile failed to parse: {e}\n{text}"))
    }

    #[test]
    fn renders_scenario_file() {
        let src = "FROM base:latest\nAGENT helper\nINSTRUCTION \"Say hi\"\nEND\n";
        let cfg = parse_str(src, &Environment::new()).unwrap();
        let text = to_agentfile(&cfg);
        assert!(text.starts_with("FROM base:latest\n"));
        assert!(text.contains("AGENT helper\n    INSTRUCTION \"Say hi\"\nEND\n"));
        assert_eq!(reparse(&cfg), cfg);
    }

    #[test]
    fn inline_schema_survives() {
        let mut cfg = AgentfileConfig::default();
        let mut agent = Agent::new("reporter");
        agent.output_format = Some(OutputFormat::JsonSchema {
            schema: json!({
                "title": "Report",
                "type": "object",
                "properties": {"score": {"type": "number", "minimum": 0}},
                "required": ["score"],
            }),
        });
        cfg.agents.insert("reporter".into(), agent);
        assert_eq!(reparse(&cfg), cfg);
    }

    #[test]
    fn multi_line_instruction_survives() {
        let mut cfg = AgentfileConfig::default();
        let mut agent = Agent::new("poet");
        agent.instruction = "Line one.\n  Line \"two\" \\ done".into();
        cfg.agents.insert("poet".into(), agent);
        assert_eq!(reparse(&cfg), cfg);
    }

    fn name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,8}"
    }

    fn text() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 .,:/_-]{0,24}"
    }

    fn agent_strategy() -> impl Strategy<Value = Agent> {
        (
            name(),
            text(),
            prop::collection::vec(name(), 0..3),
            prop::option::of(name()),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(name, instruction, servers, model, use_history, human_input)| {
                let mut a = Agent::new(name);
                a.instruction = instruction;
                a.servers = servers;
                a.model = model;
                a.use_history = use_history;
                a.human_input = human_input;
                a
            })
    }

    fn server_strategy() -> impl Strategy<Value = McpServer> {
        (
            name(),
            prop_oneof![Just(Transport::Stdio), Just(Transport::Sse), Just(Transport::Http)],
            prop::option::of(name()),
            prop::collection::vec(text(), 0..3),
            prop::collection::vec(("[A-Z][A-Z0-9_]{0,6}", prop::option::of(text())), 0..3),
        )
            .prop_map(|(name, transport, command, args, env)| {
                let mut s = McpServer::new(name);
                s.transport = transport;
                s.command = command;
                s.args = args;
                s.env = env.into_iter().collect();
                s
            })
    }

    fn secret_strategy() -> impl Strategy<Value = Secret> {
        prop_oneof![
            "[A-Z][A-Z0-9_]{0,8}".prop_map(Secret::Name),
            ("[A-Z][A-Z0-9_]{0,8}", text())
                .prop_map(|(name, value)| Secret::Value { name, value }),
            (name(), prop::collection::vec(("[a-z][a-z_]{0,6}", text()), 0..3)).prop_map(
                |(name, values)| Secret::Context {
                    name,
                    values: values.into_iter().collect::<IndexMap<_, _>>(),
                }
            ),
        ]
    }

    fn config_strategy() -> impl Strategy<Value = AgentfileConfig> {
        (
            prop::collection::vec(agent_strategy(), 0..4),
            prop::collection::vec(server_strategy(), 0..3),
            prop::collection::vec(secret_strategy(), 0..4),
            prop::collection::vec(1u16..=65535, 0..3),
            prop::collection::vec(("RUN|LABEL|WORKDIR|USER", prop::collection::vec("[a-z0-9=./-]{1,8}", 0..3)), 0..3),
            (name(), name(), "[0-9]{1,2}", 0u32..10),
            any::<Option<usize>>(),
        )
            .prop_map(|(agents, servers, secrets, ports, passthrough, eo, default_idx)| {
                let mut cfg = AgentfileConfig::default();
                for agent in agents {
                    cfg.agents.insert(agent.name.clone(), agent);
                }
                for server in servers {
                    cfg.servers.insert(server.name.clone(), server);
                }
                cfg.secrets = secrets;
                for port in ports {
                    if !cfg.expose_ports.contains(&port) {
                        cfg.expose_ports.push(port);
                    }
                }
                cfg.dockerfile_instructions = passthrough
                    .into_iter()
                    .map(|(instruction, args)| DockerfileInstruction { instruction, args })
                    .collect();
                let (generator, evaluator, rating, refinements) = eo;
                let mut e = EvaluatorOptimizer::new("refine");
                e.generator = generator;
                e.evaluator = evaluator;
                e.min_rating = rating
                    .parse::<MinRating>()
                    .unwrap_or_default();
                e.max_refinements = refinements;
                cfg.evaluator_optimizers.insert("refine".into(), e);
                if let Some(idx) = default_idx
                    && !cfg.agents.is_empty()
                {
                    let len = cfg.agents.len();
                    if let Some((_, agent)) = cfg.agents.get_index_mut(idx % len) {
                        agent.default = true;
                    }
                }
                cfg
            })
    }

    proptest! {
        #[test]
        fn render_then_parse_is_identity(cfg in config_strategy()) {
            let text = to_agentfile(&cfg);
            let parsed = parse_str(&text, &Environment::new());
            prop_assert!(parsed.is_ok(), "{:?}\n{}", parsed, text);
            prop_assert_eq!(parsed.unwrap(), cfg);
        }
    }
}
