//! Keyword classification and scope rules.

use super::block::BlockKind;

/// Every keyword the Agentfile grammar gives a meaning to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    // top level
    From,
    Framework,
    Model,
    Secret,
    Secrets,
    Expose,
    Cmd,
    Entrypoint,
    // block openers
    Agent,
    Router,
    Chain,
    Parallel,
    Orchestrator,
    EvaluatorOptimizer,
    Server,
    SecretContext,
    End,
    // agent and workflow bodies
    Instruction,
    Servers,
    UseHistory,
    HumanInput,
    Default,
    OutputFormat,
    Agents,
    Sequence,
    Cumulative,
    ContinueWithFinal,
    FanOut,
    FanIn,
    IncludeRequest,
    PlanType,
    PlanIterations,
    Generator,
    Evaluator,
    MinRating,
    MaxRefinements,
    // server bodies
    Command,
    Args,
    Transport,
    Url,
    Env,
}

/// Where a line is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    TopLevel,
    Block(BlockKind),
}

impl Directive {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let d = match keyword {
            "FROM" => Directive::From,
            "FRAMEWORK" => Directive::Framework,
            "MODEL" => Directive::Model,
            "SECRET" => Directive::Secret,
            "SECRETS" => Directive::Secrets,
            "EXPOSE" => Directive::Expose,
            "CMD" => Directive::Cmd,
            "ENTRYPOINT" => Directive::Entrypoint,
            "AGENT" => Directive::Agent,
            "ROUTER" => Directive::Router,
            "CHAIN" => Directive::Chain,
            "PARALLEL" => Directive::Parallel,
            "ORCHESTRATOR" => Directive::Orchestrator,
            "EVALUATOR_OPTIMIZER" => Directive::EvaluatorOptimizer,
            "SERVER" | "MCP_SERVER" => Directive::Server,
            "SECRET_CONTEXT" => Directive::SecretContext,
            "END" => Directive::End,
            "INSTRUCTION" => Directive::Instruction,
            "SERVERS" => Directive::Servers,
            "USE_HISTORY" => Directive::UseHistory,
            "HUMAN_INPUT" => Directive::HumanInput,
            "DEFAULT" => Directive::Default,
            "OUTPUT_FORMAT" => Directive::OutputFormat,
            "AGENTS" => Directive::Agents,
            "SEQUENCE" => Directive::Sequence,
            "CUMULATIVE" => Directive::Cumulative,
            "CONTINUE_WITH_FINAL" => Directive::ContinueWithFinal,
            "FAN_OUT" => Directive::FanOut,
            "FAN_IN" => Directive::FanIn,
            "INCLUDE_REQUEST" => Directive::IncludeRequest,
            "PLAN_TYPE" => Directive::PlanType,
            "PLAN_ITERATIONS" => Directive::PlanIterations,
            "GENERATOR" => Directive::Generator,
            "EVALUATOR" => Directive::Evaluator,
            "MIN_RATING" => Directive::MinRating,
            "MAX_REFINEMENTS" => Directive::MaxRefinements,
            "COMMAND" => Directive::Command,
            "ARGS" => Directive::Args,
            "TRANSPORT" => Directive::Transport,
            "URL" => Directive::Url,
            "ENV" => Directive::Env,
            _ => return None,
        };
        Some(d)
    }

    /// Block kind opened by this directive, if it is an opener.
    pub fn opens_block(self) -> Option<BlockKind> {
        match self {
            Directive::Agent => Some(BlockKind::Agent),
            Directive::Router => Some(BlockKind::Router),
            Directive::Chain => Some(BlockKind::Chain),
            Directive::Parallel => Some(BlockKind::Parallel),
            Directive::Orchestrator => Some(BlockKind::Orchestrator),
            Directive::EvaluatorOptimizer => Some(BlockKind::EvaluatorOptimizer),
            Directive::Server => Some(BlockKind::Server),
            Directive::SecretContext => Some(BlockKind::SecretContext),
            _ => None,
        }
    }

    /// Whether the directive has a handler in `scope`. `END` and block
    /// openers are routed by the state machine and never report true here.
    pub fn allowed_in(self, scope: Scope) -> bool {
        use BlockKind as B;
        use Directive as D;

        let Scope::Block(kind) = scope else {
            return matches!(
                self,
                D::From
                    | D::Framework
                    | D::Model
                    | D::Secret
                    | D::Secrets
                    | D::Expose
                    | D::Cmd
                    | D::Entrypoint
            );
        };
        match self {
            D::Instruction => kind.entity_kind().is_some(),
            D::Default => kind.entity_kind().is_some(),
            D::Model => matches!(kind, B::Agent | B::Router | B::Orchestrator),
            D::Servers | D::UseHistory | D::OutputFormat => kind == B::Agent,
            D::HumanInput => matches!(kind, B::Agent | B::Orchestrator),
            D::Agents => matches!(kind, B::Router | B::Orchestrator),
            D::Sequence | D::Cumulative | D::ContinueWithFinal => kind == B::Chain,
            D::FanOut | D::FanIn => kind == B::Parallel,
            D::IncludeRequest => matches!(kind, B::Parallel | B::EvaluatorOptimizer),
            D::PlanType | D::PlanIterations => kind == B::Orchestrator,
            D::Generator | D::Evaluator | D::MinRating | D::MaxRefinements => {
                kind == B::EvaluatorOptimizer
            }
            D::Command | D::Args | D::Transport | D::Url | D::Env => kind == B::Server,
            _ => false,
        }
    }

    /// Grammar keywords that are also plain Dockerfile instructions and pass
    /// through when seen outside their block.
    pub fn is_dockerfile_instruction(self) -> bool {
        matches!(self, Directive::Env)
    }
}

/// Outcome of looking at a line's leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classified<'a> {
    Known(Directive),
    /// Well-formed uppercase keyword outside the grammar (`RUN`, `LABEL`, ...).
    Passthrough(&'a str),
    Unknown(&'a str),
}

pub fn classify(keyword: &str) -> Classified<'_> {
    if let Some(d) = Directive::from_keyword(keyword) {
        return Classified::Known(d);
    }
    if is_keyword_shape(keyword) {
        Classified::Passthrough(keyword)
    } else {
        Classified::Unknown(keyword)
    }
}

/// `[A-Z][A-Z0-9_]*`
fn is_keyword_shape(keyword: &str) -> bool {
    let mut chars = keyword.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
