//! Workflow records composing agents by name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::naming::{Entity, EntityKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Router {
    pub name: String,
    pub agents: Vec<String>,
    pub model: Option<String>,
    pub instruction: Option<String>,
    pub default: bool,
}

impl Router {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            model: None,
            instruction: None,
            default: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub name: String,
    pub sequence: Vec<String>,
    pub instruction: Option<String>,
    pub cumulative: bool,
    pub continue_with_final: bool,
    pub default: bool,
}

impl Chain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence: Vec::new(),
            instruction: None,
            cumulative: false,
            continue_with_final: true,
            default: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parallel {
    pub name: String,
    pub fan_out: Vec<String>,
    pub fan_in: Option<String>,
    pub instruction: Option<String>,
    pub include_request: bool,
    pub default: bool,
}

impl Parallel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fan_out: Vec::new(),
            fan_in: None,
            instruction: None,
            include_request: true,
            default: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    #[default]
    Full,
    Iterative,
}

impl PlanType {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Full => "full",
            PlanType::Iterative => "iterative",
        }
    }
}

impl FromStr for PlanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(PlanType::Full),
            "iterative" => Ok(PlanType::Iterative),
            other => Err(format!("unknown plan type '{other}' (expected full or iterative)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orchestrator {
    pub name: String,
    pub agents: Vec<String>,
    pub model: Option<String>,
    pub instruction: Option<String>,
    pub plan_type: PlanType,
    pub plan_iterations: u32,
    pub human_input: bool,
    pub default: bool,
}

impl Orchestrator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            model: None,
            instruction: None,
            plan_type: PlanType::Full,
            plan_iterations: 5,
            human_input: false,
            default: false,
        }
    }
}

/// Quality levels an evaluator can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rating::Excellent => "EXCELLENT",
            Rating::Good => "GOOD",
            Rating::Fair => "FAIR",
            Rating::Poor => "POOR",
        };
        f.write_str(s)
    }
}

/// Threshold at which refinement stops: a number or a named rating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MinRating {
    Numeric(f64),
    Symbolic(Rating),
}

impl Default for MinRating {
    fn default() -> Self {
        MinRating::Symbolic(Rating::Good)
    }
}

impl fmt::Display for MinRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinRating::Numeric(n) => write!(f, "{n}"),
            MinRating::Symbolic(r) => write!(f, "{r}"),
        }
    }
}

impl FromStr for MinRating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rating = match s.to_ascii_uppercase().as_str() {
            "EXCELLENT" => Some(Rating::Excellent),
            "GOOD" => Some(Rating::Good),
            "FAIR" => Some(Rating::Fair),
            "POOR" => Some(Rating::Poor),
            _ => None,
        };
        if let Some(r) = rating {
            return Ok(MinRating::Symbolic(r));
        }
        match s.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(MinRating::Numeric(n)),
            _ => Err(format!(
                "invalid rating '{s}' (expected a number or EXCELLENT, GOOD, FAIR, POOR)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorOptimizer {
    pub name: String,
    pub generator: String,
    pub evaluator: String,
    pub min_rating: MinRating,
    pub max_refinements: u32,
    pub include_request: bool,
    pub instruction: Option<String>,
    pub default: bool,
}

impl EvaluatorOptimizer {
    /// Start a record with the role pair still unset; `GENERATOR` and
    /// `EVALUATOR` must both be filled before the block closes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generator: String::new(),
            evaluator: String::new(),
            min_rating: MinRating::default(),
            max_refinements: 3,
            include_request: true,
            instruction: None,
            default: false,
        }
    }
}

macro_rules! impl_entity {
    ($ty:ty, $kind:expr, |$this:ident| $refs:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn name(&self) -> &str {
                &self.name
            }

            fn is_default(&self) -> bool {
                self.default
            }

            fn set_default(&mut self, value: bool) {
                self.default = value;
            }

            fn references(&self) -> Vec<&str> {
                let $this = self;
                $refs
            }
        }
    };
}

impl_entity!(Router, EntityKind::Router, |r| {
    r.agents.iter().map(String::as_str).collect()
});
impl_entity!(Chain, EntityKind::Chain, |c| {
    c.sequence.iter().map(String::as_str).collect()
});
impl_entity!(Parallel, EntityKind::Parallel, |p| {
    p.fan_out
        .iter()
        .map(String::as_str)
        .chain(p.fan_in.as_deref())
        .collect()
});
impl_entity!(Orchestrator, EntityKind::Orchestrator, |o| {
    o.agents.iter().map(String::as_str).collect()
});
impl_entity!(EvaluatorOptimizer, EntityKind::EvaluatorOptimizer, |e| {
    vec![e.generator.as_str(), e.evaluator.as_str()]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_rating_parses_symbolic_and_numeric() {
        assert_eq!(
            "good".parse::<MinRating>().unwrap(),
            MinRating::Symbolic(Rating::Good)
        );
        assert_eq!("0.8".parse::<MinRating>().unwrap(), MinRating::Numeric(0.8));
        assert!("great".parse::<MinRating>().is_err());
        assert!("NaN".parse::<MinRating>().is_err());
    }

    #[test]
    fn parallel_references_include_fan_in() {
        let mut p = Parallel::new("p");
        p.fan_out = vec!["a".into(), "b".into()];
        p.fan_in = Some("c".into());
        assert_eq!(p.references(), vec!["a", "b", "c"]);
    }

    #[test]
    fn defaults_are_per_instance() {
        let mut a = Chain::new("a");
        let b = Chain::new("b");
        a.sequence.push("x".into());
        assert!(b.sequence.is_empty());
        assert!(b.continue_with_final);
    }
}
