//! Agent records and their structured output format.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use super::naming::{Entity, EntityKind, pascal_case};

/// Instruction used when an agent block never sets `INSTRUCTION`.
pub const DEFAULT_INSTRUCTION: &str = "You are a helpful agent.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    pub instruction: String,
    /// Server names; resolved by consumers, not at parse time.
    pub servers: Vec<String>,
    pub model: Option<String>,
    pub use_history: bool,
    pub human_input: bool,
    pub default: bool,
    pub output_format: Option<OutputFormat>,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
            servers: Vec::new(),
            model: None,
            use_history: true,
            human_input: false,
            default: false,
            output_format: None,
        }
    }
}

impl Entity for Agent {
    const KIND: EntityKind = EntityKind::Agent;

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
        self.servers.iter().map(String::as_str).collect()
    }
}

/// Structured output requested from an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputFormat {
    /// Schema embedded in the Agentfile.
    JsonSchema { schema: JsonValue },
    /// Schema kept in a `.json`/`.yaml` file next to the Agentfile.
    SchemaFile { file: PathBuf },
}

/// Result of resolving an output schema at generation time.
///
/// Loading never aborts generation: failures become `Unavailable` and the
/// caller decides how to surface the diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaLoad {
    Loaded(JsonValue),
    Unavailable { path: PathBuf, reason: String },
}

impl SchemaLoad {
    /// Comment-style marker suitable for embedding in generated sources.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            SchemaLoad::Loaded(_) => None,
            SchemaLoad::Unavailable { path, reason } => Some(format!(
                "# Error loading schema file {}: {}",
                path.display(),
                reason
            )),
        }
    }
}

impl OutputFormat {
    /// Load the schema document. `base_dir` is the directory holding the Agentfile.
    pub fn load_schema(&self, base_dir: &Path) -> SchemaLoad {
        let path = match self {
            OutputFormat::JsonSchema { schema } => return SchemaLoad::Loaded(schema.clone()),
            OutputFormat::SchemaFile { file } if file.is_absolute() => file.clone(),
            OutputFormat::SchemaFile { file } => base_dir.join(file),
        };
        let unavailable = |reason: String| {
            tracing::warn!("output schema {} unavailable: {}", path.display(), reason);
            SchemaLoad::Unavailable {
                path: path.clone(),
                reason,
            }
        };

        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();
        if !matches!(ext.as_str(), "json" | "yaml" | "yml") {
            return unavailable("unsupported schema file format".to_string());
        }
        let content = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => return unavailable(e.to_string()),
        };
        let parsed = if ext == "json" {
            serde_json::from_str::<JsonValue>(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str::<JsonValue>(&content).map_err(|e| e.to_string())
        };
        match parsed {
            Ok(schema) => SchemaLoad::Loaded(schema),
            Err(e) => unavailable(e),
        }
    }

    /// Build the `response_format` document for `agent_name`.
    pub fn response_format(&self, agent_name: &str, base_dir: &Path) -> SchemaLoad {
        match self.load_schema(base_dir) {
            SchemaLoad::Loaded(schema) => {
                let name = schema_model_name(&schema, agent_name);
                SchemaLoad::Loaded(json!({
                    "type": "json_schema",
                    "json_schema": { "name": name, "schema": schema },
                }))
            }
            other => other,
        }
    }
}

/// Schema `title` if present, otherwise `<PascalAgentName>Model`.
pub fn schema_model_name(schema: &JsonValue, agent_name: &str) -> String {
    if let Some(title) = schema.get("title").and_then(|t| t.as_str()) {
        return title.to_string();
    }
    format!("{}Model", pascal_case(agent_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_agent_defaults() {
        let a = Agent::new("helper");
        assert_eq!(a.instruction, DEFAULT_INSTRUCTION);
        assert!(a.use_history);
        assert!(!a.human_input);
        assert!(!a.default);
        assert!(a.servers.is_empty());
    }

    #[test]
    fn model_name_prefers_title() {
        let schema = json!({"title": "Report", "type": "object"});
        assert_eq!(schema_model_name(&schema, "x"), "Report");
        assert_eq!(
            schema_model_name(&json!({"type": "object"}), "news-summary"),
            "NewsSummaryModel"
        );
    }

    #[test]
    fn unsupported_extension_degrades() {
        let fmt = OutputFormat::SchemaFile {
            file: PathBuf::from("schema.txt"),
        };
        let load = fmt.load_schema(Path::new("/nonexistent"));
        let marker = load.diagnostic().expect("diagnostic");
        assert!(marker.contains("unsupported schema file format"));
    }

    #[test]
    fn inline_schema_response_format() {
        let fmt = OutputFormat::JsonSchema {
            schema: json!({"type": "object"}),
        };
        let SchemaLoad::Loaded(doc) = fmt.response_format("weather bot", Path::new(".")) else {
            panic!("inline schema always loads");
        };
        assert_eq!(doc["type"], "json_schema");
        assert_eq!(doc["json_schema"]["name"], "WeatherBotModel");
    }
}
