//! Parser and configuration model for Agentfile agent deployment descriptions.

pub mod config;
pub mod model;
pub mod overrides;
pub mod parser;
pub mod render;
