//! Agentfile configuration model: root config, agents, workflows, servers, secrets.

pub mod agent;
pub mod naming;
pub mod secret;
pub mod server;
pub mod types;
pub mod validate;
pub mod workflow;

pub use agent::*;
pub use naming::*;
pub use secret::*;
pub use server::*;
pub use types::*;
pub use validate::*;
pub use workflow::*;
