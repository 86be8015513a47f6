//! Sandbox run configuration.

use serde::{Deserialize, Serialize};

/// A command to run inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Install/start commands executed on an explicit "run" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_install_command")]
    pub install_command: CommandSpec,
    #[serde(default = "default_start_command")]
    pub start_command: CommandSpec,
}

fn default_install_command() -> CommandSpec {
    CommandSpec::new("npm", &["install"])
}

fn default_start_command() -> CommandSpec {
    CommandSpec::new("npm", &["start"])
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            install_command: default_install_command(),
            start_command: default_start_command(),
        }
    }
}
