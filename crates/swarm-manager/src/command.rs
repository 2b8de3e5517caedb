//! Command templates, the wire contract with the `docker` CLI.
//!
//! A template is a command line with named `{placeholder}`s. Rendering
//! substitutes shell-quoted values, so a hostname or token can never
//! inject extra arguments. Braces not wrapping an identifier are left
//! alone, which keeps Go template syntax like `'{{ json . }}'` literal.

use serde::{Deserialize, Serialize};
use swarm_transport::shell_quote;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("command template {template:?} has no value for placeholder {name:?}")]
    MissingParam { template: String, name: String },
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Value substituted for a placeholder.
#[derive(Debug, Clone, Copy)]
pub enum Param<'a> {
    /// One shell word.
    Arg(&'a str),
    /// Several shell words, each quoted and joined with spaces.
    Args(&'a [String]),
}

impl Param<'_> {
    fn render(&self) -> String {
        match self {
            Param::Arg(value) => shell_quote(value),
            Param::Args(values) => values
                .iter()
                .map(|v| shell_quote(v))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// A command line with named placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(String);

impl CommandTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute every placeholder from `params`.
    ///
    /// Fails if the template names a placeholder `params` lacks. Unused
    /// params are ignored.
    pub fn render(&self, params: &[(&str, Param<'_>)]) -> CommandResult<String> {
        let template = self.0.as_str();
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            match placeholder(after) {
                Some(name) => {
                    let value = params
                        .iter()
                        .find(|(key, _)| *key == name)
                        .map(|(_, value)| value.render())
                        .ok_or_else(|| CommandError::MissingParam {
                            template: template.to_string(),
                            name: name.to_string(),
                        })?;
                    out.push_str(&value);
                    rest = &after[name.len() + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        Ok(out)
    }
}

/// The identifier at the start of `s` if it is closed by `}`.
fn placeholder(s: &str) -> Option<&str> {
    let end = s.find('}')?;
    let name = &s[..end];
    let mut chars = name.chars();
    let first = chars.next()?;
    let valid = (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(name)
}

/// Every command the manager issues.
///
/// | template | placeholders |
/// |---|---|
/// | `info`, `nodes` | none |
/// | `tasks` | `node` |
/// | `init` | `advertise_addr`, `listen_addr` |
/// | `join` | `advertise_addr`, `listen_addr`, `token`, `remote_addr` |
/// | `token` | `role` |
/// | `update` | `options` (list), `node` |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandTemplates {
    pub info: CommandTemplate,
    pub nodes: CommandTemplate,
    pub tasks: CommandTemplate,
    pub init: CommandTemplate,
    pub join: CommandTemplate,
    pub token: CommandTemplate,
    pub update: CommandTemplate,
}

impl Default for CommandTemplates {
    fn default() -> Self {
        Self {
            info: CommandTemplate::new("docker info --format '{{ json . }}'"),
            nodes: CommandTemplate::new("docker node ls --format '{{ json . }}'"),
            tasks: CommandTemplate::new("docker node ps --format '{{ json . }}' {node}"),
            init: CommandTemplate::new(
                "docker swarm init --advertise-addr {advertise_addr} --listen-addr {listen_addr}",
            ),
            join: CommandTemplate::new(
                "docker swarm join --advertise-addr {advertise_addr} --listen-addr {listen_addr} --token {token} {remote_addr}",
            ),
            token: CommandTemplate::new("docker swarm join-token -q {role}"),
            update: CommandTemplate::new("docker node update {options} {node}"),
        }
    }
}
