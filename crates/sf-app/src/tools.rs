//! External tool invocation.
//!
//! Downloaders, converters, solver scripts and plotters are all described by
//! a [`ToolDef`]: a program, an argument list and extra environment
//! variables. Arguments and environment values may contain `{key}` tokens
//! that are filled from a [`Placeholders`] table before the program runs.
//! Success is exit status 0.

use sf_core::Domain;
use sf_project::ToolDef;
use std::path::Path;
use std::process::{Command, Output};

/// Trailing characters of stderr kept in error messages.
const STDERR_TAIL: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// `{key}` → value table for tool arguments.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    values: Vec<(String, String)>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.values.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.values.push((key.to_string(), value)),
        }
    }

    pub fn with_path(self, key: &str, path: &Path) -> Self {
        self.with(key, path.display())
    }

    /// Adds `lat_min`, `lat_max`, `lon_min` and `lon_max`.
    pub fn with_domain(self, domain: &Domain) -> Self {
        self.with("lat_min", domain.lat_min)
            .with("lat_max", domain.lat_max)
            .with("lon_min", domain.lon_min)
            .with("lon_max", domain.lon_max)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace every known `{key}` in `template`. Unknown tokens are left as is.
    pub fn substitute(&self, template: &str) -> String {
        let mut out = template.to_string();
        for (key, value) in &self.values {
            out = out.replace(&format!("{{{key}}}"), value);
        }
        out
    }
}

/// Run `tool` to completion. `cwd` defaults to the current directory;
/// `extra_env` is applied after the tool's own environment.
pub fn run_tool(
    tool: &ToolDef,
    vars: &Placeholders,
    cwd: Option<&Path>,
    extra_env: &[(&str, &str)],
) -> Result<Output, ToolError> {
    let args: Vec<String> = tool.args.iter().map(|a| vars.substitute(a)).collect();

    let mut cmd = Command::new(&tool.program);
    cmd.args(&args);
    for (key, value) in &tool.env {
        cmd.env(key, vars.substitute(value));
    }
    for (key, value) in extra_env {
        cmd.env(key, value);
    }
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    tracing::debug!(program = %tool.program, args = ?args, cwd = ?cwd, "running external tool");

    let output = cmd.output().map_err(|source| ToolError::Spawn {
        program: tool.program.clone(),
        source,
    })?;

    if !output.stdout.is_empty() {
        tracing::trace!(
            program = %tool.program,
            stdout = %String::from_utf8_lossy(&output.stdout),
            "tool output"
        );
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let start = stderr
            .char_indices()
            .rev()
            .nth(STDERR_TAIL)
            .map(|(i, _)| i)
            .unwrap_or(0);
        return Err(ToolError::Failed {
            program: tool.program.clone(),
            status: output.status.to_string(),
            stderr: stderr[start..].trim().to_string(),
        });
    }

    Ok(output)
}
