//! Statistics collaborator (`scc`) and normalization of its JSON output.

use std::path::PathBuf;
use std::process::Command;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{MetricsError, Result};
use crate::git::Workspace;

/// Line count and complexity of one language at one sample date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LanguageMetric {
    pub lines: Option<u64>,
    pub complexity: Option<u64>,
}

/// Per-language metrics of one snapshot, in the order the tool reported them
pub type LanguageMetrics = IndexMap<String, LanguageMetric>;

/// Accepted key spellings for each logical field, in priority order.
///
/// Exact matches are tried first, then the same keys ignoring ASCII case.
#[derive(Debug, Clone, Copy)]
pub struct FieldAliases {
    pub name: &'static [&'static str],
    pub lines: &'static [&'static str],
    pub complexity: &'static [&'static str],
}

/// Key spellings emitted by the various `scc` versions and output modes
pub const SCC_ALIASES: FieldAliases = FieldAliases {
    name: &["Name", "language", "Language", "name"],
    lines: &["Code", "code", "Lines", "lines"],
    complexity: &["Complexity", "complexity"],
};

impl FieldAliases {
    /// Normalize one payload element. `None` when no usable name is found.
    pub fn extract(&self, entry: &Map<String, Value>) -> Option<(String, LanguageMetric)> {
        let name = lookup(entry, self.name, as_name)?;
        let metric = LanguageMetric {
            lines: lookup(entry, self.lines, as_count),
            complexity: lookup(entry, self.complexity, as_count),
        };
        Some((name, metric))
    }
}

fn lookup<T>(
    entry: &Map<String, Value>,
    aliases: &[&str],
    convert: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    let exact = aliases
        .iter()
        .filter_map(|alias| entry.get(*alias))
        .find_map(&convert);
    if exact.is_some() {
        return exact;
    }

    aliases.iter().find_map(|alias| {
        entry
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(alias))
            .find_map(|(_, value)| convert(value))
    })
}

fn as_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f < u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse a statistics payload: a JSON array with one object per language.
///
/// Elements without a recognizable name (or that are not objects) are
/// dropped; a language reported twice keeps its last values.
pub fn parse_languages(raw: &str, aliases: &FieldAliases) -> Result<LanguageMetrics> {
    let payload: Value = serde_json::from_str(raw)?;
    let Value::Array(entries) = payload else {
        return Err(MetricsError::Validation(
            "statistics output is not a JSON array".to_string(),
        ));
    };

    Ok(entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| aliases.extract(entry))
        .collect())
}

/// Tool producing per-language aggregates for a checked-out tree
pub trait StatsTool {
    /// Probe the tool before any work is done; fails when it is missing or broken
    fn check_available(&self) -> Result<String>;

    /// Run against the workspace and return the raw JSON payload
    fn run(&self, workspace: &Workspace) -> Result<String>;
}

/// `scc` invoked as `scc -f json`
pub struct Scc {
    program: PathBuf,
}

impl Scc {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Scc {
            program: program.into(),
        }
    }
}

impl StatsTool for Scc {
    fn check_available(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .map_err(|e| MetricsError::StatsUnavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(MetricsError::StatsUnavailable(format!(
                "{} --version exited with {}",
                self.program.display(),
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run(&self, workspace: &Workspace) -> Result<String> {
        let output = Command::new(&self.program)
            .args(["-f", "json"])
            .current_dir(workspace.path())
            .output()
            .map_err(|e| MetricsError::Command(format!("Failed to execute scc: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MetricsError::Command(format!("scc failed: {}", stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
