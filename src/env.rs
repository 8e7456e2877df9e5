//! The environment-variable source.
//!
//! Variables carrying the configured prefix (default `GS_`) are always
//! imported, with the prefix stripped. Everything else passes through the
//! include/exclude regex filters, themselves read from the captured
//! environment (`INCLUDE_ENV_PATTERNS`, default `.*`, and
//! `EXCLUDE_ENV_PATTERNS`, default empty; both comma-separated). Imported
//! keys are rewritten `_` → `.` and lowercased: `GS_ENVS_INT` → `envs.int`.

use regex::Regex;

use crate::error::ConfError;
use crate::props::Properties;

/// Environment variable naming the comma-separated include patterns.
pub const INCLUDE_ENV_PATTERNS: &str = "INCLUDE_ENV_PATTERNS";
/// Environment variable naming the comma-separated exclude patterns.
pub const EXCLUDE_ENV_PATTERNS: &str = "EXCLUDE_ENV_PATTERNS";

/// A captured snapshot of the process environment, filtered into properties.
pub struct Environment {
    prefix: String,
    environ: Vec<(String, String)>,
}

impl Environment {
    pub(crate) fn new() -> Self {
        Environment {
            prefix: "GS_".to_string(),
            environ: std::env::vars().collect(),
        }
    }

    /// Replace the prefix whose variables are imported unconditionally.
    pub fn set_prefix(&mut self, prefix: &str) {
        self.prefix = prefix.to_string();
    }

    /// Replace the captured environment; tests feed synthetic pairs here.
    pub fn reset(&mut self, environ: Vec<(String, String)>) {
        self.environ = environ;
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        self.environ
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
    }

    pub(crate) fn copy_to(&self, out: &mut Properties) -> Result<(), ConfError> {
        let compile = |patterns: &str| -> Result<Vec<Regex>, ConfError> {
            patterns
                .split(',')
                .map(|p| Regex::new(p).map_err(ConfError::from))
                .collect()
        };
        let includes = compile(self.lookup(INCLUDE_ENV_PATTERNS).unwrap_or(".*"))?;
        let excludes = match self.lookup(EXCLUDE_ENV_PATTERNS) {
            Some(patterns) => compile(patterns)?,
            None => Vec::new(),
        };
        let matches = |rex: &[Regex], s: &str| rex.iter().any(|r| r.is_match(s));

        for (key, value) in &self.environ {
            let prop_key = if let Some(rest) = key.strip_prefix(&self.prefix) {
                rest
            } else if matches(&includes, key) && !matches(&excludes, key) {
                key
            } else {
                continue;
            };
            let prop_key = prop_key.replace('_', ".").to_lowercase();
            out.set(&prop_key, value)?;
        }
        Ok(())
    }
}
