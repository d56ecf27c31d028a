//! Build configuration: which feeds to convert and with what options.
//!
//! Stored as a plain JSON document on disk:
//! ```json
//! {
//!   "operators": [
//!     { "code": "stib", "name": "STIB-MIVB Brussels", "path": "feeds/stib.zip" },
//!     { "code": "delijn", "name": "De Lijn", "path": "feeds/delijn" }
//!   ],
//!   "options": { "max_patterns_per_route": 2 }
//! }
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// One operator's feed source.
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorConfig {
    /// Short code used to namespace identifiers, e.g. "stib".
    pub code: String,
    /// Human-readable operator name.
    pub name: String,
    /// Feed directory or `.zip` archive.
    pub path: PathBuf,
}

/// Tunables shared by all per-operator chains.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineOptions {
    /// Cap on patterns retained per route, majority shapes first.
    #[serde(default = "default_max_patterns")]
    pub max_patterns_per_route: usize,
    /// Ramer-Douglas-Peucker tolerance, in degrees. The default of 1e-5
    /// (roughly a metre) keeps street-level detail.
    #[serde(default = "default_epsilon")]
    pub simplify_epsilon_degrees: f64,
    /// Emit per-operator partitions in addition to the per-mode ones.
    #[serde(default)]
    pub partition_by_operator: bool,
}

fn default_max_patterns() -> usize {
    3
}

fn default_epsilon() -> f64 {
    1e-5
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            max_patterns_per_route: default_max_patterns(),
            simplify_epsilon_degrees: default_epsilon(),
            partition_by_operator: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BuildConfig {
    pub operators: Vec<OperatorConfig>,
    #[serde(default)]
    pub options: PipelineOptions,
}

impl BuildConfig {
    /// Loads and validates the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path}"))?;
        let config: BuildConfig =
            serde_json::from_str(&content).with_context(|| format!("parsing config file {path}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.operators.is_empty() {
            bail!("config lists no operators");
        }
        let mut seen = std::collections::BTreeSet::new();
        for op in &self.operators {
            if op.code.is_empty() {
                bail!("operator {:?} has an empty code", op.name);
            }
            if !seen.insert(op.code.as_str()) {
                bail!("duplicate operator code {:?}", op.code);
            }
        }
        if self.options.max_patterns_per_route == 0 {
            bail!("max_patterns_per_route must be at least 1");
        }
        if !self.options.simplify_epsilon_degrees.is_finite()
            || self.options.simplify_epsilon_degrees < 0.0
        {
            bail!("simplify_epsilon_degrees must be a non-negative number");
        }
        Ok(())
    }
}
