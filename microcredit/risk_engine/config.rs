use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    engine::Engine,
    error::EngineResult,
    rule::Rule,
    variable::Variable,
};

/// Serializable rule base: input variables, the output variable and rules.
///
/// TOML layout:
///
/// ```toml
/// [[inputs]]
/// name = "payment_history"
/// universe = { lo = 0, hi = 10, step = 1 }
/// [inputs.terms]
/// bad = [0, 0, 4]
///
/// [output]
/// name = "risk_level"
/// universe = { lo = 0, hi = 100 }
/// [output.terms]
/// high = [50, 75, 100]
///
/// [[rules]]
/// when = "payment_history is bad"
/// then = "risk_level is high"
/// weight = 1.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleBaseDocument {
    /// Antecedent variables in declaration order.
    pub inputs: Vec<Variable>,
    /// Consequent variable.
    pub output: Variable,
    /// Rules in evaluation order.
    pub rules: Vec<Rule>,
}

impl RuleBaseDocument {
    /// Loads a document from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading rule base {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parses a document from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Renders the document as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Captures the configuration of a built engine.
    #[must_use]
    pub fn from_engine(engine: &Engine) -> Self {
        Self {
            inputs: engine.inputs().to_vec(),
            output: engine.output().clone(),
            rules: engine.rules().to_vec(),
        }
    }

    /// Validates the document into an engine.
    pub fn build(self) -> EngineResult<Engine> {
        self.inputs
            .into_iter()
            .fold(Engine::builder(), crate::engine::EngineBuilder::input)
            .output(self.output)
            .rules(self.rules)
            .build()
    }
}

/// Loads and validates a rule base file in one step.
pub fn load_engine(path: impl AsRef<Path>) -> Result<Engine> {
    let path = path.as_ref();
    let document = RuleBaseDocument::load(path)?;
    document
        .build()
        .with_context(|| format!("validating rule base {}", path.display()))
}
