use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::{EngineError, EngineResult},
    membership::{MembershipFunction, Universe},
};

/// Degrees of one crisp value against every term of a variable, in
/// declaration order.
pub type Fuzzification = IndexMap<String, f64>;

/// Linguistic variable: a universe partitioned into named triangular terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    universe: Universe,
    terms: IndexMap<String, MembershipFunction>,
}

impl Variable {
    /// Creates a variable without terms.
    #[must_use]
    pub fn new(name: impl Into<String>, universe: Universe) -> Self {
        Self {
            name: name.into(),
            universe,
            terms: IndexMap::new(),
        }
    }

    /// Adds a term, rejecting duplicates and control points outside the universe.
    pub fn add_term(&mut self, name: impl Into<String>, mf: MembershipFunction) -> EngineResult<()> {
        let name = name.into();
        if self.terms.contains_key(&name) {
            return Err(EngineError::config(format!(
                "variable `{}` declares term `{name}` twice",
                self.name
            )));
        }
        if !mf.fits(&self.universe) {
            let [a, _, c] = mf.points();
            return Err(EngineError::config(format!(
                "term `{name}` of `{}` spans [{a}, {c}] outside universe [{}, {}]",
                self.name,
                self.universe.lo(),
                self.universe.hi()
            )));
        }
        self.terms.insert(name, mf);
        Ok(())
    }

    /// Builder-style [`Variable::add_term`] for a triangle `(a, b, c)`.
    pub fn with_term(mut self, name: impl Into<String>, a: f64, b: f64, c: f64) -> EngineResult<Self> {
        self.add_term(name, MembershipFunction::triangular(a, b, c)?)?;
        Ok(self)
    }

    /// Variable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Discretized domain.
    #[must_use]
    pub const fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Terms in declaration order.
    #[must_use]
    pub const fn terms(&self) -> &IndexMap<String, MembershipFunction> {
        &self.terms
    }

    /// Looks up a term by name.
    #[must_use]
    pub fn term(&self, name: &str) -> Option<&MembershipFunction> {
        self.terms.get(name)
    }

    /// Position of a term in declaration order.
    #[must_use]
    pub fn term_index(&self, name: &str) -> Option<usize> {
        self.terms.get_index_of(name)
    }

    /// Degrees of `x` against every term.
    #[must_use]
    pub fn fuzzify(&self, x: f64) -> Fuzzification {
        self.terms
            .iter()
            .map(|(name, mf)| (name.clone(), mf.degree(x)))
            .collect()
    }

    /// Term with the highest degree for `x`.
    ///
    /// Terms are scanned in declaration order and a later term replaces the
    /// current best only when its degree is strictly greater, so exact ties
    /// report the earlier-declared term. `None` only for a variable without
    /// terms.
    #[must_use]
    pub fn dominant_term(&self, x: f64) -> Option<&str> {
        let mut best: Option<(&str, f64)> = None;
        for (name, mf) in &self.terms {
            let degree = mf.degree(x);
            match best {
                Some((_, top)) if degree <= top => {}
                _ => best = Some((name.as_str(), degree)),
            }
        }
        best.map(|(name, _)| name)
    }

    pub(crate) fn validate(&self) -> EngineResult<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::config("variable name must not be empty"));
        }
        if self.terms.is_empty() {
            return Err(EngineError::config(format!(
                "variable `{}` declares no terms",
                self.name
            )));
        }
        for (name, mf) in &self.terms {
            if !mf.fits(&self.universe) {
                return Err(EngineError::config(format!(
                    "term `{name}` of `{}` lies outside its universe",
                    self.name
                )));
            }
        }
        Ok(())
    }
}
