use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    error::{EngineError, EngineResult},
    membership::Universe,
    rule::{Antecedent, Rule, TermRef},
    variable::{Fuzzification, Variable},
};

/// Degrees of every input against every one of its terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FuzzifiedInputs {
    variables: IndexMap<String, Fuzzification>,
}

impl FuzzifiedInputs {
    /// Degree of `term` on `variable`, if both exist.
    #[must_use]
    pub fn degree(&self, variable: &str, term: &str) -> Option<f64> {
        self.variables.get(variable)?.get(term).copied()
    }

    /// All degrees of one variable.
    #[must_use]
    pub fn get(&self, variable: &str) -> Option<&Fuzzification> {
        self.variables.get(variable)
    }

    /// Variables in input declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Fuzzification)> {
        self.variables.iter().map(|(name, degrees)| (name.as_str(), degrees))
    }

    fn by_index(&self, variable: usize, term: usize) -> f64 {
        self.variables
            .get_index(variable)
            .and_then(|(_, degrees)| degrees.get_index(term))
            .map_or(0.0, |(_, degree)| *degree)
    }
}

/// Aggregated output membership sampled over the output universe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputProfile {
    universe: Universe,
    degrees: Vec<f64>,
}

impl OutputProfile {
    /// Identically zero profile over `universe`.
    #[must_use]
    pub fn zeroed(universe: Universe) -> Self {
        Self {
            degrees: vec![0.0; universe.len()],
            universe,
        }
    }

    /// Builds a profile from explicit samples; one degree per universe point.
    ///
    /// Fails with [`EngineError::InvalidProfile`] on a sample-count mismatch or a
    /// degree outside `[0, 1]`.
    pub fn from_degrees(universe: Universe, degrees: Vec<f64>) -> EngineResult<Self> {
        check_profile(&degrees, &universe)?;
        Ok(Self { universe, degrees })
    }

    /// Universe the profile is sampled on.
    #[must_use]
    pub const fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Degree at each sampled point.
    #[must_use]
    pub fn degrees(&self) -> &[f64] {
        &self.degrees
    }

    /// `(point, degree)` pairs in ascending point order.
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.universe.points().zip(self.degrees.iter().copied())
    }

    /// Whether every sample is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.degrees.iter().all(|degree| *degree <= 0.0)
    }

    /// Centre of gravity of the profile.
    pub fn centroid(&self) -> EngineResult<f64> {
        defuzzify(&self.degrees, &self.universe)
    }

    fn absorb(&mut self, strength: f64, output: &Variable, term: usize) {
        let Some((_, mf)) = output.terms().get_index(term) else {
            return;
        };
        for (point, slot) in self.universe.points().zip(self.degrees.iter_mut()) {
            let clipped = strength.min(mf.degree(point));
            if clipped > *slot {
                *slot = clipped;
            }
        }
    }
}

/// Discretized centroid `Σ y·μ(y) / Σ μ(y)` over the universe samples.
///
/// An all-zero profile has no centroid and yields [`EngineError::NoRuleFired`];
/// a profile that does not sample `universe` point for point, or carries a
/// degree outside `[0, 1]`, yields [`EngineError::InvalidProfile`].
pub fn defuzzify(profile: &[f64], universe: &Universe) -> EngineResult<f64> {
    check_profile(profile, universe)?;
    let (weighted, area) = universe
        .points()
        .zip(profile)
        .fold((0.0, 0.0), |(weighted, area), (point, degree)| {
            (weighted + point * degree, area + degree)
        });
    if area.is_nan() || area <= 0.0 {
        return Err(EngineError::NoRuleFired);
    }
    Ok(weighted / area)
}

fn check_profile(profile: &[f64], universe: &Universe) -> EngineResult<()> {
    if profile.len() != universe.len() {
        return Err(EngineError::InvalidProfile(format!(
            "{} samples for a universe of {} points",
            profile.len(),
            universe.len()
        )));
    }
    if let Some(degree) = profile.iter().find(|degree| !(0.0..=1.0).contains(*degree)) {
        return Err(EngineError::InvalidProfile(format!(
            "degree {degree} is outside [0, 1]"
        )));
    }
    Ok(())
}

/// Everything one inference call produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inference {
    /// Input fuzzification.
    pub fuzzified: FuzzifiedInputs,
    /// Firing strength per rule, in rule order.
    pub strengths: Vec<f64>,
    /// Aggregated output profile.
    pub profile: OutputProfile,
    /// Defuzzified crisp output.
    pub crisp: f64,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { variable: usize, term: usize },
    And(Vec<Node>),
    Or(Vec<Node>),
}

impl Node {
    fn strength(&self, inputs: &FuzzifiedInputs) -> f64 {
        match self {
            Self::Leaf { variable, term } => inputs.by_index(*variable, *term),
            Self::And(children) => children
                .iter()
                .map(|child| child.strength(inputs))
                .fold(1.0, f64::min),
            Self::Or(children) => children
                .iter()
                .map(|child| child.strength(inputs))
                .fold(0.0, f64::max),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    antecedent: Node,
    output_term: usize,
    weight: f64,
}

impl CompiledRule {
    fn fire_strength(&self, inputs: &FuzzifiedInputs) -> f64 {
        self.antecedent.strength(inputs) * self.weight
    }
}

/// Builder collecting variables and rules before validation.
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    inputs: Vec<Variable>,
    output: Option<Variable>,
    rules: Vec<Rule>,
}

impl EngineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an input variable.
    #[must_use]
    pub fn input(mut self, variable: Variable) -> Self {
        self.inputs.push(variable);
        self
    }

    /// Sets the output variable.
    #[must_use]
    pub fn output(mut self, variable: Variable) -> Self {
        self.output = Some(variable);
        self
    }

    /// Appends a rule.
    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Appends several rules.
    #[must_use]
    pub fn rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Validates every reference and resolves term lookups to indices.
    pub fn build(self) -> EngineResult<Engine> {
        let output = self
            .output
            .ok_or_else(|| EngineError::config("engine has no output variable"))?;
        if self.inputs.is_empty() {
            return Err(EngineError::config("engine has no input variables"));
        }
        if self.rules.is_empty() {
            return Err(EngineError::config("rule base is empty"));
        }
        let mut seen = HashSet::new();
        for variable in self.inputs.iter().chain(std::iter::once(&output)) {
            variable.validate()?;
            if !seen.insert(variable.name()) {
                return Err(EngineError::config(format!(
                    "variable `{}` is declared twice",
                    variable.name()
                )));
            }
        }
        let compiled = self
            .rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| compile_rule(idx, rule, &self.inputs, &output))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Engine {
            inputs: self.inputs,
            output,
            rules: self.rules,
            compiled,
        })
    }
}

fn compile_rule(
    idx: usize,
    rule: &Rule,
    inputs: &[Variable],
    output: &Variable,
) -> EngineResult<CompiledRule> {
    let number = idx + 1;
    if !(0.0..=1.0).contains(&rule.weight) {
        return Err(EngineError::config(format!(
            "rule {number} has weight {} outside [0, 1]",
            rule.weight
        )));
    }
    let TermRef { variable, term } = &rule.consequent;
    if variable != output.name() {
        return Err(EngineError::config(format!(
            "rule {number} concludes on `{variable}`, expected output `{}`",
            output.name()
        )));
    }
    let output_term = output.term_index(term).ok_or_else(|| {
        EngineError::config(format!(
            "rule {number} concludes unknown term `{term}` of `{variable}`"
        ))
    })?;
    Ok(CompiledRule {
        antecedent: compile_node(number, &rule.antecedent, inputs)?,
        output_term,
        weight: rule.weight,
    })
}

fn compile_node(number: usize, node: &Antecedent, inputs: &[Variable]) -> EngineResult<Node> {
    match node {
        Antecedent::Is(TermRef { variable, term }) => {
            let position = inputs
                .iter()
                .position(|input| input.name() == variable)
                .ok_or_else(|| {
                    EngineError::config(format!(
                        "rule {number} references unknown input variable `{variable}`"
                    ))
                })?;
            let term_idx = inputs[position].term_index(term).ok_or_else(|| {
                EngineError::config(format!(
                    "rule {number} references unknown term `{term}` of `{variable}`"
                ))
            })?;
            Ok(Node::Leaf {
                variable: position,
                term: term_idx,
            })
        }
        Antecedent::And(children) | Antecedent::Or(children) if children.is_empty() => Err(
            EngineError::config(format!("rule {number} has an empty and/or group")),
        ),
        Antecedent::And(children) => Ok(Node::And(
            children
                .iter()
                .map(|child| compile_node(number, child, inputs))
                .collect::<EngineResult<_>>()?,
        )),
        Antecedent::Or(children) => Ok(Node::Or(
            children
                .iter()
                .map(|child| compile_node(number, child, inputs))
                .collect::<EngineResult<_>>()?,
        )),
    }
}

/// Validated, immutable Mamdani inference engine.
///
/// All methods take `&self`; every call allocates its own buffers, so one
/// engine can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct Engine {
    inputs: Vec<Variable>,
    output: Variable,
    rules: Vec<Rule>,
    compiled: Vec<CompiledRule>,
}

impl Engine {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Input variables in declaration order.
    #[must_use]
    pub fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    /// Output variable.
    #[must_use]
    pub const fn output(&self) -> &Variable {
        &self.output
    }

    /// Rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Looks up an input or the output variable by name.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.inputs
            .iter()
            .chain(std::iter::once(&self.output))
            .find(|variable| variable.name() == name)
    }

    /// Fuzzifies one crisp value per input, in input declaration order.
    pub fn fuzzify(&self, crisp: &[f64]) -> EngineResult<FuzzifiedInputs> {
        if crisp.len() != self.inputs.len() {
            return Err(EngineError::InputArity {
                expected: self.inputs.len(),
                got: crisp.len(),
            });
        }
        let variables = self
            .inputs
            .iter()
            .zip(crisp)
            .map(|(variable, value)| (variable.name().to_owned(), variable.fuzzify(*value)))
            .collect();
        Ok(FuzzifiedInputs { variables })
    }

    /// Weighted firing strength of rule `rule` (0-based).
    #[must_use]
    pub fn fire_strength(&self, rule: usize, inputs: &FuzzifiedInputs) -> Option<f64> {
        self.compiled
            .get(rule)
            .map(|compiled| compiled.fire_strength(inputs))
    }

    /// Firing strength of every rule, in rule order.
    #[must_use]
    pub fn fire_strengths(&self, inputs: &FuzzifiedInputs) -> Vec<f64> {
        self.compiled
            .iter()
            .map(|compiled| compiled.fire_strength(inputs))
            .collect()
    }

    /// Max-min aggregation of every rule's clipped consequent.
    #[must_use]
    pub fn aggregate(&self, inputs: &FuzzifiedInputs) -> OutputProfile {
        self.aggregate_strengths(&self.fire_strengths(inputs))
    }

    fn aggregate_strengths(&self, strengths: &[f64]) -> OutputProfile {
        let mut profile = OutputProfile::zeroed(*self.output.universe());
        for (compiled, strength) in self.compiled.iter().zip(strengths) {
            if *strength > 0.0 {
                profile.absorb(*strength, &self.output, compiled.output_term);
            }
        }
        profile
    }

    /// Runs fuzzification, rule evaluation, aggregation and defuzzification.
    pub fn infer(&self, crisp: &[f64]) -> EngineResult<Inference> {
        let fuzzified = self.fuzzify(crisp)?;
        let strengths = self.fire_strengths(&fuzzified);
        let profile = self.aggregate_strengths(&strengths);
        let crisp = profile.centroid()?;
        Ok(Inference {
            fuzzified,
            strengths,
            profile,
            crisp,
        })
    }

    /// Dominant term of `value` on the named variable.
    #[must_use]
    pub fn classify_input(&self, variable: &str, value: f64) -> Option<&str> {
        self.variable(variable)?.dominant_term(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(name: &str) -> Variable {
        Variable::new(name, Universe::integers(0, 10).unwrap())
            .with_term("low", 0.0, 0.0, 5.0)
            .unwrap()
            .with_term("high", 5.0, 10.0, 10.0)
            .unwrap()
    }

    fn output() -> Variable {
        Variable::new("out", Universe::integers(0, 100).unwrap())
            .with_term("small", 0.0, 25.0, 50.0)
            .unwrap()
            .with_term("large", 50.0, 75.0, 100.0)
            .unwrap()
    }

    fn engine() -> Engine {
        Engine::builder()
            .input(level("x"))
            .input(level("y"))
            .output(output())
            .rule(Rule::new(
                Antecedent::is("x", "low") & Antecedent::is("y", "low"),
                TermRef::new("out", "small"),
            ))
            .rule(Rule::new(
                Antecedent::is("x", "high") | Antecedent::is("y", "high"),
                TermRef::new("out", "large"),
            ))
            .build()
            .unwrap()
    }

    fn build_err(builder: EngineBuilder) -> String {
        match builder.build() {
            Err(EngineError::Configuration(message)) => message,
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn and_is_bounded_by_min_and_or_by_max() {
        let engine = engine();
        for x in 0..=10 {
            for y in 0..=10 {
                let inputs = engine.fuzzify(&[f64::from(x), f64::from(y)]).unwrap();
                let x_low = inputs.degree("x", "low").unwrap();
                let y_low = inputs.degree("y", "low").unwrap();
                let x_high = inputs.degree("x", "high").unwrap();
                let y_high = inputs.degree("y", "high").unwrap();
                let and = engine.fire_strength(0, &inputs).unwrap();
                let or = engine.fire_strength(1, &inputs).unwrap();
                assert!(and <= x_low.min(y_low));
                assert!(or >= x_high.max(y_high));
                assert!((0.0..=1.0).contains(&and) && (0.0..=1.0).contains(&or));
            }
        }
        assert_eq!(engine.fire_strength(7, &FuzzifiedInputs::default()), None);
    }

    #[test]
    fn aggregate_dominates_each_clipped_rule() {
        let engine = engine();
        for (x, y) in [(3.0, 6.0), (1.0, 2.0), (7.5, 0.0), (4.0, 4.5)] {
            let inputs = engine.fuzzify(&[x, y]).unwrap();
            let strengths = engine.fire_strengths(&inputs);
            assert!(strengths.iter().any(|s| *s > 0.0));
            let profile = engine.aggregate(&inputs);
            for (rule, strength) in engine.rules().iter().zip(&strengths) {
                let mf = engine.output().term(&rule.consequent.term).unwrap();
                for (point, degree) in profile.samples() {
                    assert!((0.0..=1.0).contains(&degree));
                    assert!(degree >= strength.min(mf.degree(point)));
                }
            }
        }
    }

    #[test]
    fn weight_scales_firing_strength() {
        let engine = Engine::builder()
            .input(level("x"))
            .output(output())
            .rule(Rule::new(Antecedent::is("x", "high"), TermRef::new("out", "large")).with_weight(0.5))
            .build()
            .unwrap();
        let inputs = engine.fuzzify(&[10.0]).unwrap();
        assert!((engine.fire_strength(0, &inputs).unwrap() - 0.5).abs() < 1e-12);
        let profile = engine.aggregate(&inputs);
        let peak = profile.degrees().iter().copied().fold(0.0, f64::max);
        assert!((peak - 0.5).abs() < 1e-12);
    }

    #[test]
    fn uniform_profile_centroid_is_midpoint() {
        let universe = Universe::integers(-20, 20).unwrap();
        let profile = OutputProfile::from_degrees(universe, vec![1.0; universe.len()]).unwrap();
        assert!((profile.centroid().unwrap() - universe.midpoint()).abs() < 1e-12);

        let shifted = Universe::new(0.0, 100.0, 0.5).unwrap();
        let uniform = vec![1.0; shifted.len()];
        assert!((defuzzify(&uniform, &shifted).unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn zero_profile_reports_no_rule_fired() {
        let universe = Universe::integers(0, 100).unwrap();
        let profile = OutputProfile::zeroed(universe);
        assert!(profile.is_empty());
        assert_eq!(profile.centroid(), Err(EngineError::NoRuleFired));
    }

    #[test]
    fn malformed_profiles_are_rejected() {
        let universe = Universe::integers(0, 100).unwrap();
        assert!(matches!(
            defuzzify(&[0.2, 1.0, 0.2], &universe),
            Err(EngineError::InvalidProfile(_))
        ));
        assert!(matches!(
            OutputProfile::from_degrees(universe, vec![0.0; 3]),
            Err(EngineError::InvalidProfile(_))
        ));

        let pair = Universe::integers(0, 1).unwrap();
        assert!(matches!(
            defuzzify(&[f64::NAN, 1.0], &pair),
            Err(EngineError::InvalidProfile(_))
        ));
        assert!(matches!(
            defuzzify(&[-0.5, 0.5], &pair),
            Err(EngineError::InvalidProfile(_))
        ));
        assert_eq!(defuzzify(&[0.0, 1.0], &pair), Ok(1.0));
    }

    #[test]
    fn infer_is_deterministic_and_checks_arity() {
        let engine = engine();
        let first = engine.infer(&[2.0, 9.0]).unwrap();
        let second = engine.infer(&[2.0, 9.0]).unwrap();
        assert_eq!(first.crisp.to_bits(), second.crisp.to_bits());
        assert_eq!(first, second);
        assert_eq!(
            engine.infer(&[1.0]),
            Err(EngineError::InputArity {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn classify_input_covers_inputs_and_output() {
        let engine = engine();
        assert_eq!(engine.classify_input("x", 1.0), Some("low"));
        assert_eq!(engine.classify_input("out", 80.0), Some("large"));
        assert_eq!(engine.classify_input("missing", 1.0), None);
    }

    #[test]
    fn build_rejects_inconsistent_rule_bases() {
        let base = || Engine::builder().input(level("x")).output(output());

        let message = build_err(base().rule(Rule::new(
            Antecedent::is("z", "low"),
            TermRef::new("out", "small"),
        )));
        assert!(message.contains("unknown input variable `z`"));

        let message = build_err(base().rule(Rule::new(
            Antecedent::is("x", "medium"),
            TermRef::new("out", "small"),
        )));
        assert!(message.contains("unknown term `medium`"));

        let message = build_err(base().rule(Rule::new(
            Antecedent::is("x", "low"),
            TermRef::new("x", "high"),
        )));
        assert!(message.contains("expected output `out`"));

        let message = build_err(base().rule(Rule::new(
            Antecedent::is("x", "low"),
            TermRef::new("out", "huge"),
        )));
        assert!(message.contains("unknown term `huge`"));

        let message = build_err(base().rule(
            Rule::new(Antecedent::is("x", "low"), TermRef::new("out", "small")).with_weight(1.5),
        ));
        assert!(message.contains("weight"));

        let message = build_err(base().rule(Rule::new(
            Antecedent::And(Vec::new()),
            TermRef::new("out", "small"),
        )));
        assert!(message.contains("empty"));

        assert!(build_err(base()).contains("rule base is empty"));
        assert!(build_err(Engine::builder().input(level("x"))).contains("no output"));
        assert!(build_err(
            base()
                .input(level("x"))
                .rule(Rule::new(Antecedent::is("x", "low"), TermRef::new("out", "small")))
        )
        .contains("declared twice"));
        assert!(build_err(
            Engine::builder()
                .input(Variable::new("bare", Universe::integers(0, 1).unwrap()))
                .output(output())
                .rule(Rule::new(Antecedent::is("bare", "x"), TermRef::new("out", "small")))
        )
        .contains("no terms"));
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
