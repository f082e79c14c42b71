use serde::{Deserialize, Serialize};

use crate::{
    classification::RiskBand,
    engine::{Engine, Inference},
    error::{EngineError, EngineResult},
    membership::Universe,
    rule::{Antecedent, Rule, TermRef},
    variable::Variable,
};

/// Months the applicant's business has been active.
pub const ACTIVITY_MONTHS: &str = "activity_months";
/// Regularity of the applicant's income, rated 0-10.
pub const INCOME_CONSISTENCY: &str = "income_consistency";
/// Repayment track record, rated 0-10.
pub const PAYMENT_HISTORY: &str = "payment_history";
/// Output variable.
pub const RISK_LEVEL: &str = "risk_level";

/// Upper bound of `activity_months`.
pub const MAX_ACTIVITY_MONTHS: u8 = 60;
/// Upper bound of both 0-10 ratings.
pub const MAX_RATING: u8 = 10;

fn rating(name: &str) -> EngineResult<Variable> {
    Variable::new(name, Universe::integers(0, i32::from(MAX_RATING))?)
        .with_term("bad", 0.0, 0.0, 4.0)?
        .with_term("reasonable", 2.0, 5.0, 8.0)?
        .with_term("good", 6.0, 10.0, 10.0)
}

/// Builds the fixed three-input, four-rule microcredit engine.
pub fn configure() -> EngineResult<Engine> {
    let activity = Variable::new(
        ACTIVITY_MONTHS,
        Universe::integers(0, i32::from(MAX_ACTIVITY_MONTHS))?,
    )
    .with_term("new", 0.0, 0.0, 12.0)?
    .with_term("recent", 6.0, 18.0, 36.0)?
    .with_term("established", 24.0, 60.0, 60.0)?;

    let risk = Variable::new(RISK_LEVEL, Universe::integers(0, 100)?)
        .with_term("low", 0.0, 25.0, 50.0)?
        .with_term("medium", 30.0, 50.0, 70.0)?
        .with_term("high", 50.0, 75.0, 100.0)?;

    let is = Antecedent::is;
    let then = |term: &str| TermRef::new(RISK_LEVEL, term);

    Engine::builder()
        .input(activity)
        .input(rating(INCOME_CONSISTENCY)?)
        .input(rating(PAYMENT_HISTORY)?)
        .output(risk)
        .rule(Rule::new(
            is(PAYMENT_HISTORY, "bad") | is(INCOME_CONSISTENCY, "bad"),
            then("high"),
        ))
        .rule(Rule::new(
            is(ACTIVITY_MONTHS, "established")
                & is(PAYMENT_HISTORY, "good")
                & is(INCOME_CONSISTENCY, "good"),
            then("low"),
        ))
        .rule(Rule::new(
            is(ACTIVITY_MONTHS, "recent") & is(PAYMENT_HISTORY, "reasonable"),
            then("medium"),
        ))
        .rule(Rule::new(
            is(PAYMENT_HISTORY, "good") & is(INCOME_CONSISTENCY, "reasonable"),
            then("low"),
        ))
        .build()
}

/// Checks that `engine` reads exactly the three applicant signals and scores
/// onto `risk_level`, so evaluation can map [`MicrocreditInputs`] by name.
pub fn check_engine(engine: &Engine) -> EngineResult<()> {
    if engine.output().name() != RISK_LEVEL {
        return Err(EngineError::config(format!(
            "output variable must be `{RISK_LEVEL}`, got `{}`",
            engine.output().name()
        )));
    }
    let mut names: Vec<&str> = engine.inputs().iter().map(Variable::name).collect();
    names.sort_unstable();
    let mut expected = [ACTIVITY_MONTHS, INCOME_CONSISTENCY, PAYMENT_HISTORY];
    expected.sort_unstable();
    if names != expected {
        return Err(EngineError::config(format!(
            "inputs must be {}, got {}",
            expected.join(", "),
            names.join(", ")
        )));
    }
    Ok(())
}

/// The three applicant signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicrocreditInputs {
    /// Months of activity, `0..=60`.
    pub activity_months: u8,
    /// Income consistency rating, `0..=10`.
    pub income_consistency: u8,
    /// Payment history rating, `0..=10`.
    pub payment_history: u8,
}

impl MicrocreditInputs {
    /// Bundles the three signals.
    #[must_use]
    pub const fn new(activity_months: u8, income_consistency: u8, payment_history: u8) -> Self {
        Self {
            activity_months,
            income_consistency,
            payment_history,
        }
    }

    /// Range check performed by callers before evaluation.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.activity_months <= MAX_ACTIVITY_MONTHS,
            "activity_months must be between 0 and {MAX_ACTIVITY_MONTHS}, got {}",
            self.activity_months
        );
        anyhow::ensure!(
            self.income_consistency <= MAX_RATING,
            "income_consistency must be between 0 and {MAX_RATING}, got {}",
            self.income_consistency
        );
        anyhow::ensure!(
            self.payment_history <= MAX_RATING,
            "payment_history must be between 0 and {MAX_RATING}, got {}",
            self.payment_history
        );
        Ok(())
    }

    /// Values paired with their variable names, in engine input order.
    #[must_use]
    pub fn named(&self) -> [(&'static str, f64); 3] {
        [
            (ACTIVITY_MONTHS, f64::from(self.activity_months)),
            (INCOME_CONSISTENCY, f64::from(self.income_consistency)),
            (PAYMENT_HISTORY, f64::from(self.payment_history)),
        ]
    }

    fn crisp_for(&self, engine: &Engine) -> EngineResult<Vec<f64>> {
        let named = self.named();
        engine
            .inputs()
            .iter()
            .map(|variable| {
                named
                    .iter()
                    .find(|(name, _)| *name == variable.name())
                    .map(|(_, value)| *value)
                    .ok_or_else(|| {
                        EngineError::Configuration(format!(
                            "engine input `{}` is not a microcredit signal",
                            variable.name()
                        ))
                    })
            })
            .collect()
    }
}

/// Crisp risk score and its band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskResult {
    /// Defuzzified score in `[0, 100]`.
    pub score: f64,
    /// Band of `score`.
    pub band: RiskBand,
}

impl RiskResult {
    /// Classifies a crisp score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        Self {
            score,
            band: RiskBand::from_score(score),
        }
    }
}

/// Runs full inference, returning the intermediate stages as well.
pub fn infer(engine: &Engine, inputs: &MicrocreditInputs) -> EngineResult<Inference> {
    engine.infer(&inputs.crisp_for(engine)?)
}

/// Scores an applicant; [`EngineError::NoRuleFired`] when no rule covers the inputs.
pub fn evaluate(engine: &Engine, inputs: &MicrocreditInputs) -> EngineResult<RiskResult> {
    infer(engine, inputs).map(|inference| RiskResult::from_score(inference.crisp))
}

/// Dominant term of `value` on `variable`, for diagnostics.
#[must_use]
pub fn classify_input<'e>(engine: &'e Engine, variable: &str, value: f64) -> Option<&'e str> {
    engine.classify_input(variable, value)
}

/// One row of the input status report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputStatus {
    /// Variable name.
    pub variable: String,
    /// Crisp value supplied.
    pub value: f64,
    /// Term with the highest membership.
    pub dominant_term: String,
}

/// Per-input dominant terms, in engine input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputReport {
    /// One row per input variable.
    pub rows: Vec<InputStatus>,
}

impl InputReport {
    /// Row for one variable.
    #[must_use]
    pub fn get(&self, variable: &str) -> Option<&InputStatus> {
        self.rows.iter().find(|row| row.variable == variable)
    }
}

/// Builds the input status report for the given signals.
#[must_use]
pub fn input_report(engine: &Engine, inputs: &MicrocreditInputs) -> InputReport {
    let rows = inputs
        .named()
        .into_iter()
        .filter_map(|(variable, value)| {
            engine
                .classify_input(variable, value)
                .map(|term| InputStatus {
                    variable: variable.to_owned(),
                    value,
                    dominant_term: term.to_owned(),
                })
        })
        .collect();
    InputReport { rows }
}
