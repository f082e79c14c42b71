#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms,
    missing_docs
)]

//! Microcredit risk scoring: a Mamdani fuzzy inference engine plus the
//! fixed rule base that turns three applicant signals into a risk band.

/// Engine error types.
#[path = "../error.rs"]
pub mod error;

/// Triangular membership functions and discretized universes.
#[path = "../membership.rs"]
pub mod membership;

/// Linguistic variables, fuzzification and dominant-term lookup.
#[path = "../variable.rs"]
pub mod variable;

/// Rule antecedent trees and their textual form.
#[path = "../rule.rs"]
pub mod rule;

/// Core inference engine.
#[path = "../engine.rs"]
pub mod engine;

/// Score to risk band mapping.
#[path = "../classification.rs"]
pub mod classification;

/// Data-driven rule base documents.
#[path = "../config.rs"]
pub mod config;

/// Built-in microcredit rule base and typed evaluation.
#[path = "../microcredit.rs"]
pub mod microcredit;

/// Telemetry builder/hook for risk components.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// Risk runtime entry point.
#[path = "../main.rs"]
pub mod runtime;

pub use classification::RiskBand;
pub use config::RuleBaseDocument;
pub use engine::{defuzzify, Engine, EngineBuilder, FuzzifiedInputs, Inference, OutputProfile};
pub use error::{EngineError, EngineResult};
pub use membership::{membership, MembershipFunction, Universe, MAX_UNIVERSE_SAMPLES};
pub use microcredit::{
    check_engine, classify_input, configure, evaluate, input_report, InputReport, InputStatus,
    MicrocreditInputs, RiskResult,
};
pub use rule::{Antecedent, Rule, TermRef};
pub use runtime::{Assessment, RiskRuntime};
pub use telemetry::{RiskTelemetry, RiskTelemetryBuilder};
pub use variable::{Fuzzification, Variable};
