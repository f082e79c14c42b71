use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use shared_logging::LogLevel;
use uuid::Uuid;

use crate::{
    config,
    engine::{Engine, Inference},
    error::{EngineError, EngineResult},
    microcredit::{self, InputReport, MicrocreditInputs, RiskResult},
    telemetry::RiskTelemetry,
};

/// Outcome of one applicant assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    /// Identifier carried by the telemetry records of this call.
    pub id: Uuid,
    /// Signals that were scored.
    pub inputs: MicrocreditInputs,
    /// Score and band.
    pub result: RiskResult,
    /// Dominant term per input.
    pub report: InputReport,
    /// Firing strength per rule.
    pub strengths: Vec<f64>,
}

/// Shares one immutable engine between callers and records telemetry.
#[derive(Debug, Clone)]
pub struct RiskRuntime {
    engine: Arc<Engine>,
    telemetry: Option<RiskTelemetry>,
}

impl RiskRuntime {
    /// Wraps a built engine; fails unless it reads the microcredit signals.
    pub fn new(engine: Engine, telemetry: Option<RiskTelemetry>) -> EngineResult<Self> {
        microcredit::check_engine(&engine)?;
        let runtime = Self {
            engine: Arc::new(engine),
            telemetry,
        };
        runtime.log(
            LogLevel::Info,
            "risk.engine.configured",
            json!({
                "inputs": runtime.engine.inputs().iter().map(|v| v.name()).collect::<Vec<_>>(),
                "output": runtime.engine.output().name(),
                "rules": runtime.engine.rules().len(),
            }),
        );
        Ok(runtime)
    }

    /// Runtime over the built-in microcredit rule base.
    pub fn with_defaults(telemetry: Option<RiskTelemetry>) -> EngineResult<Self> {
        Self::new(microcredit::configure()?, telemetry)
    }

    /// Runtime over a TOML rule base file.
    pub fn from_rule_base(path: impl AsRef<Path>, telemetry: Option<RiskTelemetry>) -> Result<Self> {
        let path = path.as_ref();
        let engine = config::load_engine(path)?;
        Self::new(engine, telemetry)
            .with_context(|| format!("rule base {} is not a microcredit engine", path.display()))
    }

    /// Underlying engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Scores an applicant and builds the diagnostic report.
    pub fn assess(&self, inputs: MicrocreditInputs) -> EngineResult<Assessment> {
        let id = Uuid::new_v4();
        let inference = match microcredit::infer(&self.engine, &inputs) {
            Ok(inference) => inference,
            Err(err) => {
                self.log_failure(id, &inputs, &err);
                return Err(err);
            }
        };
        let result = RiskResult::from_score(inference.crisp);
        let report = microcredit::input_report(&self.engine, &inputs);
        self.log(
            LogLevel::Info,
            "risk.evaluation.completed",
            json!({
                "evaluation_id": id,
                "inputs": inputs,
                "score": result.score,
                "band": result.band.label(),
                "strengths": inference.strengths,
            }),
        );
        Ok(Assessment {
            id,
            inputs,
            result,
            report,
            strengths: inference.strengths,
        })
    }

    /// Full inference trace, including the aggregated output profile.
    pub fn profile(&self, inputs: MicrocreditInputs) -> EngineResult<Inference> {
        let inference = microcredit::infer(&self.engine, &inputs);
        if let Err(err) = &inference {
            self.log_failure(Uuid::new_v4(), &inputs, err);
        }
        inference
    }

    /// Dominant term per input.
    #[must_use]
    pub fn report(&self, inputs: MicrocreditInputs) -> InputReport {
        microcredit::input_report(&self.engine, &inputs)
    }

    fn log_failure(&self, id: Uuid, inputs: &MicrocreditInputs, err: &EngineError) {
        let message = match err {
            EngineError::NoRuleFired => "risk.evaluation.no_rule_fired",
            _ => "risk.evaluation.failed",
        };
        self.log(
            LogLevel::Warn,
            message,
            json!({
                "evaluation_id": id,
                "inputs": inputs,
                "error": err.to_string(),
            }),
        );
    }

    fn log(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(level, message, metadata);
        }
    }
}
