use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use microcredit_risk_engine::{
    microcredit::{MAX_ACTIVITY_MONTHS, MAX_RATING},
    Assessment, EngineError, InputReport, MicrocreditInputs, RiskRuntime, RiskTelemetry,
    RuleBaseDocument,
};
use serde_json::json;
use shared_logging::LogLevel;

const BANNER_WIDTH: usize = 60;
const TABLE_WIDTH: usize = 75;

#[derive(Parser, Debug)]
#[command(name = "risk", version, about = "Microcredit applicant risk scoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// TOML rule base; the built-in microcredit rules when omitted.
    #[arg(long, global = true)]
    rules: Option<PathBuf>,
    /// Append JSON-lines telemetry to this file.
    #[arg(long, global = true)]
    log: Option<PathBuf>,
    /// Minimum telemetry level.
    #[arg(long, global = true, default_value = "info", value_parser = parse_level)]
    log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scores an applicant.
    Assess {
        #[command(flatten)]
        applicant: ApplicantArgs,
        /// Print the assessment as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Shows the dominant term of every input.
    Report {
        #[command(flatten)]
        applicant: ApplicantArgs,
    },
    /// Dumps the aggregated output curve and rule strengths as JSON.
    Profile {
        #[command(flatten)]
        applicant: ApplicantArgs,
    },
    /// Validates the rule base and lists its rules.
    Rules,
}

#[derive(Args, Debug, Clone, Copy)]
struct ApplicantArgs {
    /// Months of activity [0-60].
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_ACTIVITY_MONTHS)))]
    activity: u8,
    /// Income consistency [0-10].
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_RATING)))]
    income: u8,
    /// Payment history [0-10].
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_RATING)))]
    history: u8,
}

impl From<ApplicantArgs> for MicrocreditInputs {
    fn from(args: ApplicantArgs) -> Self {
        Self::new(args.activity, args.income, args.history)
    }
}

fn parse_level(raw: &str) -> Result<LogLevel, String> {
    raw.parse().map_err(|err: anyhow::Error| err.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = build_runtime(&cli)?;
    match cli.command {
        Commands::Assess { applicant, json } => {
            let inputs = MicrocreditInputs::from(applicant);
            let assessment = runtime.assess(inputs).map_err(|err| explain(err, &inputs))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&assessment)?);
            } else {
                print!("{}", render_assessment(&assessment));
            }
        }
        Commands::Report { applicant } => {
            print!("{}", render_report(&runtime.report(applicant.into())));
        }
        Commands::Profile { applicant } => {
            let inputs = MicrocreditInputs::from(applicant);
            let inference = runtime.profile(inputs).map_err(|err| explain(err, &inputs))?;
            let curve: Vec<[f64; 2]> = inference
                .profile
                .samples()
                .map(|(point, degree)| [point, degree])
                .collect();
            let payload = json!({
                "inputs": inputs,
                "score": inference.crisp,
                "strengths": inference.strengths,
                "profile": curve,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Commands::Rules => {
            let engine = runtime.engine();
            for variable in engine.inputs() {
                let terms: Vec<&str> = variable.terms().keys().map(String::as_str).collect();
                println!("input  {} [{}]", variable.name(), terms.join(", "));
            }
            let output = engine.output();
            let terms: Vec<&str> = output.terms().keys().map(String::as_str).collect();
            println!("output {} [{}]", output.name(), terms.join(", "));
            for (idx, rule) in engine.rules().iter().enumerate() {
                println!("{:>3}. {rule}", idx + 1);
            }
            if cli.rules.is_none() {
                println!();
                print!("{}", RuleBaseDocument::from_engine(engine).to_toml_string()?);
            }
        }
    }
    Ok(())
}

fn build_runtime(cli: &Cli) -> Result<RiskRuntime> {
    let telemetry = match &cli.log {
        Some(path) => Some(
            RiskTelemetry::builder("risk-cli")
                .log_path(path)
                .min_level(cli.log_level)
                .build()
                .with_context(|| format!("opening log {}", path.display()))?,
        ),
        None => None,
    };
    match &cli.rules {
        Some(path) => RiskRuntime::from_rule_base(path, telemetry),
        None => Ok(RiskRuntime::with_defaults(telemetry)?),
    }
}

fn explain(err: EngineError, inputs: &MicrocreditInputs) -> anyhow::Error {
    match err {
        EngineError::NoRuleFired => anyhow::anyhow!(
            "no rule covers activity={} income={} history={}; the risk cannot be scored for this profile",
            inputs.activity_months,
            inputs.income_consistency,
            inputs.payment_history
        ),
        other => other.into(),
    }
}

fn render_assessment(assessment: &Assessment) -> String {
    let heavy = "=".repeat(BANNER_WIDTH);
    let light = "-".repeat(BANNER_WIDTH);
    let band = assessment.result.band.label().to_uppercase();
    format!(
        "{heavy}\n FINAL RESULT: {band} RISK\n{light}\n Risk score: {:.2} / 100.0\n{heavy}\n",
        assessment.result.score
    )
}

fn render_report(report: &InputReport) -> String {
    let heavy = "=".repeat(TABLE_WIDTH);
    let mut out = format!(
        "{heavy}\n{:^width$}\n{heavy}\n",
        "INPUT STATUS REPORT",
        width = TABLE_WIDTH
    );
    let headers: Vec<String> = report.rows.iter().map(|row| heading(&row.variable)).collect();
    let values: Vec<String> = report
        .rows
        .iter()
        .map(|row| value_label(&row.variable, row.value))
        .collect();
    let terms: Vec<String> = report
        .rows
        .iter()
        .map(|row| row.dominant_term.to_uppercase())
        .collect();
    out.push_str(&table_row(&headers));
    out.push_str(&"-".repeat(TABLE_WIDTH));
    out.push('\n');
    out.push_str(&table_row(&values));
    out.push_str(&table_row(&terms));
    out.push_str(&heavy);
    out.push('\n');
    out
}

fn table_row(cells: &[String]) -> String {
    let mut line = String::from("|");
    for cell in cells {
        line.push_str(&format!(" {cell:^22} |"));
    }
    line.push('\n');
    line
}

fn heading(variable: &str) -> String {
    variable.replace('_', " ").to_uppercase()
}

fn value_label(variable: &str, value: f64) -> String {
    if variable == microcredit_risk_engine::microcredit::ACTIVITY_MONTHS {
        format!("{value} months")
    } else {
        format!("Rating {value}")
    }
}
