// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use sbe_core::{ExecutionContext, Observation, SbeError};
use sbe_engine::{BatchResult, EngineConfig, run_batch};
use serde::Serialize;
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

const REQUIRED_COLUMNS: [&str; 4] = ["unit_id", "category_id", "period", "value"];

struct Cli {
    command: Command,
}

enum Command {
    Run(RunArgs),
}

#[derive(Debug, Default)]
struct RunArgs {
    input: PathBuf,
    out_dir: PathBuf,
    alpha: Option<f64>,
    min_observations: Option<usize>,
    min_segment: Option<usize>,
    min_effect: Option<f64>,
}

enum CliError {
    Sbe(SbeError),
    Io {
        context: String,
        source: io::Error,
    },
    Csv {
        context: String,
        source: csv::Error,
    },
    Json {
        context: String,
        source: serde_json::Error,
    },
    InvalidInput(String),
}

impl CliError {
    fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    fn csv(context: impl Into<String>, source: csv::Error) -> Self {
        Self::Csv {
            context: context.into(),
            source,
        }
    }

    fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Sbe(SbeError::InvalidInput(_)) | Self::InvalidInput(_) => "invalid_input",
            Self::Sbe(SbeError::NumericalIssue(_)) => "numerical_issue",
            Self::Sbe(SbeError::Infeasible(_)) => "infeasible",
            Self::Sbe(SbeError::Cancelled) => "cancelled",
            Self::Io { .. } => "io_error",
            Self::Csv { .. } => "csv_error",
            Self::Json { .. } => "json_error",
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sbe(err) => write!(f, "{err}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Csv { context, source } => write!(f, "{context}: {source}"),
            Self::Json { context, source } => write!(f, "{context}: {source}"),
            Self::InvalidInput(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sbe(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::InvalidInput(_) => None,
        }
    }
}

impl From<SbeError> for CliError {
    fn from(err: SbeError) -> Self {
        Self::Sbe(err)
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

fn main() {
    if let Err(err) = run() {
        emit_structured_error(&err);
        process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let Some(cli) = parse_cli_from_env()? else {
        return Ok(());
    };

    match cli.command {
        Command::Run(args) => handle_run(args),
    }
}

fn parse_cli_from_env() -> Result<Option<Cli>, CliError> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        print_root_help();
        return Ok(None);
    }

    if matches!(args[0].as_str(), "-h" | "--help" | "help") {
        print_root_help();
        return Ok(None);
    }
    if matches!(args[0].as_str(), "-V" | "--version") {
        print_version();
        return Ok(None);
    }

    let command_name = args[0].clone();
    let rest = &args[1..];

    if rest
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_command_help(command_name.as_str())?;
        return Ok(None);
    }

    let command = match command_name.as_str() {
        "run" => Command::Run(parse_run_args(rest)?),
        _ => {
            return Err(CliError::invalid_input(format!(
                "unknown command '{command_name}'; expected 'run'"
            )));
        }
    };

    Ok(Some(Cli { command }))
}

fn parse_run_args(tokens: &[String]) -> Result<RunArgs, CliError> {
    let mut args = RunArgs::default();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--input" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.input = PathBuf::from(raw);
            }
            "--out-dir" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.out_dir = PathBuf::from(raw);
            }
            "--alpha" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.alpha = Some(parse_f64_arg(raw.as_str(), flag)?);
            }
            "--min-observations" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.min_observations = Some(parse_usize_arg(raw.as_str(), flag)?);
            }
            "--min-segment" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.min_segment = Some(parse_usize_arg(raw.as_str(), flag)?);
            }
            "--min-effect" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.min_effect = Some(parse_f64_arg(raw.as_str(), flag)?);
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown run option '{other}'"
                )));
            }
        }
        idx += 1;
    }

    if args.input.as_os_str().is_empty() {
        return Err(CliError::invalid_input("run requires --input <csv>"));
    }
    if args.out_dir.as_os_str().is_empty() {
        return Err(CliError::invalid_input("run requires --out-dir <dir>"));
    }
    Ok(args)
}

fn split_flag(token: &str) -> Result<(&str, Option<String>), CliError> {
    if !token.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "unexpected positional argument '{token}'; expected --flag value"
        )));
    }
    if let Some((flag, value)) = token.split_once('=') {
        return Ok((flag, Some(value.to_string())));
    }
    Ok((token, None))
}

fn take_flag_value(
    flag: &str,
    inline_value: Option<String>,
    tokens: &[String],
    idx: &mut usize,
) -> Result<String, CliError> {
    if let Some(value) = inline_value {
        return Ok(value);
    }

    *idx += 1;
    let value = tokens
        .get(*idx)
        .ok_or_else(|| CliError::invalid_input(format!("{flag} requires a value")))?;
    if value.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "{flag} requires a value, but got option '{value}'"
        )));
    }
    Ok(value.clone())
}

fn parse_usize_arg(raw: &str, flag: &str) -> Result<usize, CliError> {
    raw.parse::<usize>().map_err(|_| {
        CliError::invalid_input(format!(
            "{flag} expects a non-negative integer, got '{raw}'"
        ))
    })
}

fn parse_f64_arg(raw: &str, flag: &str) -> Result<f64, CliError> {
    raw.parse::<f64>()
        .map_err(|_| CliError::invalid_input(format!("{flag} expects a number, got '{raw}'")))
}

fn build_engine_config(args: &RunArgs) -> EngineConfig {
    let mut config = EngineConfig::default();
    if let Some(alpha) = args.alpha {
        config.fdr.alpha = alpha;
    }
    if let Some(min_observations) = args.min_observations {
        config.panel.min_observations = min_observations;
    }
    if let Some(min_segment) = args.min_segment {
        config.chow.min_segment = min_segment;
    }
    if let Some(min_effect) = args.min_effect {
        config.fdr.min_abs_effect = min_effect;
    }
    config
}

fn handle_run(args: RunArgs) -> Result<(), CliError> {
    let file = fs::File::open(&args.input)
        .map_err(|err| CliError::io(format!("opening {}", args.input.display()), err))?;
    let observations = parse_observations(file)?;

    let config = build_engine_config(&args);
    let result = run_batch(&observations, &config, &ExecutionContext::new())?;

    write_outputs(&args.out_dir, &result)?;
    println!(
        "{} series, {} candidates, {} significant, {} estimated, {} ranked categories -> {}",
        result.diagnostics.n_series,
        result.diagnostics.n_candidates,
        result.diagnostics.n_significant,
        result.diagnostics.n_estimated,
        result.ranking.len(),
        args.out_dir.display()
    );
    Ok(())
}

/// Parses tabular observations. Column order is free and extra columns are
/// ignored, but every required column must be present and every period and
/// value cell must parse; anything else fails before the pipeline starts.
fn parse_observations(reader: impl io::Read) -> Result<Vec<Observation>, CliError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|err| CliError::csv("reading CSV header", err))?
        .clone();
    let mut indices = [0usize; REQUIRED_COLUMNS.len()];
    let mut missing = Vec::new();
    for (slot, name) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
        match headers.iter().position(|header| header == name) {
            Some(position) => *slot = position,
            None => missing.push(name),
        }
    }
    if !missing.is_empty() {
        return Err(CliError::invalid_input(format!(
            "input is missing required column(s): {}",
            missing.join(", ")
        )));
    }
    let [unit_idx, category_idx, period_idx, value_idx] = indices;

    let mut observations = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|err| CliError::csv(format!("reading row {}", row + 2), err))?;
        let field = |idx: usize| -> Result<&str, CliError> {
            record.get(idx).ok_or_else(|| {
                CliError::invalid_input(format!("row {} has too few columns", row + 2))
            })
        };

        let period_raw = field(period_idx)?;
        let period = period_raw.parse::<i64>().map_err(|_| {
            CliError::invalid_input(format!(
                "row {}: period '{period_raw}' is not an integer",
                row + 2
            ))
        })?;
        let value_raw = field(value_idx)?;
        let value = value_raw.parse::<f64>().map_err(|_| {
            CliError::invalid_input(format!(
                "row {}: value '{value_raw}' is not a number",
                row + 2
            ))
        })?;

        observations.push(Observation {
            unit_id: field(unit_idx)?.to_string(),
            category_id: field(category_idx)?.to_string(),
            period,
            value,
        });
    }
    Ok(observations)
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), CliError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|err| CliError::csv(format!("creating {}", path.display()), err))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| CliError::csv(format!("writing {}", path.display()), err))?;
    }
    writer
        .flush()
        .map_err(|err| CliError::io(format!("flushing {}", path.display()), err))?;
    Ok(())
}

fn write_outputs(out_dir: &Path, result: &BatchResult) -> Result<(), CliError> {
    fs::create_dir_all(out_dir)
        .map_err(|err| CliError::io(format!("creating {}", out_dir.display()), err))?;

    write_csv(&out_dir.join("detections.csv"), &result.detections)?;
    write_csv(&out_dir.join("effects.csv"), &result.effects)?;
    write_csv(&out_dir.join("ranking.csv"), &result.ranking)?;

    let diagnostics_path = out_dir.join("diagnostics.json");
    let json = serde_json::to_string_pretty(&result.diagnostics)
        .map_err(|err| CliError::json("serializing diagnostics", err))?;
    fs::write(&diagnostics_path, json)
        .map_err(|err| CliError::io(format!("writing {}", diagnostics_path.display()), err))?;
    Ok(())
}

fn print_version() {
    println!("sbe {}", env!("CARGO_PKG_VERSION"));
}

fn print_root_help() {
    println!(
        "sbe {}\n\nUSAGE:\n  sbe <COMMAND> [OPTIONS]\n\nCOMMANDS:\n  run      Detect structural breaks and estimate effects from a panel CSV\n\nGLOBAL OPTIONS:\n  -h, --help      Show help\n  -V, --version   Show version\n\nRun 'sbe run --help' for options.",
        env!("CARGO_PKG_VERSION")
    );
}

fn print_command_help(command: &str) -> Result<(), CliError> {
    match command {
        "run" => {
            println!(
                "USAGE:\n  sbe run --input <csv> --out-dir <dir> [OPTIONS]\n\nOPTIONS:\n  --input <path>               Required panel CSV with columns unit_id, category_id, period, value\n  --out-dir <path>             Required output directory\n  --alpha <float>              False discovery rate, default 0.05\n  --min-observations <usize>   Minimum rows per series, default 5\n  --min-segment <usize>        Minimum observations per segment, default 3\n  --min-effect <float>         Minimum absolute effect size, default 1.0"
            );
            Ok(())
        }
        other => Err(CliError::invalid_input(format!(
            "unknown command '{other}'; expected 'run'"
        ))),
    }
}

fn emit_structured_error(err: &CliError) {
    let envelope = ErrorEnvelope {
        error: ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        },
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!(
            "{{\"error\":{{\"code\":\"{}\",\"message\":\"{}\"}}}}",
            err.code(),
            err
        ),
    }
}
