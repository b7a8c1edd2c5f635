pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod ingest;
pub mod io_utils;
pub mod pipeline;
pub mod progress;
pub mod selector;
pub mod stats;
pub mod store;
pub mod table;
pub mod variable;
pub mod workbench;

use std::{env, fs, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};
use serde::Serialize;

use crate::{
    cli::{Cli, Commands, InputArgs, OutputFormat},
    config::WorkbenchConfig,
    ingest::IngestOptions,
    pipeline::ChangeDescriptor,
    stats::TestId,
    workbench::{StepOutcome, Workbench},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("survey_workbench", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => WorkbenchConfig::load(path)?,
        None => WorkbenchConfig::default(),
    };
    match cli.command {
        Commands::Probe(args) => {
            let workbench = open_workbench(config, &args.input)?;
            emit(args.format, workbench.get_variables(), || {
                table::render_variables(workbench.get_variables())
            })
        }
        Commands::Review(args) => {
            let workbench = open_workbench(config, &args.input)?;
            let review = workbench.review()?;
            emit(args.format, &review, || table::render_review(&review))
        }
        Commands::Prepare(args) => handle_prepare(config, &args),
        Commands::Analyze(args) => {
            let mut config = config;
            if let Some(mode) = args.p_values {
                config.p_value_mode = mode;
            }
            let test = args.test.parse::<TestId>()?;
            let workbench = open_workbench(config, &args.input)?;
            let result = workbench.run_test(test, &args.primary, args.secondary.as_deref())?;
            emit(args.format, &result, || table::render_test_result(&result))
        }
        Commands::Suggest(args) => {
            let workbench = open_workbench(config, &args.input)?;
            let tests = workbench.suggest_tests(args.intent, &args.first, args.second.as_deref())?;
            if tests.is_empty() {
                println!("No test fits a {} analysis of these variables", args.intent);
            }
            for (position, test) in tests.iter().enumerate() {
                let marker = if position == 0 { " (recommended)" } else { "" };
                println!("{}{marker}", test.as_str());
            }
            Ok(())
        }
    }
}

/// Ingests the input and replays any step file over it.
fn open_workbench(mut config: WorkbenchConfig, input: &InputArgs) -> Result<Workbench> {
    if let Some(sample_rows) = input.sample_rows {
        config.inference_sample_rows = sample_rows;
    }
    let mut workbench = Workbench::new(config)?;
    let options = IngestOptions {
        delimiter: input.delimiter,
        encoding: io_utils::resolve_encoding(input.input_encoding.as_deref())?,
        ..IngestOptions::default()
    };
    info!(
        "Ingesting '{}' with delimiter '{}'",
        input.input.display(),
        printable_delimiter(io_utils::resolve_delimiter(&input.input, input.delimiter))
    );
    workbench.ingest_file(&input.input, &options)?;
    if let Some(path) = &input.steps {
        replay_steps(&mut workbench, path)?;
    }
    Ok(workbench)
}

fn replay_steps(workbench: &mut Workbench, path: &Path) -> Result<Vec<StepOutcome>> {
    let steps = load_steps(path)?;
    let mut outcomes = Vec::with_capacity(steps.len());
    for descriptor in steps {
        let kind = descriptor.kind();
        let outcome = workbench
            .apply_step(descriptor)
            .with_context(|| format!("Applying step {kind} from {path:?}"))?;
        debug!("{kind}: {:?}", outcome.report);
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Step files are YAML; JSON lists parse the same way.
pub fn load_steps(path: &Path) -> Result<Vec<ChangeDescriptor>> {
    let raw = fs::read_to_string(path).with_context(|| format!("Reading step file {path:?}"))?;
    serde_yaml::from_str(&raw).with_context(|| format!("Parsing step file {path:?}"))
}

fn handle_prepare(config: WorkbenchConfig, args: &cli::PrepareArgs) -> Result<()> {
    let steps_path = args
        .input
        .steps
        .clone()
        .ok_or_else(|| anyhow!("prepare requires --steps"))?;
    let input = InputArgs {
        steps: None,
        ..args.input.clone()
    };
    let mut workbench = open_workbench(config, &input)?;
    let outcomes = replay_steps(&mut workbench, &steps_path)?;
    for outcome in &outcomes {
        info!(
            "{}: {} row(s) removed, {} value(s) changed{}",
            outcome.kind,
            outcome.report.rows_removed,
            outcome.report.values_changed,
            outcome
                .report
                .notes
                .first()
                .map(|note| format!(" ({note})"))
                .unwrap_or_default()
        );
    }
    if let Some(report) = &args.report {
        let file = fs::File::create(report)
            .with_context(|| format!("Creating report file {report:?}"))?;
        serde_json::to_writer_pretty(file, &outcomes).context("Writing step report")?;
    }
    let output = args.output.clone().unwrap_or_else(|| "-".into());
    let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    export::write_csv(
        workbench.get_all_rows(),
        workbench.get_variables(),
        &output,
        args.output_delimiter,
        encoding,
    )
}

fn emit<T: Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
    render: impl FnOnce() -> String,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).context("Serializing output")?;
            println!("{json}");
        }
        OutputFormat::Table => print!("{}", render()),
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
