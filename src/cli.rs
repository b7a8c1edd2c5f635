use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{selector::AnalysisIntent, stats::PValueMode};

#[derive(Debug, Parser)]
#[command(author, version, about = "Prepare survey datasets and run statistical tests", long_about = None)]
pub struct Cli {
    /// Workbench settings file (YAML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest a CSV file and list the inferred variables
    Probe(ProbeArgs),
    /// Show removal candidates, duplicates, inconsistent labels and composite proposals
    Review(ReviewArgs),
    /// Apply a list of preparation steps and write the prepared CSV
    Prepare(PrepareArgs),
    /// Run a statistical test on a (optionally prepared) dataset
    Analyze(AnalyzeArgs),
    /// Suggest admissible tests for an analysis intent
    Suggest(SuggestArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Input CSV file (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Rows sampled when inferring variable types (overrides the config file)
    #[arg(long = "sample-rows")]
    pub sample_rows: Option<usize>,
    /// Preparation steps (YAML or JSON list of change descriptors) applied after ingestion
    #[arg(long = "steps")]
    pub steps: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ReviewArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct PrepareArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter to use for output (defaults by output extension)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Write the step outcomes as JSON to this file
    #[arg(long = "report")]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Test identifier, e.g. independent-t-test, one-way-anova, pearson-correlation, chi-square, normality
    #[arg(short = 't', long = "test")]
    pub test: String,
    /// Primary variable
    #[arg(long)]
    pub primary: String,
    /// Secondary variable (required by every test except normality)
    #[arg(long)]
    pub secondary: Option<String>,
    /// p-value computation (overrides the config file)
    #[arg(long = "p-values", value_enum)]
    pub p_values: Option<PValueMode>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct SuggestArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// What the analysis is after
    #[arg(long, value_enum)]
    pub intent: AnalysisIntent,
    /// First variable
    #[arg(long)]
    pub first: String,
    /// Second variable
    #[arg(long)]
    pub second: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_delimiters() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter(";"), Ok(b';'));
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("").is_err());
    }

    #[test]
    fn analyze_arguments_parse() {
        let cli = Cli::try_parse_from([
            "survey-workbench",
            "analyze",
            "-i",
            "data.csv",
            "--test",
            "t-test",
            "--primary",
            "gender",
            "--secondary",
            "score",
            "--p-values",
            "exact",
            "--format",
            "json",
        ])
        .unwrap();
        let Commands::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.p_values, Some(PValueMode::Exact));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.secondary.as_deref(), Some("score"));
    }
}
