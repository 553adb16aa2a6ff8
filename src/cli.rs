use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{report::NumericPlotKind, schema::InputType};

#[derive(Debug, Parser)]
#[command(author, version, about = "Infer survey schemas and tally responses", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Classify every column of a survey export and optionally save the schema
    Classify(ClassifyArgs),
    /// Tally one categorical column, optionally grouped by another column
    Tally(TallyArgs),
    /// Tally every question of a schema grouped by an identifier column
    Report(ReportArgs),
    /// Show the distribution of the identifier columns
    Population(PopulationArgs),
}

#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Survey export to read ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Treat NA-style tokens (NA, N/A, null, ...) as missing answers
    #[arg(long = "placeholders-as-missing")]
    pub placeholders_as_missing: bool,
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Destination schema YAML file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Print the inferred schema YAML to stdout
    #[arg(long)]
    pub print: bool,
}

#[derive(Debug, Args)]
pub struct TallyArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Column to tally
    #[arg(short = 't', long = "target")]
    pub target: String,
    /// Column to group respondents by
    #[arg(short = 'b', long = "by")]
    pub by: Option<String>,
    /// How the column's values are encoded (single-select, multi-select)
    #[arg(long = "input-type", default_value = "single-select")]
    pub input_type: InputType,
    /// Emit the aggregation as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Schema YAML file (inferred from the input when omitted)
    #[arg(short = 's', long = "schema")]
    pub schema: Option<PathBuf>,
    /// Column to group respondents by (defaults to the grad_type identifier)
    #[arg(short = 'b', long = "by")]
    pub by: Option<String>,
    /// Presentation of numeric questions (bar, line)
    #[arg(long = "numeric-kind", default_value = "bar")]
    pub numeric_kind: NumericPlotKind,
    /// Emit the aggregations as JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PopulationArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Schema YAML file (inferred from the input when omitted)
    #[arg(short = 's', long = "schema")]
    pub schema: Option<PathBuf>,
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
