pub mod aggregate;
pub mod classify;
pub mod cli;
pub mod decode;
pub mod error;
pub mod io_utils;
pub mod raw;
pub mod report;
pub mod schema;
pub mod stats;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands, InputArgs},
    raw::{LoadOptions, RawTable},
    schema::{ColumnRole, SurveySchema},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("survey_profiler", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Classify(args) => handle_classify(&args),
        Commands::Tally(args) => handle_tally(&args),
        Commands::Report(args) => handle_report(&args),
        Commands::Population(args) => handle_population(&args),
    }
}

fn load_table(args: &InputArgs) -> Result<RawTable> {
    let options = LoadOptions {
        delimiter: io_utils::resolve_input_delimiter(&args.input, args.delimiter),
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
        placeholders_as_missing: args.placeholders_as_missing,
    };
    info!(
        "Reading '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(options.delimiter)
    );
    RawTable::load(&args.input, &options)
}

fn load_or_classify(table: &RawTable, path: Option<&std::path::Path>) -> Result<SurveySchema> {
    match path {
        Some(path) => {
            let schema = SurveySchema::load(path)
                .with_context(|| format!("Loading schema from {path:?}"))?;
            schema
                .validate_headers(&table.headers())
                .with_context(|| format!("Checking schema {path:?} against the survey"))?;
            Ok(schema)
        }
        None => {
            debug!("No schema supplied; classifying the survey");
            Ok(classify::classify(table))
        }
    }
}

fn handle_classify(args: &cli::ClassifyArgs) -> Result<()> {
    let table = load_table(&args.input)?;
    let (schema, diagnostics) = classify::classify_with_diagnostics(&table);
    print!("{}", report::render_diagnostics(&diagnostics));
    if args.print {
        print!("{}", schema.to_yaml_string()?);
    }
    if let Some(output) = &args.output {
        schema
            .save(output)
            .with_context(|| format!("Writing schema to {output:?}"))?;
        info!(
            "Schema with {} identifier(s) and {} question(s) written to {:?}",
            schema.identifiers.bound().len(),
            schema.useful_columns.len(),
            output
        );
    }
    Ok(())
}

fn handle_tally(args: &cli::TallyArgs) -> Result<()> {
    let table = load_table(&args.input)?;
    let agg = aggregate::aggregate(&table, &args.target, args.input_type, args.by.as_deref())
        .with_context(|| format!("Tallying column '{}'", args.target))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&agg)?);
    } else {
        print!("{}", report::render_aggregation(&agg));
    }
    Ok(())
}

fn handle_report(args: &cli::ReportArgs) -> Result<()> {
    let table = load_table(&args.input)?;
    let schema = load_or_classify(&table, args.schema.as_deref())?;
    let by = match args.by.as_deref() {
        Some(by) => by,
        None => match schema.identifiers.get(ColumnRole::GradType) {
            Some(by) => by,
            None => bail!("No --by column given and the schema has no grad_type identifier"),
        },
    };

    let mut results = Vec::with_capacity(schema.useful_columns.len());
    for descriptor in &schema.useful_columns {
        if descriptor.question == by {
            warn!("Skipping '{}': it is the grouping column", by);
            continue;
        }
        let result = aggregate::aggregate_question(&table, descriptor, Some(by))
            .with_context(|| format!("Aggregating question '{}'", descriptor.question))?;
        results.push(result);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        let sections = results
            .iter()
            .map(|result| report::render_question(result, args.numeric_kind))
            .collect::<Vec<_>>();
        print!("{}", sections.join("\n"));
    }
    info!("Reported {} question(s) grouped by '{}'", results.len(), by);
    Ok(())
}

fn handle_population(args: &cli::PopulationArgs) -> Result<()> {
    let table = load_table(&args.input)?;
    let schema = load_or_classify(&table, args.schema.as_deref())?;
    if schema.identifiers.bound().is_empty() {
        bail!("No identifier columns are bound; nothing to show");
    }
    let population = aggregate::population(&table, &schema.identifiers)
        .context("Tallying identifier columns")?;
    print!("{}", report::render_population(&population));
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
