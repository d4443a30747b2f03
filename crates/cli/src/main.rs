mod compile;
mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use serde::Serialize;
use spanmetrics::{
    create_span_metrics, ColumnResolver, IdentityResolver, SpansIndexResolver, SqlScript,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Compile span metrics into ClickHouse materialized views
#[derive(Parser, Debug)]
#[command(name = "spanmetrics")]
#[command(about = "Compile span metrics into ClickHouse materialized views", long_about = None)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Table, global = true)]
    format: Format,

    /// How attribute names map to SQL
    #[arg(long, value_enum, default_value_t = ResolverKind::SpansIndex, global = true)]
    resolver: ResolverKind,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile every configured metric and print the view definitions
    Compile,
    /// Print the DDL script for every configured metric
    Ddl,
    /// Parse a UPQL query and print its parts
    Parse { query: String },
    /// Compile a UPQL query into a SELECT fragment
    Query { query: String },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Table,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ResolverKind {
    SpansIndex,
    Identity,
}

impl ResolverKind {
    fn resolver(self) -> Arc<dyn ColumnResolver> {
        match self {
            ResolverKind::SpansIndex => Arc::new(SpansIndexResolver),
            ResolverKind::Identity => Arc::new(IdentityResolver),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber with environment filter
    // Set RUST_LOG environment variable to control log level
    // Example: RUST_LOG=info or RUST_LOG=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let resolver = args.resolver.resolver();

    match args.command {
        Command::Compile => {
            let config = load_config(args.config)?;
            let views = compile::compile_all(config.metrics_from_spans, resolver).await?;
            match args.format {
                Format::Table => println!("{}", display::views_table(&views)),
                Format::Json => print_json(&views)?,
            }
        }
        Command::Ddl => {
            let config = load_config(args.config)?;
            let mut script = SqlScript::new(config.ch_schema.ddl_options());
            create_span_metrics(
                &config.metrics_from_spans,
                &config.project_ids(),
                resolver.as_ref(),
                &mut script,
            )?;
            match args.format {
                Format::Table => {
                    if !script.records().is_empty() {
                        println!("{}\n", display::records_table(script.records()));
                    }
                    println!("{}", script.into_sql());
                }
                Format::Json => print_json(&DdlOutput {
                    metrics: script.records(),
                    statements: script.statements(),
                })?,
            }
        }
        Command::Parse { query } => {
            let parts = upql::parse(&query).context("Failed to parse query")?;
            match args.format {
                Format::Table => println!("{}", display::parts_table(&parts)),
                Format::Json => print_json(&parts)?,
            }
        }
        Command::Query { query } => {
            let compiled = spanmetrics::compile_query(&query, resolver.as_ref())
                .context("Failed to compile query")?;
            match args.format {
                Format::Table => println!("{}", compiled.to_sql()),
                Format::Json => print_json(&compiled)?,
            }
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct DdlOutput<'a> {
    metrics: &'a [spanmetrics::MetricRecord],
    statements: &'a [String],
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config = Config::load(path.as_deref())?;
    config.validate().context("Invalid configuration")?;
    info!(
        metrics = config.metrics_from_spans.len(),
        projects = config.projects.len(),
        "Loaded configuration"
    );
    Ok(config)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
