//! Gridlens CLI
//!
//! Command-line interface for Gridlens operations:
//! - Translate questions into Flux or InfluxQL
//! - Ask questions against a live server
//! - Import CSV exports as points
//! - Check server health

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use gridlens::client::{InfluxClient, QueryRequest};
use gridlens::config::{generate_default_config, Config, LoggingConfig};
use gridlens::convert::{convert, read_csv, DatasetType};
use gridlens::translate::render::RenderSettings;
use gridlens::translate::{QueryLanguage, TranslationContext, Translator};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "gridlens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ask questions about energy grid data in plain language")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate a question without running it
    Translate {
        question: String,
        /// Target language (flux, influxql)
        #[arg(short, long)]
        language: Option<QueryLanguage>,
        /// Translation context as JSON, e.g. '{"regions": ["south"]}'
        #[arg(long)]
        context: Option<String>,
    },

    /// Translate a question and run it
    Ask {
        question: String,
        #[arg(short, long)]
        language: Option<QueryLanguage>,
        #[arg(long)]
        context: Option<String>,
    },

    /// Run a raw query
    Query {
        query: String,
        #[arg(short, long)]
        language: Option<QueryLanguage>,
    },

    /// Import a CSV file
    Import {
        path: PathBuf,
        /// Dataset type (generation, consumption, transmission)
        #[arg(short, long)]
        dataset: DatasetType,
        /// Target bucket (default: configured bucket)
        #[arg(short, long)]
        bucket: Option<String>,
        /// Convert and report without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Probe the server
    Health,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gridlens={}", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_context(raw: Option<&str>) -> anyhow::Result<TranslationContext> {
    match raw {
        Some(json) => serde_json::from_str(json).context("Invalid --context JSON"),
        None => Ok(TranslationContext::default()),
    }
}

fn translator(config: &Config) -> Translator<'static> {
    Translator::default().with_settings(RenderSettings {
        bucket: config.influx.bucket.clone(),
        retention_policy: config.translator.retention_policy.clone(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);

    match cli.command {
        Commands::Translate {
            question,
            language,
            context,
        } => {
            let language = language.unwrap_or(config.translator.default_language);
            let context = parse_context(context.as_deref())?;
            let result = translator(&config).translate(&question, language, &context)?;
            print_json(&result)?;
        }

        Commands::Ask {
            question,
            language,
            context,
        } => {
            let language = language.unwrap_or(config.translator.default_language);
            let context = parse_context(context.as_deref())?;
            let result = translator(&config).translate(&question, language, &context)?;
            tracing::info!(
                intent = %result.query_type,
                confidence = result.confidence_score,
                "Running translated query"
            );

            let client = InfluxClient::new(config.influx.clone());
            let rows = client.query(&QueryRequest::from(&result)).await;
            client.close();
            let rows = rows?;
            print_json(&serde_json::json!({
                "translation": result,
                "rows": rows,
            }))?;
        }

        Commands::Query { query, language } => {
            let language = language.unwrap_or(config.translator.default_language);
            let client = InfluxClient::new(config.influx.clone());
            let rows = client.query(&QueryRequest::new(language, query)).await;
            client.close();
            print_json(&rows?)?;
        }

        Commands::Import {
            path,
            dataset,
            bucket,
            dry_run,
        } => {
            let records =
                read_csv(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            let conversion = convert(&records, dataset);

            for rejection in conversion.rejected.iter().take(20) {
                tracing::warn!(reason = %rejection.reason, "Rejected record");
            }

            let report = serde_json::json!({
                "records": records.len(),
                "accepted": conversion.accepted_count(),
                "rejected": conversion.rejected_count(),
            });

            if dry_run {
                print_json(&report)?;
                return Ok(());
            }
            if conversion.points.is_empty() {
                bail!("No valid records in {}", path.display());
            }

            let client = InfluxClient::new(config.influx.clone());
            let summary = client.write(&conversion.points, bucket.as_deref()).await;
            client.close();
            let summary = summary?;
            print_json(&serde_json::json!({
                "conversion": report,
                "write": summary,
            }))?;
        }

        Commands::Health => {
            let client = InfluxClient::new(config.influx.clone());
            let report = client.health_check().await;
            client.close();
            print_json(&report)?;
            if !report.is_healthy() {
                std::process::exit(1);
            }
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}
