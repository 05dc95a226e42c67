mod config;
mod discover;
mod emit;
mod error;
mod fetch;
mod ids;
mod merge;
mod parser;
mod pipeline;
mod reading;
mod record;
mod report;

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::RunConfig;
use crate::fetch::{Fetcher, Page};
use crate::reading::dictionary::DictionaryConverter;
use crate::reading::{ReadingQuality, ReadingResolver};
use crate::record::RawField;

#[derive(Parser)]
#[command(name = "roster_scraper", about = "Election candidate roster builder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every source, merge, and write the roster CSV
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides `output.path`
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Extract local HTML files with one source's schema, CSV on stdout
    Extract {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        source: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the automated reading for kanji names
    Yomi {
        #[arg(required = true)]
        text: Vec<String>,
        /// Extra `kanji<TAB>reading` dictionary files
        #[arg(long)]
        dict: Vec<PathBuf>,
    },
    /// Validate a config file and list its sources
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config, output, report } => {
            let mut cfg = RunConfig::load(&config)?;
            if let Some(path) = output {
                cfg.output.path = path;
            }
            run(&cfg, report).await
        }
        Commands::Extract { config, source, files } => {
            let cfg = RunConfig::load(&config)?;
            extract_files(&cfg, &source, &files)
        }
        Commands::Yomi { text, dict } => {
            let resolver = ReadingResolver::new(DictionaryConverter::with_files(dict.as_slice())?);
            for name in &text {
                let field = RawField::new("cli", name);
                match resolver.yomi(&field, ReadingQuality::Absent) {
                    Ok(yomi) => println!("{}\t{}", name, yomi),
                    Err(e) => println!("{}\t! {}", name, e.reason),
                }
            }
            Ok(())
        }
        Commands::Check { config } => {
            let cfg = RunConfig::load(&config)?;
            pipeline::compile(&cfg)?;
            let conv = DictionaryConverter::with_files(cfg.reading.dictionaries.as_slice())?;
            println!("Name table: {} entries", conv.len());
            for s in &cfg.sources {
                let discover = s
                    .discover
                    .as_ref()
                    .map(|d| format!(", discover from {}", d.index_url))
                    .unwrap_or_default();
                println!(
                    "  {:<16} rank {:>3} | readings {:?} | {} urls{}",
                    s.id,
                    s.priority,
                    s.readings,
                    s.urls.len(),
                    discover
                );
            }
            println!("{} sources OK", cfg.sources.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run(cfg: &RunConfig, report_path: Option<PathBuf>) -> anyhow::Result<()> {
    let schemas = pipeline::compile(cfg)?;
    let resolver = ReadingResolver::new(DictionaryConverter::with_files(cfg.reading.dictionaries.as_slice())?);
    let fetcher = Fetcher::new(&cfg.fetch)?;

    // Phase 1: Fetch
    let t_fetch = Instant::now();
    let targets = pipeline::collect_targets(cfg, &fetcher).await?;
    println!("Fetching {} pages from {} sources...", targets.len(), cfg.sources.len());
    let pages = fetcher.fetch_all(targets).await?;
    println!("Fetched {} pages in {:.1}s", pages.len(), t_fetch.elapsed().as_secs_f64());

    // Phase 2: Extract, resolve, merge
    let t_process = Instant::now();
    let out = pipeline::process(cfg, &schemas, &resolver, &pages);
    println!("Processed in {:.1}s", t_process.elapsed().as_secs_f64());

    if out.records.is_empty() {
        println!("No candidates extracted; {} left untouched.", cfg.output.path.display());
    } else {
        emit::write_file(
            &cfg.output.path,
            &out.records,
            cfg.output.metadata_columns.as_deref(),
            cfg.output.bom,
        )?;
    }

    out.report.print();
    if let Some(path) = report_path {
        out.report.save(&path)?;
    }
    Ok(())
}

fn extract_files(cfg: &RunConfig, source_id: &str, files: &[PathBuf]) -> anyhow::Result<()> {
    let mut single = cfg.clone();
    single.sources = vec![cfg.source(source_id)?.clone()];
    let schemas = pipeline::compile(&single)?;
    let resolver = ReadingResolver::new(DictionaryConverter::with_files(cfg.reading.dictionaries.as_slice())?);

    let pages = files
        .iter()
        .map(|path| {
            let html = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(Page {
                source: 0,
                url: path.display().to_string(),
                html,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let out = pipeline::process(&single, &schemas, &resolver, &pages);
    let columns = emit::metadata_columns(&out.records, cfg.output.metadata_columns.as_deref());
    let stdout = std::io::stdout();
    let mut w = stdout.lock();
    emit::write_csv(&mut w, &out.records, &columns, false)?;
    w.flush()?;
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
