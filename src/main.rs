mod batch;
mod config;
mod html;
mod inject;
mod render;
mod store;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use config::{PipelineConfig, Tier};

#[derive(Parser)]
#[command(name = "linkboost", about = "Legacy content parser and link injector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inject links into every eligible document in the store
    Run {
        /// Compute and report only; never write the store
        #[arg(long)]
        dry_run: bool,
        /// Eligibility tier: 1, 2, 3 or all
        #[arg(short, long, default_value = "all")]
        tier: String,
        /// Directory holding collection files
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// JSON file overriding the built-in mapping tables
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Parse one markup file into its structured document (JSON on stdout)
    Parse {
        file: PathBuf,
    },
    /// Parse one markup file and lay it out as HTML on stdout
    Render {
        file: PathBuf,
    },
    /// Store overview: documents, processed counts, tier distribution
    Stats {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            dry_run,
            tier,
            data_dir,
            config,
        } => {
            let cfg = PipelineConfig::load(config.as_deref())?;
            let tier = Tier::from_str(&tier)?;
            if dry_run {
                println!("Dry run: no collection will be modified.");
            }
            batch::run(&cfg, &data_dir, tier, dry_run)?;
            Ok(())
        }
        Commands::Parse { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let doc = html::parse_document(&raw);
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
        Commands::Render { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let doc = html::parse_document(&raw);
            print!("{}", render::render_document(&doc));
            Ok(())
        }
        Commands::Stats { data_dir, config } => {
            let cfg = PipelineConfig::load(config.as_deref())?;
            print_stats(&cfg, &data_dir)
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_stats(cfg: &PipelineConfig, data_dir: &std::path::Path) -> Result<()> {
    let paths = store::collection_paths(data_dir)?;
    let mut documents = 0usize;
    let mut processed = 0usize;
    let mut per_tier = [0usize; 3];

    for path in &paths {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let records = store::scan_records_default(&text);
        println!(
            "{}: {} documents",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            records.len()
        );
        for record in records {
            documents += 1;
            if let store::FieldState::Found(range) = &record.body {
                if text[range.clone()].contains(inject::SENTINEL) {
                    processed += 1;
                }
            }
            let category = record
                .category
                .as_deref()
                .unwrap_or(&cfg.default_category);
            for (i, tier) in [Tier::One, Tier::Two, Tier::Three].iter().enumerate() {
                if cfg.eligible(&record.slug, category, *tier) {
                    per_tier[i] += 1;
                }
            }
        }
    }

    println!("Collections: {}", paths.len());
    println!("Documents:   {}", documents);
    println!("Processed:   {}", processed);
    println!("Pending:     {}", documents - processed);
    println!("Tier 1:      {}", per_tier[0]);
    println!("Tier 2:      {}", per_tier[1]);
    println!("Tier 3:      {}", per_tier[2]);
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
