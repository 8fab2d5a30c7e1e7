//! paperscout - Multi-source academic literature aggregation pipeline.
//!
//! Queries up to twelve bibliographic sources in parallel, merges the
//! results into one record per paper, scores and filters them, and exports
//! the survivors.
//!
//! ## Usage
//!
//! ```bash
//! paperscout search "graph neural networks" --sources arxiv,openalex,dblp --ylo 2020
//! paperscout search "protein folding" --sources all --min-cpy 2 --format csv,bibtex
//! ```

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use paperscout::clients::gscholar::ScholarOptions;
use paperscout::clients::{self, SearchQuery};
use paperscout::config::Config;
use paperscout::export::zotero::ZoteroClient;
use paperscout::export::{bibtex, csv as csv_export, zotero};
use paperscout::quality::FilterPolicy;
use paperscout::record::Source;
use paperscout::{collect, dedup, huggingface, quality};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Multi-source academic literature aggregation pipeline
#[derive(Parser)]
#[command(name = "paperscout")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the sources and run the full pipeline
    Search {
        /// Search keywords
        keyword: String,

        /// Comma-separated source list, or "all"
        #[arg(long, default_value = "all")]
        sources: String,

        /// Maximum records to collect per source
        #[arg(long, default_value = "100")]
        max: usize,

        /// Publication year lower bound (inclusive)
        #[arg(long)]
        ylo: Option<i32>,

        /// Publication year upper bound (inclusive)
        #[arg(long)]
        yhi: Option<i32>,

        /// Minimum quality score in [0,1]
        #[arg(long)]
        min_quality: Option<f64>,

        /// Minimum citations per year since publication
        #[arg(long)]
        min_cpy: Option<f64>,

        /// Papers at most this many years old skip the citation filter
        #[arg(long, default_value = "2")]
        grace_years: i32,

        /// Drop records with unknown citation counts instead of keeping them
        #[arg(long)]
        strict_citations: bool,

        /// Enrich results with HuggingFace model/dataset links
        #[arg(long)]
        hf: bool,

        /// Export formats: comma-separated subset of csv,bibtex,zotero
        #[arg(long, default_value = "csv")]
        format: String,

        /// Push results into the configured Zotero library
        #[arg(long)]
        zotero_push: bool,

        /// Proxy URL for Google Scholar (e.g., http://127.0.0.1:7890)
        #[arg(long)]
        proxy: Option<String>,

        /// Google Scholar mirror site URL
        #[arg(long)]
        mirror: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },

    /// List supported sources and their key requirements
    Sources,

    /// Manage the API key configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage Google Scholar cookies
    Cookies {
        #[command(subcommand)]
        action: CookieAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the config file path
    Path,
    /// Write an empty config template
    Init,
}

#[derive(Subcommand)]
enum CookieAction {
    /// Clear stored cookies
    Clear,
    /// Show cookie file path
    Path,
    /// Import cookies exported from a browser
    Import,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Search {
            keyword,
            sources,
            max,
            ylo,
            yhi,
            min_quality,
            min_cpy,
            grace_years,
            strict_citations,
            hf,
            format,
            zotero_push,
            proxy,
            mirror,
            output,
        } => {
            let opts = SearchOpts {
                keyword,
                sources,
                max,
                ylo,
                yhi,
                min_quality,
                min_cpy,
                grace_years,
                strict_citations,
                hf,
                format,
                zotero_push,
                proxy,
                mirror,
                output,
            };
            run_search_pipeline(opts).await
        }
        Commands::Sources => {
            list_sources();
            Ok(())
        }
        Commands::Config { action } => handle_config(action),
        Commands::Cookies { action } => handle_cookies(action),
    }
}

// ============================================================================
// Search Pipeline
// ============================================================================

struct SearchOpts {
    keyword: String,
    sources: String,
    max: usize,
    ylo: Option<i32>,
    yhi: Option<i32>,
    min_quality: Option<f64>,
    min_cpy: Option<f64>,
    grace_years: i32,
    strict_citations: bool,
    hf: bool,
    format: String,
    zotero_push: bool,
    proxy: Option<String>,
    mirror: Option<String>,
    output: PathBuf,
}

async fn run_search_pipeline(opts: SearchOpts) -> Result<()> {
    let config = Config::load();
    let sources = collect::resolve_sources(&opts.sources, &config)?;
    if sources.is_empty() {
        anyhow::bail!("No usable sources (check --sources and API keys)");
    }

    let formats = parse_formats(&opts.format)?;

    let mut query = SearchQuery::new(&opts.keyword);
    query.max_results = opts.max;
    query.year_min = opts.ylo;
    query.year_max = opts.yhi;

    let scholar_options = ScholarOptions {
        proxy: opts.proxy.clone(),
        base_url: opts.mirror.clone(),
    };

    // Create output folder
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let safe_keyword: String = opts
        .keyword
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .collect::<String>()
        .trim()
        .replace(' ', "_");
    let output_folder = opts.output.join(format!("{}_{}", timestamp, safe_keyword));
    std::fs::create_dir_all(&output_folder).context("Failed to create output directory")?;

    println!("Output folder: {}", output_folder.display());

    // ===========================================
    // STAGE 1: Collection
    // ===========================================
    println!("\n--- Stage 1: Collection ({} sources) ---", sources.len());

    let collection = collect::collect(&sources, &query, &config, &scholar_options).await;

    for report in &collection.reports {
        match &report.error {
            Some(e) => println!("  {:<16} FAILED: {}", report.source, e),
            None => println!(
                "  {:<16} {} records in {} ms",
                report.source, report.found, report.elapsed_ms
            ),
        }
    }

    if collection.records.is_empty() {
        println!("No results from any source.");
        return Ok(());
    }
    println!("Collected {} raw records.", collection.records.len());

    let raw_path = output_folder.join("1_raw.csv");
    csv_export::write_csv(&collection.records, &raw_path)?;
    println!("Saved: {}", raw_path.display());

    // ===========================================
    // STAGE 2: Dedup & Merge
    // ===========================================
    println!("\n--- Stage 2: Dedup & Merge ---");

    let (mut merged, stats) = dedup::dedup_records(collection.records);
    println!(
        "Merged {} raw records into {} ({} duplicates removed).",
        stats.input, stats.output, stats.duplicates_removed
    );

    quality::score_records(&mut merged);

    let merged_path = output_folder.join("2_merged.csv");
    csv_export::write_csv(&merged, &merged_path)?;
    println!("Saved: {}", merged_path.display());

    // ===========================================
    // STAGE 3: Filtering
    // ===========================================
    println!("\n--- Stage 3: Filtering ---");

    let policy = FilterPolicy {
        year_min: opts.ylo,
        year_max: opts.yhi,
        min_quality: opts.min_quality,
        min_citations_per_year: opts.min_cpy,
        grace_years: opts.grace_years,
        strict_citations: opts.strict_citations,
    };
    let (mut filtered, report) = quality::apply_filters(merged, &policy);
    println!(
        "Kept {} of {} ({} year, {} quality, {} citations dropped).",
        report.output, report.input, report.dropped_year, report.dropped_quality, report.dropped_citations
    );

    if filtered.is_empty() {
        println!("All records filtered out.");
        return Ok(());
    }

    // ===========================================
    // STAGE 4: HuggingFace Enrichment
    // ===========================================
    if opts.hf {
        println!("\n--- Stage 4: HuggingFace Enrichment ---");
        let client = clients::build_client(30)?;
        huggingface::enrich(&client, &mut filtered).await;
        let enriched = filtered.iter().filter(|r| r.hf.is_some()).count();
        println!("Enriched {} of {} records.", enriched, filtered.len());
    }

    // Most cited first; unknown counts sink to the bottom
    filtered.sort_by(|a, b| b.citations.unwrap_or(-1).cmp(&a.citations.unwrap_or(-1)));

    let filtered_path = output_folder.join("3_filtered.csv");
    csv_export::write_csv(&filtered, &filtered_path)?;
    println!("Saved: {}", filtered_path.display());

    // ===========================================
    // STAGE 5: Export
    // ===========================================
    println!("\n--- Stage 5: Export ---");

    for format in &formats {
        match format.as_str() {
            // The stage CSV above already is the CSV export
            "csv" => {}
            "bibtex" => {
                let path = output_folder.join("results.bib");
                bibtex::write_bibtex(&filtered, &path)?;
                println!("Saved: {}", path.display());
            }
            "zotero" => {
                let path = output_folder.join("zotero.json");
                zotero::write_json(&filtered, &path)?;
                println!("Saved: {}", path.display());
            }
            _ => unreachable!("validated by parse_formats"),
        }
    }

    if opts.zotero_push {
        let (Some(key), Some(user_id)) = (&config.zotero_key, &config.zotero_user_id) else {
            anyhow::bail!("--zotero-push requires zotero_key and zotero_user_id in the config");
        };
        println!("Pushing {} items to Zotero...", filtered.len());
        let client = ZoteroClient::new(clients::build_client(60)?, key, user_id);
        let accepted = client.push(&filtered).await?;
        println!("Zotero accepted {} items.", accepted);
    }

    info!(results = filtered.len(), "Pipeline complete");
    println!("\n✓ Pipeline complete. Results in: {}", output_folder.display());
    Ok(())
}

/// Validate the --format list.
fn parse_formats(spec: &str) -> Result<Vec<String>> {
    let mut formats = Vec::new();
    for f in spec.split(',') {
        let f = f.trim().to_lowercase();
        match f.as_str() {
            "csv" | "bibtex" | "zotero" => {
                if !formats.contains(&f) {
                    formats.push(f);
                }
            }
            other => anyhow::bail!("Unknown format: '{}' (expected csv, bibtex, zotero)", other),
        }
    }
    Ok(formats)
}

// ============================================================================
// Sources & Config & Cookies
// ============================================================================

fn list_sources() {
    println!("{:<16} {}", "SOURCE", "NOTES");
    for source in Source::all() {
        let notes = match source {
            Source::Ieee | Source::Elsevier | Source::Springer => "API key required",
            Source::SemanticScholar | Source::Pubmed | Source::PubmedCentral => {
                "API key optional (raises rate limits)"
            }
            Source::GoogleScholar => "scraped; cookies recommended",
            _ => "no key needed",
        };
        println!("{:<16} {}", source, notes);
    }
}

fn handle_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("Config file: {:?}", Config::path()?);
        }
        ConfigAction::Init => {
            let path = Config::write_template()?;
            println!("Wrote config template to {:?}", path);
            println!("Fill in the keys for the sources you want to use.");
        }
    }
    Ok(())
}

fn handle_cookies(action: CookieAction) -> Result<()> {
    use paperscout::cookies::CookieManager;

    let manager = CookieManager::new()?;

    match action {
        CookieAction::Clear => {
            manager.clear()?;
            println!("Cookies cleared.");
        }
        CookieAction::Path => {
            println!("Cookie file: {:?}", manager.path());
        }
        CookieAction::Import => import_cookies(&manager)?,
    }

    Ok(())
}

/// Read a browser cookie export from stdin and persist it.
fn import_cookies(manager: &paperscout::cookies::CookieManager) -> Result<()> {
    use std::io::{self, Write};

    println!("Paste cookies in JSON format (or press Enter to skip):");
    println!("Format: [{{\"name\":\"NID\",\"value\":\"xxx\",\"domain\":\".google.com\"}},...]");
    print!("> ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    if input.is_empty() {
        println!("No cookies provided. You can manually create the cookie file at:");
        println!("{:?}", manager.path());
        return Ok(());
    }

    match serde_json::from_str::<Vec<paperscout::cookies::Cookie>>(input) {
        Ok(cookies) => {
            manager.save(&cookies)?;
            println!("Successfully saved {} cookies!", cookies.len());
        }
        Err(e) => {
            println!("Failed to parse cookies: {}", e);
            println!("Please ensure the format is valid JSON.");
        }
    }

    Ok(())
}
