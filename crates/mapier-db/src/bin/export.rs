//! mapier-export: export canonical places in a bounding box to GeoJSON.
//!
//! ```text
//! mapier-export export --bbox "-87.61,-87.58,41.78,41.80" --output hyde_park.geojson
//! mapier-export export --bbox "-122.52,-122.35,37.70,37.83" --output sf.geojson --limit 100
//! mapier-export count --bbox "-87.61,-87.58,41.78,41.80"
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mapier_db::{defaults, BoundingBox, Database, ExportQuery, PoolConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mapier-export")]
#[command(author, version, about = "Export mapier places to GeoJSON")]
#[command(propagate_version = true)]
struct Cli {
    /// Database URL (default: DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write places in a bounding box as a GeoJSON FeatureCollection
    Export {
        /// Bounding box as "min_lon,max_lon,min_lat,max_lat"
        #[arg(short, long, allow_hyphen_values = true)]
        bbox: String,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Maximum number of places
        #[arg(short, long, default_value_t = defaults::EXPORT_LIMIT)]
        limit: i64,

        /// Skip bulk-ingested places below this confidence
        #[arg(long, default_value_t = defaults::LOCAL_MIN_CONFIDENCE)]
        min_confidence: f64,
    },

    /// Count places in a bounding box
    Count {
        /// Bounding box as "min_lon,max_lon,min_lat,max_lat"
        #[arg(short, long, allow_hyphen_values = true)]
        bbox: String,

        /// Skip bulk-ingested places below this confidence
        #[arg(long, default_value_t = defaults::LOCAL_MIN_CONFIDENCE)]
        min_confidence: f64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mapier_db=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let database_url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| defaults::DATABASE_URL.to_string());

    match cli.command {
        Commands::Export {
            bbox,
            output,
            limit,
            min_confidence,
        } => {
            let mut query = ExportQuery::new(parse_bbox(&bbox)?).with_limit(limit)?;
            query.min_confidence = min_confidence;

            let db = connect(&database_url).await?;
            let collection = db.export.export(&query).await?;
            let body = serde_json::to_string_pretty(&collection)?;
            tokio::fs::write(&output, body)
                .await
                .with_context(|| format!("writing {}", output.display()))?;

            println!(
                "Exported {} places to {}",
                collection.features.len(),
                output.display()
            );
            for feature in collection.features.iter().take(5) {
                let name = feature
                    .properties
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("<unnamed>");
                let category = feature
                    .properties
                    .get("primary_category")
                    .and_then(|v| v.as_str())
                    .unwrap_or("-");
                println!("  {} ({})", name, category);
            }
        }
        Commands::Count {
            bbox,
            min_confidence,
        } => {
            let mut query = ExportQuery::new(parse_bbox(&bbox)?);
            query.min_confidence = min_confidence;

            let db = connect(&database_url).await?;
            let n = db.export.count(&query).await?;
            println!("{}", n);
        }
    }
    Ok(())
}

fn parse_bbox(raw: &str) -> anyhow::Result<BoundingBox> {
    BoundingBox::parse(raw).map_err(|e| anyhow::anyhow!("invalid --bbox: {}", e.message))
}

async fn connect(url: &str) -> anyhow::Result<Database> {
    let db = Database::connect_with_config(url, PoolConfig::from_env().with_max_connections(2))
        .await
        .context("connecting to database")?;
    Ok(db)
}
