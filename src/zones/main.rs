//! Zone maintenance CLI.
//!
//! Imports and validates KMZ zone boundaries, classifies coordinates and
//! orders route waypoints.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use fieldzone::config::Config;
use fieldzone::coordinates::BatchProcessor;
use fieldzone::kmz::{extract_zones_from_path, validate_zones, ZoneImporter};
use fieldzone::models::{Coordinate, CoordinateId, GeoPoint};
use fieldzone::pip::ZoneClassifier;
use fieldzone::routing::{optimize, tour_length_meters};
use fieldzone::store::SledStore;

#[derive(Parser, Debug)]
#[command(name = "zones")]
#[command(about = "Zone boundary import and coordinate classification")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store directory, overrides the config
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import zone boundaries from a KMZ file into the store
    Import { file: PathBuf },

    /// Validate a KMZ file without importing it
    Validate { file: PathBuf },

    /// Classify a single coordinate
    Classify {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },

    /// Classify a CSV of coordinates (id,latitude,longitude[,address])
    Batch {
        file: PathBuf,

        /// Output CSV, stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Classification only, in fixed-size chunks
        #[arg(long)]
        bulk: bool,
    },

    /// Order a CSV of coordinates into a short tour
    Sequence {
        file: PathBuf,

        /// Id of the coordinate to start from
        #[arg(long)]
        start: Option<CoordinateId>,
    },
}

#[derive(Debug, Deserialize)]
struct CoordinateRow {
    id: CoordinateId,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Serialize)]
struct ClassifiedRow {
    id: CoordinateId,
    latitude: f64,
    longitude: f64,
    zone_id: Option<i64>,
    confidence: f64,
}

#[derive(Debug, Serialize)]
struct SequencedRow {
    point_order: usize,
    id: CoordinateId,
    latitude: f64,
    longitude: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(store) = args.store {
        config.store.path = store;
    }

    match args.command {
        Command::Import { file } => {
            let store = SledStore::open(&config.store.path).context("Failed to open store")?;
            let reader = BufReader::new(File::open(&file).context("Failed to open KMZ file")?);
            let summary = ZoneImporter::new(&store, config.validation.country_bbox)
                .import(reader)
                .await?;
            store.flush().await?;
            print_json(&summary)?;
            if !summary.success {
                anyhow::bail!("Import finished with {} errors", summary.errors.len());
            }
        }
        Command::Validate { file } => {
            let extraction = extract_zones_from_path(&file)?;
            for error in &extraction.errors {
                warn!("{}", error);
            }
            let report = validate_zones(&extraction.zones, &config.validation.country_bbox);
            print_json(&report)?;
        }
        Command::Classify { lat, lon } => {
            let point = GeoPoint::new(lat, lon)?;
            let store = SledStore::open(&config.store.path).context("Failed to open store")?;
            let detection = ZoneClassifier::new(&store).detect(&point).await;
            print_json(&detection)?;
        }
        Command::Batch { file, output, bulk } => {
            let coordinates = read_coordinates(&file)?;
            let store = SledStore::open(&config.store.path).context("Failed to open store")?;
            let processor = BatchProcessor::new(&store);

            let pb = ProgressBar::new(coordinates.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
                    )?
                    .progress_chars("#>-"),
            );

            let result = if bulk {
                processor
                    .process_bulk(coordinates, |done| pb.set_position(done as u64))
                    .await
            } else {
                processor
                    .process_with_progress(coordinates, &config.batch, |done| {
                        pb.set_position(done as u64)
                    })
                    .await
            };
            pb.finish_and_clear();

            for group in &result.duplicates {
                info!("Possible duplicates: {:?}", group.coordinate_ids);
            }
            for error in &result.errors {
                warn!("Coordinate {}: {}", error.coordinate_id, error.message);
            }

            let mut writer = csv_writer(output.as_deref())?;
            for processed in &result.processed {
                let c = &processed.coordinate;
                writer.serialize(ClassifiedRow {
                    id: c.id,
                    latitude: c.point.lat,
                    longitude: c.point.lon,
                    zone_id: c.zone_id,
                    confidence: processed.confidence,
                })?;
            }
            writer.flush()?;
        }
        Command::Sequence { file, start } => {
            let coordinates = read_coordinates(&file)?;
            let start = match start {
                Some(id) => Some(
                    coordinates
                        .iter()
                        .find(|c| c.id == id)
                        .with_context(|| format!("Start coordinate {} not in file", id))?,
                ),
                None => None,
            };

            let tour = optimize(&coordinates, start);
            info!(
                "Tour length: {:.0} m (input order {:.0} m)",
                tour_length_meters(&tour),
                tour_length_meters(&coordinates)
            );

            let mut writer = csv_writer(None)?;
            for (i, c) in tour.iter().enumerate() {
                writer.serialize(SequencedRow {
                    point_order: i + 1,
                    id: c.id,
                    latitude: c.point.lat,
                    longitude: c.point.lon,
                })?;
            }
            writer.flush()?;
        }
    }

    Ok(())
}

fn read_coordinates(path: &Path) -> Result<Vec<Coordinate>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut coordinates = Vec::new();
    for row in reader.deserialize() {
        let row: CoordinateRow = row.context("Malformed coordinate row")?;
        // Range problems are reported per coordinate by the processor
        let mut coordinate =
            Coordinate::new(row.id, GeoPoint::new_unchecked(row.latitude, row.longitude), "csv");
        coordinate.address = row.address.filter(|a| !a.is_empty());
        coordinates.push(coordinate);
    }

    info!("Read {} coordinates from {}", coordinates.len(), path.display());
    Ok(coordinates)
}

fn csv_writer(path: Option<&Path>) -> Result<csv::Writer<Box<dyn Write>>> {
    let sink: Box<dyn Write> = match path {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    };
    Ok(csv::Writer::from_writer(sink))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
