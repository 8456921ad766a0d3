use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::VariablesConfig;
use crate::crs::CrsRef;
use crate::geocode::GeocodingCache;
use crate::io::{read_table, write_table};
use crate::ops::ExecutionContext;
use crate::ops::aggregate::{BoundingBoxOp, CentroidOp, UnionOp};
use crate::ops::filter::QueryFilterOp;
use crate::ops::relation::{RelationOp, RelationPredicate};
use crate::ops::reproject::ReprojectOp;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Filter rows with a query expression like "area(geometry) < 15"
    Filter {
        /// Input GeoJSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Query expression; supports ${name} workflow variables
        #[arg(short, long)]
        query: String,

        /// YAML file with workflow variables
        #[arg(long)]
        variables: Option<PathBuf>,

        /// CRS authority code assumed for inputs without CRS metadata
        #[arg(long, default_value = crate::crs::WGS84_CODE)]
        crs: String,
    },

    /// Evaluate a topological predicate row-pairwise over two tables
    Relate {
        /// Left GeoJSON table (all columns are kept)
        #[arg(short, long)]
        left: PathBuf,

        /// Right GeoJSON table (only geometries are read)
        #[arg(short, long)]
        right: PathBuf,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,

        /// One of: disjoint, intersects, touches, crosses, within,
        /// contains, overlaps, equals
        #[arg(short, long)]
        predicate: String,

        /// CRS authority code assumed for inputs without CRS metadata
        #[arg(long, default_value = crate::crs::WGS84_CODE)]
        crs: String,
    },

    /// Compute the bounding box of all geometries as a single row
    Bbox {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = crate::crs::WGS84_CODE)]
        crs: String,
    },

    /// Merge all geometries into one by incremental set-union
    Union {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = crate::crs::WGS84_CODE)]
        crs: String,
    },

    /// Replace each row's geometry with its centroid
    Centroid {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = crate::crs::WGS84_CODE)]
        crs: String,
    },

    /// Reproject geometries into a target CRS
    Reproject {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Target CRS authority code, e.g. EPSG:3857
        #[arg(short, long)]
        to: String,

        /// CRS authority code assumed for inputs without CRS metadata
        #[arg(long, default_value = crate::crs::WGS84_CODE)]
        crs: String,
    },

    /// Empty a provider's geocoding cache table
    CacheClear {
        /// Provider identifier, e.g. nominatim
        #[arg(short, long)]
        provider: String,

        /// Cache database path (defaults to the per-user data directory)
        #[arg(long)]
        cache_path: Option<PathBuf>,
    },
}

/// Run one command to completion; returns the number of output rows.
pub fn run(cli: &Cli) -> Result<u64> {
    match &cli.command {
        Command::Filter {
            input,
            output,
            query,
            variables,
            crs,
        } => {
            let crs = CrsRef::from_code(crs)?;
            let variables = VariablesConfig::load_optional(variables.as_deref())
                .context("CLI: failed to load workflow variables")?;
            let table = read_table(input, &crs)?;

            let op = QueryFilterOp::configure(query, &variables.variables, &table.spec)?;
            tracing::info!("Filter: {}", op.source());

            let ctx = ExecutionContext::new("Filter: rows");
            let result = op.execute(&table, &ctx)?;
            tracing::info!("Filter: {} of {} rows kept", result.len(), table.len());
            write_table(&result, output)
        }

        Command::Relate {
            left,
            right,
            output,
            predicate,
            crs,
        } => {
            let crs = CrsRef::from_code(crs)?;
            let predicate: RelationPredicate = predicate.parse()?;
            let left = read_table(left, &crs)?;
            let right = read_table(right, &crs)?;

            let op = RelationOp::new(predicate);
            op.configure(&left, &right)?;
            let ctx = ExecutionContext::new("Relate: rows");
            let result = op.execute(&left, &right, &ctx)?;
            write_table(&result, output)
        }

        Command::Bbox { input, output, crs } => {
            let crs = CrsRef::from_code(crs)?;
            let table = read_table(input, &crs)?;
            let ctx = ExecutionContext::new("Bbox: rows");
            let result = BoundingBoxOp.execute(&table, &ctx)?;
            write_table(&result, output)
        }

        Command::Union { input, output, crs } => {
            let crs = CrsRef::from_code(crs)?;
            let table = read_table(input, &crs)?;
            let ctx = ExecutionContext::new("Union: rows");
            let result = UnionOp.execute(&table, &ctx)?;
            write_table(&result, output)
        }

        Command::Centroid { input, output, crs } => {
            let crs = CrsRef::from_code(crs)?;
            let table = read_table(input, &crs)?;
            let ctx = ExecutionContext::new("Centroid: rows");
            let result = CentroidOp.execute(&table, &ctx)?;
            write_table(&result, output)
        }

        Command::Reproject {
            input,
            output,
            to,
            crs,
        } => {
            let crs = CrsRef::from_code(crs)?;
            let target = CrsRef::from_code(to)?;
            let table = read_table(input, &crs)?;
            let op = ReprojectOp::new(target);
            let ctx = ExecutionContext::new("Reproject: rows");
            let result = op.execute(&table, &ctx)?;
            write_table(&result, output)
        }

        Command::CacheClear {
            provider,
            cache_path,
        } => {
            let cache = match cache_path {
                Some(path) => GeocodingCache::open_at(path, provider),
                None => GeocodingCache::open(provider),
            };
            cache.clear();
            tracing::info!("Cache cleared for provider '{}'", provider);
            Ok(0)
        }
    }
}
