//! smelt: flatten JSON-typed columns of a delimited file
//!
//! Usage:
//!   # Flatten the first 10000 rows of a zipped export to CSV on stdout
//!   smelt data/test_v2.csv.zip
//!
//!   # Stream every row as NDJSON, 500 rows per batch
//!   smelt --all-rows --batches --batch-size 500 --format ndjson train.csv.gz
//!
//!   # Let the first batch decide which columns hold JSON
//!   smelt --detect --output flat.csv sessions.csv

// Use MiMalloc allocator for better performance
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use smelt::{
    detect_json_columns, CollisionPolicy, ColumnPlacement, Compression, FlattenConfig, ReadOptions,
    RowSource, Table, TableFormat, TableWriter,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "smelt")]
#[command(about = "Flatten JSON-typed columns of a delimited file", long_about = None)]
struct Args {
    /// Input file (.csv, .csv.gz or a .zip holding one file)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// JSON config file with `read` and `flatten` sections; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum number of rows to read (default: 10000)
    #[arg(long, conflicts_with = "all_rows")]
    nrows: Option<usize>,

    /// Read the whole file
    #[arg(long)]
    all_rows: bool,

    /// Read and flatten the file in batches
    #[arg(long)]
    batches: bool,

    /// Rows per batch (default: 100)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Comma-separated JSON-typed columns
    /// (default: device,geoNetwork,totals,trafficSource)
    #[arg(long, conflicts_with = "detect")]
    json_columns: Option<String>,

    /// Pick the JSON-typed columns from the first batch
    #[arg(long)]
    detect: bool,

    /// Comma-separated columns always kept as text (default: fullVisitorId)
    #[arg(long)]
    text_columns: Option<String>,

    /// Keep every cell as text instead of inferring numbers and booleans
    #[arg(long)]
    no_infer: bool,

    /// Field delimiter of the input
    #[arg(long)]
    delimiter: Option<char>,

    /// The input has no header line
    #[arg(long)]
    no_header: bool,

    /// Compression of the input (default: from the extension)
    #[arg(long, value_enum)]
    compression: Option<CompressionArg>,

    /// Separator between column name and nested key (default: ".")
    #[arg(long)]
    separator: Option<String>,

    /// Where expanded columns go
    #[arg(long, value_enum)]
    placement: Option<PlacementArg>,

    /// What to do when an expanded column name already exists
    #[arg(long, value_enum)]
    on_collision: Option<CollisionArg>,

    /// Output format
    #[arg(long, value_enum, default_value = "csv")]
    format: FormatArg,

    /// Output file (stdout if omitted)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompressionArg {
    None,
    Gzip,
    Zip,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PlacementArg {
    InPlace,
    Append,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CollisionArg {
    Error,
    Overwrite,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Csv,
    Ndjson,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    read: ReadOptions,
    flatten: FlattenConfig,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let (options, mut config) = build_config(&args)?;

    if args.detect {
        config.json_columns = detect_columns(&args.input, &options)?;
        info!(columns = ?config.json_columns, "detected JSON columns");
        if config.json_columns.is_empty() {
            warn!("no JSON columns detected; output equals input");
        }
    }

    let format = match args.format {
        FormatArg::Csv => TableFormat::Csv,
        FormatArg::Ndjson => TableFormat::Ndjson,
    };

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };
    let mut writer = TableWriter::new(sink, format);
    write_flattened(&args, &options, &config, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Load (or stream) the input and write every flattened row to `writer`
fn write_flattened<W: Write>(
    args: &Args,
    options: &ReadOptions,
    config: &FlattenConfig,
    writer: &mut TableWriter<W>,
) -> Result<()> {
    if args.batches {
        let batches = smelt::generate(&args.input, options, config)?;
        match args.format {
            FormatArg::Ndjson => {
                let mut count = 0;
                for batch in batches {
                    let batch = batch.context("Failed to flatten batch")?;
                    writer.write_table(&batch)?;
                    count += 1;
                }
                info!(batches = count, "wrote batches");
            }
            FormatArg::Csv => {
                // Batches may disagree on columns; CSV needs one header
                let batches = batches
                    .collect::<smelt::Result<Vec<Table>>>()
                    .context("Failed to flatten batch")?;
                writer.write_table(&Table::concat(batches))?;
            }
        }
    } else {
        let table = smelt::load(&args.input, options, config)
            .with_context(|| format!("Failed to load {}", args.input.display()))?;
        writer.write_table(&table)?;
    }
    Ok(())
}

/// Merge the config file (if any) with command line flags
fn build_config(args: &Args) -> Result<(ReadOptions, FlattenConfig)> {
    let file = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str::<ConfigFile>(&text)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => ConfigFile::default(),
    };
    let (mut options, mut config) = (file.read, file.flatten);

    if args.all_rows {
        options.nrows = None;
    } else if let Some(nrows) = args.nrows {
        options.nrows = Some(nrows);
    }
    if let Some(batch_size) = args.batch_size {
        if batch_size == 0 {
            bail!("--batch-size must be at least 1");
        }
        options.batch_size = batch_size;
    }
    if let Some(delimiter) = args.delimiter {
        if !delimiter.is_ascii() {
            bail!("--delimiter must be a single ASCII character");
        }
        options.delimiter = delimiter as u8;
    }
    if args.no_infer {
        options.infer_scalars = false;
    }
    if args.no_header {
        options.has_headers = false;
    }
    if let Some(compression) = args.compression {
        options.compression = Some(match compression {
            CompressionArg::None => Compression::None,
            CompressionArg::Gzip => Compression::Gzip,
            CompressionArg::Zip => Compression::Zip,
        });
    }
    if let Some(columns) = &args.text_columns {
        options.text_columns = split_list(columns);
    }

    if let Some(columns) = &args.json_columns {
        config.json_columns = split_list(columns);
    }
    if let Some(separator) = &args.separator {
        config.separator = separator.clone();
    }
    if let Some(placement) = args.placement {
        config.placement = match placement {
            PlacementArg::InPlace => ColumnPlacement::InPlace,
            PlacementArg::Append => ColumnPlacement::Append,
        };
    }
    if let Some(policy) = args.on_collision {
        config.on_collision = match policy {
            CollisionArg::Error => CollisionPolicy::Error,
            CollisionArg::Overwrite => CollisionPolicy::Overwrite,
        };
    }

    Ok((options, config))
}

/// Sample the first batch of the raw file for JSON-object columns
fn detect_columns(path: &Path, options: &ReadOptions) -> Result<Vec<String>> {
    let mut batches = RowSource::open(path, options.clone())?.batches();
    match batches.next() {
        Some(batch) => Ok(detect_json_columns(&batch?)),
        None => Ok(Vec::new()),
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
