//! Defines command-line interface options using `clap` for nc_parquet.

use clap::Parser;
use nc_parquet::pipeline::{ConvertConfig, Strategy, DEFAULT_INPUT};
use std::path::PathBuf;

/// Convert a gridded NetCDF dataset to Parquet in fixed-size time slices
#[derive(Parser, Debug)]
#[command(
    version,
    name = "nc_parquet",
    about = "Convert gridded NetCDF datasets to Parquet"
)]
pub struct Args {
    /// Path to the NetCDF file
    #[arg(default_value = DEFAULT_INPUT)]
    pub file: PathBuf,

    /// Output strategy: `chunked` writes one file per slice into pq/, `single` writes one file
    #[arg(long, value_parser = parse_strategy, default_value = "chunked")]
    pub strategy: Strategy,

    /// Number of time steps per slice. Defaults to 500 (chunked) or 100 (single).
    #[arg(long, value_parser = parse_chunk_size)]
    pub chunk_size: Option<usize>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn to_config(&self) -> ConvertConfig {
        let config = ConvertConfig::new(self.strategy).with_input(&self.file);
        match self.chunk_size {
            Some(chunk_size) => config.with_chunk_size(chunk_size),
            None => config,
        }
    }
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    match s.to_lowercase().as_str() {
        "chunked" | "a" => Ok(Strategy::Chunked),
        "single" | "b" => Ok(Strategy::Single),
        other => Err(format!(
            "Invalid strategy '{}': expected 'chunked' or 'single'",
            other
        )),
    }
}

fn parse_chunk_size(s: &str) -> Result<usize, String> {
    let size = s
        .parse::<usize>()
        .map_err(|_| format!("Invalid chunk size '{}'", s))?;
    if size == 0 {
        return Err("Chunk size must be greater than 0".to_string());
    }
    Ok(size)
}
