//! Entry point for the nc_parquet application.
//! Parses the CLI, runs one conversion and reports the failing stage on error.

use clap::Parser;
use nc_parquet::convert;
mod cli;
mod logging;

use cli::Args;

fn main() {
    // Parse command-line arguments
    let args = Args::parse();
    logging::init(args.verbose);

    println!("------------------------------------------------------------------");
    println!("            nc_parquet: NetCDF to Parquet converter");
    println!("------------------------------------------------------------------");

    let config = args.to_config();
    match convert(&config) {
        Ok(report) => {
            println!(
                "✅ Wrote {} rows from {} time steps ({} slices)",
                report.rows, report.time_steps, report.slices
            );
            for path in &report.outputs {
                println!("   {}", path.display());
            }
        }
        Err(e) => {
            eprintln!("❌ {} failed: {}", e.stage(), e);
            std::process::exit(1);
        }
    }
}
