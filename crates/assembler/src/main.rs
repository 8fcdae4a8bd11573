// vmap-assembler - builds runtime vmap data from extracted raw files
// Consumes the extractor's dir_bin placement dump and raw model files,
// produces the .vmtree/.vmtile spatial indexes and .vmo models the
// collision and line-of-sight engine loads at runtime.

use clap::Parser;

mod assemble;
mod bih;
mod config;
mod error;
mod map_writer;
mod model_list;
mod raw_model;
mod spawn;
#[cfg(test)]
mod test_util;
mod world_model;

use vmap_shared::log::{initialize_logging, map_log_level};

#[derive(Parser, Debug)]
#[command(name = "vmap-assembler")]
#[command(about = "VMap assembler: builds runtime vmap trees from extracted raw data")]
#[command(version)]
struct Cli {
    /// Console log level override (0=Minimum, 1=Basic, 2=Detail, 3=Debug, 4=Trace)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<i32>,

    /// Raw data directory
    raw_data_dir: String,

    /// Output vmap directory
    output_dir: String,

    /// JSON configuration file path
    #[arg(long = "config", default_value = "config.json")]
    config_input: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let console_level = map_log_level(cli.log_level.unwrap_or(2));
    initialize_logging(None, console_level, None);

    assemble::run_assemble(&cli)
}
