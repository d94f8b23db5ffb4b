//! `nissl`: 大鼠体感皮层 Nissl 切片的深度密度与分层边界命令行工具.

mod result;
mod runner;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "nissl")]
#[command(version, about = "Cell density and layer boundaries of rat SSCX Nissl sections", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// 单张图像的输入.
#[derive(Args)]
pub struct ImageArgs {
    /// QuPath cell detection table (tab separated)
    #[arg(value_name = "CELLS")]
    pub cells: PathBuf,

    /// QuPath GeoJSON annotations
    #[arg(value_name = "ANNOTATIONS")]
    pub annotations: PathBuf,

    /// Pixel size in micrometers per pixel
    #[arg(long, value_name = "UM", required_unless_present = "pixel_size_file")]
    pub pixel_size: Option<f64>,

    /// Text file whose first line is the pixel size
    #[arg(long, value_name = "FILE", conflicts_with = "pixel_size")]
    pub pixel_size_file: Option<PathBuf>,

    /// Name of the cortical region polygon in the annotations
    #[arg(long, value_name = "NAME", default_value = "S1HL")]
    pub region: String,

    /// Result table, printed to stdout when absent (output directory for `convert`)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Directory for PNG visualisations
    #[arg(long, value_name = "DIR")]
    pub plot_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Cell density as a function of cortical depth for one image
    Density {
        #[command(flatten)]
        image: ImageArgs,

        /// Section thickness in micrometers
        #[arg(long, value_name = "UM", default_value = "50")]
        thickness: f64,

        /// Number of depth strata requested
        #[arg(long, value_name = "N", default_value = "20")]
        rows: usize,

        /// Number of grid columns
        #[arg(long, value_name = "N", default_value = "10")]
        cols: usize,
    },

    /// Cell density for every image listed by a YAML batch config
    DensityBatch {
        /// YAML batch config
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Save PNG visualisations into the output directory
        #[arg(long)]
        plot: bool,
    },

    /// Layer bottom boundaries for one image
    Boundary {
        #[command(flatten)]
        image: ImageArgs,

        /// Layers to locate, all layers when absent
        #[arg(long, value_name = "NAME", value_delimiter = ',')]
        layers: Vec<String>,

        /// Multiplier applied to the estimated DBSCAN radius
        #[arg(long, value_name = "FLOAT", default_value = "4.0")]
        eps_factor: f64,
    },

    /// Layer boundaries for every image listed by a YAML batch config
    BoundaryBatch {
        /// YAML batch config
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Save PNG visualisations into the output directory
        #[arg(long)]
        plot: bool,
    },

    /// Flag cells to exclude from density counts (stereology correction)
    Exclude {
        /// Input cell detection table
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output cell detection table with an `exclude_for_density` column
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Section thickness in micrometers
        #[arg(long, value_name = "UM", default_value = "50")]
        thickness: f64,

        /// Random seed for reproducible runs
        #[arg(long, value_name = "N")]
        seed: Option<u64>,
    },

    /// Stereology exclusion for every image listed by a YAML batch config
    ExcludeBatch {
        /// YAML batch config
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Export the annotations and cell features of one image as tab separated tables
    Convert {
        #[command(flatten)]
        image: ImageArgs,

        /// Prefix of the output files, the image name when absent
        #[arg(long, value_name = "PREFIX")]
        prefix: Option<String>,
    },

    /// Export the tables of every image listed by a YAML batch config
    ConvertBatch {
        /// YAML batch config
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    if let Err(e) = simple_logger::SimpleLogger::new().with_level(level).init() {
        eprintln!("cannot initialise logging: {e}");
    }

    let ans = match cli.command {
        Commands::Density {
            image,
            thickness,
            rows,
            cols,
        } => runner::density(&image, thickness, rows, cols),
        Commands::DensityBatch { config, plot } => runner::density_batch(&config, plot),
        Commands::Boundary {
            image,
            layers,
            eps_factor,
        } => runner::boundary(&image, &layers, eps_factor),
        Commands::BoundaryBatch { config, plot } => runner::boundary_batch(&config, plot),
        Commands::Exclude {
            input,
            output,
            thickness,
            seed,
        } => runner::exclude(&input, &output, thickness, seed),
        Commands::ExcludeBatch { config } => runner::exclude_batch(&config),
        Commands::Convert { image, prefix } => runner::convert(&image, prefix.as_deref()),
        Commands::ConvertBatch { config } => runner::convert_batch(&config),
    };

    match ans {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
