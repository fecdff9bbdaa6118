use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use upload_imaging::output::FileOutcome;
use upload_imaging::source::LocalFile;
use upload_imaging::{Pipeline, config, output};

#[derive(Parser)]
#[command(name = "upload-imaging")]
#[command(about = "Post-process uploaded images with a configured recipe")]
#[command(long_about = "\
Post-process uploaded images with a configured recipe

The recipe is an ordered list of operations read from the config file.
Each file is decoded once, every operation is applied in order, and the
result is written back atomically. A convert operation changes the output
file extension; the original file is left in place.

Operations:
  auto_orient        Rotate upright from EXIF orientation
  strip              Remove all metadata
  resize_to_limit    Shrink to fit width x height (never enlarges)
  resize_to_fit      Scale up or down to fit width x height
  resize_to_fill     Cover width x height and crop at gravity
  convert            Re-encode as jpg, jpeg, png, tif, tiff, webp or avif

Run 'upload-imaging gen-config' to generate a documented imaging.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = "imaging.toml", global = true)]
    config: PathBuf,

    /// Log each operation (equivalent to RUST_LOG=upload_imaging=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply the configured recipe to each file, in place
    Process {
        /// Image files to process
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Validate the config file and print the recipe
    Check,
    /// Print a stock imaging.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Process { files } => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let pipeline = Pipeline::from_config(&config);

            let outcomes: Vec<FileOutcome> = files
                .par_iter()
                .map(|path| {
                    let mut source = LocalFile::new(path);
                    (path.clone(), pipeline.process(&mut source))
                })
                .collect();
            output::print_process_output(&outcomes);

            let failed = outcomes.iter().filter(|(_, o)| o.is_err()).count();
            if failed > 0 {
                return Err(format!("{failed} of {} files failed", outcomes.len()).into());
            }
        }
        Command::Check => {
            println!("==> Checking {}", cli.config.display());
            let config = config::load_config(&cli.config)?;
            output::print_check_output(&config);
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "upload_imaging=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. The user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
