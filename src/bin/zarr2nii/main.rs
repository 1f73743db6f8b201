//! Command line extraction of a nifti-zarr pyramid level into NIfTI.
use clap::Parser;
use env_logger::{Builder, Env};
use log::{error, info};
use niizarr::zarr2nii;
use std::path::PathBuf;
use std::process;

/// Convert nifti-zarr to nifti
#[derive(Parser, Debug)]
#[command(name = "zarr2nii", version, about)]
struct Args {
    /// Input zarr directory
    input: PathBuf,

    /// Output nifti file (`.nii` or `.nii.gz`)
    output: PathBuf,

    /// Pyramid level to extract
    #[arg(long, default_value_t = 0)]
    level: usize,
}

fn main() {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match zarr2nii(&args.input, &args.output, args.level) {
        Ok(_) => info!("wrote {}", args.output.display()),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
