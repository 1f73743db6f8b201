//! Command line converter from NIfTI to nifti-zarr.
use clap::Parser;
use env_logger::{Builder, Env};
use log::{error, info};
use niizarr::{nii2zarr, ChunkSize, ConvertOptions};
use std::path::PathBuf;
use std::process;

/// Convert nifti to nifti-zarr
#[derive(Parser, Debug)]
#[command(name = "nii2zarr", version, about)]
struct Args {
    /// Input nifti file
    input: PathBuf,

    /// Output zarr directory
    output: PathBuf,

    /// Spatial chunk size: `64`, per axis `64,64,32`, or per level
    /// `64;32`
    #[arg(long, default_value = "64", value_parser = parse_chunk)]
    chunk: ChunkSize,

    /// Save all channels in a single chunk
    #[arg(long)]
    unchunk_channels: bool,

    /// Save all timepoints in a single chunk
    #[arg(long)]
    unchunk_time: bool,

    /// Number of levels in the pyramid. If -1, use as many levels as
    /// possible
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    levels: i64,

    /// Pyramid method
    #[arg(long, default_value = "gaussian", value_parser = ["gaussian", "laplacian"])]
    method: String,

    /// Missing value
    #[arg(long)]
    fill: Option<f64>,

    /// Compressor
    #[arg(long, default_value = "blosc", value_parser = ["blosc", "zlib"])]
    compressor: String,

    /// Segmentation volume
    #[arg(long, conflicts_with = "no_label")]
    label: bool,

    /// Not a segmentation volume
    #[arg(long)]
    no_label: bool,

    /// No time dimension: the 4th axis holds channels
    #[arg(long)]
    no_time: bool,

    /// Thick slice axis that should not be downsampled
    #[arg(long, value_parser = ["x", "y", "z"])]
    no_pyramid_axis: Option<String>,
}

fn parse_chunk(s: &str) -> Result<ChunkSize, String> {
    s.parse().map_err(|e: niizarr::NiizarrError| e.to_string())
}

impl Args {
    fn options(&self) -> Result<ConvertOptions, String> {
        let label = match (self.label, self.no_label) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        Ok(ConvertOptions {
            chunk: self.chunk.clone(),
            chunk_channel: if self.unchunk_channels { 0 } else { 1 },
            chunk_time: if self.unchunk_time { 0 } else { 1 },
            levels: if self.levels < 0 { None } else { Some(self.levels as usize) },
            method: self.method.parse()?,
            label,
            no_time: self.no_time,
            no_pyramid_axis: self.no_pyramid_axis.as_deref().map(str::parse).transpose()?,
            fill_value: self.fill,
            compressor: self.compressor.clone(),
            ..ConvertOptions::default()
        })
    }
}

fn main() {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let options = match args.options() {
        Ok(options) => options,
        Err(e) => {
            error!("{}", e);
            process::exit(2);
        }
    };
    match nii2zarr(&args.input, &args.output, &options) {
        Ok(_) => info!("wrote {}", args.output.display()),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
