use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use tracing::{error, info};

use isp_color_calibration::calibration::{CalibrationConfig, CalibrationPipeline, write_outputs};
use isp_color_calibration::image_pipeline::{
    IspConfig, RawImageReader, RawLoaderReader, StandardTiffWriter, TiffCompression, TiffMosaicReader,
    TiffOutputConfig,
};
use isp_color_calibration::logger;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum InputFormat {
    /// Camera raw file decoded with rawloader
    #[default]
    Raw,
    /// Undemosaiced 8 or 16 bit grayscale TIFF
    Tiff,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Compression {
    None,
    Lzw,
    DeflateFast,
    #[default]
    Deflate,
    DeflateBest,
}

impl Compression {
    fn to_tiff(self) -> TiffCompression {
        match self {
            Compression::None => TiffCompression::None,
            Compression::Lzw => TiffCompression::Lzw,
            Compression::DeflateFast => TiffCompression::DeflateFast,
            Compression::Deflate => TiffCompression::DeflateBalanced,
            Compression::DeflateBest => TiffCompression::DeflateBest,
        }
    }
}

/// Derive ISP color parameters from a photo of a reference color chart.
#[derive(Parser, Debug)]
#[command(name = "color_calibrate", version)]
struct Args {
    /// Raw image of the color chart
    input: PathBuf,

    /// Directory for black_level.txt, intercept_x.txt, isp_out.json and the calibrated TIFF
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    #[arg(short, long, value_enum, default_value_t = InputFormat::Raw)]
    format: InputFormat,

    /// Base ISP configuration (bayer pattern, demosaic filter)
    #[arg(long)]
    isp_config: Option<PathBuf>,

    /// Number of chart patches horizontally
    #[arg(long, default_value_t = 6)]
    patches_wide: usize,

    /// Number of chart patches vertically
    #[arg(long, default_value_t = 4)]
    patches_high: usize,

    /// Reflectance mapped to the clamp minimum
    #[arg(long, default_value_t = 0.0)]
    clamp_min: f32,

    /// Reflectance mapped to the clamp maximum
    #[arg(long, default_value_t = 1.0)]
    clamp_max: f32,

    /// Per-channel gamma, e.g. 1.0,1.0,1.0
    #[arg(long, value_delimiter = ',', default_values_t = [1.0, 1.0, 1.0])]
    gamma: Vec<f32>,

    /// Take the black level from the raw response instead of dark targets
    #[arg(long)]
    no_black_level_estimate: bool,

    /// Save numbered intermediate images here
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Compression::Deflate)]
    compression: Compression,

    /// Horizontal differencing before compressing the calibrated TIFF
    #[arg(long)]
    predictor: bool,

    /// Run every stage on the calling thread
    #[arg(long)]
    sequential: bool,

    /// Print per-stage timings
    #[arg(long)]
    timings: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.clamp_min >= args.clamp_max {
        bail!("clamp min {} must be below clamp max {}", args.clamp_min, args.clamp_max);
    }
    let [r, g, b] = args.gamma[..] else {
        bail!("gamma needs 3 values, got {}", args.gamma.len());
    };

    let isp = match &args.isp_config {
        Some(path) => IspConfig::load(path)?,
        None => IspConfig::default(),
    };
    let tiff = TiffOutputConfig::builder()
        .compression(args.compression.to_tiff())
        .horizontal_predictor(args.predictor)
        .build();

    let config = CalibrationConfig::builder()
        .patches(args.patches_wide, args.patches_high)
        .clamp_reflectance(args.clamp_min, args.clamp_max)
        .gamma([r, g, b])
        .estimate_black_level(!args.no_black_level_estimate)
        .debug_dir(args.debug_dir.clone())
        .parallel(!args.sequential)
        .isp(isp)
        .tiff(tiff)
        .build();

    info!("Bayer pattern: {:?}", config.isp.bayer_pattern);
    info!("Chart: {}x{} patches", config.patches_wide, config.patches_high);

    let reader: Box<dyn RawImageReader> = match args.format {
        InputFormat::Raw => Box::new(RawLoaderReader),
        InputFormat::Tiff => Box::new(TiffMosaicReader),
    };

    let pipeline = CalibrationPipeline::new(config);
    let report = pipeline
        .run_file(reader.as_ref(), &args.input)
        .with_context(|| format!("calibrating {}", args.input.display()))?;

    let files = write_outputs(&report, &args.output_dir, &StandardTiffWriter, &pipeline.config().tiff)?;
    info!("ISP configuration: {}", files.isp_config.display());

    if args.timings {
        report.timings.log_summary();
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init(args.verbose);

    info!("Starting color calibration...");
    if let Err(e) = run(args) {
        error!("Calibration failed: {:#}", e);
        return Err(e);
    }
    info!("Calibration successful!");
    Ok(())
}
