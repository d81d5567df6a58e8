use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use image::{DynamicImage, ImageReader};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use cardigits::detection::{
    CharacterRecognizer, DisabledRecognizer, OcrConfig, OcrsRecognizer, extract_regions,
    preprocessing, segment_glyphs,
};
use cardigits::{
    Pipeline, PipelineConfig, PipelineOutput, RegionSpec, RegionStatus, RunSummary, SegmentConfig,
    TileSource,
};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "jp2", "png", "bmp", "tiff", "tif"];

#[derive(Parser)]
#[command(name = "cardigits")]
#[command(about = "Read the printed number off a photographed ID card")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rectify a card photo and read the digits in each region
    Extract {
        /// Path to input image file
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        #[command(flatten)]
        opts: ExtractOpts,
    },
    /// Run `extract` on every image in a directory
    Batch {
        #[arg(value_name = "DIR")]
        input_dir: PathBuf,

        #[command(flatten)]
        opts: ExtractOpts,
    },
    /// Crop regions out of an already rectified card image
    Crop {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Edge fractions to trim, as top,bottom,left,right (repeatable)
        #[arg(long = "region", value_name = "T,B,L,R", required = true)]
        regions: Vec<RegionSpec>,

        #[arg(long, value_name = "DIR", default_value = "output")]
        out: PathBuf,
    },
    /// Write a black-and-white version of an image next to it
    Threshold {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Blur kernel size (odd)
        #[arg(long, default_value_t = 5)]
        blur: u32,

        /// Pixels brighter than this become white
        #[arg(long, default_value_t = 64)]
        threshold: u8,

        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Cut square glyph tiles out of a region image
    Segment {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        #[arg(long, value_name = "DIR", default_value = "digits")]
        out: PathBuf,

        #[command(flatten)]
        segment: SegmentOpts,
    },
}

#[derive(Args, Clone, Default)]
struct SegmentOpts {
    /// Blur kernel size before thresholding (odd)
    #[arg(long)]
    blur: Option<u32>,

    /// Binary threshold, 0-255
    #[arg(long)]
    threshold: Option<u8>,

    /// Keep at most this many glyphs (0 keeps all)
    #[arg(long)]
    expected: Option<usize>,

    /// Cut tiles from the color region instead of the threshold mask
    #[arg(long)]
    original: bool,

    /// Invert tile colors
    #[arg(long)]
    invert: bool,
}

impl SegmentOpts {
    fn apply(&self, config: &mut SegmentConfig) {
        if let Some(blur) = self.blur {
            config.blur_kernel_size = blur;
        }
        if let Some(threshold) = self.threshold {
            config.binary_threshold = threshold;
        }
        if let Some(expected) = self.expected {
            config.expected_glyph_count = expected;
        }
        if self.original {
            config.tile_source = TileSource::Original;
        }
        if self.invert {
            config.invert = true;
        }
    }
}

#[derive(Args, Clone)]
struct ExtractOpts {
    /// JSON pipeline configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Region to read, as top,bottom,left,right fractions (repeatable; replaces the configured list)
    #[arg(long = "region", value_name = "T,B,L,R")]
    regions: Vec<RegionSpec>,

    #[command(flatten)]
    segment: SegmentOpts,

    /// Ink fraction of the densest glyph below which a glyph is read as 0
    #[arg(long)]
    zero_ratio: Option<f64>,

    /// Recognize glyphs in parallel
    #[arg(long)]
    parallel: bool,

    /// Use the whole photo when no card outline is found
    #[arg(long)]
    fallback: bool,

    /// Skip OCR step (heuristic zeros only, everything else is '?')
    #[arg(long)]
    skip_ocr: bool,

    /// Directory holding the ocrs detection and recognition models
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

impl ExtractOpts {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if !self.regions.is_empty() {
            config.regions = self.regions.clone();
        }
        self.segment.apply(&mut config.segment);
        if let Some(ratio) = self.zero_ratio {
            config.classify.zero_area_ratio = ratio;
        }
        if self.parallel {
            config.classify.parallel = true;
        }
        if self.fallback {
            config.rectify.fallback_to_full_image = true;
        }
        config.validate()?;
        Ok(config)
    }

    fn recognizer(&self) -> anyhow::Result<Box<dyn CharacterRecognizer>> {
        if self.skip_ocr {
            return Ok(Box::new(DisabledRecognizer));
        }
        let ocr_config = match &self.model_dir {
            Some(dir) => OcrConfig::from_dir(dir),
            None => OcrConfig::default(),
        };
        Ok(Box::new(OcrsRecognizer::new(&ocr_config)?))
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Extract { image_path, opts } => {
            let config = opts.pipeline_config()?;
            let recognizer = opts.recognizer()?;
            let output =
                extract_one(&image_path, &config, recognizer.as_ref(), opts.debug_out.clone())?;
            if opts.json {
                println!("{}", serde_json::to_string_pretty(&output.summary())?);
            } else {
                print_report(&image_path, &output);
            }
            Ok(())
        }
        Command::Batch { input_dir, opts } => run_batch(&input_dir, &opts),
        Command::Crop {
            image_path,
            regions,
            out,
        } => run_crop(&image_path, &regions, &out),
        Command::Threshold {
            image_path,
            blur,
            threshold,
            out,
        } => run_threshold(&image_path, blur, threshold, out),
        Command::Segment {
            image_path,
            out,
            segment,
        } => run_segment(&image_path, &out, &segment),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_image(path: &Path) -> anyhow::Result<DynamicImage> {
    ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))
}

/// File stem and extension, the way output files are named after their input.
fn name_parts(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    (stem, ext)
}

fn extract_one(
    image_path: &Path,
    config: &PipelineConfig,
    recognizer: &dyn CharacterRecognizer,
    debug_out: Option<PathBuf>,
) -> anyhow::Result<PipelineOutput> {
    let img = load_image(image_path)?;
    tracing::info!(path = %image_path.display(), width = img.width(), height = img.height(), "Image loaded");

    let mut pipeline = Pipeline::new(config.clone());
    if let Some(dir) = debug_out {
        pipeline = pipeline.with_debug(dir)?;
    }
    Ok(pipeline.run(&img, recognizer)?)
}

fn print_report(image_path: &Path, output: &PipelineOutput) {
    println!("\n=== {} ===", image_path.display());
    if !output.was_rectified {
        println!("Card outline not found; read the full image instead.");
    }
    for (index, region) in output.regions.iter().enumerate() {
        match region {
            Ok(out) => {
                match out.status() {
                    RegionStatus::NoGlyphsFound => {
                        println!("Region {} ({}): no digits found", index, out.spec)
                    }
                    RegionStatus::Complete => {
                        println!("Region {} ({}): {}", index, out.spec, out.digits())
                    }
                    RegionStatus::Unresolved { count } => println!(
                        "Region {} ({}): {}  [{} unresolved]",
                        index,
                        out.spec,
                        out.digits(),
                        count
                    ),
                }
                if let Some(text) = &out.cross_check {
                    println!("  whole-region OCR: {}", text);
                }
            }
            Err(err) => println!("Region {}: error: {}", index, err),
        }
    }
}

/// One file's outcome in `batch --json` output.
#[derive(Debug, Serialize)]
struct BatchEntry {
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// The whole batch as a single JSON array.
fn render_batch_json(entries: &[BatchEntry]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(entries)
}

fn run_batch(input_dir: &Path, opts: &ExtractOpts) -> anyhow::Result<()> {
    let config = opts.pipeline_config()?;
    let recognizer = opts.recognizer()?;

    let mut files: Vec<PathBuf> = std::fs::read_dir(input_dir)
        .with_context(|| format!("Failed to read {}", input_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_string_lossy().to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    let mut entries = Vec::with_capacity(files.len());
    for path in &files {
        let debug_out = opts
            .debug_out
            .as_ref()
            .map(|root| root.join(name_parts(path).0));
        let entry = match extract_one(path, &config, recognizer.as_ref(), debug_out) {
            Ok(output) => {
                if !opts.json {
                    print_report(path, &output);
                }
                BatchEntry {
                    path: path.clone(),
                    summary: Some(output.summary()),
                    error: None,
                }
            }
            Err(err) => {
                eprintln!("Error processing {}: {:#}", path.display(), err);
                BatchEntry {
                    path: path.clone(),
                    summary: None,
                    error: Some(format!("{:#}", err)),
                }
            }
        };
        entries.push(entry);
    }

    if opts.json {
        println!("{}", render_batch_json(&entries)?);
    } else {
        println!("\nProcessing Summary:");
        println!("{}", "-".repeat(50));
        for entry in &entries {
            let outcome = entry.error.as_deref().map_or("ok".to_string(), |e| format!("failed: {}", e));
            println!("{}: {}", entry.path.display(), outcome);
        }
    }
    Ok(())
}

fn run_crop(image_path: &Path, regions: &[RegionSpec], out: &Path) -> anyhow::Result<()> {
    let img = load_image(image_path)?;
    std::fs::create_dir_all(out)?;
    let (stem, ext) = name_parts(image_path);

    for (idx, (spec, crop)) in regions.iter().zip(extract_regions(&img, regions)).enumerate() {
        match crop {
            Ok(cropped) => {
                let output_path = out.join(format!("{}_crop_{}.{}", stem, idx, ext));
                cropped.save(&output_path)?;
                println!("Saved cropped image: {}", output_path.display());
            }
            Err(err) => eprintln!("Skipped region {} ({}): {}", idx, spec, err),
        }
    }
    Ok(())
}

fn run_threshold(
    image_path: &Path,
    blur: u32,
    threshold: u8,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    if blur == 0 || blur % 2 == 0 {
        anyhow::bail!("--blur must be an odd number, got {}", blur);
    }
    let img = load_image(image_path)?;
    let gray = preprocessing::to_grayscale(&img);
    let blurred = preprocessing::apply_blur(&gray, blur);
    let bw = preprocessing::binarize(&blurred, threshold, false);

    let output_path = out.unwrap_or_else(|| {
        let (stem, ext) = name_parts(image_path);
        image_path.with_file_name(format!("{}_bw.{}", stem, ext))
    });
    bw.save(&output_path)?;
    println!("Saved thresholded image to {}", output_path.display());
    Ok(())
}

fn run_segment(image_path: &Path, out: &Path, opts: &SegmentOpts) -> anyhow::Result<()> {
    let mut config = SegmentConfig::default();
    opts.apply(&mut config);
    PipelineConfig {
        segment: config.clone(),
        ..PipelineConfig::default()
    }
    .validate()?;

    let img = load_image(image_path)?;
    std::fs::create_dir_all(out)?;
    let (stem, _) = name_parts(image_path);

    let segmentation = segment_glyphs(&img, &config);
    if segmentation.is_empty() {
        println!("No valid contours found after filtering!");
        return Ok(());
    }
    for tile in &segmentation.tiles {
        let output_path = out.join(format!("{}_{}.png", stem, tile.rank()));
        tile.image().save(&output_path)?;
        println!("Saved digit {} to {}", tile.rank(), output_path.display());
    }
    Ok(())
}
