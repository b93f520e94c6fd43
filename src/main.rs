use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use facerank::{config, dataset, eval, matcher, Embedder, Evaluator, GalleryIndex, Pipeline};
use log::info;

#[derive(Parser)]
#[command(name = "facerank")]
#[command(
    version,
    about = "Rank-N identification accuracy of a face embedding model"
)]
struct Cli {
    /// Config file (defaults to facerank.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate rank-N accuracy over a labeled dataset directory
    Eval(EvalArgs),
    /// Print the cosine similarity of two face images
    Compare {
        #[command(flatten)]
        model: ModelArgs,
        image_a: PathBuf,
        image_b: PathBuf,
    },
    /// Print the effective config
    Config {
        /// Save it to the config path
        #[arg(long)]
        write: bool,
    },
}

#[derive(Args)]
struct ModelArgs {
    /// ONNX face recognition model
    #[arg(short, long)]
    model: Option<PathBuf>,
}

#[derive(Args)]
struct EvalArgs {
    /// Directory of face images; the label is the file name up to the first '.'
    dataset: PathBuf,
    #[command(flatten)]
    model: ModelArgs,
    /// File-name marker of gallery images
    #[arg(long)]
    marker: Option<String>,
    /// Ranks to report, e.g. 1,2,3
    #[arg(long, value_delimiter = ',')]
    ranks: Option<Vec<usize>>,
    /// Scoring threads (0 = one per CPU)
    #[arg(short, long)]
    workers: Option<usize>,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else if cli.quiet {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };
    env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .format_timestamp(None)
        .init();

    let mut cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Eval(args) => {
            if let Some(model) = args.model.model.clone() {
                cfg.model = Some(model);
            }
            if let Some(marker) = args.marker.clone() {
                cfg.gallery_marker = marker;
            }
            if let Some(ranks) = args.ranks.clone() {
                cfg.ranks = ranks;
            }
            if let Some(workers) = args.workers {
                cfg.workers = workers;
            }
            cfg.validate().context("invalid configuration")?;
            run_eval(&cfg, &args.dataset, args.json)
        }
        Commands::Compare {
            model,
            image_a,
            image_b,
        } => {
            if let Some(model) = model.model {
                cfg.model = Some(model);
            }
            cfg.validate().context("invalid configuration")?;
            compare(&cfg, &image_a, &image_b)
        }
        Commands::Config { write } => show_config(&cfg, cli.config.as_deref(), write),
    }
}

fn open_pipeline(cfg: &config::Config) -> Result<Pipeline> {
    let model = cfg
        .model
        .as_deref()
        .context("no model given; pass --model or set `model` in the config")?;
    info!("Loading model: {}", model.display());
    Pipeline::new(model, cfg.preprocess.into())
        .context("Failed to initialize face recognition pipeline")
}

fn run_eval(cfg: &config::Config, dir: &Path, json: bool) -> Result<()> {
    info!("Evaluating dataset: {}", dir.display());

    let images = dataset::load(dir)?;
    let split = dataset::split(images, &cfg.gallery_marker);
    info!(
        "Found {} gallery and {} probe image(s) (marker {:?})",
        split.gallery.len(),
        split.probes.len(),
        cfg.gallery_marker
    );
    check_split(&split, dir, &cfg.gallery_marker)?;

    let mut pipeline = open_pipeline(cfg)?;

    let gallery =
        GalleryIndex::build(&split.gallery, &mut pipeline).context("Failed to build gallery")?;
    let probes = eval::embed_probes(&split.probes, &mut pipeline, &eval::AbortFlag::new())
        .context("Failed to embed probes")?;

    let report = Evaluator::new(&gallery, cfg.workers)?.evaluate(&probes, &cfg.ranks)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

/// A run needs at least one probe; say why there is none.
fn check_split(split: &dataset::Split, dir: &Path, marker: &str) -> Result<()> {
    if !split.probes.is_empty() {
        return Ok(());
    }
    if split.gallery.is_empty() {
        anyhow::bail!("No images found in {}", dir.display());
    }
    anyhow::bail!(
        "No probe images in {}: every file matched marker {:?}",
        dir.display(),
        marker
    )
}

fn compare(cfg: &config::Config, a: &Path, b: &Path) -> Result<()> {
    let mut pipeline = open_pipeline(cfg)?;
    let emb_a = pipeline.embed(a)?;
    let emb_b = pipeline.embed(b)?;
    if emb_a.dim() != emb_b.dim() {
        anyhow::bail!(
            "Embedding dimensions differ: {} vs {}",
            emb_a.dim(),
            emb_b.dim()
        );
    }

    match matcher::similarity(&emb_a, &emb_b) {
        Some(score) => println!("similarity: {score:.6}"),
        None => println!("similarity: degenerate"),
    }
    Ok(())
}

fn show_config(cfg: &config::Config, path: Option<&Path>, write: bool) -> Result<()> {
    print!("{}", toml::to_string_pretty(cfg)?);
    if write {
        config::save_config(cfg, path)?;
        info!(
            "✓ Config written to {}",
            path.unwrap_or(&config::CONFIG_PATH).display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use facerank::LabeledImage;

    #[test]
    fn test_empty_dataset_reports_no_images() {
        let err = check_split(&dataset::Split::default(), Path::new("faces"), "normal")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("No images found in faces"), "{msg}");
        assert!(!msg.contains("marker"), "{msg}");
    }

    #[test]
    fn test_all_gallery_reports_marker() {
        let split = dataset::split(
            vec![LabeledImage::from_path("faces/a.normal.png").unwrap()],
            "normal",
        );
        let msg = check_split(&split, Path::new("faces"), "normal")
            .unwrap_err()
            .to_string();
        assert!(msg.contains("every file matched marker \"normal\""), "{msg}");
    }

    #[test]
    fn test_split_with_probes_passes() {
        let split = dataset::split(
            vec![
                LabeledImage::from_path("faces/a.normal.png").unwrap(),
                LabeledImage::from_path("faces/a.sad.png").unwrap(),
            ],
            "normal",
        );
        assert!(check_split(&split, Path::new("faces"), "normal").is_ok());
    }
}
