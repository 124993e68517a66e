use clap::{Parser, Subcommand};
use cli::{BatchManifest, ImageEntry, StoredAnalysis, apply_overrides, load_config};
use color_eyre::eyre::{Result, eyre};
use lesion::{AnalysisConfig, AnalysisPipeline, AnalysisReport, ImageBuffer, LesionError};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single photograph and print the report as JSON
    Analyze {
        /// Path to the photograph (PNG, JPEG or TIFF)
        #[arg(short, long)]
        image: PathBuf,
        /// Analysis settings (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the segmentation luminance threshold
        #[arg(long)]
        threshold: Option<u8>,
        /// External classifier program; receives the image path as its last argument
        #[arg(long)]
        classifier_cmd: Option<String>,
        /// Extra argument for the classifier program (repeatable)
        #[arg(long = "classifier-arg")]
        classifier_args: Vec<String>,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Save the lesion mask as a grayscale PNG
        #[arg(long)]
        mask_output: Option<PathBuf>,
    },
    /// Analyze every image listed in a manifest and store one report per image
    Batch {
        /// Path to the manifest (.toml or .json)
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// Print the JSON schema of the analysis report
    Schema,
    /// Print the default analysis settings as TOML
    DefaultConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Analyze {
            image,
            config,
            threshold,
            classifier_cmd,
            classifier_args,
            output,
            mask_output,
        } => {
            let config = apply_overrides(
                load_config(config.as_deref())?,
                *threshold,
                classifier_cmd.as_deref(),
                classifier_args,
            )?;
            analyze_image(&config, image, output.as_deref(), mask_output.as_deref()).await?;
        }
        Commands::Batch { manifest } => {
            run_batch(manifest).await?;
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&AnalysisReport::schema())?);
        }
        Commands::DefaultConfig => {
            print!("{}", AnalysisConfig::default().to_toml()?);
        }
    }

    Ok(())
}

async fn analyze_image(
    config: &AnalysisConfig,
    image_path: &Path,
    output: Option<&Path>,
    mask_output: Option<&Path>,
) -> Result<()> {
    let pipeline = AnalysisPipeline::from_config(config)?;
    info!("{}", pipeline.info());

    let image = ImageBuffer::open(image_path)?;
    info!("Loaded {} ({}x{})", image_path.display(), image.width(), image.height());

    let (report, descriptors) = match pipeline.analyze_with_descriptors(&image).await {
        Ok(analyzed) => analyzed,
        Err(err @ LesionError::ClassifierUnavailable { .. }) => {
            error!("{err}");
            eprintln!("analysis failed, please retry");
            std::process::exit(2);
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(mask_path) = mask_output {
        descriptors.mask.to_gray_image().save(mask_path)?;
        info!("Mask written to {}", mask_path.display());
    }

    let json = report.to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn run_batch(manifest_path: &Path) -> Result<()> {
    let manifest = BatchManifest::from_file(manifest_path)?;
    let config = manifest.analysis_config()?;
    let pipeline = AnalysisPipeline::from_config(&config)?;
    info!("{}", pipeline.info());

    std::fs::create_dir_all(&manifest.output_dir)?;

    let mut failed = Vec::new();
    for entry in &manifest.images {
        match analyze_entry(&pipeline, entry).await {
            Ok(report) => {
                let stored = StoredAnalysis::new(entry, report);
                let path = stored.save_in(&manifest.output_dir)?;
                info!(
                    "'{}': {}% ({}) -> {}",
                    entry.name,
                    stored.report.analysis.risk.cancer_percentage,
                    stored.report.risk_level,
                    path.display()
                );
            }
            Err(err) => {
                if err.is_retryable() {
                    warn!("'{}': analysis failed, please retry: {err}", entry.name);
                } else {
                    error!("'{}': {err}", entry.name);
                }
                failed.push(entry.name.clone());
            }
        }
    }

    if !failed.is_empty() {
        return Err(eyre!(
            "{} of {} images failed: {}",
            failed.len(),
            manifest.images.len(),
            failed.join(", ")
        ));
    }

    info!("✅ Analyzed {} images", manifest.images.len());
    Ok(())
}

async fn analyze_entry(
    pipeline: &AnalysisPipeline,
    entry: &ImageEntry,
) -> Result<AnalysisReport, LesionError> {
    let image = ImageBuffer::open(&entry.path)?;
    pipeline.analyze_detailed(&image).await
}
