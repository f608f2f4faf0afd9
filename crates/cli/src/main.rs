use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use fallwatch_core::fall::domain::fall_reading::FallReading;
use fallwatch_core::fall::domain::posture_classifier::FallStrategy;
use fallwatch_core::fall::domain::reading_repository::FallReadingRepository;
use fallwatch_core::fall::infrastructure::in_memory_reading_repository::InMemoryReadingRepository;
use fallwatch_core::pipeline::fall_detector::{AnalyzeOptions, FallDetector};
use fallwatch_core::shared::settings::AnalysisSettings;
use fallwatch_core::storage::psql_manager::PsqlManager;
use fallwatch_core::video::infrastructure::file_ordering::rename_and_order_files;

/// Fall detection for videos, with readings stored in PostgreSQL.
#[derive(Parser)]
#[command(name = "fallwatch")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Analysis settings JSON (defaults to the per-user settings file).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Database config JSON. DATABASE_URL overrides it.
    #[arg(long, global = true, default_value = "db_config.json")]
    db_config: PathBuf,

    /// Trained fall model (ONNX).
    #[arg(long, global = true)]
    trained_model: Option<PathBuf>,

    /// Base YOLO11 pose model (ONNX).
    #[arg(long, global = true)]
    base_model: Option<PathBuf>,

    /// Which evidence decides a fall.
    #[arg(long, global = true, value_enum)]
    mode: Option<Mode>,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long, global = true)]
    confidence: Option<f64>,

    /// Run detection every Nth frame (1 = every frame).
    #[arg(long, global = true)]
    skip_frames: Option<usize>,

    /// Consecutive fallen frames needed to confirm a fall.
    #[arg(long, global = true)]
    min_fall_frames: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one video and print the first stored reading.
    Analyze {
        input: PathBuf,
        /// Annotated output video (default: `<stem>_falls.<ext>` next to the input).
        output: Option<PathBuf>,
        /// Do not write the annotated video.
        #[arg(long)]
        no_save: bool,
        /// Open the output folder when done.
        #[arg(long)]
        open: bool,
        /// Keep readings in memory instead of the database.
        #[arg(long)]
        no_db: bool,
    },
    /// Analyze every video in a folder.
    AnalyzeFolder {
        input_dir: PathBuf,
        output_dir: PathBuf,
        #[arg(long)]
        no_save: bool,
        #[arg(long)]
        no_db: bool,
    },
    /// Print stored fall readings.
    Readings {
        /// Only readings for this video path.
        #[arg(long)]
        video: Option<String>,
        /// Only the first reading.
        #[arg(long)]
        first: bool,
    },
    /// Rename the videos of a folder to `<prefix>1.<ext>`, `<prefix>2.<ext>`, ...
    OrderFiles {
        dir: PathBuf,
        #[arg(long, default_value = "video")]
        prefix: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Combined,
    Model,
    Pose,
}

impl From<Mode> for FallStrategy {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Combined => FallStrategy::Combined,
            Mode::Model => FallStrategy::ModelOnly,
            Mode::Pose => FallStrategy::PoseOnly,
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Command::Analyze {
            input,
            output,
            no_save,
            open,
            no_db,
        } => {
            let output = output.clone().unwrap_or_else(|| default_output(input));
            let detector = build_detector(&cli, *no_db)?;
            let options = AnalyzeOptions {
                save: !*no_save,
                open_in_finder: *open,
            };
            let report = detector.analyze_video(input, &output, options)?;
            eprintln!();
            log::info!(
                "{} frame(s) at {:.1} fps, {} fall(s)",
                report.frames_processed,
                report.fps,
                report.fall_count()
            );
            print_first(&detector.repository().get_all_cv_fall_readings()?);
        }
        Command::AnalyzeFolder {
            input_dir,
            output_dir,
            no_save,
            no_db,
        } => {
            let detector = build_detector(&cli, *no_db)?;
            let options = AnalyzeOptions {
                save: !*no_save,
                open_in_finder: false,
            };
            let report = detector.analyze_folder(input_dir, output_dir, options)?;
            eprintln!();
            for (path, r) in &report.analyzed {
                println!("{}: {} fall(s)", path.display(), r.fall_count());
            }
            for (path, reason) in &report.failed {
                println!("{}: failed: {reason}", path.display());
            }
            log::info!(
                "{} video(s) analyzed, {} failed, {} fall(s) total",
                report.analyzed.len(),
                report.failed.len(),
                report.total_falls()
            );
        }
        Command::Readings { video, first } => {
            let manager = PsqlManager::from_config_path(&cli.db_config)?;
            let readings = match video {
                Some(v) => manager.get_readings_for_video(v)?,
                None => manager.get_all_cv_fall_readings()?,
            };
            if *first {
                print_first(&readings);
            } else if readings.is_empty() {
                println!("No fall readings stored");
            } else {
                for r in &readings {
                    println!("{r}");
                }
            }
        }
        Command::OrderFiles { dir, prefix } => {
            for path in rename_and_order_files(dir, prefix)? {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

fn build_detector(cli: &Cli, no_db: bool) -> Result<FallDetector, Box<dyn std::error::Error>> {
    let settings = settings_from(cli)?;
    let repository: Arc<dyn FallReadingRepository> = if no_db {
        log::info!("Keeping readings in memory");
        Arc::new(InMemoryReadingRepository::new())
    } else {
        Arc::new(PsqlManager::from_config_path(&cli.db_config)?)
    };

    let trained = settings.trained_model.clone();
    let base = settings.base_model.clone();
    let detector = FallDetector::from_models_reporting(
        &trained,
        &base,
        repository,
        settings,
        Some(Arc::new(download_progress)),
    )?
    .with_progress(Arc::new(|current: usize, total: usize| {
        eprint!("\rAnalyzing frame {current}/{total}");
        true
    }));
    Ok(detector)
}

fn settings_from(cli: &Cli) -> Result<AnalysisSettings, Box<dyn std::error::Error>> {
    let mut settings = AnalysisSettings::load_or_default(cli.settings.as_deref())?;
    if let Some(path) = &cli.trained_model {
        settings.trained_model = path.clone();
    }
    if let Some(path) = &cli.base_model {
        settings.base_model = path.clone();
    }
    if let Some(mode) = cli.mode {
        settings.strategy = mode.into();
    }
    if let Some(confidence) = cli.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(format!("--confidence must be between 0.0 and 1.0, got {confidence}").into());
        }
        settings.confidence = confidence;
    }
    if let Some(n) = cli.skip_frames {
        if n == 0 {
            return Err("--skip-frames must be >= 1".into());
        }
        settings.skip_frames = n;
    }
    if let Some(n) = cli.min_fall_frames {
        if n == 0 {
            return Err("--min-fall-frames must be >= 1".into());
        }
        settings.min_fall_frames = n;
    }
    Ok(settings)
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp4".to_string());
    input.with_file_name(format!("{stem}_falls.{ext}"))
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
}

fn first_line(readings: &[FallReading]) -> String {
    match readings.first() {
        Some(reading) => reading.to_string(),
        None => "No fall readings stored".to_string(),
    }
}

fn print_first(readings: &[FallReading]) {
    println!("{}", first_line(readings));
}
