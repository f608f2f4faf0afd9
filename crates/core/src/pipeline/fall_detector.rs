use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::annotation::infrastructure::overlay_annotator::OverlayAnnotator;
use crate::detection::domain::person_detector::PersonDetector;
use crate::detection::infrastructure::execution_provider::accelerator_name;
use crate::detection::infrastructure::fused_person_detector::FusedPersonDetector;
use crate::detection::infrastructure::model_resolver;
use crate::detection::infrastructure::onnx_fall_model_detector::OnnxFallModelDetector;
use crate::detection::infrastructure::onnx_pose_detector::OnnxPoseDetector;
use crate::detection::infrastructure::person_tracker::PersonTracker;
use crate::detection::infrastructure::skip_frame_detector::SkipFrameDetector;
use crate::detection::infrastructure::tracked_person_detector::TrackedPersonDetector;
use crate::fall::domain::fall_monitor::FallMonitor;
use crate::fall::domain::fall_reading::NewFallReading;
use crate::fall::domain::posture_classifier::{FallStrategy, PostureClassifier};
use crate::fall::domain::reading_repository::FallReadingRepository;
use crate::shared::settings::AnalysisSettings;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;
use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;
use crate::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use crate::video::infrastructure::file_ordering::list_video_files;

use super::analysis_report::AnalysisReport;
use super::analyze_video_use_case::{AnalysisError, AnalyzeVideoUseCase};
use super::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
use super::pipeline_executor::ProgressFn;

pub type DetectorResult = Result<Box<dyn PersonDetector>, Box<dyn std::error::Error>>;
pub type DetectorFactory = Box<dyn Fn() -> DetectorResult + Send + Sync>;
pub type ReaderFactory = Box<dyn Fn() -> Box<dyn VideoReader> + Send + Sync>;
pub type WriterFactory = Box<dyn Fn() -> Box<dyn VideoWriter> + Send + Sync>;
pub type FolderOpener = Box<dyn Fn(&Path) -> std::io::Result<()> + Send + Sync>;
pub type SharedProgress = Arc<dyn Fn(usize, usize) -> bool + Send + Sync>;
/// Model download progress: `(file_name, bytes_downloaded, total_bytes)`.
pub type DownloadProgress = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzeOptions {
    /// Write the annotated video to the output path.
    pub save: bool,
    /// Reveal the output folder in the desktop file manager afterwards.
    pub open_in_finder: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            save: true,
            open_in_finder: false,
        }
    }
}

/// Result of analysing every video in a folder.
#[derive(Debug, Default)]
pub struct FolderReport {
    pub analyzed: Vec<(PathBuf, AnalysisReport)>,
    pub failed: Vec<(PathBuf, String)>,
}

impl FolderReport {
    pub fn total_falls(&self) -> usize {
        self.analyzed.iter().map(|(_, r)| r.fall_count()).sum()
    }
}

/// Runs fall analysis over videos and stores the confirmed falls.
///
/// Each video gets a fresh detector and monitor, so tracker ids and fall
/// streaks never leak between files.
pub struct FallDetector {
    detector_factory: DetectorFactory,
    reader_factory: ReaderFactory,
    writer_factory: WriterFactory,
    repository: Arc<dyn FallReadingRepository>,
    settings: AnalysisSettings,
    folder_opener: FolderOpener,
    progress: Option<SharedProgress>,
}

impl FallDetector {
    /// Builds a detector backed by ONNX models and ffmpeg.
    ///
    /// Only the models the configured strategy needs are resolved: the
    /// trained model for `model`, the base pose model for `pose`, both for
    /// `combined`. Missing files are looked up in the model cache, then in
    /// `settings.models_dir`, then downloaded from the configured URL.
    pub fn from_models(
        trained_model: &Path,
        base_model: &Path,
        repository: Arc<dyn FallReadingRepository>,
        settings: AnalysisSettings,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Self::from_models_reporting(trained_model, base_model, repository, settings, None)
    }

    /// Like [`FallDetector::from_models`], reporting model downloads to
    /// `on_download`.
    pub fn from_models_reporting(
        trained_model: &Path,
        base_model: &Path,
        repository: Arc<dyn FallReadingRepository>,
        settings: AnalysisSettings,
        on_download: Option<DownloadProgress>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let strategy = settings.strategy;
        let resolve_model = |path: &Path, url: Option<&str>| {
            let progress = on_download.clone().map(|cb| -> model_resolver::ProgressFn {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Box::new(move |done: u64, total: u64| cb(&name, done, total))
            });
            model_resolver::resolve(path, url, settings.models_dir.as_deref(), progress)
        };
        let trained = match strategy {
            FallStrategy::PoseOnly => None,
            _ => Some(resolve_model(
                trained_model,
                settings.trained_model_url.as_deref(),
            )?),
        };
        let base = match strategy {
            FallStrategy::ModelOnly => None,
            _ => Some(resolve_model(base_model, settings.base_model_url.as_deref())?),
        };
        let fall_class = settings.fall_class_index().ok_or_else(|| {
            format!(
                "fall class {:?} is not one of {:?}",
                settings.fall_class, settings.class_names
            )
        })?;
        log::info!(
            "Fall detector ready ({strategy:?}, {} inference)",
            accelerator_name()
        );

        let num_classes = settings.class_names.len();
        let confidence = settings.confidence;
        let tracker_max_lost = settings.tracker_max_lost;
        let skip_frames = settings.skip_frames;
        let detector_factory: DetectorFactory = Box::new(move || -> DetectorResult {
            let pose = base
                .as_deref()
                .map(|p| OnnxPoseDetector::new(p, confidence))
                .transpose()?;
            let model = trained
                .as_deref()
                .map(|p| OnnxFallModelDetector::new(p, num_classes, fall_class, confidence))
                .transpose()?;
            let inner: Box<dyn PersonDetector> = match (pose, model) {
                (Some(pose), Some(model)) => {
                    Box::new(FusedPersonDetector::new(Box::new(pose), Box::new(model)))
                }
                (Some(pose), None) => Box::new(pose),
                (None, Some(model)) => Box::new(model),
                (None, None) => return Err("no detection model configured".into()),
            };
            let tracked = TrackedPersonDetector::new(inner, PersonTracker::new(tracker_max_lost));
            let detector: Box<dyn PersonDetector> =
                Box::new(SkipFrameDetector::new(Box::new(tracked), skip_frames)?);
            Ok(detector)
        });

        Ok(Self::with_components(
            detector_factory,
            Box::new(|| Box::new(FfmpegReader::new()) as Box<dyn VideoReader>),
            Box::new(|| Box::new(FfmpegWriter::new()) as Box<dyn VideoWriter>),
            repository,
            settings,
        ))
    }

    pub fn with_components(
        detector_factory: DetectorFactory,
        reader_factory: ReaderFactory,
        writer_factory: WriterFactory,
        repository: Arc<dyn FallReadingRepository>,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            detector_factory,
            reader_factory,
            writer_factory,
            repository,
            settings,
            folder_opener: Box::new(|path: &Path| open::that(path)),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_folder_opener(mut self, opener: FolderOpener) -> Self {
        self.folder_opener = opener;
        self
    }

    pub fn repository(&self) -> &Arc<dyn FallReadingRepository> {
        &self.repository
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Analyses `input`, stores one reading per confirmed fall and returns
    /// the run's report.
    ///
    /// With `save`, the annotated video is written to `output`. With
    /// `open_in_finder` as well, the output folder is revealed afterwards.
    pub fn analyze_video(
        &self,
        input: &Path,
        output: &Path,
        options: AnalyzeOptions,
    ) -> Result<AnalysisReport, Box<dyn std::error::Error>> {
        if !input.is_file() {
            return Err(AnalysisError::InputMissing(input.to_path_buf()).into());
        }

        let mut reader = (self.reader_factory)();
        let metadata = reader.open(input)?;
        log::info!(
            "Analyzing {} ({}x{}, {} frames)",
            input.display(),
            metadata.width,
            metadata.height,
            metadata.total_frames
        );

        let writer = if options.save {
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            Some((self.writer_factory)())
        } else {
            None
        };

        let detector = match (self.detector_factory)() {
            Ok(d) => d,
            Err(e) => {
                reader.close();
                return Err(e);
            }
        };

        let mut use_case = AnalyzeVideoUseCase::new(
            reader,
            writer,
            detector,
            self.new_monitor(),
            Box::new(OverlayAnnotator::default()),
            Box::new(ThreadedPipelineExecutor::new()),
            self.progress_fn(),
            None,
        );
        let report = use_case.execute(&metadata, output)?;

        let video_path = input.to_string_lossy();
        let readings: Vec<NewFallReading> = report
            .events
            .iter()
            .map(|e| NewFallReading::from_event(e, &video_path))
            .collect();
        if !readings.is_empty() {
            let stored = self.repository.insert_readings(&readings)?;
            log::info!("Stored {stored} fall reading(s) for {}", input.display());
        }

        if options.save {
            log::info!("Annotated video written to {}", output.display());
            if options.open_in_finder {
                self.reveal(output.parent().unwrap_or(Path::new(".")));
            }
        }
        Ok(report)
    }

    /// Analyses every video in `input_dir` in file name order. Outputs keep
    /// their input file name under `output_dir`.
    ///
    /// A failing video is logged and recorded; the rest still run.
    pub fn analyze_folder(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        options: AnalyzeOptions,
    ) -> Result<FolderReport, Box<dyn std::error::Error>> {
        let videos = list_video_files(input_dir)?;
        if options.save {
            fs::create_dir_all(output_dir)?;
        }
        log::info!("Found {} video(s) in {}", videos.len(), input_dir.display());

        let per_video = AnalyzeOptions {
            open_in_finder: false,
            ..options
        };
        let mut report = FolderReport::default();
        for video in videos {
            let Some(name) = video.file_name() else {
                continue;
            };
            let output = output_dir.join(name);
            match self.analyze_video(&video, &output, per_video) {
                Ok(r) => report.analyzed.push((video, r)),
                Err(e) => {
                    log::error!("Failed to analyze {}: {e}", video.display());
                    report.failed.push((video, e.to_string()));
                }
            }
        }

        if options.save && options.open_in_finder {
            self.reveal(output_dir);
        }
        Ok(report)
    }

    fn new_monitor(&self) -> FallMonitor {
        let s = &self.settings;
        FallMonitor::new(
            PostureClassifier::new(s.strategy, s.model_threshold, s.pose_threshold),
            s.min_fall_frames,
            s.recovery_frames,
            s.tracker_max_lost,
        )
    }

    fn progress_fn(&self) -> Option<ProgressFn> {
        self.progress.clone().map(|p| -> ProgressFn {
            Box::new(move |current: usize, total: usize| p(current, total))
        })
    }

    fn reveal(&self, folder: &Path) {
        let folder = if folder.as_os_str().is_empty() {
            Path::new(".")
        } else {
            folder
        };
        if let Err(e) = (self.folder_opener)(folder) {
            log::warn!("Could not open {}: {e}", folder.display());
        }
    }
}
