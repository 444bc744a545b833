//! Pipeline engine: resize, background removal, matte post-processing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::error::{Error, Result};
use crate::matte;
use crate::model::{ModelVariant, RemovalModel};
use crate::resize;
use crate::types::{CutoutImage, FinalImage, ResizedImage, SourceImage};

/// Options controlling a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Long-side bound for model input.
    pub max_size: u32,
    /// Model variant override; `None` picks per file by filename.
    pub variant: Option<ModelVariant>,
    /// Gaussian blur sigma for the cosmetic pass; 0 disables.
    pub blur_sigma: f32,
    /// Saturation boost for the cosmetic pass; 1.0 disables.
    pub saturation: f32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_size: resize::DEFAULT_MAX_SIZE,
            variant: None,
            blur_sigma: matte::DEFAULT_BLUR_SIGMA,
            saturation: matte::DEFAULT_SATURATION,
        }
    }
}

/// Lifecycle of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Run created, nothing started.
    Idle,
    /// Scaling the source to the model bound.
    Resizing,
    /// Waiting on the removal model.
    Removing,
    /// Softening the matte and encoding the final PNG.
    PostProcessing,
    /// Final image produced.
    Done,
    /// Run aborted; see the recorded error.
    Failed,
}

impl RunState {
    /// State name for logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resizing => "resizing",
            Self::Removing => "removing",
            Self::PostProcessing => "post-processing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything belonging to one image's trip through the pipeline.
///
/// A run is created fresh per source image and never reused. Whatever
/// artifacts were produced before a failure stay on the run for inspection;
/// a failed run never carries a final image.
#[derive(Debug)]
pub struct PipelineRun {
    /// The image as submitted.
    pub source: SourceImage,
    /// Output of the resize stage.
    pub resized: Option<ResizedImage>,
    /// Output of the removal model.
    pub cutout: Option<CutoutImage>,
    /// Output of the post-processing stage.
    pub final_image: Option<FinalImage>,
    /// Where the run currently stands.
    pub state: RunState,
    /// The error that stopped the run, if it failed.
    pub error: Option<Error>,
}

impl PipelineRun {
    fn new(source: SourceImage) -> Self {
        Self {
            source,
            resized: None,
            cutout: None,
            final_image: None,
            state: RunState::Idle,
            error: None,
        }
    }

    /// Consume the run, yielding the final image or the error that stopped it.
    ///
    /// # Errors
    ///
    /// Returns the run's recorded error, or [`Error::Incomplete`] if the run
    /// is not in a terminal state.
    pub fn into_result(self) -> Result<FinalImage> {
        if let Some(err) = self.error {
            return Err(err);
        }
        match self.final_image {
            Some(final_image) => Ok(final_image),
            None => Err(Error::Incomplete { state: self.state }),
        }
    }
}

/// Report from processing one file, for batch runs that must not panic.
#[derive(Debug)]
pub struct FileOutcome {
    /// Input path.
    pub path: PathBuf,
    /// State the run ended in.
    pub state: RunState,
    /// Whether a final image was written.
    pub success: bool,
    /// Human-readable status message.
    pub message: String,
}

/// The pipeline engine: owns the removal model and the run configuration.
///
/// Create once and reuse for any number of images. Runs are synchronous and
/// single-shot: [`CutoutEngine::run`] drives one source image to a terminal
/// state and returns before another can start, and no state carries over
/// between runs.
pub struct CutoutEngine<M> {
    model: M,
    options: PipelineOptions,
}

impl<M: RemovalModel> CutoutEngine<M> {
    /// Create an engine with default options.
    pub fn new(model: M) -> Self {
        Self {
            model,
            options: PipelineOptions::default(),
        }
    }

    /// Create an engine with explicit options.
    pub fn with_options(model: M, options: PipelineOptions) -> Self {
        Self { model, options }
    }

    /// The engine's run configuration.
    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// The removal model the engine drives.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Drive one source image through resize, removal and post-processing.
    ///
    /// Never panics. The returned run is always terminal: `Done` with a
    /// final image, or `Failed` with the error recorded and any artifacts
    /// produced before the failure still attached.
    #[must_use]
    pub fn run(&self, source: SourceImage) -> PipelineRun {
        let mut run = PipelineRun::new(source);
        match self.advance(&mut run) {
            Ok(()) => run.state = RunState::Done,
            Err(e) => {
                log::debug!("pipeline failed for {} while {}: {e}", run.source.name, run.state);
                run.error = Some(e);
                run.state = RunState::Failed;
            }
        }
        run
    }

    fn advance(&self, run: &mut PipelineRun) -> Result<()> {
        run.state = RunState::Resizing;
        let resized = resize::resize_source(&run.source, self.options.max_size)?;

        run.state = RunState::Removing;
        let variant = self
            .options
            .variant
            .unwrap_or_else(|| ModelVariant::for_file_name(&run.source.name));
        log::debug!("removing background from {} with {variant}", run.source.name);
        let removal = self.model.remove(&resized, variant);
        run.resized = Some(resized);
        let cutout = removal.map_err(|e| Error::Removal(Box::new(e)))?;

        run.state = RunState::PostProcessing;
        let post = matte::post_process(
            &cutout,
            output_file_name(&run.source.name),
            self.options.blur_sigma,
            self.options.saturation,
        );
        run.cutout = Some(cutout);
        run.final_image = Some(post?);
        Ok(())
    }

    /// Run the pipeline and return just the final image.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the run; see [`Error`] for the stage
    /// taxonomy.
    pub fn process(&self, source: SourceImage) -> Result<FinalImage> {
        self.run(source).into_result()
    }

    /// Process a single image file: load, run the pipeline, write the PNG.
    ///
    /// Returns a [`FileOutcome`] instead of an error so batch runs keep
    /// going past individual failures.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path) -> FileOutcome {
        let source = match SourceImage::from_path(input) {
            Ok(s) => s,
            Err(e) => {
                return FileOutcome {
                    path: input.to_path_buf(),
                    state: RunState::Failed,
                    success: false,
                    message: format!("Failed to load: {e}"),
                };
            }
        };

        let run = self.run(source);
        let state = run.state;
        let final_image = match run.into_result() {
            Ok(f) => f,
            Err(e) => {
                return FileOutcome {
                    path: input.to_path_buf(),
                    state,
                    success: false,
                    message: e.to_string(),
                };
            }
        };

        if let Some(parent) = output.parent() {
            if !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return FileOutcome {
                        path: input.to_path_buf(),
                        state,
                        success: false,
                        message: format!("Failed to create output directory: {e}"),
                    };
                }
            }
        }

        match final_image.save(output) {
            Ok(()) => FileOutcome {
                path: input.to_path_buf(),
                state,
                success: true,
                message: format!("{}x{} cutout written", final_image.width, final_image.height),
            },
            Err(e) => FileOutcome {
                path: input.to_path_buf(),
                state,
                success: false,
                message: format!("Failed to save: {e}"),
            },
        }
    }

    /// Process every supported image in a directory.
    ///
    /// Output names come from [`batch_output_names`], so two inputs sharing
    /// a stem never overwrite each other. Uses parallel iteration when the
    /// `cli` feature is enabled (via rayon); each file gets its own fresh
    /// run.
    #[must_use]
    pub fn process_directory(&self, input_dir: &Path, output_dir: &Path) -> Vec<FileOutcome> {
        let files: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![FileOutcome {
                    path: input_dir.to_path_buf(),
                    state: RunState::Failed,
                    success: false,
                    message: format!("Failed to read directory: {e}"),
                }];
            }
        };

        if !output_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(output_dir) {
                return vec![FileOutcome {
                    path: output_dir.to_path_buf(),
                    state: RunState::Failed,
                    success: false,
                    message: format!("Failed to create output directory: {e}"),
                }];
            }
        }

        let names: Vec<String> = files.iter().map(|p| file_name_of(p)).collect();
        let jobs: Vec<(PathBuf, PathBuf)> = files
            .into_iter()
            .zip(batch_output_names(&names))
            .map(|(input, name)| (input, output_dir.join(name)))
            .collect();

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            jobs.par_iter()
                .map(|(input, output)| self.process_file(input, output))
                .collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            jobs.iter()
                .map(|(input, output)| self.process_file(input, output))
                .collect()
        }
    }
}

/// Run just the resize stage against files.
///
/// Reads `input`, fits it within `max_size` and writes the result to
/// `output` in the source's own format. An `output` extension naming a
/// different image format is rejected rather than silently mislabeled.
///
/// # Errors
///
/// Returns [`Error::Io`] on read/write failures, [`Error::UnsupportedFormat`]
/// for unknown input extensions or a mismatched output extension, and
/// [`Error::Decode`] for corrupt image data.
pub fn resize_file(input: &Path, output: &Path, max_size: u32) -> Result<ResizedImage> {
    let source = SourceImage::from_path(input)?;
    if let Ok(requested) = ImageFormat::from_path(output) {
        if requested != source.format {
            return Err(Error::UnsupportedFormat(format!(
                "{} output for {} input; resize keeps the source format",
                requested.to_mime_type(),
                source.mime_type()
            )));
        }
    }
    let resized = resize::resize_source(&source, max_size)?;
    std::fs::write(output, &resized.bytes)?;
    Ok(resized)
}

/// Run just the post-processing stage against files.
///
/// Reads an existing cutout from `input`, softens its matte and writes the
/// final PNG to `output`. An `output` extension naming a non-PNG format is
/// rejected rather than silently mislabeled.
///
/// # Errors
///
/// Returns [`Error::Io`] on read/write failures, [`Error::UnsupportedFormat`]
/// if `output` names a non-PNG format, [`Error::Decode`] for corrupt cutout
/// data and [`Error::Encode`] if the final PNG cannot be produced.
pub fn soften_file(
    input: &Path,
    output: &Path,
    blur_sigma: f32,
    saturation: f32,
) -> Result<FinalImage> {
    if let Ok(requested) = ImageFormat::from_path(output) {
        if requested != ImageFormat::Png {
            return Err(Error::UnsupportedFormat(format!(
                "{} output for a softened matte; the final image is always PNG",
                requested.to_mime_type()
            )));
        }
    }
    let bytes = std::fs::read(input)?;
    let cutout = CutoutImage::new(bytes);
    let final_image = matte::post_process(
        &cutout,
        output_file_name(&file_name_of(input)),
        blur_sigma,
        saturation,
    )?;
    final_image.save(output)?;
    Ok(final_image)
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg" | "png" | "webp"),
        None => false,
    }
}

/// Output filename for a source: the stem with a `.png` extension.
///
/// Example: `"photo.jpg"` becomes `"photo.png"`.
#[must_use]
pub fn output_file_name(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("cutout");
    format!("{stem}.png")
}

/// Output filenames for a batch of inputs, keeping stem collisions apart.
///
/// Each entry follows [`output_file_name`] unless two inputs share a stem
/// (`photo.jpg` and `photo.png` would both become `photo.png`); colliding
/// inputs keep their full filename ahead of the `.png` extension
/// (`photo.jpg.png`), so no batch entry overwrites another.
#[must_use]
pub fn batch_output_names(file_names: &[String]) -> Vec<String> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for name in file_names {
        *counts.entry(output_file_name(name)).or_insert(0) += 1;
    }
    file_names
        .iter()
        .map(|name| {
            let output = output_file_name(name);
            if counts[&output] > 1 {
                format!("{name}.png")
            } else {
                output
            }
        })
        .collect()
}

fn file_name_of(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().into_owned(),
    )
}

/// Default output path for a processed cutout.
///
/// Example: `"photo.jpg"` becomes `"photo_cutout.png"`. The suffix keeps a
/// PNG input from being overwritten by its own output.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_cutout.png"))
}

/// Default output path for a resized image.
///
/// Example: `"photo.jpg"` becomes `"photo_resized.jpg"`.
#[must_use]
pub fn default_resized_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_resized.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encode_image;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::sync::Mutex;

    /// Stand-in model: full-frame cutout with one semi-transparent row.
    struct FrameModel;

    impl RemovalModel for FrameModel {
        type Error = std::convert::Infallible;

        fn remove(
            &self,
            image: &ResizedImage,
            _variant: ModelVariant,
        ) -> std::result::Result<CutoutImage, Self::Error> {
            let (w, h) = image.dimensions();
            let mut rgba = RgbaImage::from_pixel(w, h, Rgba([200, 180, 160, 255]));
            for x in 0..w {
                rgba.put_pixel(x, 0, Rgba([200, 180, 160, 128]));
            }
            Ok(CutoutImage::from_rgba(rgba).expect("png encode"))
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("weights not loaded")]
    struct WeightsError;

    struct ExplodingModel;

    impl RemovalModel for ExplodingModel {
        type Error = WeightsError;

        fn remove(
            &self,
            _image: &ResizedImage,
            _variant: ModelVariant,
        ) -> std::result::Result<CutoutImage, Self::Error> {
            Err(WeightsError)
        }
    }

    struct RecordingModel {
        seen: Mutex<Option<ModelVariant>>,
    }

    impl RemovalModel for RecordingModel {
        type Error = std::convert::Infallible;

        fn remove(
            &self,
            image: &ResizedImage,
            variant: ModelVariant,
        ) -> std::result::Result<CutoutImage, Self::Error> {
            *self.seen.lock().unwrap() = Some(variant);
            let (w, h) = image.dimensions();
            Ok(CutoutImage::from_rgba(RgbaImage::new(w, h)).expect("png encode"))
        }
    }

    fn png_source(name: &str, w: u32, h: u32) -> SourceImage {
        let img = image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            w,
            h,
            Rgba([10, 40, 70, 255]),
        ));
        SourceImage::new(name, ImageFormat::Png, encode_image(&img, ImageFormat::Png).unwrap())
    }

    #[test]
    fn run_reaches_done_with_all_artifacts() {
        let engine = CutoutEngine::new(FrameModel);
        let run = engine.run(png_source("photo.png", 64, 48));

        assert_eq!(run.state, RunState::Done);
        assert!(run.resized.is_some());
        assert!(run.cutout.is_some());

        let final_image = run.final_image.as_ref().unwrap();
        assert_eq!(final_image.name, "photo.png");
        assert_eq!(final_image.dimensions(), (64, 48));
    }

    #[test]
    fn failed_removal_keeps_resized_but_no_final() {
        let engine = CutoutEngine::new(ExplodingModel);
        let run = engine.run(png_source("photo.png", 32, 32));

        assert_eq!(run.state, RunState::Failed);
        assert!(run.resized.is_some());
        assert!(run.cutout.is_none());
        assert!(run.final_image.is_none());

        let err = run.into_result().unwrap_err();
        assert_eq!(err.to_string(), "background removal failed");
    }

    #[test]
    fn variant_heuristic_applies_when_not_overridden() {
        let engine = CutoutEngine::new(RecordingModel {
            seen: Mutex::new(None),
        });

        let _ = engine.run(png_source("beach_selfie.png", 16, 16));
        assert_eq!(*engine.model().seen.lock().unwrap(), Some(ModelVariant::Isnet));

        let _ = engine.run(png_source("warehouse.png", 16, 16));
        assert_eq!(
            *engine.model().seen.lock().unwrap(),
            Some(ModelVariant::IsnetFp16)
        );
    }

    #[test]
    fn variant_override_beats_heuristic() {
        let opts = PipelineOptions {
            variant: Some(ModelVariant::IsnetFp16),
            ..PipelineOptions::default()
        };
        let engine = CutoutEngine::with_options(
            RecordingModel {
                seen: Mutex::new(None),
            },
            opts,
        );

        let _ = engine.run(png_source("selfie.png", 16, 16));
        assert_eq!(
            *engine.model().seen.lock().unwrap(),
            Some(ModelVariant::IsnetFp16)
        );
    }

    #[test]
    fn default_options_match_the_primary_variant() {
        let opts = PipelineOptions::default();
        assert_eq!(opts.max_size, 2048);
        assert!(opts.variant.is_none());
    }

    #[test]
    fn output_file_name_swaps_extension_for_png() {
        assert_eq!(output_file_name("photo.jpg"), "photo.png");
        assert_eq!(output_file_name("archive.v2.webp"), "archive.v2.png");
        assert_eq!(output_file_name("noext"), "noext.png");
    }

    #[test]
    fn batch_output_names_keep_colliding_stems_apart() {
        let names = vec![
            "photo.jpg".to_string(),
            "photo.png".to_string(),
            "other.webp".to_string(),
        ];
        assert_eq!(
            batch_output_names(&names),
            vec!["photo.jpg.png", "photo.png.png", "other.png"]
        );
    }

    #[test]
    fn default_paths_never_clobber_inputs() {
        let p = default_output_path(Path::new("/tmp/photo.png"));
        assert_eq!(p, PathBuf::from("/tmp/photo_cutout.png"));

        let p = default_resized_path(Path::new("photo.jpg"));
        assert_eq!(p.file_name().unwrap().to_str().unwrap(), "photo_resized.jpg");
    }

    #[test]
    fn is_supported_image_accepts_web_formats() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
        assert!(is_supported_image(Path::new("photo.webp")));
    }

    #[test]
    fn is_supported_image_rejects_everything_else() {
        assert!(!is_supported_image(Path::new("photo.bmp")));
        assert!(!is_supported_image(Path::new("photo.txt")));
        assert!(!is_supported_image(Path::new("photo")));
    }
}
