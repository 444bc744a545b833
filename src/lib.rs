//! Background cutout pipeline around a pluggable removal model.
//!
//! Uploaded images rarely arrive model-ready: they come in oversized, and
//! the raw cutouts a segmentation model returns have hard matte edges. This
//! crate wraps an external background removal model with the two stages that
//! fix that: a pre-processor that scales sources down to the model's input
//! bound, and a post-processor that blurs, re-saturates and softens the
//! returned matte into the final transparent PNG.
//!
//! The model itself stays outside the crate, behind [`RemovalModel`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use cutout_pipeline::{CutoutEngine, SourceImage};
//! # use cutout_pipeline::{CutoutImage, ModelVariant, RemovalModel, ResizedImage};
//! # struct MyModel;
//! # impl RemovalModel for MyModel {
//! #     type Error = std::io::Error;
//! #     fn remove(&self, image: &ResizedImage, _v: ModelVariant) -> Result<CutoutImage, Self::Error> {
//! #         Ok(CutoutImage::new(image.bytes.clone()))
//! #     }
//! # }
//!
//! let engine = CutoutEngine::new(MyModel);
//! let source = SourceImage::from_path(Path::new("photo.jpg")).unwrap();
//! let final_image = engine.process(source).unwrap();
//! final_image.save(Path::new("photo_cutout.png")).unwrap();
//! ```
//!
//! # Stages
//!
//! Each stage is usable on its own: [`resize::resize_source`] fits an image
//! within a bound, and [`matte::post_process`] turns a raw cutout into the
//! softened final PNG. Portrait-looking filenames select the full-precision
//! model variant automatically; see [`ModelVariant::for_file_name`].

#![deny(missing_docs)]

mod engine;
pub mod error;
pub mod matte;
pub mod model;
pub mod resize;
pub mod types;

pub use engine::{
    batch_output_names, default_output_path, default_resized_path, is_supported_image,
    output_file_name, resize_file, soften_file, CutoutEngine, FileOutcome, PipelineOptions,
    PipelineRun, RunState,
};
pub use error::{Error, Result};
pub use matte::{
    boost_saturation, post_process, soften_alpha, DEFAULT_BLUR_SIGMA, DEFAULT_SATURATION,
    EDGE_SOFTEN_FACTOR,
};
pub use model::{ModelVariant, RemovalModel};
pub use resize::{fit_dimensions, resize_source, DEFAULT_MAX_SIZE};
pub use types::{encode_image, CutoutImage, FinalImage, ResizedImage, SourceImage};
