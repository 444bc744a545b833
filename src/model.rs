//! The background removal seam: an external, opaque model behind a trait.

use crate::types::{CutoutImage, ResizedImage};

/// Which removal model weights to run.
///
/// [`IsnetFp16`](ModelVariant::IsnetFp16) is the fast default;
/// [`Isnet`](ModelVariant::Isnet) trades speed for edge fidelity and is
/// preferred for portrait shots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelVariant {
    /// Half-precision isnet, the default.
    #[default]
    IsnetFp16,
    /// Full-precision isnet, for portraits and fine hair edges.
    Isnet,
}

impl ModelVariant {
    /// Wire name of the variant.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IsnetFp16 => "isnet_fp16",
            Self::Isnet => "isnet",
        }
    }

    /// Pick a variant from a filename.
    ///
    /// Names containing `selfie`, `face` or `portrait` (any case) select the
    /// full-precision model; everything else gets the fast default.
    #[must_use]
    pub fn for_file_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("selfie") || lower.contains("face") || lower.contains("portrait") {
            Self::Isnet
        } else {
            Self::IsnetFp16
        }
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An external background removal model.
///
/// The pipeline treats the model as a single-shot black box: one resized
/// image in, one cutout with an alpha channel out. There is no cancellation
/// and no partial result; implementations that need a timeout enforce it
/// themselves. The engine never retries a failed call.
pub trait RemovalModel: Send + Sync {
    /// Error type produced by the model.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Remove the background from `image`, returning the cutout.
    ///
    /// # Errors
    ///
    /// Implementations return their own error when inference fails; the
    /// engine wraps it as [`Error::Removal`](crate::error::Error::Removal)
    /// and fails the run.
    fn remove(
        &self,
        image: &ResizedImage,
        variant: ModelVariant,
    ) -> std::result::Result<CutoutImage, Self::Error>;
}
