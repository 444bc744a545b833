//! Run the full pipeline with a stand-in model that keys the background off
//! luminance. Real deployments plug in an actual segmentation model; this
//! exists to show the wiring end to end.
//!
//! Usage: cargo run --example pipeline -- input.jpg [output.png]

use std::convert::Infallible;
use std::path::{Path, PathBuf};

use cutout_pipeline::{
    default_output_path, CutoutEngine, CutoutImage, ModelVariant, RemovalModel, ResizedImage,
    SourceImage,
};
use image::Rgba;

/// Treats bright pixels as background, like a product shot on white.
struct LumaKeyModel;

impl RemovalModel for LumaKeyModel {
    type Error = Infallible;

    fn remove(
        &self,
        image: &ResizedImage,
        _variant: ModelVariant,
    ) -> Result<CutoutImage, Self::Error> {
        let rgba = image.to_image().expect("resized image decodes").to_rgba8();
        let mut out = rgba.clone();
        for (x, y, px) in rgba.enumerate_pixels() {
            let luma =
                0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2]);
            if luma > 240.0 {
                out.put_pixel(x, y, Rgba([px[0], px[1], px[2], 0]));
            }
        }
        Ok(CutoutImage::from_rgba(out).expect("png encode"))
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <input> [output.png]", args[0]);
        std::process::exit(1);
    }

    let input = Path::new(&args[1]);
    let output = args
        .get(2)
        .map_or_else(|| default_output_path(input), PathBuf::from);

    let source = match SourceImage::from_path(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", input.display());
            std::process::exit(1);
        }
    };

    let engine = CutoutEngine::new(LumaKeyModel);
    let run = engine.run(source);
    eprintln!("run finished: {}", run.state);

    match run.into_result() {
        Ok(final_image) => {
            if let Err(e) = final_image.save(&output) {
                eprintln!("Failed to save: {e}");
                std::process::exit(1);
            }
            eprintln!(
                "{}x{} cutout written to {}",
                final_image.width,
                final_image.height,
                output.display()
            );
        }
        Err(e) => {
            eprintln!("Pipeline failed: {e}");
            std::process::exit(1);
        }
    }
}
