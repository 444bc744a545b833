use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use cutout_pipeline::{
    batch_output_names, default_output_path, default_resized_path, is_supported_image,
    resize_file, soften_file, DEFAULT_BLUR_SIGMA, DEFAULT_MAX_SIZE, DEFAULT_SATURATION,
};

/// Upload size cap, inherited from the pipeline's web origins.
const MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Parser)]
#[command(
    name = "cutout",
    about = "Pre- and post-process images around an external background removal model",
    version,
    after_help = "The removal model itself is not bundled: `resize` prepares an image for a\n\
                  model run, `soften` turns the model's raw cutout into the final PNG."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Scale an image (or directory of images) to fit the model input bound
    Resize {
        /// Input image file or directory
        input: String,

        /// Output file or directory (default: {name}_resized.{ext})
        #[arg(short, long)]
        output: Option<String>,

        /// Long-side bound in pixels
        #[arg(long, default_value_t = DEFAULT_MAX_SIZE)]
        max_size: u32,
    },
    /// Soften the matte of a cutout (or directory of cutouts) into final PNGs
    Soften {
        /// Input cutout file or directory
        input: String,

        /// Output file or directory (default: {name}_cutout.png)
        #[arg(short, long)]
        output: Option<String>,

        /// Gaussian blur sigma for the cosmetic pass (0 disables)
        #[arg(long, default_value_t = DEFAULT_BLUR_SIGMA)]
        blur: f32,

        /// Saturation boost for the cosmetic pass (1.0 disables)
        #[arg(long, default_value_t = DEFAULT_SATURATION)]
        saturation: f32,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        log::LevelFilter::Error
    } else if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();

    let failures = match &cli.command {
        Command::Resize {
            input,
            output,
            max_size,
        } => {
            if *max_size == 0 {
                eprintln!("Error: --max-size must be at least 1");
                process::exit(1);
            }
            run_stage(
                input,
                output.as_deref(),
                cli.quiet,
                "resize",
                default_resized_path,
                |names| names.to_vec(),
                |in_path, out_path| resize_one(in_path, out_path, *max_size),
            )
        }
        Command::Soften {
            input,
            output,
            blur,
            saturation,
        } => {
            if !(0.0..).contains(blur) {
                eprintln!("Error: --blur must be a non-negative number");
                process::exit(1);
            }
            if !(0.0..).contains(saturation) {
                eprintln!("Error: --saturation must be a non-negative number");
                process::exit(1);
            }
            run_stage(
                input,
                output.as_deref(),
                cli.quiet,
                "soften",
                default_output_path,
                batch_output_names,
                |in_path, out_path| soften_one(in_path, out_path, *blur, *saturation),
            )
        }
    };

    if failures > 0 {
        process::exit(1);
    }
}

/// Dispatch a stage over a single file or every supported image in a
/// directory, returning the failure count.
fn run_stage(
    input: &str,
    output: Option<&str>,
    quiet: bool,
    usage: &str,
    default_single: impl Fn(&Path) -> PathBuf,
    batch_file_names: impl Fn(&[String]) -> Vec<String>,
    process_one: impl Fn(&Path, &Path) -> Result<String, String>,
) -> u32 {
    let input_path = Path::new(input);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {input}");
        process::exit(1);
    }

    let mut ok_count = 0u32;
    let mut fail_count = 0u32;

    if input_path.is_dir() {
        let Some(output_dir) = output.map(PathBuf::from) else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: cutout {usage} <input_dir> -o <output_dir>");
            process::exit(1);
        };
        if let Err(e) = std::fs::create_dir_all(&output_dir) {
            eprintln!("Error: Failed to create output directory: {e}");
            process::exit(1);
        }

        let mut files: Vec<PathBuf> = match std::fs::read_dir(input_path) {
            Ok(rd) => rd
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_file() && is_supported_image(p))
                .collect(),
            Err(e) => {
                eprintln!("Error: Failed to read directory: {e}");
                process::exit(1);
            }
        };
        files.sort();
        let names: Vec<String> = files.iter().map(|p| display_name(p)).collect();
        let out_names = batch_file_names(&names);

        for ((file, name), out_name) in files.iter().zip(&names).zip(&out_names) {
            let out_path = output_dir.join(out_name);
            match process_one(file, &out_path) {
                Ok(msg) => {
                    ok_count += 1;
                    if !quiet {
                        eprintln!("[OK] {name}: {msg}");
                    }
                }
                Err(msg) => {
                    fail_count += 1;
                    eprintln!("[FAIL] {name}: {msg}");
                }
            }
        }

        if !quiet {
            eprintln!();
            eprint!("[Summary] Processed: {ok_count}");
            if fail_count > 0 {
                eprint!(", Failed: {fail_count}");
            }
            eprintln!(" (Total: {})", files.len());
        }
    } else {
        let out_path = output.map_or_else(|| default_single(input_path), PathBuf::from);
        let name = display_name(input_path);
        match process_one(input_path, &out_path) {
            Ok(msg) => {
                if !quiet {
                    eprintln!("[OK] {name}: {msg}");
                }
            }
            Err(msg) => {
                fail_count += 1;
                eprintln!("[FAIL] {name}: {msg}");
            }
        }
    }

    fail_count
}

fn resize_one(input: &Path, output: &Path, max_size: u32) -> Result<String, String> {
    let size = std::fs::metadata(input)
        .map_err(|e| format!("Failed to read metadata: {e}"))?
        .len();
    if size > MAX_INPUT_BYTES {
        return Err(format!(
            "Image too large ({} MiB, limit {} MiB)",
            size.div_ceil(1024 * 1024),
            MAX_INPUT_BYTES / (1024 * 1024)
        ));
    }

    let resized = resize_file(input, output, max_size).map_err(|e| e.to_string())?;
    Ok(format!(
        "{}x{} -> {}",
        resized.width,
        resized.height,
        output.display()
    ))
}

fn soften_one(input: &Path, output: &Path, blur: f32, saturation: f32) -> Result<String, String> {
    let final_image = soften_file(input, output, blur, saturation).map_err(|e| e.to_string())?;
    Ok(format!(
        "{}x{} -> {}",
        final_image.width,
        final_image.height,
        output.display()
    ))
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().into_owned(),
    )
}
