// ============================================================================
// pixelforge CLI — headless project export via command-line arguments
// ============================================================================
//
// Usage examples:
//   pixelforge --input walker.pforge --output walker.gif
//   pixelforge -i walker.pforge -o frame.png --frame 2 --scale 8
//   pixelforge -i a.pforge b.pforge --output-dir out/ --format gif
//   pixelforge -i walker.pforge --format sheet --output walker-sheet.png
//
// No editor session is started. All compositing and encoding runs
// synchronously on the current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::compositor;
use crate::project::Project;
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// pixelforge headless exporter.
///
/// Turn .pforge sprite projects into animated GIFs, PNG frames or sprite
/// sheets — no editor required.
#[derive(Parser, Debug)]
#[command(
    name = "pixelforge",
    about = "pixelforge headless sprite/animation exporter",
    long_about = "Export .pforge project files without opening the editor.\n\
                  Supported outputs: animated GIF, a single composited PNG\n\
                  frame, or a PNG sprite sheet.\n\n\
                  Example:\n  \
                  pixelforge --input walker.pforge --output walker.gif\n  \
                  pixelforge -i a.pforge b.pforge --output-dir out/ --format sheet"
)]
pub struct CliArgs {
    /// Input .pforge project file(s).
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<PathBuf>,

    /// Output file path. Only valid for single-file input.
    /// For batch input use --output-dir instead.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch export.
    /// Files are written here with the project file's stem and the target
    /// format's extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: gif, png, sheet.
    /// When omitted, inferred from --output's extension, defaulting to gif.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Playback rate override for GIF export (frames per second).
    /// Defaults to the rate stored in the project.
    #[arg(long, value_name = "FPS")]
    pub fps: Option<u32>,

    /// Integer upscale factor for PNG and sheet output (nearest-neighbor).
    #[arg(long, default_value_t = 1, value_name = "N")]
    pub scale: u32,

    /// Frame index for single-frame PNG export.
    /// Defaults to the project's current frame.
    #[arg(long, value_name = "INDEX")]
    pub frame: Option<usize>,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExportFormat {
    Gif,
    Png,
    Sheet,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            ExportFormat::Gif => "gif",
            ExportFormat::Png | ExportFormat::Sheet => "png",
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    if args.input.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch export.",
            args.input.len()
        );
        return ExitCode::FAILURE;
    }
    if args.scale == 0 {
        eprintln!("error: --scale must be at least 1.");
        return ExitCode::FAILURE;
    }

    let format = parse_format(args.format.as_deref(), args.output.as_deref());

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let total = args.input.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in args.input.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let output_path = match build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            format,
        ) {
            Some(p) => p,
            None => {
                eprintln!(
                    "  error: cannot determine output path for '{}'.",
                    input_path.display()
                );
                any_failure = true;
                continue;
            }
        };

        match run_one(input_path, &output_path, format, &args) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                log_err!("export of {} failed: {}", input_path.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// ============================================================================
// Per-file export pipeline
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    format: ExportFormat,
    args: &CliArgs,
) -> Result<(), String> {
    let project = Project::open(input).map_err(|e| format!("load failed: {}", e))?;
    let canvas = &project.canvas;

    match format {
        ExportFormat::Gif => {
            let bytes = project.export_gif(args.fps);
            std::fs::write(output, &bytes).map_err(|e| format!("write failed: {}", e))?;
            log_info!(
                "Exported GIF {} ({} frames, {} bytes)",
                output.display(),
                canvas.frame_count(),
                bytes.len()
            );
        }
        ExportFormat::Png => {
            let frame_idx = args.frame.unwrap_or(canvas.current_frame_index);
            if frame_idx >= canvas.frame_count() {
                return Err(format!(
                    "frame index {} out of range (project has {} frames)",
                    frame_idx,
                    canvas.frame_count()
                ));
            }
            let img = upscale(compositor::composite_frame(canvas, frame_idx), args.scale);
            img.save(output).map_err(|e| format!("save failed: {}", e))?;
            log_info!("Exported frame {} to {}", frame_idx, output.display());
        }
        ExportFormat::Sheet => {
            let img = upscale(compositor::composite_sprite_sheet(canvas), args.scale);
            img.save(output).map_err(|e| format!("save failed: {}", e))?;
            log_info!(
                "Exported sprite sheet ({} frames) to {}",
                canvas.frame_count(),
                output.display()
            );
        }
    }
    Ok(())
}

fn upscale(img: image::RgbaImage, scale: u32) -> image::RgbaImage {
    if scale <= 1 {
        return img;
    }
    image::imageops::resize(
        &img,
        img.width() * scale,
        img.height() * scale,
        image::imageops::FilterType::Nearest,
    )
}

// ============================================================================
// Helpers
// ============================================================================

/// Choose the export format from the `--format` string or infer it from the
/// output file extension. Defaults to GIF when neither is known.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> ExportFormat {
    if let Some(f) = format_arg {
        return match f.to_lowercase().as_str() {
            "png" => ExportFormat::Png,
            "sheet" => ExportFormat::Sheet,
            _ => ExportFormat::Gif,
        };
    }

    if let Some(out) = output {
        return match out
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase()
            .as_str()
        {
            "png" => ExportFormat::Png,
            _ => ExportFormat::Gif,
        };
    }

    ExportFormat::Gif
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, new extension
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: ExportFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let name = if format == ExportFormat::Sheet {
        format!("{}-sheet.{}", stem, ext)
    } else {
        format!("{}.{}", stem, ext)
    };

    if let Some(dir) = output_dir {
        return Some(dir.join(name));
    }
    Some(input.parent().unwrap_or(Path::new(".")).join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_inference() {
        assert_eq!(parse_format(Some("sheet"), None), ExportFormat::Sheet);
        assert_eq!(parse_format(Some("PNG"), None), ExportFormat::Png);
        assert_eq!(
            parse_format(None, Some(Path::new("out/anim.gif"))),
            ExportFormat::Gif
        );
        assert_eq!(
            parse_format(None, Some(Path::new("frame.png"))),
            ExportFormat::Png
        );
        assert_eq!(parse_format(None, None), ExportFormat::Gif);
    }

    #[test]
    fn output_path_fallbacks() {
        let input = Path::new("work/walker.pforge");
        assert_eq!(
            build_output_path(input, None, None, ExportFormat::Gif).unwrap(),
            Path::new("work/walker.gif")
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out")), ExportFormat::Sheet).unwrap(),
            Path::new("out/walker-sheet.png")
        );
        assert_eq!(
            build_output_path(input, Some(Path::new("x.gif")), None, ExportFormat::Gif).unwrap(),
            Path::new("x.gif")
        );
    }
}
