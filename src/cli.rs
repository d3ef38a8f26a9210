// ============================================================================
// DigitPad CLI — headless front end for the drawing pad
// ============================================================================
//
// Usage examples:
//   digitpad draw --strokes seven.json --output seven.png --predict
//   digitpad predict -i drawing.png
//   digitpad predict -i "scans/*.png"
//   digitpad generate --label 3 --ascii
//   digitpad generate --label 3 --mean --output three.png
//   digitpad payload -i drawing.png
//   digitpad config --save --sharpen-low 90
//
// Everything runs synchronously on the current thread; requests to the digit
// service block until they resolve or time out.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::canvas::{CanvasState, SharpenThresholds};
use crate::io::{MAX_UPSCALE, load_grid, render_ascii, save_png};
use crate::ops::brush::{StrokePoint, draw_path};
use crate::ops::pipeline::{pixels_to_payload, request_generated, request_prediction};
use crate::service::{DigitService, GenerateMode, HttpDigitService};
use crate::settings::AppSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// DigitPad headless digit pad.
#[derive(Parser, Debug)]
#[command(
    name = "digitpad",
    about = "Draw digits, ask a model what they are, and view generated digits",
    long_about = "Replays brush strokes or imports PNG drawings onto a 28x28 grid, sends\n\
                  the grid to a digit prediction service, and fetches generated digits\n\
                  back for display as PNG or ASCII.\n\n\
                  Example:\n  \
                  digitpad draw --strokes seven.json --predict --ascii\n  \
                  digitpad generate --label 3 --output three.png"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Settings file to use instead of the per-user one.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Prediction endpoint (overrides settings and environment).
    #[arg(long, global = true, value_name = "URL")]
    pub predict_url: Option<String>,

    /// Sample generation endpoint (overrides settings and environment).
    #[arg(long, global = true, value_name = "URL")]
    pub generate_url: Option<String>,

    /// Class-mean generation endpoint (overrides settings and environment).
    #[arg(long, global = true, value_name = "URL")]
    pub generate_mean_url: Option<String>,

    /// Lower sharpen threshold: generated cells below it turn black.
    #[arg(long, global = true, value_name = "0-255")]
    pub sharpen_low: Option<u8>,

    /// Upper sharpen threshold: generated cells above it turn white.
    #[arg(long, global = true, value_name = "0-255")]
    pub sharpen_high: Option<u8>,

    /// Echo the session log to stderr and print timing information.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a JSON stroke file (`[{"x": .., "y": ..}, ...]`) onto a blank grid.
    Draw {
        #[arg(short, long, value_name = "FILE.json")]
        strokes: PathBuf,
        /// Brush diameter in canvas units.
        #[arg(long)]
        diameter: Option<f32>,
        /// Canvas width in canvas units.
        #[arg(long)]
        canvas_width: Option<f32>,
        /// Write the resulting grid as PNG.
        #[arg(short, long, value_name = "FILE.png")]
        output: Option<PathBuf>,
        /// Print the resulting grid as ASCII art.
        #[arg(long)]
        ascii: bool,
        /// Send the resulting grid to the prediction service.
        #[arg(long)]
        predict: bool,
    },
    /// Predict the digit shown in one or more PNG drawings.
    /// Glob patterns accepted (e.g. "scans/*.png").
    Predict {
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<String>,
    },
    /// Fetch a generated digit and display it.
    Generate {
        /// Digit to generate (0-9).
        #[arg(short, long, allow_negative_numbers = true)]
        label: i64,
        /// Use the class mean instead of a random sample.
        #[arg(long)]
        mean: bool,
        /// Write the grid as PNG.
        #[arg(short, long, value_name = "FILE.png")]
        output: Option<PathBuf>,
        /// Print the grid as ASCII art (default when --output is absent).
        #[arg(long)]
        ascii: bool,
        /// Pixels per cell in the PNG (1-64).
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=MAX_UPSCALE as i64))]
        upscale: u32,
    },
    /// Print the JSON payload a drawing would be sent as.
    Payload {
        #[arg(short, long, value_name = "FILE.png")]
        input: PathBuf,
    },
    /// Print the effective settings.
    Config {
        /// Also write them to the settings file.
        #[arg(long)]
        save: bool,
    },
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI against the HTTP digit service and return an OS exit code.
/// `0` = everything succeeded, `1` = something failed.
pub fn run(args: CliArgs) -> ExitCode {
    let settings = match resolve_settings(&args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let service = HttpDigitService::new(settings.endpoints(), settings.request_timeout());
    run_with(&args, &settings, &service)
}

/// Run the CLI against any [`DigitService`].
pub fn run_with(args: &CliArgs, settings: &AppSettings, service: &dyn DigitService) -> ExitCode {
    let start = Instant::now();
    let result = match &args.command {
        Command::Draw {
            strokes,
            diameter,
            canvas_width,
            output,
            ascii,
            predict,
        } => run_draw(
            settings,
            service,
            strokes,
            diameter.unwrap_or(settings.brush_diameter),
            canvas_width.unwrap_or(settings.canvas_width),
            output.as_deref(),
            *ascii,
            *predict,
        ),
        Command::Predict { input } => run_predict(settings, service, input),
        Command::Generate {
            label,
            mean,
            output,
            ascii,
            upscale,
        } => run_generate(settings, service, *label, *mean, output.as_deref(), *ascii, *upscale),
        Command::Payload { input } => run_payload(settings, input),
        Command::Config { save } => run_config(args, settings, *save),
    };

    // stdout carries command output only (payload JSON, ASCII art).
    if args.verbose {
        eprintln!("  ({:.0}ms)", start.elapsed().as_secs_f64() * 1000.0);
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Settings file (explicit or per-user), then environment, then flags.
pub fn resolve_settings(args: &CliArgs) -> Result<AppSettings, String> {
    let mut settings = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(format!("settings file '{}' does not exist", path.display()));
            }
            let mut s = AppSettings::load_from(path);
            s.apply_env();
            s
        }
        None => AppSettings::load(),
    };

    if let Some(url) = &args.predict_url {
        settings.predict_url = url.clone();
    }
    if let Some(url) = &args.generate_url {
        settings.generate_url = url.clone();
    }
    if let Some(url) = &args.generate_mean_url {
        settings.generate_mean_url = url.clone();
    }
    if args.sharpen_low.is_some() || args.sharpen_high.is_some() {
        let low = args.sharpen_low.unwrap_or(settings.thresholds.low());
        let high = args.sharpen_high.unwrap_or(settings.thresholds.high());
        settings.thresholds = SharpenThresholds::new(low, high).map_err(|e| e.to_string())?;
    }
    Ok(settings)
}

// ============================================================================
// Subcommands
// ============================================================================

fn new_session(settings: &AppSettings) -> Result<CanvasState, String> {
    CanvasState::new(settings.grid_dim, settings.thresholds).map_err(|e| e.to_string())
}

fn run_draw(
    settings:     &AppSettings,
    service:      &dyn DigitService,
    strokes:      &Path,
    diameter:     f32,
    canvas_width: f32,
    output:       Option<&Path>,
    ascii:        bool,
    predict:      bool,
) -> Result<(), String> {
    let src = std::fs::read_to_string(strokes)
        .map_err(|e| format!("could not read strokes '{}': {}", strokes.display(), e))?;
    let points: Vec<StrokePoint> = serde_json::from_str(&src)
        .map_err(|e| format!("invalid stroke file '{}': {}", strokes.display(), e))?;

    let mut state = new_session(settings)?;
    draw_path(state.pixels_mut(), &points, diameter, canvas_width);

    show(&state, output, ascii, 1)?;
    if predict {
        let digit = request_prediction(&mut state, service).map_err(|e| e.to_string())?;
        println!("prediction: {}", digit);
    }
    Ok(())
}

fn run_predict(settings: &AppSettings, service: &dyn DigitService, patterns: &[String]) -> Result<(), String> {
    let inputs = resolve_inputs(patterns);
    if inputs.is_empty() {
        return Err("no input files matched the given pattern(s).".to_string());
    }

    let mut state = new_session(settings)?;
    let mut failures = 0usize;
    for path in &inputs {
        match predict_one(&mut state, service, path) {
            Ok(digit) => println!("{}: {}", path.display(), digit),
            Err(e) => {
                eprintln!("{}: error: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        Err(format!("{} of {} input(s) failed", failures, inputs.len()))
    } else {
        Ok(())
    }
}

fn predict_one(state: &mut CanvasState, service: &dyn DigitService, path: &Path) -> Result<u8, String> {
    let grid = load_grid(path, state.dim()).map_err(|e| format!("load failed: {}", e))?;
    state.replace_pixels(grid).map_err(|e| e.to_string())?;
    request_prediction(state, service).map_err(|e| e.to_string())
}

fn run_generate(
    settings: &AppSettings,
    service:  &dyn DigitService,
    label:    i64,
    mean:     bool,
    output:   Option<&Path>,
    ascii:    bool,
    upscale:  u32,
) -> Result<(), String> {
    let mode = if mean { GenerateMode::Mean } else { GenerateMode::Sample };
    let mut state = new_session(settings)?;
    request_generated(&mut state, service, label, mode).map_err(|e| e.to_string())?;
    show(&state, output, ascii || output.is_none(), upscale)
}

fn run_payload(settings: &AppSettings, input: &Path) -> Result<(), String> {
    let mut state = new_session(settings)?;
    let grid = load_grid(input, state.dim()).map_err(|e| format!("load failed: {}", e))?;
    state.replace_pixels(grid).map_err(|e| e.to_string())?;
    let payload = pixels_to_payload(&state).map_err(|e| e.to_string())?;
    println!("{}", payload);
    Ok(())
}

fn run_config(args: &CliArgs, settings: &AppSettings, save: bool) -> Result<(), String> {
    print!("{}", settings.to_config_string());
    if save {
        let path = args
            .config
            .clone()
            .or_else(AppSettings::settings_path)
            .ok_or_else(|| "no settings path on this platform".to_string())?;
        settings
            .save_to(&path)
            .map_err(|e| format!("could not write '{}': {}", path.display(), e))?;
        println!("saved to {}", path.display());
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn show(state: &CanvasState, output: Option<&Path>, ascii: bool, upscale: u32) -> Result<(), String> {
    if let Some(path) = output {
        save_png(state.pixels(), path, upscale).map_err(|e| format!("save failed: {}", e))?;
    }
    if ascii {
        print!("{}", render_ascii(state.pixels()));
    }
    Ok(())
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}
