use std::cell::RefCell;
use std::process::ExitCode;

use clap::Parser;
use digitpad::cli::{CliArgs, run_with};
use digitpad::io::{load_grid, save_png};
use digitpad::{AppSettings, DigitService, GenerateMode, PixelGrid, ServiceError};

struct MockService {
    prediction: Result<u8, ServiceError>,
    generated: Vec<f32>,
    calls: RefCell<usize>,
}

impl DigitService for MockService {
    fn predict(&self, _payload: &str) -> Result<u8, ServiceError> {
        *self.calls.borrow_mut() += 1;
        self.prediction.clone()
    }

    fn generate(&self, _label: u8, _mode: GenerateMode) -> Result<Vec<f32>, ServiceError> {
        *self.calls.borrow_mut() += 1;
        Ok(self.generated.clone())
    }
}

fn service(prediction: Result<u8, ServiceError>) -> MockService {
    MockService {
        prediction,
        generated: vec![255.0; 784],
        calls: RefCell::new(0),
    }
}

fn run(argv: &[&str], service: &MockService) -> ExitCode {
    let args = CliArgs::try_parse_from(argv).unwrap();
    run_with(&args, &AppSettings::default(), service)
}

#[test_log::test]
fn draw_replays_strokes_and_predicts() {
    let dir = tempfile::tempdir().unwrap();
    let strokes = dir.path().join("one.json");
    std::fs::write(&strokes, r#"[{"x": 140, "y": 40}, {"x": 140, "y": 140}, {"x": 140, "y": 240}]"#).unwrap();
    let png = dir.path().join("one.png");

    let mock = service(Ok(1));
    let code = run(
        &[
            "digitpad", "draw", "--strokes", strokes.to_str().unwrap(), "--output", png.to_str().unwrap(), "--predict",
        ],
        &mock,
    );
    assert_eq!(code, ExitCode::SUCCESS);
    assert_eq!(*mock.calls.borrow(), 1);

    let grid = load_grid(&png, 28).unwrap();
    assert_eq!(grid.get(14, 14), 235);
    assert_eq!(grid.get(0, 0), 255);
}

#[test_log::test]
fn draw_with_bad_stroke_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let strokes = dir.path().join("broken.json");
    std::fs::write(&strokes, "{not json").unwrap();
    let mock = service(Ok(1));
    assert_eq!(run(&["digitpad", "draw", "--strokes", strokes.to_str().unwrap()], &mock), ExitCode::FAILURE);
    assert_eq!(*mock.calls.borrow(), 0);
}

#[test_log::test]
fn predict_reports_failure_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("blank.png");
    save_png(&PixelGrid::blank(28).unwrap(), &png, 1).unwrap();

    let ok = service(Ok(8));
    assert_eq!(run(&["digitpad", "predict", "-i", png.to_str().unwrap()], &ok), ExitCode::SUCCESS);

    let failing = service(Err(ServiceError::Remote("model offline".into())));
    assert_eq!(run(&["digitpad", "predict", "-i", png.to_str().unwrap()], &failing), ExitCode::FAILURE);

    let missing = dir.path().join("nothing-*.png");
    assert_eq!(run(&["digitpad", "predict", "-i", missing.to_str().unwrap()], &ok), ExitCode::FAILURE);
}

#[test_log::test]
fn generate_writes_png() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("gen.png");
    let mock = service(Ok(0));
    let code = run(
        &["digitpad", "generate", "--label", "5", "--output", png.to_str().unwrap(), "--upscale", "1"],
        &mock,
    );
    assert_eq!(code, ExitCode::SUCCESS);
    // 255 in → inverted to 0 → below the low threshold → black.
    let grid = load_grid(&png, 28).unwrap();
    assert!(grid.as_slice().iter().all(|&v| v == 0));
}

#[test_log::test]
fn generate_rejects_out_of_range_label() {
    let mock = service(Ok(0));
    assert_eq!(run(&["digitpad", "generate", "--label", "12"], &mock), ExitCode::FAILURE);
    assert_eq!(*mock.calls.borrow(), 0);
}

#[test]
fn verbose_payload_keeps_stdout_parseable() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("blank.png");
    save_png(&PixelGrid::blank(28).unwrap(), &png, 1).unwrap();
    let cfg = dir.path().join("digitpad_settings.cfg");
    AppSettings::default().save_to(&cfg).unwrap();

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_DigitPad"))
        .args(["payload", "-i", png.to_str().unwrap(), "--config", cfg.to_str().unwrap(), "-v"])
        .env("XDG_DATA_HOME", dir.path())
        .env("HOME", dir.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let flat: Vec<u8> = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(flat, vec![0u8; 784]);
    assert!(String::from_utf8_lossy(&output.stderr).contains("ms)"));
}

#[test]
fn oversized_grid_dim_in_settings_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("digitpad_settings.cfg");
    std::fs::write(&cfg, "grid_dim=5000000000\n").unwrap();
    assert_eq!(AppSettings::load_from(&cfg).grid_dim, 28);

    let mock = service(Ok(0));
    let mut settings = AppSettings::default();
    settings.grid_dim = 5_000_000_000;
    let args = CliArgs::try_parse_from(["digitpad", "generate", "--label", "3"]).unwrap();
    assert_eq!(run_with(&args, &settings, &mock), ExitCode::FAILURE);
    assert_eq!(*mock.calls.borrow(), 0);
}
