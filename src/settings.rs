use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::canvas::{DEFAULT_DIM, MAX_DIM, SharpenThresholds};
use crate::service::Endpoints;

pub const ENV_PREDICT_URL: &str = "DIGITPAD_PREDICT_URL";
pub const ENV_GENERATE_URL: &str = "DIGITPAD_GENERATE_URL";
pub const ENV_GENERATE_MEAN_URL: &str = "DIGITPAD_GENERATE_MEAN_URL";

/// Settings that persist across sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// POST endpoint that classifies a flat sample
    pub predict_url: String,
    /// GET endpoint returning a random sample for `?label=`
    pub generate_url: String,
    /// GET endpoint returning the class mean for `?label=`
    pub generate_mean_url: String,
    /// Side length of the drawing grid
    pub grid_dim: usize,
    /// Brush diameter in canvas units
    pub brush_diameter: f32,
    /// Width of the drawing surface in canvas units
    pub canvas_width: f32,
    /// Pass-through band of the inbound sharpen stage
    pub thresholds: SharpenThresholds,
    /// Whole-request timeout for the digit service
    pub request_timeout_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            predict_url: "http://localhost:8000/predict".to_string(),
            generate_url: "http://localhost:8000/sample".to_string(),
            generate_mean_url: "http://localhost:8000/sample_mean".to_string(),
            grid_dim: DEFAULT_DIM,
            brush_diameter: 20.0,
            canvas_width: 280.0,
            thresholds: SharpenThresholds::default(),
            request_timeout_secs: 30,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/digitpad/digitpad_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\DigitPad\digitpad_settings.cfg
    /// On macOS:   ~/Library/Application Support/DigitPad/digitpad_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("digitpad");
            return Some(config_dir.join("digitpad_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("DigitPad").join("digitpad_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("DigitPad")
                    .join("digitpad_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join("digitpad_settings.cfg")))
        }
    }

    /// Serialize to the `key=value` file format.
    pub fn to_config_string(&self) -> String {
        format!(
            "predict_url={}\n\
             generate_url={}\n\
             generate_mean_url={}\n\
             grid_dim={}\n\
             brush_diameter={}\n\
             canvas_width={}\n\
             sharpen_low={}\n\
             sharpen_high={}\n\
             request_timeout_secs={}\n",
            self.predict_url,
            self.generate_url,
            self.generate_mean_url,
            self.grid_dim,
            self.brush_diameter,
            self.canvas_width,
            self.thresholds.low(),
            self.thresholds.high(),
            self.request_timeout_secs,
        )
    }

    /// Parse the `key=value` file format. Unknown keys and unparsable values
    /// are skipped, leaving the default in place.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        let mut low = s.thresholds.low();
        let mut high = s.thresholds.high();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "predict_url" => s.predict_url = val.to_string(),
                "generate_url" => s.generate_url = val.to_string(),
                "generate_mean_url" => s.generate_mean_url = val.to_string(),
                "grid_dim" => {
                    s.grid_dim = match val.parse::<usize>() {
                        Ok(d) if (1..=MAX_DIM).contains(&d) => d,
                        _ => {
                            log::warn!("settings: grid_dim '{}' outside 1..={}, using {}", val, MAX_DIM, DEFAULT_DIM);
                            DEFAULT_DIM
                        }
                    };
                }
                "brush_diameter" => {
                    s.brush_diameter = val.parse().ok().filter(|d: &f32| d.is_finite() && *d > 0.0).unwrap_or(20.0);
                }
                "canvas_width" => {
                    s.canvas_width = val.parse().ok().filter(|w: &f32| w.is_finite() && *w > 0.0).unwrap_or(280.0);
                }
                "sharpen_low" => low = val.parse().unwrap_or(low),
                "sharpen_high" => high = val.parse().unwrap_or(high),
                "request_timeout_secs" => {
                    s.request_timeout_secs = val.parse().unwrap_or(30);
                }
                _ => log::debug!("settings: ignoring unknown key '{}'", key),
            }
        }

        s.thresholds = match SharpenThresholds::new(low, high) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("settings: {}, using defaults", e);
                SharpenThresholds::default()
            }
        };
        s
    }

    /// Load settings from `path` (returns default if the file is missing).
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }

    /// Load from the platform settings path, then apply environment overrides.
    pub fn load() -> Self {
        let mut s = match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        };
        s.apply_env();
        s
    }

    /// Endpoint URLs from the environment win over the file.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_PREDICT_URL) {
            self.predict_url = url;
        }
        if let Ok(url) = std::env::var(ENV_GENERATE_URL) {
            self.generate_url = url;
        }
        if let Ok(url) = std::env::var(ENV_GENERATE_MEAN_URL) {
            self.generate_mean_url = url;
        }
    }

    /// Write settings to `path`, creating its directory.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            predict: self.predict_url.clone(),
            generate: self.generate_url.clone(),
            generate_mean: self.generate_mean_url.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
