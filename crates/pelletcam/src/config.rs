//! JSON session configuration.

use pelletcam_core::DisplaySize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// How to wait between triggering a capture and fetching the photo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureWait {
    /// Sleep for a fixed wall-clock delay.
    FixedDelay { millis: u64 },
}

impl Default for CaptureWait {
    fn default() -> Self {
        CaptureWait::FixedDelay { millis: 5_000 }
    }
}

impl CaptureWait {
    /// Fixed delay, saturating at `u64::MAX` milliseconds.
    pub fn fixed(delay: Duration) -> Self {
        CaptureWait::FixedDelay {
            millis: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Block until the device is expected to have stored the photo.
    pub fn wait(&self) {
        match *self {
            CaptureWait::FixedDelay { millis } => {
                if millis > 0 {
                    log::debug!("waiting {millis} ms for capture to complete");
                    std::thread::sleep(Duration::from_millis(millis));
                }
            }
        }
    }
}

fn default_host() -> String {
    "192.168.4.1".to_string()
}

fn default_capture_url() -> String {
    "http://192.168.4.1/capture".to_string()
}

fn default_fetch_url() -> String {
    "http://192.168.4.1/saved-photo".to_string()
}

fn default_network_hint() -> String {
    "Wi-Fi network PELLET".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Camera device endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_capture_url")]
    pub capture_url: String,
    #[serde(default = "default_fetch_url")]
    pub fetch_url: String,
    #[serde(default)]
    pub capture_wait: CaptureWait,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Shown to the operator when the device cannot be reached.
    #[serde(default = "default_network_hint")]
    pub network_hint: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            capture_url: default_capture_url(),
            fetch_url: default_fetch_url(),
            capture_wait: CaptureWait::default(),
            request_timeout_secs: default_request_timeout_secs(),
            network_hint: default_network_hint(),
        }
    }
}

fn default_box_size() -> u32 {
    10
}

fn default_swatch_side() -> u32 {
    100
}

fn default_calibration_file() -> String {
    "reference_data.csv".to_string()
}

fn default_results_file() -> String {
    "results.csv".to_string()
}

fn default_reference_tag() -> String {
    "reference".to_string()
}

fn default_image_extension() -> String {
    "jpg".to_string()
}

fn default_pictures_dir() -> PathBuf {
    PathBuf::from("pics")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_max_capture_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

/// Everything a session needs besides the operator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    /// Canvas the reference photo is shown on for calibration clicks.
    #[serde(default)]
    pub display: DisplaySize,
    /// Side of the sampling box in pixels.
    #[serde(default = "default_box_size")]
    pub box_size: u32,
    /// Side of the solid audit swatch in pixels.
    #[serde(default = "default_swatch_side")]
    pub swatch_side: u32,
    /// Calibration table, stored in the output folder.
    #[serde(default = "default_calibration_file")]
    pub calibration_file: String,
    /// Results table, stored in both the output and pictures folders.
    #[serde(default = "default_results_file")]
    pub results_file: String,
    #[serde(default = "default_reference_tag")]
    pub reference_tag: String,
    /// Extension given to captured photos.
    #[serde(default = "default_image_extension")]
    pub image_extension: String,
    #[serde(default = "default_pictures_dir")]
    pub pictures_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Upper bound on capture attempts before the operator must give up.
    #[serde(default = "default_max_capture_attempts")]
    pub max_capture_attempts: u32,
    /// Persist the region crop and color swatch of each sample.
    #[serde(default = "default_true")]
    pub save_artifacts: bool,
    #[serde(default = "default_true")]
    pub check_reachability: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            display: DisplaySize::default(),
            box_size: default_box_size(),
            swatch_side: default_swatch_side(),
            calibration_file: default_calibration_file(),
            results_file: default_results_file(),
            reference_tag: default_reference_tag(),
            image_extension: default_image_extension(),
            pictures_dir: default_pictures_dir(),
            output_dir: default_output_dir(),
            max_capture_attempts: default_max_capture_attempts(),
            save_artifacts: true,
            check_reachability: true,
        }
    }
}

impl SessionConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// File name of the photo for `tag`.
    pub fn photo_name(&self, tag: &str) -> String {
        format!("{tag}.{}", self.image_extension)
    }
}
