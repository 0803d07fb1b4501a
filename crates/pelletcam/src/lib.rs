//! Camera-driven pellet color measurement.
//!
//! A session photographs a reference pellet, lets the operator click the
//! pellet on a display-scaled view, turns the accumulated clicks into a
//! sampling point, and then samples every tagged capture at that point,
//! recording the median color next to the reference color.
//!
//! ## Quickstart
//!
//! ```no_run
//! use pelletcam::{HttpCamera, PingProbe, SessionConfig, SessionController, TerminalOperator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::default();
//! let camera = HttpCamera::new(&config.device);
//! let mut session =
//!     SessionController::new(config, TerminalOperator::stdio(), camera, PingProbe::default());
//! let summary = session.run()?;
//! println!("{} capture(s) recorded", summary.captures.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `pelletcam::core`: coordinate mapping, region sampling, calibration aggregation.
//! - `pelletcam::dataset`: calibration and results tables.
//! - `pelletcam::session`: the session state machine.
//! - `pelletcam::camera` / `pelletcam::network`: device collaborators.

pub use pelletcam_core as core;
pub use pelletcam_dataset as dataset;

pub mod camera;
pub mod config;
pub mod network;
pub mod operator;
pub mod session;

#[cfg(feature = "http")]
pub use camera::HttpCamera;
pub use camera::{Camera, CameraError};
pub use config::{CaptureWait, ConfigError, DeviceConfig, SessionConfig};
pub use network::{NetworkError, PingProbe, Reachability};
pub use operator::{Notice, Operator, Prompt, TerminalOperator};
pub use session::{
    CapturedPhoto, SessionController, SessionError, SessionOutcome, SessionPaths, SessionState,
    SessionSummary,
};

pub use pelletcam_core::{
    DisplayClick, DisplaySize, ImageCoordinate, MedianColor, SamplingModel,
};
pub use pelletcam_dataset::CaptureRecord;
