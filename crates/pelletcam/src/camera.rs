//! Photo acquisition from the camera device.

use std::path::Path;

#[cfg(feature = "http")]
use crate::config::{CaptureWait, DeviceConfig};
#[cfg(feature = "http")]
use std::{fs, io::Read, time::Duration};

#[derive(thiserror::Error, Debug)]
pub enum CameraError {
    #[error("request to {url} failed: {reason}")]
    Http { url: String, reason: String },
    #[error("{url} returned an empty photo")]
    EmptyBody { url: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Something that can take a photo and store it at a given path.
pub trait Camera {
    /// Take one photo and write it verbatim to `target`.
    fn capture(&mut self, target: &Path) -> Result<(), CameraError>;
}

impl<C: Camera + ?Sized> Camera for &mut C {
    fn capture(&mut self, target: &Path) -> Result<(), CameraError> {
        (**self).capture(target)
    }
}

/// Camera driven over two HTTP endpoints: one triggers a capture, the other
/// returns the last stored photo.
#[cfg(feature = "http")]
pub struct HttpCamera {
    agent: ureq::Agent,
    capture_url: String,
    fetch_url: String,
    wait: CaptureWait,
}

#[cfg(feature = "http")]
impl HttpCamera {
    pub fn new(device: &DeviceConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(device.request_timeout_secs))
            .build();
        Self {
            agent,
            capture_url: device.capture_url.clone(),
            fetch_url: device.fetch_url.clone(),
            wait: device.capture_wait,
        }
    }

    fn get(&self, url: &str) -> Result<ureq::Response, CameraError> {
        self.agent.get(url).call().map_err(|e| CameraError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(feature = "http")]
impl Camera for HttpCamera {
    fn capture(&mut self, target: &Path) -> Result<(), CameraError> {
        log::info!("triggering capture via {}", self.capture_url);
        self.get(&self.capture_url)?;
        self.wait.wait();

        let resp = self.get(&self.fetch_url)?;
        let mut body = Vec::new();
        resp.into_reader().read_to_end(&mut body)?;
        if body.is_empty() {
            return Err(CameraError::EmptyBody {
                url: self.fetch_url.clone(),
            });
        }
        fs::write(target, &body)?;
        log::info!("stored {} bytes at {}", body.len(), target.display());
        Ok(())
    }
}
