//! The end-to-end measurement session.
//!
//! A session walks through a fixed sequence of states:
//!
//! ```text
//! AwaitingFolders -> AwaitingReferenceConfirm -> CapturingReference -> Calibrating
//!   -> TrainingModel -> AwaitingTag -> CapturingTagged -> Sampling -> Recording
//!   -> AwaitingTag | SessionEnded
//! ```
//!
//! The sampling model is trained exactly once, right after the reference
//! observation is stored, and stays fixed until the session ends. The
//! reference color is sampled from the reference photo at the clicked point.
//!
//! Acquiring a photo means capturing it, decoding it and, for tagged captures,
//! sampling it at the model point. A failure anywhere in that chain is one
//! failed attempt; the operator may retry up to `max_capture_attempts`.

use crate::camera::{Camera, CameraError};
use crate::config::SessionConfig;
use crate::network::{NetworkError, Reachability};
use crate::operator::{Notice, Operator, Prompt};
use image::{ImageReader, RgbImage};
use pelletcam_core::{
    aggregate, map_click, sample, solid_swatch, CalibrationError, CalibrationObservation,
    ImageCoordinate, MedianColor, RegionSample, SampleError, SamplingModel,
};
use pelletcam_dataset::{append, read_calibration, CaptureRecord, DatasetError, ResultsSink};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("capture aborted after {attempts} attempt(s): {source}")]
    CaptureAborted {
        attempts: u32,
        #[source]
        source: Box<SessionError>,
    },
    #[error("cannot read photo {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A stored and decoded photo; tagged captures also carry their sample.
#[derive(Clone, PartialEq)]
pub struct CapturedPhoto {
    pub path: PathBuf,
    pub image: RgbImage,
    pub sampled: Option<RegionSample>,
}

impl fmt::Debug for CapturedPhoto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedPhoto")
            .field("path", &self.path)
            .field("dimensions", &self.image.dimensions())
            .field("sampled", &self.sampled)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    AwaitingFolders,
    AwaitingReferenceConfirm,
    CapturingReference,
    Calibrating(CapturedPhoto),
    TrainingModel,
    AwaitingTag,
    CapturingTagged { tag: String },
    Sampling { tag: String, photo: CapturedPhoto },
    Recording(CaptureRecord),
    SessionEnded,
    /// The operator cancelled before the tag loop started.
    Aborted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::SessionEnded | SessionState::Aborted)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::AwaitingFolders => "awaiting-folders",
            SessionState::AwaitingReferenceConfirm => "awaiting-reference-confirm",
            SessionState::CapturingReference => "capturing-reference",
            SessionState::Calibrating(_) => "calibrating",
            SessionState::TrainingModel => "training-model",
            SessionState::AwaitingTag => "awaiting-tag",
            SessionState::CapturingTagged { .. } => "capturing-tagged",
            SessionState::Sampling { .. } => "sampling",
            SessionState::Recording(_) => "recording",
            SessionState::SessionEnded => "session-ended",
            SessionState::Aborted => "aborted",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Aborted,
}

/// What a finished session produced.
#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub outcome: SessionOutcome,
    pub model: Option<SamplingModel>,
    pub reference: Option<MedianColor>,
    pub captures: Vec<CaptureRecord>,
}

/// Folders chosen for this run and the tables derived from them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionPaths {
    pub pictures: PathBuf,
    pub output: PathBuf,
    pub calibration_table: PathBuf,
    pub results: ResultsPaths,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultsPaths {
    pub master: PathBuf,
    pub session: PathBuf,
}

impl SessionPaths {
    pub fn new(config: &SessionConfig, pictures: PathBuf, output: PathBuf) -> Self {
        Self {
            calibration_table: output.join(&config.calibration_file),
            results: ResultsPaths {
                master: output.join(&config.results_file),
                session: pictures.join(&config.results_file),
            },
            pictures,
            output,
        }
    }
}

/// Tags become file names and table fields.
fn validate_tag(tag: &str) -> Result<(), &'static str> {
    if tag.trim().is_empty() {
        return Err("tag is empty");
    }
    if tag.contains([',', '\n', '\r']) {
        return Err("tag must not contain commas or line breaks");
    }
    if tag.contains(['/', '\\']) || tag == "." || tag == ".." {
        return Err("tag must be a plain file name");
    }
    Ok(())
}

fn load_rgb(path: &Path) -> Result<RgbImage, SessionError> {
    let wrap = |source: image::ImageError| SessionError::Image {
        path: path.to_path_buf(),
        source,
    };
    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(wrap)?;
    Ok(img.to_rgb8())
}

/// Drives one session from folder selection to the end of the tag loop.
pub struct SessionController<O, C, P> {
    config: SessionConfig,
    operator: O,
    camera: C,
    probe: P,
    state: SessionState,
    paths: Option<SessionPaths>,
    model: Option<SamplingModel>,
    reference: Option<MedianColor>,
    captures: Vec<CaptureRecord>,
}

impl<O: Operator, C: Camera, P: Reachability> SessionController<O, C, P> {
    pub fn new(config: SessionConfig, operator: O, camera: C, probe: P) -> Self {
        Self {
            config,
            operator,
            camera,
            probe,
            state: SessionState::AwaitingFolders,
            paths: None,
            model: None,
            reference: None,
            captures: Vec::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn paths(&self) -> Option<&SessionPaths> {
        self.paths.as_ref()
    }

    /// Check the device, then run the state machine until it terminates.
    pub fn run(&mut self) -> Result<SessionSummary, SessionError> {
        if self.config.check_reachability {
            let host = self.config.device.host.clone();
            if let Err(e) = self.probe.probe(&host) {
                log::error!("{e}");
                self.operator.notify(Notice::DeviceUnreachable {
                    host,
                    hint: self.config.device.network_hint.clone(),
                });
                return Err(e.into());
            }
        }

        // A step that fails leaves the controller in `Aborted`.
        while !self.state.is_terminal() {
            let current = std::mem::replace(&mut self.state, SessionState::Aborted);
            let from = current.name();
            let next = self.step(current)?;
            log::debug!("session state: {from} -> {}", next.name());
            self.state = next;
        }

        let outcome = match self.state {
            SessionState::Aborted => {
                log::info!("session aborted");
                SessionOutcome::Aborted
            }
            _ => {
                self.operator.notify(Notice::SessionEnded {
                    captures: self.captures.len(),
                });
                SessionOutcome::Completed
            }
        };
        Ok(SessionSummary {
            outcome,
            model: self.model,
            reference: self.reference,
            captures: self.captures.clone(),
        })
    }

    fn step(&mut self, state: SessionState) -> Result<SessionState, SessionError> {
        match state {
            SessionState::AwaitingFolders => self.choose_folders(),
            SessionState::AwaitingReferenceConfirm => {
                Ok(if self.operator.confirm(Prompt::ReferencePellet) {
                    SessionState::CapturingReference
                } else {
                    SessionState::Aborted
                })
            }
            SessionState::CapturingReference => {
                let tag = self.config.reference_tag.clone();
                let photo = self.acquire(&tag, None)?;
                Ok(SessionState::Calibrating(photo))
            }
            SessionState::Calibrating(photo) => self.calibrate(photo),
            SessionState::TrainingModel => {
                self.train()?;
                Ok(SessionState::AwaitingTag)
            }
            SessionState::AwaitingTag => Ok(self.next_tag()),
            SessionState::CapturingTagged { tag } => {
                let center = self.require_model()?.center;
                match self.acquire(&tag, Some(center)) {
                    Ok(photo) => Ok(SessionState::Sampling { tag, photo }),
                    Err(SessionError::CaptureAborted { attempts, source }) => {
                        log::warn!("skipping {tag} after {attempts} attempt(s): {source}");
                        self.operator.notify(Notice::CaptureSkipped { tag });
                        Ok(SessionState::AwaitingTag)
                    }
                    Err(e) => Err(e),
                }
            }
            SessionState::Sampling { tag, photo } => self.record_tagged(tag, photo),
            SessionState::Recording(record) => {
                self.results_sink()?.append(&record)?;
                log::info!("recorded {} -> {}", record.tag, record.color);
                self.operator.notify(Notice::Recorded(record.clone()));
                self.captures.push(record);
                Ok(SessionState::AwaitingTag)
            }
            SessionState::SessionEnded | SessionState::Aborted => Ok(state),
        }
    }

    fn choose_folders(&mut self) -> Result<SessionState, SessionError> {
        if !self.operator.confirm(Prompt::PicturesFolder) {
            return Ok(SessionState::Aborted);
        }
        let pictures = self
            .operator
            .choose_folder(Prompt::PicturesFolder, &self.config.pictures_dir)
            .unwrap_or_else(|| self.config.pictures_dir.clone());

        if !self.operator.confirm(Prompt::OutputFolder) {
            return Ok(SessionState::Aborted);
        }
        let output = self
            .operator
            .choose_folder(Prompt::OutputFolder, &self.config.output_dir)
            .unwrap_or_else(|| self.config.output_dir.clone());

        fs::create_dir_all(&pictures)?;
        fs::create_dir_all(&output)?;
        let paths = SessionPaths::new(&self.config, pictures, output);
        log::info!(
            "pictures in {}, results in {}",
            paths.pictures.display(),
            paths.output.display()
        );

        let session_table = &paths.results.session;
        if session_table.is_file() && self.operator.confirm_delete(session_table) {
            fs::remove_file(session_table)?;
            log::info!("deleted {}", session_table.display());
        }

        self.paths = Some(paths);
        Ok(SessionState::AwaitingReferenceConfirm)
    }

    fn calibrate(&mut self, photo: CapturedPhoto) -> Result<SessionState, SessionError> {
        let image = &photo.image;
        let Some(click) = self.operator.collect_click(&photo.path, self.config.display) else {
            log::warn!("no calibration click, aborting");
            return Ok(SessionState::Aborted);
        };
        let point = map_click(click, self.config.display, image.width(), image.height());
        log::info!(
            "click ({}, {}) on {}x{} canvas -> ({:.1}, {:.1}) in {}x{} photo",
            click.x,
            click.y,
            self.config.display.width,
            self.config.display.height,
            point.x,
            point.y,
            image.width(),
            image.height()
        );

        let reference = sample(image, point, self.config.box_size)?;
        self.audit(image, &reference, &self.config.reference_tag)?;
        self.reference = Some(reference.color);
        self.operator.notify(Notice::ReferenceSampled(reference.color));

        let table = self.require_paths()?.calibration_table.clone();
        append(&table, &CalibrationObservation::new(&photo.path, point))?;
        Ok(SessionState::TrainingModel)
    }

    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    fn train(&mut self) -> Result<(), SessionError> {
        self.operator.notify(Notice::TrainingStarted);
        let table = self.require_paths()?.calibration_table.clone();
        let history = read_calibration(&table)?;
        let model = aggregate(&history)?;
        self.model = Some(model);
        self.operator.notify(Notice::ModelTrained(model));
        Ok(())
    }

    fn next_tag(&mut self) -> SessionState {
        loop {
            let Some(tag) = self.operator.ask_tag() else {
                return SessionState::SessionEnded;
            };
            let tag = tag.trim().to_string();
            match validate_tag(&tag) {
                Ok(()) => return SessionState::CapturingTagged { tag },
                Err(reason) => {
                    log::warn!("rejected tag {tag:?}: {reason}");
                    self.operator.notify(Notice::InvalidTag { tag, reason });
                }
            }
        }
    }

    fn record_tagged(
        &mut self,
        tag: String,
        photo: CapturedPhoto,
    ) -> Result<SessionState, SessionError> {
        let sampled = match photo.sampled {
            Some(sampled) => sampled,
            None => sample(&photo.image, self.require_model()?.center, self.config.box_size)?,
        };
        self.audit(&photo.image, &sampled, &tag)?;
        let record = CaptureRecord::now(
            tag,
            photo.path,
            sampled.color,
            self.reference.unwrap_or_default(),
        );
        Ok(SessionState::Recording(record))
    }

    fn audit(
        &self,
        image: &RgbImage,
        sampled: &RegionSample,
        tag: &str,
    ) -> Result<(), SessionError> {
        if self.config.save_artifacts {
            let output = &self.require_paths()?.output;
            save_artifacts(output, tag, image, sampled, self.config.swatch_side);
        }
        Ok(())
    }

    /// Capture, decode and optionally sample the photo for `tag`, asking the
    /// operator before each retry.
    fn acquire(
        &mut self,
        tag: &str,
        center: Option<ImageCoordinate>,
    ) -> Result<CapturedPhoto, SessionError> {
        let target = self.photo_path(tag)?;
        let max_attempts = self.config.max_capture_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.try_acquire(&target, center) {
                Ok(photo) => return Ok(photo),
                Err(e) => {
                    log::warn!("capture attempt {attempt}/{max_attempts} failed: {e}");
                    if attempt >= max_attempts || !self.operator.retry_capture(attempt, &e) {
                        return Err(SessionError::CaptureAborted {
                            attempts: attempt,
                            source: Box::new(e),
                        });
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn try_acquire(
        &mut self,
        target: &Path,
        center: Option<ImageCoordinate>,
    ) -> Result<CapturedPhoto, SessionError> {
        self.camera.capture(target)?;
        let image = load_rgb(target)?;
        let sampled = center
            .map(|center| sample(&image, center, self.config.box_size))
            .transpose()?;
        Ok(CapturedPhoto {
            path: target.to_path_buf(),
            image,
            sampled,
        })
    }

    fn require_model(&self) -> Result<SamplingModel, SessionError> {
        self.model
            .ok_or(SessionError::Calibration(CalibrationError::EmptyDataset))
    }

    fn photo_path(&self, tag: &str) -> Result<PathBuf, SessionError> {
        Ok(self
            .require_paths()?
            .pictures
            .join(self.config.photo_name(tag)))
    }

    fn results_sink(&self) -> Result<ResultsSink, SessionError> {
        let results = &self.require_paths()?.results;
        Ok(ResultsSink::new(&results.master, &results.session))
    }

    fn require_paths(&self) -> Result<&SessionPaths, SessionError> {
        self.paths.as_ref().ok_or_else(|| {
            SessionError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "session folders not chosen",
            ))
        })
    }
}

/// Write `{tag}_region_of_interest.jpg` and `{tag}_median_color_swatch.jpg`.
///
/// Failures are logged and otherwise ignored; the sampled color does not
/// depend on them.
pub fn save_artifacts(
    output: &Path,
    tag: &str,
    image: &RgbImage,
    sampled: &RegionSample,
    swatch_side: u32,
) {
    let region_path = output.join(format!("{tag}_region_of_interest.jpg"));
    if let Err(e) = sampled.region.crop(image).save(&region_path) {
        log::warn!("could not save {}: {e}", region_path.display());
    }

    let swatch_path = output.join(format!("{tag}_median_color_swatch.jpg"));
    if let Err(e) = solid_swatch(sampled.color, swatch_side).save(&swatch_path) {
        log::warn!("could not save {}: {e}", swatch_path.display());
    }
}
