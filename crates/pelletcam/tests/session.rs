use image::{ImageFormat, Rgb, RgbImage};
use pelletcam::{
    Camera, CameraError, DisplayClick, DisplaySize, ImageCoordinate, MedianColor, NetworkError,
    Notice, Operator, Prompt, Reachability, SessionConfig, SessionController, SessionError,
    SessionOutcome,
};
use pelletcam::dataset::{DatasetError, CALIBRATION_HEADER, RESULTS_HEADER};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

/// 160x120 grey frame with a 20x20 pellet around (80, 60).
fn frame(pellet: [u8; 3]) -> RgbImage {
    let mut img = RgbImage::from_pixel(160, 120, Rgb([128, 128, 128]));
    for y in 50..70 {
        for x in 70..90 {
            img.put_pixel(x, y, Rgb(pellet));
        }
    }
    img
}

/// What the fake camera stores on each capture.
enum Shot {
    /// A full-size frame with a pellet of this color.
    Pellet([u8; 3]),
    /// A 40x30 frame: decodes fine but does not contain the sampling point.
    Small([u8; 3]),
    /// Raw bytes written as-is, e.g. an error page instead of a photo.
    Bytes(&'static [u8]),
    Fail,
}

struct ScriptedCamera {
    shots: VecDeque<Shot>,
    taken: Vec<PathBuf>,
}

impl ScriptedCamera {
    fn new(shots: impl IntoIterator<Item = Shot>) -> Self {
        Self {
            shots: shots.into_iter().collect(),
            taken: Vec::new(),
        }
    }

    fn save(img: RgbImage, target: &Path) -> Result<(), CameraError> {
        img.save_with_format(target, ImageFormat::Png)
            .map_err(|e| CameraError::Http {
                url: "fake".into(),
                reason: e.to_string(),
            })
    }
}

impl Camera for ScriptedCamera {
    fn capture(&mut self, target: &Path) -> Result<(), CameraError> {
        match self.shots.pop_front().unwrap_or(Shot::Fail) {
            Shot::Pellet(pellet) => Self::save(frame(pellet), target)?,
            Shot::Small(color) => Self::save(RgbImage::from_pixel(40, 30, Rgb(color)), target)?,
            Shot::Bytes(bytes) => fs::write(target, bytes)?,
            Shot::Fail => {
                return Err(CameraError::Http {
                    url: "http://camera/capture".into(),
                    reason: "connection refused".into(),
                })
            }
        }
        self.taken.push(target.to_path_buf());
        Ok(())
    }
}

struct Reachable(bool);

impl Reachability for Reachable {
    fn probe(&self, host: &str) -> Result<(), NetworkError> {
        if self.0 {
            Ok(())
        } else {
            Err(NetworkError::UnreachableDevice {
                host: host.to_string(),
            })
        }
    }
}

struct ScriptedOperator {
    pictures: PathBuf,
    output: PathBuf,
    confirms: VecDeque<bool>,
    delete_existing: bool,
    click: Option<DisplayClick>,
    tags: VecDeque<String>,
    retries: VecDeque<bool>,
    failures: Vec<&'static str>,
    notices: Vec<Notice>,
    prompts: Vec<Prompt>,
}

impl ScriptedOperator {
    fn new(root: &Path) -> Self {
        Self {
            pictures: root.join("pics").join("exp1"),
            output: root.join("output"),
            confirms: VecDeque::new(),
            delete_existing: false,
            click: Some(DisplayClick::new(400.0, 300.0)),
            tags: VecDeque::new(),
            retries: VecDeque::new(),
            failures: Vec::new(),
            notices: Vec::new(),
            prompts: Vec::new(),
        }
    }

    fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&mut self, prompt: Prompt) -> bool {
        self.prompts.push(prompt);
        self.confirms.pop_front().unwrap_or(true)
    }

    fn choose_folder(&mut self, prompt: Prompt, _default: &Path) -> Option<PathBuf> {
        match prompt {
            Prompt::PicturesFolder => Some(self.pictures.clone()),
            _ => Some(self.output.clone()),
        }
    }

    fn confirm_delete(&mut self, _existing: &Path) -> bool {
        self.delete_existing
    }

    fn collect_click(&mut self, _image: &Path, display: DisplaySize) -> Option<DisplayClick> {
        assert_eq!(display, DisplaySize::default());
        self.click
    }

    fn ask_tag(&mut self) -> Option<String> {
        self.tags.pop_front()
    }

    fn retry_capture(&mut self, _attempt: u32, error: &SessionError) -> bool {
        self.failures.push(match error {
            SessionError::Camera(_) => "camera",
            SessionError::Image { .. } => "image",
            SessionError::Sample(_) => "sample",
            _ => "other",
        });
        self.retries.pop_front().unwrap_or(false)
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

fn config() -> SessionConfig {
    let mut cfg = SessionConfig::default();
    cfg.device.capture_wait = pelletcam::CaptureWait::FixedDelay { millis: 0 };
    cfg
}

#[test]
fn full_session_records_every_tagged_capture() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut operator = ScriptedOperator::new(dir.path()).tags(&["p1", "bad,tag", "p2"]);
    let mut camera = ScriptedCamera::new([
        Shot::Pellet([200, 40, 40]),
        Shot::Pellet([30, 90, 210]),
        Shot::Pellet([10, 220, 10]),
    ]);

    let summary = SessionController::new(config(), &mut operator, &mut camera, Reachable(true))
        .run()
        .expect("session");

    assert_eq!(summary.outcome, SessionOutcome::Completed);
    let model = summary.model.expect("trained model");
    assert_eq!(model.center, ImageCoordinate::new(80.0, 60.0));
    assert_eq!(summary.reference, Some(MedianColor::new(200, 40, 40)));

    let colors: Vec<(String, MedianColor)> = summary
        .captures
        .iter()
        .map(|r| (r.tag.clone(), r.color))
        .collect();
    assert_eq!(
        colors,
        vec![
            ("p1".to_string(), MedianColor::new(30, 90, 210)),
            ("p2".to_string(), MedianColor::new(10, 220, 10)),
        ]
    );
    assert!(summary
        .captures
        .iter()
        .all(|r| r.reference == MedianColor::new(200, 40, 40)));

    assert_eq!(
        camera.taken,
        vec![
            operator.pictures.join("reference.jpg"),
            operator.pictures.join("p1.jpg"),
            operator.pictures.join("p2.jpg"),
        ]
    );

    let calibration = fs::read_to_string(operator.output.join("reference_data.csv")).unwrap();
    let lines: Vec<&str> = calibration.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], CALIBRATION_HEADER);
    assert!(lines[1].ends_with("reference.jpg,80,60"), "{}", lines[1]);

    for table in [
        operator.output.join("results.csv"),
        operator.pictures.join("results.csv"),
    ] {
        let text = fs::read_to_string(&table).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3, "{}", table.display());
        assert_eq!(lines[0], RESULTS_HEADER);
        assert!(lines[1].starts_with("p1,"));
        assert!(lines[1].ends_with(",30,90,210,200,40,40"));
        assert!(lines[2].starts_with("p2,"));
    }

    for name in [
        "reference_region_of_interest.jpg",
        "reference_median_color_swatch.jpg",
        "p1_region_of_interest.jpg",
        "p2_median_color_swatch.jpg",
    ] {
        assert!(operator.output.join(name).is_file(), "missing {name}");
    }

    assert!(operator
        .notices
        .iter()
        .any(|n| matches!(n, Notice::InvalidTag { tag, .. } if tag == "bad,tag")));
    assert!(matches!(
        operator.notices.last(),
        Some(Notice::SessionEnded { captures: 2 })
    ));
}

#[test]
fn training_uses_the_whole_calibration_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut operator = ScriptedOperator::new(dir.path());
    fs::create_dir_all(&operator.output).unwrap();
    fs::write(
        operator.output.join("reference_data.csv"),
        format!("{CALIBRATION_HEADER}\nold/reference.jpg,100,60\n"),
    )
    .unwrap();
    let mut camera = ScriptedCamera::new([Shot::Pellet([1, 2, 3])]);

    let summary = SessionController::new(config(), &mut operator, &mut camera, Reachable(true))
        .run()
        .expect("session");

    let model = summary.model.expect("model");
    assert_eq!(model.observations, 2);
    assert_eq!(model.center, ImageCoordinate::new(90.0, 60.0));
}

#[test]
fn unreachable_device_stops_before_any_prompt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut operator = ScriptedOperator::new(dir.path());
    let mut camera = ScriptedCamera::new([]);

    let err = SessionController::new(config(), &mut operator, &mut camera, Reachable(false))
        .run()
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::Network(NetworkError::UnreachableDevice { .. })
    ));
    assert!(operator.prompts.is_empty());
    assert!(matches!(
        operator.notices.as_slice(),
        [Notice::DeviceUnreachable { .. }]
    ));
}

#[test]
fn cancelling_reference_confirmation_aborts_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut operator = ScriptedOperator::new(dir.path());
    operator.confirms = VecDeque::from([true, true, false]);
    let mut camera = ScriptedCamera::new([Shot::Pellet([1, 2, 3])]);

    let summary = SessionController::new(config(), &mut operator, &mut camera, Reachable(true))
        .run()
        .expect("session");

    assert_eq!(summary.outcome, SessionOutcome::Aborted);
    assert!(summary.model.is_none());
    assert!(camera.taken.is_empty());
    assert_eq!(
        operator.prompts,
        vec![
            Prompt::PicturesFolder,
            Prompt::OutputFolder,
            Prompt::ReferencePellet
        ]
    );
}

#[test]
fn reference_capture_gives_up_after_bounded_retries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut operator = ScriptedOperator::new(dir.path());
    operator.retries = VecDeque::from([true, true, true, true]);
    let mut camera = ScriptedCamera::new([Shot::Fail, Shot::Fail, Shot::Fail, Shot::Pellet([1, 2, 3])]);

    let err = SessionController::new(config(), &mut operator, &mut camera, Reachable(true))
        .run()
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::CaptureAborted { attempts: 3, ref source }
            if matches!(**source, SessionError::Camera(CameraError::Http { .. }))
    ));
    assert!(camera.taken.is_empty());
    assert_eq!(operator.failures, vec!["camera", "camera"]);
}

#[test]
fn reference_capture_recovers_on_retry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut operator = ScriptedOperator::new(dir.path());
    operator.retries = VecDeque::from([true]);
    let mut camera = ScriptedCamera::new([Shot::Fail, Shot::Pellet([50, 60, 70])]);

    let summary = SessionController::new(config(), &mut operator, &mut camera, Reachable(true))
        .run()
        .expect("session");

    assert_eq!(summary.reference, Some(MedianColor::new(50, 60, 70)));
}

#[test]
fn abandoned_tagged_capture_returns_to_tag_prompt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut operator = ScriptedOperator::new(dir.path()).tags(&["p1", "p2"]);
    let mut camera = ScriptedCamera::new([Shot::Pellet([1, 2, 3]), Shot::Fail, Shot::Pellet([9, 8, 7])]);

    let summary = SessionController::new(config(), &mut operator, &mut camera, Reachable(true))
        .run()
        .expect("session");

    assert_eq!(summary.outcome, SessionOutcome::Completed);
    assert_eq!(summary.captures.len(), 1);
    assert_eq!(summary.captures[0].tag, "p2");
    assert!(operator
        .notices
        .iter()
        .any(|n| matches!(n, Notice::CaptureSkipped { tag } if tag == "p1")));
}

#[test]
fn existing_session_table_is_deleted_on_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut operator = ScriptedOperator::new(dir.path()).tags(&["p1"]);
    operator.delete_existing = true;
    fs::create_dir_all(&operator.pictures).unwrap();
    let stale = operator.pictures.join("results.csv");
    fs::write(&stale, format!("{RESULTS_HEADER}\nold,old.jpg,01-01-2020 00:00,0,0,0,0,0,0\n"))
        .unwrap();
    let mut camera = ScriptedCamera::new([Shot::Pellet([1, 2, 3]), Shot::Pellet([4, 5, 6])]);

    SessionController::new(config(), &mut operator, &mut camera, Reachable(true))
        .run()
        .expect("session");

    let text = fs::read_to_string(&stale).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(!text.contains("old.jpg"));
}

#[test]
fn tagged_photo_too_small_to_sample_is_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut operator = ScriptedOperator::new(dir.path()).tags(&["p1"]);
    let mut camera = ScriptedCamera::new([Shot::Pellet([1, 2, 3]), Shot::Small([9, 9, 9])]);

    let summary = SessionController::new(config(), &mut operator, &mut camera, Reachable(true))
        .run()
        .expect("session");

    assert_eq!(summary.outcome, SessionOutcome::Completed);
    assert!(summary.captures.is_empty());
    assert_eq!(operator.failures, vec!["sample"]);
    assert!(operator
        .notices
        .iter()
        .any(|n| matches!(n, Notice::CaptureSkipped { tag } if tag == "p1")));
    assert!(matches!(
        operator.notices.last(),
        Some(Notice::SessionEnded { captures: 0 })
    ));
    assert!(!operator.output.join("results.csv").exists());
}

#[test]
fn tagged_photo_is_resampled_after_a_retry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut operator = ScriptedOperator::new(dir.path()).tags(&["p1"]);
    operator.retries = VecDeque::from([true]);
    let mut camera = ScriptedCamera::new([
        Shot::Pellet([1, 2, 3]),
        Shot::Small([9, 9, 9]),
        Shot::Pellet([40, 50, 60]),
    ]);

    let summary = SessionController::new(config(), &mut operator, &mut camera, Reachable(true))
        .run()
        .expect("session");

    assert_eq!(operator.failures, vec!["sample"]);
    assert_eq!(summary.captures.len(), 1);
    assert_eq!(summary.captures[0].color, MedianColor::new(40, 50, 60));
}

#[test]
fn undecodable_tagged_photo_skips_only_that_tag() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut operator = ScriptedOperator::new(dir.path()).tags(&["p1", "p2"]);
    let mut camera = ScriptedCamera::new([
        Shot::Pellet([1, 2, 3]),
        Shot::Bytes(b"<html>busy</html>"),
        Shot::Pellet([9, 8, 7]),
    ]);

    let summary = SessionController::new(config(), &mut operator, &mut camera, Reachable(true))
        .run()
        .expect("session");

    assert_eq!(operator.failures, vec!["image"]);
    let tags: Vec<&str> = summary.captures.iter().map(|r| r.tag.as_str()).collect();
    assert_eq!(tags, vec!["p2"]);
    assert!(operator
        .notices
        .iter()
        .any(|n| matches!(n, Notice::CaptureSkipped { tag } if tag == "p1")));
    assert!(matches!(
        operator.notices.last(),
        Some(Notice::SessionEnded { captures: 1 })
    ));
}

#[test]
fn failed_session_table_write_keeps_the_master_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut operator = ScriptedOperator::new(dir.path()).tags(&["p1"]);
    fs::create_dir_all(operator.pictures.join("results.csv")).unwrap();
    let mut camera = ScriptedCamera::new([Shot::Pellet([1, 2, 3]), Shot::Pellet([4, 5, 6])]);

    let err = SessionController::new(config(), &mut operator, &mut camera, Reachable(true))
        .run()
        .unwrap_err();

    match err {
        SessionError::Dataset(DatasetError::PartialWrite {
            written, failed, ..
        }) => {
            assert_eq!(written, operator.output.join("results.csv"));
            assert_eq!(failed, operator.pictures.join("results.csv"));
        }
        other => panic!("expected a partial write, got {other:?}"),
    }
    let master = fs::read_to_string(operator.output.join("results.csv")).unwrap();
    let lines: Vec<&str> = master.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], RESULTS_HEADER);
    assert!(lines[1].starts_with("p1,"));
    assert!(!operator
        .notices
        .iter()
        .any(|n| matches!(n, Notice::Recorded(_))));
}
