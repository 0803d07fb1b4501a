//! The person at the bench.
//!
//! The session controller talks to the operator only through the `Operator`
//! trait. Every method is a blocking request/response: a windowed front end
//! can implement it on top of its own event loop, `TerminalOperator` does it
//! with line-based prompts.

use crate::session::SessionError;
use pelletcam_core::{DisplayClick, DisplaySize, MedianColor, SamplingModel};
use pelletcam_dataset::CaptureRecord;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Confirmations requested before the operator commits to a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prompt {
    PicturesFolder,
    OutputFolder,
    ReferencePellet,
}

impl Prompt {
    pub fn message(self) -> &'static str {
        match self {
            Prompt::PicturesFolder => {
                "Choose where to save the pictures of this experiment (one folder per experiment)."
            }
            Prompt::OutputFolder => {
                "Choose the folder holding the main results table (the parent of the picture folders)."
            }
            Prompt::ReferencePellet => {
                "Place the reference pellet. The picture is taken as soon as you confirm."
            }
        }
    }
}

/// Information for the operator that needs no answer.
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    DeviceUnreachable { host: String, hint: String },
    TrainingStarted,
    ModelTrained(SamplingModel),
    ReferenceSampled(MedianColor),
    InvalidTag { tag: String, reason: &'static str },
    CaptureSkipped { tag: String },
    Recorded(CaptureRecord),
    SessionEnded { captures: usize },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::DeviceUnreachable { host, hint } => {
                write!(f, "Camera at {host} is unreachable. Connect to the {hint}.")
            }
            Notice::TrainingStarted => {
                write!(f, "Training the model with collected reference data...")
            }
            Notice::ModelTrained(m) => write!(
                f,
                "Model training completed: sampling at ({}, {}) from {} observation(s).",
                m.center.x, m.center.y, m.observations
            ),
            Notice::ReferenceSampled(c) => write!(f, "Reference color {c}."),
            Notice::InvalidTag { tag, reason } => write!(f, "Tag {tag:?} rejected: {reason}."),
            Notice::CaptureSkipped { tag } => write!(f, "No picture recorded for {tag:?}."),
            Notice::Recorded(r) => write!(f, "{}: {} (reference {})", r.tag, r.color, r.reference),
            Notice::SessionEnded { captures } => write!(
                f,
                "Session ended after {captures} capture(s). Don't forget to double check your results."
            ),
        }
    }
}

pub trait Operator {
    /// Ask to proceed with `prompt`; `false` aborts the run.
    fn confirm(&mut self, prompt: Prompt) -> bool;

    /// Pick a folder for `prompt`; `None` keeps `default`.
    fn choose_folder(&mut self, prompt: Prompt, default: &Path) -> Option<PathBuf>;

    /// Ask whether an existing per-session results table should be deleted.
    fn confirm_delete(&mut self, existing: &Path) -> bool;

    /// Show `image` scaled to `display` and return where the operator clicked.
    /// `None` means the operator closed the view without clicking.
    fn collect_click(&mut self, image: &Path, display: DisplaySize) -> Option<DisplayClick>;

    /// Ask for the next pellet tag; `None` ends the session.
    fn ask_tag(&mut self) -> Option<String>;

    /// Attempt `attempt` produced no usable photo (capture, decode or
    /// sampling failed); return `true` to try again.
    fn retry_capture(&mut self, attempt: u32, error: &SessionError) -> bool;

    fn notify(&mut self, notice: Notice);
}

impl<O: Operator + ?Sized> Operator for &mut O {
    fn confirm(&mut self, prompt: Prompt) -> bool {
        (**self).confirm(prompt)
    }

    fn choose_folder(&mut self, prompt: Prompt, default: &Path) -> Option<PathBuf> {
        (**self).choose_folder(prompt, default)
    }

    fn confirm_delete(&mut self, existing: &Path) -> bool {
        (**self).confirm_delete(existing)
    }

    fn collect_click(&mut self, image: &Path, display: DisplaySize) -> Option<DisplayClick> {
        (**self).collect_click(image, display)
    }

    fn ask_tag(&mut self) -> Option<String> {
        (**self).ask_tag()
    }

    fn retry_capture(&mut self, attempt: u32, error: &SessionError) -> bool {
        (**self).retry_capture(attempt, error)
    }

    fn notify(&mut self, notice: Notice) {
        (**self).notify(notice)
    }
}

/// Line-based operator on any reader/writer pair, usually stdin/stdout.
///
/// End of input answers every question with its cancel value.
pub struct TerminalOperator<R, W> {
    input: R,
    output: W,
}

impl TerminalOperator<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn ask(&mut self, question: &str) -> Option<String> {
        let _ = write!(self.output, "{question} ");
        let _ = self.output.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn yes_no(&mut self, question: &str, default: bool) -> bool {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let Some(answer) = self.ask(&format!("{question} {hint}")) else {
                return false;
            };
            match answer.to_ascii_lowercase().as_str() {
                "" => return default,
                "y" | "yes" => return true,
                "n" | "no" => return false,
                _ => continue,
            }
        }
    }

    fn say(&mut self, text: &str) {
        let _ = writeln!(self.output, "{text}");
    }
}

/// Parse `x y` or `x,y`.
fn parse_click(s: &str) -> Option<DisplayClick> {
    let mut parts = s
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty());
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(DisplayClick::new(x, y))
}

impl<R: BufRead, W: Write> Operator for TerminalOperator<R, W> {
    fn confirm(&mut self, prompt: Prompt) -> bool {
        self.yes_no(prompt.message(), true)
    }

    fn choose_folder(&mut self, _prompt: Prompt, default: &Path) -> Option<PathBuf> {
        let answer = self.ask(&format!("Folder [{}]:", default.display()))?;
        (!answer.is_empty()).then(|| PathBuf::from(answer))
    }

    fn confirm_delete(&mut self, existing: &Path) -> bool {
        self.yes_no(
            &format!("{} already exists. Delete it?", existing.display()),
            false,
        )
    }

    fn collect_click(&mut self, image: &Path, display: DisplaySize) -> Option<DisplayClick> {
        self.say(&format!(
            "Open {} scaled to {}x{} and locate the pellet.",
            image.display(),
            display.width,
            display.height
        ));
        loop {
            let answer = self.ask("Clicked position as `x y`:")?;
            match parse_click(&answer) {
                Some(click) => return Some(click),
                None => self.say("Expected two numbers, e.g. `400 300`."),
            }
        }
    }

    fn ask_tag(&mut self) -> Option<String> {
        self.say("Place your pellet. Naming convention: pelletname_reagent_concentration.");
        let answer = self.ask("Image tag (`.` or end of input ends the session):")?;
        (answer != ".").then_some(answer)
    }

    fn retry_capture(&mut self, attempt: u32, error: &SessionError) -> bool {
        self.say(&format!("Capture attempt {attempt} failed: {error}"));
        self.yes_no("Try again?", true)
    }

    fn notify(&mut self, notice: Notice) {
        self.say(&notice.to_string());
    }
}
