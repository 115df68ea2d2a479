//! Programmatic counterpart of the browser upload page.
//!
//! Mirrors the page's state machine:
//!
//! ```text
//! Empty -> ImageSelected -> Submitting -> Resolved | Failed
//! ```
//!
//! `Resolved` and `Failed` go back to `ImageSelected` when a new image is
//! chosen, straight to `Submitting` when the same image is submitted again,
//! and to `Empty` on [`Uploader::reset`].

use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

use crate::analysis::AnalysisResult;
use crate::normalize::{self, NormalizedImage};
use crate::relay::IMAGE_FIELD;

pub const NO_IMAGE_MESSAGE: &str = "Bitte wählen Sie ein Bild aus.";
pub const NOT_AN_IMAGE_MESSAGE: &str = "Bitte wählen Sie eine Bilddatei aus.";
pub const ANALYSIS_FAILED_MESSAGE: &str = "Fehler bei der Analyse. Bitte versuchen Sie es erneut.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    ImageSelected,
    Submitting,
    Resolved,
    Failed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UploaderError {
    #[error("{0} is not an image type")]
    NotAnImage(String),
}

#[derive(Debug, thiserror::Error)]
enum SubmitError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("relay answered {0}")]
    Status(reqwest::StatusCode),
}

/// Puts an in-flight phase back to `ImageSelected` if the submission is
/// dropped before it settles.
struct InFlight<'a> {
    phase: &'a mut Phase,
}

impl<'a> InFlight<'a> {
    fn start(phase: &'a mut Phase) -> Self {
        *phase = Phase::Submitting;
        Self { phase }
    }

    fn settle(self, outcome: Phase) {
        *self.phase = outcome;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if *self.phase == Phase::Submitting {
            *self.phase = Phase::ImageSelected;
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub image: NormalizedImage,
}

pub struct Uploader {
    http: reqwest::Client,
    endpoint: String,
    phase: Phase,
    file: Option<SelectedFile>,
    analysis: Option<AnalysisResult>,
    error: Option<String>,
}

impl Uploader {
    /// `base_url` is the relay root, e.g. `http://localhost:3000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/api/analyze", base_url.trim_end_matches('/')),
            phase: Phase::Empty,
            file: None,
            analysis: None,
            error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// `data:` URL of the normalized image shown before submission.
    pub fn preview(&self) -> Option<String> {
        self.file.as_ref().map(|f| f.image.data_url())
    }

    /// Whether the submit control is enabled.
    pub fn can_submit(&self) -> bool {
        self.file.is_some() && self.phase != Phase::Submitting
    }

    /// Picks a file. Clears any previous result and error.
    pub fn select(
        &mut self,
        name: impl Into<String>,
        data: &[u8],
        media_type: &str,
    ) -> Result<&NormalizedImage, UploaderError> {
        self.error = None;
        self.analysis = None;

        if !media_type.starts_with("image/") {
            // a previously selected image stays selected
            self.phase = if self.file.is_some() {
                Phase::ImageSelected
            } else {
                Phase::Empty
            };
            self.error = Some(NOT_AN_IMAGE_MESSAGE.to_string());
            return Err(UploaderError::NotAnImage(media_type.to_string()));
        }

        let image = normalize::normalize_orientation(data, media_type);
        debug!("Selected image (normalized: {})", image.normalized);

        self.phase = Phase::ImageSelected;
        let file = self.file.insert(SelectedFile {
            name: name.into(),
            image,
        });
        Ok(&file.image)
    }

    /// Sends the selected image to the relay and records the outcome.
    ///
    /// Without a selected image this only sets [`NO_IMAGE_MESSAGE`]; no request
    /// is made. Cancelling the returned future leaves the image selected and
    /// submittable again.
    pub async fn submit(&mut self) {
        let Some(file) = self.file.clone() else {
            self.error = Some(NO_IMAGE_MESSAGE.to_string());
            return;
        };

        self.error = None;
        self.analysis = None;

        let in_flight = InFlight::start(&mut self.phase);
        match post(&self.http, &self.endpoint, file).await {
            Ok(analysis) => {
                self.analysis = Some(analysis);
                in_flight.settle(Phase::Resolved);
            }
            Err(e) => {
                warn!("Analysis request failed: {}", e);
                self.error = Some(ANALYSIS_FAILED_MESSAGE.to_string());
                in_flight.settle(Phase::Failed);
            }
        }
    }

    /// Back to the initial empty state.
    pub fn reset(&mut self) {
        self.phase = Phase::Empty;
        self.file = None;
        self.analysis = None;
        self.error = None;
    }
}

async fn post(
    http: &reqwest::Client,
    endpoint: &str,
    file: SelectedFile,
) -> Result<AnalysisResult, SubmitError> {
    let part = Part::bytes(file.image.bytes)
        .file_name(file.name)
        .mime_str(&file.image.media_type)?;
    let form = Form::new().part(IMAGE_FIELD, part);

    let response = http.post(endpoint).multipart(form).send().await?;
    if !response.status().is_success() {
        return Err(SubmitError::Status(response.status()));
    }
    Ok(response.json().await?)
}
