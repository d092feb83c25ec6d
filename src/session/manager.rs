use serde::Serialize;

use crate::ai::Detection;
use crate::capture::{EncodedImage, SelectedImage};
use crate::conversion::{parse_manual_amount, ConversionResult, ExchangeRate};
use crate::error::{AppError, Result};

/// Identifies one detection attempt. Strictly increasing per session.
pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    Manual,
    Photo,
}

impl std::str::FromStr for ModeKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" | "m" => Ok(ModeKind::Manual),
            "photo" | "p" => Ok(ModeKind::Photo),
            other => Err(AppError::Validation(format!(
                "Unknown mode {other:?}. Use manual or photo."
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualState {
    pub result: Option<ConversionResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhotoState {
    NoImage,
    ImageSelected {
        image: SelectedImage,
    },
    Detecting {
        image: SelectedImage,
        request: RequestId,
    },
    ResultsShown {
        image: SelectedImage,
        results: Vec<ConversionResult>,
        provider: String,
        detected_at: String,
    },
    /// Detection ran and found nothing. Not an error.
    NothingFound {
        image: SelectedImage,
    },
    /// `image` is `None` when the file itself could not be loaded.
    ErrorShown {
        image: Option<SelectedImage>,
        error: String,
    },
}

impl PhotoState {
    pub fn image(&self) -> Option<&SelectedImage> {
        match self {
            PhotoState::NoImage => None,
            PhotoState::ImageSelected { image }
            | PhotoState::Detecting { image, .. }
            | PhotoState::ResultsShown { image, .. }
            | PhotoState::NothingFound { image } => Some(image),
            PhotoState::ErrorShown { image, .. } => image.as_ref(),
        }
    }

    fn into_image(self) -> Option<SelectedImage> {
        match self {
            PhotoState::NoImage => None,
            PhotoState::ImageSelected { image }
            | PhotoState::Detecting { image, .. }
            | PhotoState::ResultsShown { image, .. }
            | PhotoState::NothingFound { image } => Some(image),
            PhotoState::ErrorShown { image, .. } => image,
        }
    }
}

/// Each mode carries only its own state, so nothing leaks across a switch.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Manual(ManualState),
    Photo(PhotoState),
}

impl Mode {
    pub fn fresh(kind: ModeKind) -> Self {
        match kind {
            ModeKind::Manual => Mode::Manual(ManualState::default()),
            ModeKind::Photo => Mode::Photo(PhotoState::NoImage),
        }
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            Mode::Manual(_) => ModeKind::Manual,
            Mode::Photo(_) => ModeKind::Photo,
        }
    }
}

pub struct Session {
    pub id: String,
    pub started_at: String,
    rate: ExchangeRate,
    rate_input: String,
    mode: Mode,
    last_request: RequestId,
}

impl Session {
    pub fn new(rate: ExchangeRate) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            rate,
            rate_input: rate.value().to_string(),
            mode: Mode::fresh(ModeKind::Manual),
            last_request: 0,
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn rate(&self) -> ExchangeRate {
        self.rate
    }

    /// Raw text of the rate field as the user typed it.
    pub fn rate_input(&self) -> &str {
        &self.rate_input
    }

    pub fn is_detecting(&self) -> bool {
        matches!(self.mode, Mode::Photo(PhotoState::Detecting { .. }))
    }

    /// Leaving a mode drops all of its results, errors and image. Selecting
    /// the active mode again changes nothing.
    pub fn switch_mode(&mut self, kind: ModeKind) {
        if self.mode.kind() == kind {
            return;
        }
        log::debug!("Switching to {:?} mode", kind);
        self.mode = Mode::fresh(kind);
    }

    /// Stores the typed rate and recomputes every visible result from its
    /// original amount.
    pub fn set_rate(&mut self, input: &str) -> ExchangeRate {
        self.rate_input = input.trim().to_string();
        self.rate = ExchangeRate::parse_or_default(input);

        let rate = self.rate;
        match &mut self.mode {
            Mode::Manual(state) => {
                if let Some(result) = &mut state.result {
                    if let Err(e) = result.recompute(rate) {
                        state.result = None;
                        state.error = Some(e.user_message());
                    }
                }
            }
            Mode::Photo(state) => {
                let overflowed = match &mut *state {
                    PhotoState::ResultsShown { results, .. } => results
                        .iter_mut()
                        .map(|result| result.recompute(rate))
                        .find_map(|r| r.err()),
                    _ => None,
                };
                if let Some(e) = overflowed {
                    let image = std::mem::replace(state, PhotoState::NoImage).into_image();
                    *state = PhotoState::ErrorShown {
                        image,
                        error: e.user_message(),
                    };
                }
            }
        }
        rate
    }

    pub fn submit_manual(&mut self, input: &str) -> Result<ConversionResult> {
        let Mode::Manual(state) = &mut self.mode else {
            return Err(AppError::Validation(
                "Manual entry is only available in manual mode.".to_string(),
            ));
        };

        let rate = self.rate;
        match parse_manual_amount(input).and_then(|amount| ConversionResult::new(amount, rate)) {
            Ok(result) => {
                state.result = Some(result);
                state.error = None;
                Ok(result)
            }
            Err(e) => {
                state.result = None;
                state.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// A new image always replaces whatever was shown, including an
    /// in-flight detection, whose completion will then be ignored.
    pub fn select_image(&mut self, image: SelectedImage) -> Result<()> {
        let Mode::Photo(state) = &mut self.mode else {
            return Err(AppError::Validation(
                "Image selection is only available in photo mode.".to_string(),
            ));
        };
        *state = PhotoState::ImageSelected { image };
        Ok(())
    }

    /// Records a failed image load in photo mode.
    pub fn fail_image(&mut self, error: &AppError) {
        if let Mode::Photo(state) = &mut self.mode {
            *state = PhotoState::ErrorShown {
                image: None,
                error: error.user_message(),
            };
        }
    }

    pub fn clear(&mut self) {
        match &mut self.mode {
            Mode::Manual(state) => *state = ManualState::default(),
            Mode::Photo(state) => *state = PhotoState::NoImage,
        }
    }

    /// Moves to `Detecting` and hands back what the request needs. Refusals
    /// are recorded as the current mode's error, except while a detection is
    /// already running, which is left undisturbed.
    pub fn begin_detection(&mut self) -> Result<(RequestId, EncodedImage)> {
        let state = match &mut self.mode {
            Mode::Photo(state) => state,
            Mode::Manual(manual) => {
                let err =
                    AppError::Validation("Detection is only available in photo mode.".to_string());
                manual.error = Some(err.user_message());
                return Err(err);
            }
        };
        if matches!(state, PhotoState::Detecting { .. }) {
            return Err(AppError::Validation(
                "Detection is already in progress.".to_string(),
            ));
        }

        let Some(image) = std::mem::replace(state, PhotoState::NoImage).into_image() else {
            let err = AppError::Validation("Please select an image first.".to_string());
            *state = PhotoState::ErrorShown {
                image: None,
                error: err.user_message(),
            };
            return Err(err);
        };

        self.last_request += 1;
        let request = self.last_request;
        let encoded = image.encode();
        *state = PhotoState::Detecting { image, request };
        log::debug!("Detection request {} started", request);
        Ok((request, encoded))
    }

    /// Applies a finished detection if `request` is still the outstanding one.
    /// Returns whether it was applied.
    pub fn complete_detection(&mut self, request: RequestId, outcome: Result<Detection>) -> bool {
        let current = match &self.mode {
            Mode::Photo(PhotoState::Detecting { request: r, .. }) => Some(*r),
            _ => None,
        };
        if current != Some(request) {
            log::debug!(
                "Dropping stale detection {} (outstanding: {:?})",
                request,
                current
            );
            return false;
        }

        let Mode::Photo(state) = &mut self.mode else {
            return false;
        };
        let Some(image) = std::mem::replace(state, PhotoState::NoImage).into_image() else {
            return false;
        };

        *state = match outcome {
            Ok(detection) if detection.is_empty() => PhotoState::NothingFound { image },
            Ok(detection) => {
                let results: Vec<ConversionResult> = detection
                    .amounts
                    .into_iter()
                    .filter_map(|amount| match ConversionResult::new(amount, self.rate) {
                        Ok(result) => Some(result),
                        Err(e) => {
                            log::warn!("Dropping detected amount {}: {}", amount.value(), e);
                            None
                        }
                    })
                    .collect();
                if results.is_empty() {
                    PhotoState::ErrorShown {
                        image: Some(image),
                        error: "The detected amounts are too large to convert.".to_string(),
                    }
                } else {
                    PhotoState::ResultsShown {
                        image,
                        results,
                        provider: detection.provider,
                        detected_at: detection.timestamp,
                    }
                }
            }
            Err(e) => PhotoState::ErrorShown {
                image: Some(image),
                error: e.user_message(),
            },
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::MonetaryAmount;
    use std::path::PathBuf;

    fn image(name: &str) -> SelectedImage {
        SelectedImage::from_bytes(PathBuf::from(name), vec![0xff, 0xd8, 0xff, 0xe0], 1024)
            .unwrap()
    }

    fn detection(values: &[f64]) -> Detection {
        Detection {
            amounts: values
                .iter()
                .map(|v| MonetaryAmount::new(*v).unwrap())
                .collect(),
            model: "m".to_string(),
            provider: "p".to_string(),
            timestamp: "t".to_string(),
        }
    }

    fn photo_session() -> Session {
        let mut session = Session::new(ExchangeRate::default());
        session.switch_mode(ModeKind::Photo);
        session
    }

    #[test]
    fn manual_submission_and_rate_change() {
        let mut session = Session::new(ExchangeRate::default());
        session.submit_manual("1000").unwrap();
        session.set_rate("40");

        let Mode::Manual(state) = session.mode() else {
            panic!("expected manual mode");
        };
        assert_eq!(state.result.unwrap().converted, 40_000.0);
    }

    #[test]
    fn manual_errors_replace_result() {
        let mut session = Session::new(ExchangeRate::default());
        session.submit_manual("1200").unwrap();
        assert!(session.submit_manual("abc").is_err());

        let Mode::Manual(state) = session.mode() else {
            panic!("expected manual mode");
        };
        assert!(state.result.is_none());
        assert!(state.error.is_some());
    }

    #[test]
    fn photo_rate_change_recomputes_from_originals() {
        let mut session = photo_session();
        session.select_image(image("a.jpg")).unwrap();
        let (id, _) = session.begin_detection().unwrap();
        assert!(session.complete_detection(id, Ok(detection(&[1000.0, 250.0]))));

        session.set_rate("40");
        session.set_rate("40");

        let Mode::Photo(PhotoState::ResultsShown { results, .. }) = session.mode() else {
            panic!("expected results");
        };
        let converted: Vec<f64> = results.iter().map(|r| r.converted).collect();
        assert_eq!(converted, vec![40_000.0, 10_000.0]);
    }

    #[test]
    fn bad_rate_input_uses_default() {
        let mut session = Session::new(ExchangeRate::default());
        let rate = session.set_rate("abc");
        assert_eq!(rate, ExchangeRate::default());
        assert_eq!(session.rate_input(), "abc");
    }

    #[test]
    fn mode_round_trip_clears_photo_state() {
        let mut session = photo_session();
        session.select_image(image("a.jpg")).unwrap();
        let (id, _) = session.begin_detection().unwrap();
        session.complete_detection(id, Ok(detection(&[10.0])));

        session.switch_mode(ModeKind::Manual);
        session.switch_mode(ModeKind::Photo);
        assert_eq!(session.mode(), &Mode::Photo(PhotoState::NoImage));
    }

    #[test]
    fn switching_to_photo_clears_manual_result() {
        let mut session = Session::new(ExchangeRate::default());
        session.submit_manual("5").unwrap();
        session.switch_mode(ModeKind::Photo);
        session.switch_mode(ModeKind::Manual);
        assert_eq!(session.mode(), &Mode::Manual(ManualState::default()));
    }

    #[test]
    fn new_image_clears_previous_results() {
        let mut session = photo_session();
        session.select_image(image("a.jpg")).unwrap();
        let (id, _) = session.begin_detection().unwrap();
        session.complete_detection(id, Ok(detection(&[10.0])));

        session.select_image(image("b.jpg")).unwrap();
        match session.mode() {
            Mode::Photo(PhotoState::ImageSelected { image }) => {
                assert_eq!(image.preview.path, PathBuf::from("b.jpg"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stale_completion_after_clear_is_ignored() {
        let mut session = photo_session();
        session.select_image(image("a.jpg")).unwrap();
        let (id, _) = session.begin_detection().unwrap();
        session.clear();

        assert!(!session.complete_detection(id, Ok(detection(&[10.0]))));
        assert_eq!(session.mode(), &Mode::Photo(PhotoState::NoImage));
    }

    #[test]
    fn stale_completion_after_reselect_is_ignored() {
        let mut session = photo_session();
        session.select_image(image("a.jpg")).unwrap();
        let (first, _) = session.begin_detection().unwrap();
        session.select_image(image("b.jpg")).unwrap();
        let (second, _) = session.begin_detection().unwrap();
        assert!(second > first);

        assert!(!session.complete_detection(first, Ok(detection(&[1.0]))));
        assert!(session.is_detecting());
        assert!(session.complete_detection(second, Ok(detection(&[2.0]))));
    }

    #[test]
    fn empty_detection_is_not_an_error() {
        let mut session = photo_session();
        session.select_image(image("a.jpg")).unwrap();
        let (id, _) = session.begin_detection().unwrap();
        session.complete_detection(id, Ok(detection(&[])));
        assert!(matches!(
            session.mode(),
            Mode::Photo(PhotoState::NothingFound { .. })
        ));
    }

    #[test]
    fn failed_detection_keeps_image_for_retry() {
        let mut session = photo_session();
        session.select_image(image("a.jpg")).unwrap();
        let (id, _) = session.begin_detection().unwrap();
        session.complete_detection(id, Err(AppError::Detection("boom".to_string())));

        match session.mode() {
            Mode::Photo(PhotoState::ErrorShown { image, error }) => {
                assert!(image.is_some());
                assert_eq!(error, "Failed to detect amounts: boom");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(session.begin_detection().is_ok());
    }

    #[test]
    fn detection_guards() {
        let mut session = Session::new(ExchangeRate::default());
        assert!(session.begin_detection().is_err());

        match session.mode() {
            Mode::Manual(state) => assert!(state.error.is_some()),
            other => panic!("unexpected {other:?}"),
        }

        session.switch_mode(ModeKind::Photo);
        assert!(session.begin_detection().is_err());
        match session.mode() {
            Mode::Photo(PhotoState::ErrorShown { image: None, error }) => {
                assert_eq!(error, "Please select an image first.");
            }
            other => panic!("unexpected {other:?}"),
        }

        session.select_image(image("a.jpg")).unwrap();
        session.begin_detection().unwrap();
        assert!(session.begin_detection().is_err());
        assert!(session.is_detecting());
    }

    #[test]
    fn overflowing_manual_amount_is_rejected() {
        let mut session = Session::new(ExchangeRate::default());
        assert!(matches!(
            session.submit_manual("1e307"),
            Err(AppError::Validation(_))
        ));
        let Mode::Manual(state) = session.mode() else {
            panic!("expected manual mode");
        };
        assert!(state.result.is_none());
        assert!(state.error.is_some());
    }

    #[test]
    fn rate_overflow_replaces_manual_result_with_error() {
        let mut session = Session::new(ExchangeRate::default());
        session.submit_manual("1e300").unwrap();
        session.set_rate("1e10");

        let Mode::Manual(state) = session.mode() else {
            panic!("expected manual mode");
        };
        assert!(state.result.is_none());
        assert!(state.error.is_some());
    }

    #[test]
    fn overflowing_detected_amounts_are_dropped() {
        let mut session = photo_session();
        session.select_image(image("a.jpg")).unwrap();
        let (id, _) = session.begin_detection().unwrap();
        session.complete_detection(id, Ok(detection(&[1e307, 120.0])));

        let Mode::Photo(PhotoState::ResultsShown { results, .. }) = session.mode() else {
            panic!("expected results");
        };
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].original.value(), 120.0);
        assert!(results.iter().all(|r| r.converted.is_finite()));
    }

    #[test]
    fn only_overflowing_amounts_show_an_error() {
        let mut session = photo_session();
        session.select_image(image("a.jpg")).unwrap();
        let (id, _) = session.begin_detection().unwrap();
        session.complete_detection(id, Ok(detection(&[1e307])));

        assert!(matches!(
            session.mode(),
            Mode::Photo(PhotoState::ErrorShown { image: Some(_), .. })
        ));
    }

    #[test]
    fn rate_overflow_in_photo_mode_keeps_image() {
        let mut session = photo_session();
        session.select_image(image("a.jpg")).unwrap();
        let (id, _) = session.begin_detection().unwrap();
        session.complete_detection(id, Ok(detection(&[1e300])));
        session.set_rate("1e10");

        assert!(matches!(
            session.mode(),
            Mode::Photo(PhotoState::ErrorShown { image: Some(_), .. })
        ));
        assert!(session.begin_detection().is_ok());
    }
}
