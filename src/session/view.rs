use serde::Serialize;
use std::fmt;

use super::manager::{ManualState, Mode, ModeKind, PhotoState, Session};
use crate::capture::ImagePreview;
use crate::conversion::ConversionResult;
use crate::format::{format_krw, format_thb, FractionDigits, Locale};

pub const NOTHING_FOUND: &str = "No THB amounts were found in the image.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub thb: String,
    pub krw: String,
}

/// Everything a front end needs to draw the current session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub mode: ModeKind,
    pub rate: String,
    pub detecting: bool,
    pub image: Option<ImagePreview>,
    pub results: Vec<ResultRow>,
    pub notice: Option<String>,
    pub error: Option<String>,
}

fn rows(results: &[ConversionResult], digits: FractionDigits, locale: Locale) -> Vec<ResultRow> {
    results
        .iter()
        .map(|r| ResultRow {
            thb: format_thb(r.original.value(), FractionDigits::MANUAL, locale),
            krw: format_krw(r.converted, digits, locale),
        })
        .collect()
}

impl Session {
    pub fn view(&self, locale: Locale) -> SessionView {
        let mut view = SessionView {
            mode: self.mode().kind(),
            rate: self.rate().value().to_string(),
            detecting: self.is_detecting(),
            image: None,
            results: Vec::new(),
            notice: None,
            error: None,
        };

        match self.mode() {
            Mode::Manual(ManualState { result, error }) => {
                if let Some(result) = result {
                    view.results = rows(std::slice::from_ref(result), FractionDigits::MANUAL, locale);
                }
                view.error = error.clone();
            }
            Mode::Photo(state) => {
                view.image = state.image().map(|i| i.preview.clone());
                match state {
                    PhotoState::NoImage => {
                        view.notice = Some("Select an image to detect prices.".to_string())
                    }
                    PhotoState::ImageSelected { .. } => {
                        view.notice = Some("Ready to detect.".to_string())
                    }
                    PhotoState::Detecting { .. } => {
                        view.notice = Some("Detecting amounts...".to_string())
                    }
                    PhotoState::ResultsShown { results, provider, .. } => {
                        view.results = rows(results, FractionDigits::PHOTO, locale);
                        view.notice = Some(format!("Detected by {provider}"));
                    }
                    PhotoState::NothingFound { .. } => view.notice = Some(NOTHING_FOUND.to_string()),
                    PhotoState::ErrorShown { error, .. } => view.error = Some(error.clone()),
                }
            }
        }
        view
    }
}

impl fmt::Display for SessionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            ModeKind::Manual => "manual",
            ModeKind::Photo => "photo",
        };
        writeln!(f, "[{mode}] 1 THB = {} KRW", self.rate)?;

        if let Some(image) = &self.image {
            write!(
                f,
                "  image: {} ({}, {} bytes",
                image.path.display(),
                image.mime_type,
                image.byte_len
            )?;
            if let (Some(w), Some(h)) = (image.width, image.height) {
                write!(f, ", {w}x{h}")?;
            }
            writeln!(f, ")")?;
        }
        for row in &self.results {
            writeln!(f, "  {} -> {}", row.thb, row.krw)?;
        }
        if let Some(notice) = &self.notice {
            writeln!(f, "  {notice}")?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "  error: {error}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Detection;
    use crate::capture::SelectedImage;
    use crate::conversion::{ExchangeRate, MonetaryAmount};
    use std::path::PathBuf;

    #[test]
    fn manual_view_uses_two_decimals() {
        let mut session = Session::new(ExchangeRate::default());
        session.submit_manual("1200").unwrap();
        let view = session.view(Locale::KoKr);
        assert_eq!(
            view.results,
            vec![ResultRow {
                thb: "฿1,200".to_string(),
                krw: "₩46,560".to_string(),
            }]
        );

        session.submit_manual("10.01").unwrap();
        assert_eq!(session.view(Locale::KoKr).results[0].krw, "₩388.39");
    }

    #[test]
    fn photo_view_rounds_to_whole_won() {
        let mut session = Session::new(ExchangeRate::default());
        session.switch_mode(ModeKind::Photo);
        session
            .select_image(
                SelectedImage::from_bytes(PathBuf::from("m.jpg"), vec![0xff, 0xd8, 0xff], 64)
                    .unwrap(),
            )
            .unwrap();
        let (id, _) = session.begin_detection().unwrap();
        assert!(session.view(Locale::KoKr).detecting);

        session.complete_detection(
            id,
            Ok(Detection {
                amounts: vec![MonetaryAmount::new(10.01).unwrap()],
                model: "m".to_string(),
                provider: "Gemini".to_string(),
                timestamp: "t".to_string(),
            }),
        );
        let view = session.view(Locale::KoKr);
        assert!(!view.detecting);
        assert_eq!(view.results[0].krw, "₩388");
        assert!(view.to_string().contains("m.jpg"));
    }

    #[test]
    fn manual_error_is_rendered() {
        let mut session = Session::new(ExchangeRate::default());
        let _ = session.submit_manual("-5");
        let view = session.view(Locale::KoKr);
        assert!(view.results.is_empty());
        assert!(view.to_string().contains("error:"));
    }
}
