//! Display formatting for amounts. Kept apart from `conversion` so the
//! arithmetic stays exact and locale-free.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FractionDigits {
    pub min: usize,
    pub max: usize,
}

impl FractionDigits {
    /// Manual-mode single result: up to two decimals.
    pub const MANUAL: Self = Self { min: 0, max: 2 };
    /// Photo-mode batch results: whole units only.
    pub const PHOTO: Self = Self { min: 0, max: 0 };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Locale {
    #[default]
    KoKr,
    ThTh,
    EnUs,
    DeDe,
}

impl Locale {
    pub fn tag(self) -> &'static str {
        match self {
            Locale::KoKr => "ko-KR",
            Locale::ThTh => "th-TH",
            Locale::EnUs => "en-US",
            Locale::DeDe => "de-DE",
        }
    }

    fn separators(self) -> (char, char) {
        match self {
            Locale::DeDe => ('.', ','),
            _ => (',', '.'),
        }
    }

    /// Unknown tags use Korean conventions.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "ko" | "ko-kr" => Locale::KoKr,
            "th" | "th-th" => Locale::ThTh,
            "en" | "en-us" => Locale::EnUs,
            "de" | "de-de" => Locale::DeDe,
            other => {
                log::debug!("Unknown locale tag {:?}, using ko-KR", other);
                Locale::KoKr
            }
        }
    }
}

impl FromStr for Locale {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_tag(s))
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl From<String> for Locale {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.tag().to_string()
    }
}

pub fn format_amount(value: f64, digits: FractionDigits, locale: Locale) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    // Values this large carry no fractional digits anyway.
    let scale = 10f64.powi(digits.max as i32);
    let scaled = value * scale;
    let rounded = if scaled.is_finite() {
        scaled.round() / scale
    } else {
        value
    };
    let fixed = format!("{:.*}", digits.max, rounded.abs());

    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (fixed.as_str(), ""),
    };

    let mut frac = frac_part.to_string();
    while frac.len() > digits.min && frac.ends_with('0') {
        frac.pop();
    }

    let (group_sep, decimal_sep) = locale.separators();
    let mut out = String::new();
    if rounded < 0.0 {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part, group_sep));
    if !frac.is_empty() {
        out.push(decimal_sep);
        out.push_str(&frac);
    }
    out
}

fn group_thousands(digits: &str, sep: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}

pub fn format_krw(value: f64, digits: FractionDigits, locale: Locale) -> String {
    format!("₩{}", format_amount(value, digits, locale))
}

pub fn format_thb(value: f64, digits: FractionDigits, locale: Locale) -> String {
    format!("฿{}", format_amount(value, digits, locale))
}
