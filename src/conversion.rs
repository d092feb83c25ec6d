use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// KRW per one THB used when no usable rate has been entered.
pub const DEFAULT_RATE: f64 = 38.8;

/// An amount in Thai Baht. Always finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct MonetaryAmount(f64);

impl MonetaryAmount {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(AppError::Validation(
                "Please enter a valid number.".to_string(),
            ));
        }
        if value < 0.0 {
            return Err(AppError::Validation(
                "Please enter a non-negative amount.".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for MonetaryAmount {
    type Error = AppError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<MonetaryAmount> for f64 {
    fn from(amount: MonetaryAmount) -> Self {
        amount.0
    }
}

/// Units of KRW per one unit of THB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ExchangeRate(f64);

impl ExchangeRate {
    /// Accepts only finite, positive rates.
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && value > 0.0).then_some(Self(value))
    }

    /// Rate typed into the rate field. Anything non-numeric or not positive
    /// falls back to the default for computation.
    pub fn parse_or_default(text: &str) -> Self {
        text.trim()
            .parse::<f64>()
            .ok()
            .and_then(Self::new)
            .unwrap_or_default()
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for ExchangeRate {
    type Error = AppError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value).ok_or_else(|| {
            AppError::Validation("Exchange rate must be a positive number.".to_string())
        })
    }
}

impl From<ExchangeRate> for f64 {
    fn from(rate: ExchangeRate) -> Self {
        rate.0
    }
}

impl Default for ExchangeRate {
    fn default() -> Self {
        Self(DEFAULT_RATE)
    }
}

/// No rounding happens here; display precision belongs to the formatter.
pub fn convert(amount: MonetaryAmount, rate: ExchangeRate) -> f64 {
    amount.value() * rate.value()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub original: MonetaryAmount,
    pub converted: f64,
}

impl ConversionResult {
    /// Fails when the product overflows to infinity.
    pub fn new(original: MonetaryAmount, rate: ExchangeRate) -> Result<Self> {
        Ok(Self {
            original,
            converted: checked_convert(original, rate)?,
        })
    }

    /// Rebuilds the converted value from the stored original, never from the
    /// previous converted value. Leaves `self` untouched on overflow.
    pub fn recompute(&mut self, rate: ExchangeRate) -> Result<()> {
        self.converted = checked_convert(self.original, rate)?;
        Ok(())
    }
}

fn checked_convert(amount: MonetaryAmount, rate: ExchangeRate) -> Result<f64> {
    let converted = convert(amount, rate);
    if converted.is_finite() {
        Ok(converted)
    } else {
        Err(AppError::Validation(
            "The converted amount is too large to display.".to_string(),
        ))
    }
}

/// Parses the manual-entry field. Thousands separators (`,` and `_`) are
/// tolerated; empty, non-numeric and negative input is rejected.
pub fn parse_manual_amount(text: &str) -> Result<MonetaryAmount> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();

    if cleaned.is_empty() {
        return Err(AppError::Validation(
            "Please enter an amount in THB.".to_string(),
        ));
    }

    let value: f64 = cleaned
        .parse()
        .map_err(|_| AppError::Validation("Please enter a valid number.".to_string()))?;

    MonetaryAmount::new(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(v: f64) -> MonetaryAmount {
        MonetaryAmount::new(v).unwrap()
    }

    #[test]
    fn convert_is_plain_multiplication() {
        for (a, r) in [(0.0, 38.8), (1.0, 38.8), (1200.0, 38.8), (99.99, 40.0), (0.01, 0.5)] {
            let rate = ExchangeRate::new(r).unwrap();
            assert_eq!(convert(amount(a), rate), a * r);
        }
    }

    #[test]
    fn manual_1200_at_default_rate() {
        let parsed = parse_manual_amount("1200").unwrap();
        let result = ConversionResult::new(parsed, ExchangeRate::default()).unwrap();
        assert_eq!(result.converted, 1200.0 * 38.8);
        assert!((result.converted - 46_560.0).abs() < 1e-6);
    }

    #[test]
    fn recompute_uses_original_amount() {
        let mut result = ConversionResult::new(amount(1000.0), ExchangeRate::default()).unwrap();
        assert!((result.converted - 38_800.0).abs() < 1e-6);

        result.recompute(ExchangeRate::new(40.0).unwrap()).unwrap();
        assert_eq!(result.converted, 40_000.0);

        result.recompute(ExchangeRate::new(40.0).unwrap()).unwrap();
        assert_eq!(result.converted, 40_000.0);
    }

    #[test]
    fn manual_input_rejects_negative_and_text() {
        assert!(matches!(
            parse_manual_amount("-5"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            parse_manual_amount("abc"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(parse_manual_amount("   "), Err(AppError::Validation(_))));
        assert!(matches!(parse_manual_amount("inf"), Err(AppError::Validation(_))));
        assert!(matches!(parse_manual_amount("NaN"), Err(AppError::Validation(_))));
    }

    #[test]
    fn manual_input_accepts_grouping() {
        assert_eq!(parse_manual_amount("1,250.50").unwrap().value(), 1250.5);
        assert_eq!(parse_manual_amount(" 10_000 ").unwrap().value(), 10_000.0);
    }

    #[test]
    fn rate_falls_back_to_default() {
        assert_eq!(ExchangeRate::parse_or_default("abc").value(), DEFAULT_RATE);
        assert_eq!(ExchangeRate::parse_or_default("0").value(), DEFAULT_RATE);
        assert_eq!(ExchangeRate::parse_or_default("-3").value(), DEFAULT_RATE);
        assert_eq!(ExchangeRate::parse_or_default("").value(), DEFAULT_RATE);
        assert_eq!(ExchangeRate::parse_or_default(" 41.25 ").value(), 41.25);
    }

    #[test]
    fn overflowing_product_is_rejected() {
        let huge = parse_manual_amount("1e307").unwrap();
        assert!(matches!(
            ConversionResult::new(huge, ExchangeRate::default()),
            Err(AppError::Validation(_))
        ));

        let mut result = ConversionResult::new(amount(1e300), ExchangeRate::default()).unwrap();
        let before = result.converted;
        assert!(result.recompute(ExchangeRate::new(1e10).unwrap()).is_err());
        assert_eq!(result.converted, before);
    }

    #[test]
    fn rate_deserialization_enforces_invariant() {
        let ok: ExchangeRate = serde_json::from_str("40.5").unwrap();
        assert_eq!(ok.value(), 40.5);
        assert!(serde_json::from_str::<ExchangeRate>("0").is_err());
        assert!(serde_json::from_str::<ExchangeRate>("-38.8").is_err());
    }

    #[test]
    fn amount_deserialization_enforces_invariant() {
        let ok: MonetaryAmount = serde_json::from_str("12.5").unwrap();
        assert_eq!(ok.value(), 12.5);
        assert!(serde_json::from_str::<MonetaryAmount>("-1").is_err());
    }
}
