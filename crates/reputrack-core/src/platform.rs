//! Supported e-commerce platforms and the rating scale policy applied to
//! the numbers they report.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// An e-commerce site whose product pages the extractor knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Amazon,
    Flipkart,
    Myntra,
    Meesho,
    Snapdeal,
}

impl Platform {
    /// Every supported platform, in the order batches process them by default.
    pub const ALL: [Platform; 5] = [
        Platform::Amazon,
        Platform::Flipkart,
        Platform::Myntra,
        Platform::Meesho,
        Platform::Snapdeal,
    ];

    /// Lowercase identifier stored in `tracked_links.platform`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Amazon => "amazon",
            Platform::Flipkart => "flipkart",
            Platform::Myntra => "myntra",
            Platform::Meesho => "meesho",
            Platform::Snapdeal => "snapdeal",
        }
    }

    /// Human-readable site name used in notifications.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Amazon => "Amazon",
            Platform::Flipkart => "Flipkart",
            Platform::Myntra => "Myntra",
            Platform::Meesho => "Meesho",
            Platform::Snapdeal => "Snapdeal",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amazon" => Ok(Platform::Amazon),
            "flipkart" => Ok(Platform::Flipkart),
            "myntra" => Ok(Platform::Myntra),
            "meesho" => Ok(Platform::Meesho),
            "snapdeal" => Ok(Platform::Snapdeal),
            other => Err(CoreError::UnknownPlatform(other.to_string())),
        }
    }
}

/// How a raw number read from a product page maps onto the 0-5 star scale.
///
/// Whether a platform reports out of 5 or out of 10 has not been verified
/// for every site, so the policy is per-platform configuration rather than
/// fixed arithmetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingScale {
    /// The platform reports out of 5; anything larger is not a rating.
    FivePoint,
    /// Values above 5 are capped at 5.
    Clamp,
    /// The platform always reports out of `n`; rescale every value.
    OutOf(f64),
    /// Values above 5 are assumed to be out of `n` and rescaled; values up
    /// to 5 are kept as reported.
    Adaptive(f64),
}

impl RatingScale {
    /// Map a raw page value onto the 0-5 scale.
    ///
    /// Returns `None` for negative or non-finite input, or for values the
    /// policy cannot place on the scale.
    #[must_use]
    pub fn normalize(self, raw: f64) -> Option<f64> {
        if !raw.is_finite() || raw < 0.0 {
            return None;
        }
        let value = match self {
            RatingScale::FivePoint => (raw <= 5.0).then_some(raw)?,
            RatingScale::Clamp => raw.min(5.0),
            RatingScale::OutOf(n) => {
                if n <= 0.0 || raw > n {
                    return None;
                }
                raw * 5.0 / n
            }
            RatingScale::Adaptive(n) => {
                if raw <= 5.0 {
                    raw
                } else if n > 5.0 && raw <= n {
                    raw * 5.0 / n
                } else {
                    return None;
                }
            }
        };
        Some(crate::round3(value))
    }
}

impl FromStr for RatingScale {
    type Err = CoreError;

    /// Parses `five`, `clamp`, `out_of:N`, or `adaptive:N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        let invalid = || CoreError::InvalidRatingScale(s.to_string());

        let parse_n = |n: &str| -> Result<f64, CoreError> {
            n.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v > 0.0)
                .ok_or_else(invalid)
        };

        match raw.split_once(':') {
            None if raw == "five" => Ok(RatingScale::FivePoint),
            None if raw == "clamp" => Ok(RatingScale::Clamp),
            Some(("out_of", n)) => Ok(RatingScale::OutOf(parse_n(n)?)),
            Some(("adaptive", n)) => Ok(RatingScale::Adaptive(parse_n(n)?)),
            _ => Err(invalid()),
        }
    }
}
