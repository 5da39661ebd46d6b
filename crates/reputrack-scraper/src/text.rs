//! Text cleanup and number extraction for scraped page fragments.

use std::sync::LazyLock;

use regex::Regex;

static FIRST_DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("valid regex"));

/// A number immediately qualified as a rating somewhere in page markup.
pub(crate) static PAGE_RATING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*(?:out of 5|★|⭐)").expect("valid regex")
});

static STAR_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"(\d+(?:\.\d+)?)\s*[★⭐]").expect("valid regex"),
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*out of 5").expect("valid regex"),
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*stars?\b").expect("valid regex"),
        Regex::new(r"(?i)rating\s*:\s*(\d+)").expect("valid regex"),
    ]
});

static BOILERPLATE_RES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)\d+(?:\.\d+)?\s*out of 5 stars?").expect("valid regex"),
        Regex::new(r"\d+(?:\.\d+)?\s*[★⭐]").expect("valid regex"),
        Regex::new(r"(?i)\b\d+\s+(?:days?|weeks?|months?|years?)\s+ago\b").expect("valid regex"),
        Regex::new(r"(?i)\bread more\b").expect("valid regex"),
    ]
});

static INLINE_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

/// First decimal number in `text`, e.g. `4.2` from `"4.2 out of 5 stars"`.
#[must_use]
pub fn first_decimal(text: &str) -> Option<f64> {
    FIRST_DECIMAL_RE
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok())
}

/// Rating found by scanning raw page markup for a number followed by a
/// rating qualifier.
#[must_use]
pub fn page_text_rating(source: &str) -> Option<f64> {
    PAGE_RATING_RE
        .captures(source)
        .and_then(|c| c[1].parse::<f64>().ok())
}

/// The longest non-empty trimmed line of `text`. Ties go to the earliest
/// line.
#[must_use]
pub fn longest_line(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .fold(None, |best: Option<&str>, line| match best {
            Some(b) if b.chars().count() >= line.chars().count() => Some(b),
            _ => Some(line),
        })
}

/// Remove star tokens, relative dates, and "read more" labels.
#[must_use]
pub fn strip_boilerplate(text: &str) -> String {
    let mut cleaned = text.to_string();
    for re in BOILERPLATE_RES.iter() {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    INLINE_SPACE_RE
        .replace_all(cleaned.trim(), " ")
        .into_owned()
}

/// Star count embedded in `text` (`"4★"`, `"4.0 out of 5 stars"`,
/// `"Rating: 4"`), truncated to a whole star and capped at 5.
///
/// Zero is treated as "no rating shown".
#[must_use]
pub fn parse_star_count(text: &str) -> Option<u8> {
    let value = STAR_PATTERNS
        .iter()
        .find_map(|re| re.captures(text).and_then(|c| c[1].parse::<f64>().ok()))?;
    stars_from(value)
}

/// Leading whole number of `text`, for star widgets that render just `"4"`.
#[must_use]
pub fn bare_star_count(text: &str) -> Option<u8> {
    first_decimal(text.trim()).and_then(stars_from)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn stars_from(value: f64) -> Option<u8> {
    let whole = value.trunc();
    if !(1.0..).contains(&whole) {
        return None;
    }
    Some(whole.min(5.0) as u8)
}
