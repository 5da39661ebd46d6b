//! Rating regression detection.

/// Absolute star difference a rating must fall by, strictly, to count as a drop.
pub const DROP_THRESHOLD: f64 = 0.5;

/// `true` when `new_rating` is a significant regression from `old_rating`.
///
/// Missing or zero ratings carry no signal and never count as a drop.
#[must_use]
pub fn detect(old_rating: Option<f64>, new_rating: Option<f64>) -> bool {
    match (old_rating, new_rating) {
        (Some(old), Some(new)) if old > 0.0 && new > 0.0 => old > new + DROP_THRESHOLD,
        _ => false,
    }
}

/// Suffix appended to a link's note when a drop is detected. Ratings are
/// shown to one decimal, as in the alert e-mail.
#[must_use]
pub fn drop_annotation(old_rating: f64, new_rating: f64) -> String {
    format!(" | RATING DROPPED from {old_rating:.1} to {new_rating:.1}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_beyond_threshold_is_detected() {
        assert!(detect(Some(4.5), Some(3.9)));
        assert!(detect(Some(4.8), Some(4.0)));
    }

    #[test]
    fn drop_within_threshold_is_ignored() {
        assert!(!detect(Some(4.5), Some(4.1)));
        assert!(!detect(Some(4.5), Some(4.0)));
    }

    #[test]
    fn rises_are_ignored() {
        assert!(!detect(Some(3.0), Some(4.5)));
    }

    #[test]
    fn zero_or_missing_ratings_never_trigger() {
        assert!(!detect(Some(0.0), Some(3.0)));
        assert!(!detect(None, Some(3.0)));
        assert!(!detect(Some(4.5), None));
        assert!(!detect(Some(4.5), Some(0.0)));
    }

    #[test]
    fn annotation_formats_both_ratings() {
        assert_eq!(
            drop_annotation(4.8, 4.0),
            " | RATING DROPPED from 4.8 to 4.0"
        );
    }

    #[test]
    fn annotation_hides_rescaling_noise() {
        // 7.8 out of 10 rescaled to five stars.
        assert_eq!(
            drop_annotation(4.5, 3.900_000_000_000_000_4),
            " | RATING DROPPED from 4.5 to 3.9"
        );
    }
}
