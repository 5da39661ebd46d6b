use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::review::{Review, ScoreSnapshot, SentimentBreakdown};

/// A product page being watched on one platform, with its most recent
/// analysis results.
///
/// `fake_ratio`, `sentiment_score`, `sentiment_breakdown` and `reviews` always
/// describe the same run: they are written together or not at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedLink {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    /// Recipient of rating-drop alerts; `None` when the owner has no address.
    pub owner_email: Option<String>,
    pub platform: Platform,
    pub url: String,
    pub last_rating: Option<f64>,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub fake_ratio: Option<f64>,
    pub sentiment_score: Option<f64>,
    pub sentiment_breakdown: Option<SentimentBreakdown>,
    pub scrape_note: Option<String>,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

impl TrackedLink {
    /// A link that has never been analysed.
    #[must_use]
    pub fn new(
        id: i64,
        product_id: i64,
        product_name: impl Into<String>,
        platform: Platform,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id,
            product_id,
            product_name: product_name.into(),
            owner_email: None,
            platform,
            url: url.into(),
            last_rating: None,
            last_scraped_at: None,
            fake_ratio: None,
            sentiment_score: None,
            sentiment_breakdown: None,
            scrape_note: None,
            reviews: Vec::new(),
        }
    }

    /// Apply `update` with the same rules the database write uses.
    pub fn apply(&mut self, update: &LinkUpdate) {
        if let Some(rating) = update.rating {
            self.last_rating = Some(rating);
        }
        if let Some(scraped_at) = update.scraped_at {
            self.last_scraped_at = Some(scraped_at);
        }
        if let Some(analysis) = &update.analysis {
            self.fake_ratio = Some(analysis.scores.fake_ratio);
            self.sentiment_score = Some(analysis.scores.sentiment_score);
            self.sentiment_breakdown = Some(analysis.scores.sentiment_breakdown);
            self.reviews.clone_from(&analysis.reviews);
        }
        self.scrape_note = Some(update.note.clone());
    }
}

/// Scores and the fully annotated review snapshot they were computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkAnalysis {
    pub scores: ScoreSnapshot,
    pub reviews: Vec<Review>,
}

/// The single write recorded for a link at the end of a pass.
///
/// `None` fields keep the stored value: a missing rating never erases a
/// previous one, and a missing analysis leaves all score fields and the
/// review snapshot untouched. The note is always replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkUpdate {
    pub link_id: i64,
    pub rating: Option<f64>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub analysis: Option<LinkAnalysis>,
    pub note: String,
}

impl LinkUpdate {
    /// An update that only replaces the note.
    #[must_use]
    pub fn note_only(link_id: i64, note: impl Into<String>) -> Self {
        Self {
            link_id,
            rating: None,
            scraped_at: None,
            analysis: None,
            note: note.into(),
        }
    }
}
