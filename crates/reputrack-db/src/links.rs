//! Database operations for the `tracked_links` table.

use chrono::{DateTime, Utc};
use reputrack_core::{LinkUpdate, Platform, Review, SentimentBreakdown, TrackedLink};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A `tracked_links` row joined with its product name and owner e-mail.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LinkRow {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub owner_email: Option<String>,
    pub platform: String,
    pub url: String,
    pub last_rating: Option<f64>,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub fake_ratio: Option<f64>,
    pub sentiment_score: Option<f64>,
    pub sentiment_breakdown: Option<Value>,
    pub scrape_note: Option<String>,
    pub reviews: Value,
}

impl TryFrom<LinkRow> for TrackedLink {
    type Error = DbError;

    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        let invalid = |column: &'static str, reason: String| DbError::InvalidRow {
            id: row.id,
            column,
            reason,
        };
        let platform: Platform = row
            .platform
            .parse()
            .map_err(|e: reputrack_core::CoreError| invalid("platform", e.to_string()))?;
        let sentiment_breakdown = row
            .sentiment_breakdown
            .clone()
            .map(serde_json::from_value::<SentimentBreakdown>)
            .transpose()
            .map_err(|e| invalid("sentiment_breakdown", e.to_string()))?;
        let reviews = match &row.reviews {
            Value::Null => Vec::new(),
            value => serde_json::from_value::<Vec<Review>>(value.clone())
                .map_err(|e| invalid("reviews", e.to_string()))?,
        };

        Ok(TrackedLink {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            owner_email: row.owner_email,
            platform,
            url: row.url,
            last_rating: row.last_rating,
            last_scraped_at: row.last_scraped_at,
            fake_ratio: row.fake_ratio,
            sentiment_score: row.sentiment_score,
            sentiment_breakdown,
            scrape_note: row.scrape_note,
            reviews,
        })
    }
}

const LINK_COLUMNS: &str = "SELECT l.id, l.product_id, p.name AS product_name, \
            u.email AS owner_email, l.platform, l.url, l.last_rating, \
            l.last_scraped_at, l.fake_ratio, l.sentiment_score, \
            l.sentiment_breakdown, l.scrape_note, l.reviews \
     FROM tracked_links l \
     JOIN products p ON p.id = l.product_id \
     LEFT JOIN users u ON u.id = p.user_id";

fn into_links(rows: Vec<LinkRow>) -> Result<Vec<TrackedLink>, DbError> {
    rows.into_iter().map(TrackedLink::try_from).collect()
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// List every link on one of `platforms`, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRow`]
/// if a stored snapshot cannot be decoded.
pub async fn list_links_by_platforms(
    pool: &PgPool,
    platforms: &[Platform],
) -> Result<Vec<TrackedLink>, DbError> {
    let names: Vec<String> = platforms.iter().map(|p| p.as_str().to_string()).collect();
    let rows = sqlx::query_as::<_, LinkRow>(&format!(
        "{LINK_COLUMNS} WHERE l.platform = ANY($1) ORDER BY l.id"
    ))
    .bind(names)
    .fetch_all(pool)
    .await?;

    into_links(rows)
}

/// List the links of one product, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRow`]
/// if a stored snapshot cannot be decoded.
pub async fn list_links_for_product(
    pool: &PgPool,
    product_id: i64,
) -> Result<Vec<TrackedLink>, DbError> {
    let rows = sqlx::query_as::<_, LinkRow>(&format!(
        "{LINK_COLUMNS} WHERE l.product_id = $1 ORDER BY l.id"
    ))
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    into_links(rows)
}

/// Fetch one link, or `None` if it does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRow`]
/// if the stored snapshot cannot be decoded.
pub async fn get_link(pool: &PgPool, link_id: i64) -> Result<Option<TrackedLink>, DbError> {
    let row = sqlx::query_as::<_, LinkRow>(&format!("{LINK_COLUMNS} WHERE l.id = $1"))
        .bind(link_id)
        .fetch_optional(pool)
        .await?;

    row.map(TrackedLink::try_from).transpose()
}

/// Record the outcome of one pass over a link in a single statement.
///
/// A `NULL` rating or timestamp keeps the stored value. The three score
/// columns and the review snapshot are replaced together when `analysis` is
/// present and left alone otherwise. The note is always overwritten.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the link does not exist,
/// [`DbError::Json`] if the snapshot cannot be serialised, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn apply_link_update(pool: &PgPool, update: &LinkUpdate) -> Result<(), DbError> {
    let analysis = update.analysis.as_ref();
    let breakdown = analysis
        .map(|a| serde_json::to_value(a.scores.sentiment_breakdown))
        .transpose()?;
    let reviews = analysis
        .map(|a| serde_json::to_value(&a.reviews))
        .transpose()?;

    let result = sqlx::query(
        "UPDATE tracked_links SET \
             last_rating = COALESCE($2, last_rating), \
             last_scraped_at = COALESCE($3, last_scraped_at), \
             fake_ratio = CASE WHEN $4 THEN $5 ELSE fake_ratio END, \
             sentiment_score = CASE WHEN $4 THEN $6 ELSE sentiment_score END, \
             sentiment_breakdown = CASE WHEN $4 THEN $7 ELSE sentiment_breakdown END, \
             reviews = CASE WHEN $4 THEN $8 ELSE reviews END, \
             scrape_note = $9, \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(update.link_id)
    .bind(update.rating)
    .bind(update.scraped_at)
    .bind(analysis.is_some())
    .bind(analysis.map(|a| a.scores.fake_ratio))
    .bind(analysis.map(|a| a.scores.sentiment_score))
    .bind(breakdown)
    .bind(reviews)
    .bind(&update.note)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    tracing::debug!(link_id = update.link_id, analysed = analysis.is_some(), "link snapshot written");
    Ok(())
}
