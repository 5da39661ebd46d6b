//! Per-platform extraction profiles.
//!
//! Selectors target the layouts seen on each site, newest layout first,
//! generic last. They go stale as sites ship redesigns; add new selectors at
//! the front of the relevant list rather than replacing old ones, since
//! regional variants often lag behind.

use reputrack_core::{Platform, RatingScale, DEFAULT_STARS};

use crate::browser::Locator;
use crate::strategy::{
    BodySource, ContainerStrategy, LocatorRating, MarkedContainers, PageTextRating,
    RatingStrategy, ReviewFields, SelectorContainers, StarSource,
};

/// Everything the extractor needs to know about one site.
pub struct PlatformProfile {
    pub platform: Platform,
    pub rating: Vec<Box<dyn RatingStrategy>>,
    /// Controls that block the page (login pop-ups) and should be dismissed
    /// before reading anything.
    pub dismiss: Vec<Locator>,
    /// Review sections to scroll into view, first present wins.
    pub scroll_targets: Vec<Locator>,
    /// Fraction of page height to scroll to when no section is present.
    pub scroll_fraction: f64,
    pub containers: Vec<Box<dyn ContainerStrategy>>,
    /// "Load more" style controls tried when no container qualifies.
    pub reveal: Vec<Locator>,
    pub fields: ReviewFields,
    pub extra_headers: Vec<(&'static str, &'static str)>,
    pub default_scale: RatingScale,
}

impl PlatformProfile {
    /// The built-in profile for `platform`.
    #[must_use]
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Amazon => amazon(),
            Platform::Flipkart => flipkart(),
            Platform::Myntra => myntra(),
            Platform::Meesho => meesho(),
            Platform::Snapdeal => snapdeal(),
        }
    }
}

fn locator_ratings(selectors: &[&str]) -> Vec<Box<dyn RatingStrategy>> {
    let mut chain: Vec<Box<dyn RatingStrategy>> = selectors
        .iter()
        .map(|s| Box::new(LocatorRating(Locator::css(s))) as Box<dyn RatingStrategy>)
        .collect();
    chain.push(Box::new(PageTextRating));
    chain
}

fn selector_containers(selectors: &[&str], min_chars: usize) -> Vec<Box<dyn ContainerStrategy>> {
    selectors
        .iter()
        .map(|s| Box::new(SelectorContainers::css(s, min_chars)) as Box<dyn ContainerStrategy>)
        .collect()
}

fn css_all(selectors: &[&str]) -> Vec<Locator> {
    selectors.iter().map(|s| Locator::css(s)).collect()
}

/// Line-oriented review cards: body is the longest line, stars come from a
/// `N★` token.
fn line_fields(min_chars: usize) -> ReviewFields {
    ReviewFields {
        body: vec![BodySource::LongestLine],
        stars: vec![StarSource::ContainerText],
        min_chars,
        default_stars: DEFAULT_STARS,
    }
}

fn amazon() -> PlatformProfile {
    PlatformProfile {
        platform: Platform::Amazon,
        rating: locator_ratings(&[
            r#"span[data-hook="rating-out-of-text"]"#,
            r#"i[data-hook="average-star-rating"] span.a-icon-alt"#,
            "span.a-icon-alt",
        ]),
        dismiss: Vec::new(),
        scroll_targets: css_all(&[r#"div[data-hook="reviews-medley-footer"]"#, "div#reviewsMedley"]),
        scroll_fraction: 0.5,
        containers: selector_containers(
            &[r#"[data-hook="review"]"#, r#"div[id^="customer_review"]"#],
            10,
        ),
        reveal: vec![
            Locator::css(r#"a[data-hook="see-all-reviews-link-foot"]"#),
            Locator::text_control("a", "See more reviews"),
            Locator::text_control("a", "See all reviews"),
        ],
        fields: ReviewFields {
            body: vec![
                BodySource::Within(Locator::css(r#"[data-hook="review-body"] span"#)),
                BodySource::Within(Locator::css(r#"[data-hook="review-body"]"#)),
                BodySource::LongestLine,
            ],
            stars: vec![
                StarSource::Within(Locator::css(
                    r#"[data-hook="review-star-rating"] span.a-icon-alt, [data-hook="cmps-review-star-rating"] span.a-icon-alt"#,
                )),
                StarSource::ContainerText,
            ],
            min_chars: 10,
            default_stars: DEFAULT_STARS,
        },
        extra_headers: Vec::new(),
        default_scale: RatingScale::FivePoint,
    }
}

fn flipkart() -> PlatformProfile {
    let mut containers = selector_containers(
        &[
            "div.cPHDOP",
            "div._27M-vq",
            "div.col.JOpGWq",
            r#"div[class*="review"]"#,
            "div.RcXBOT",
            "div._1PBCrt",
            "div.col._2wzgFH",
            "div.row._2nQjXd",
            "div._1AtVbE",
            "div.col-9-12",
        ],
        30,
    );
    containers.push(Box::new(MarkedContainers {
        locator: Locator::css("div.row"),
        markers: vec!["★", "Certified Buyer"],
        min_chars: 50,
        max_chars: 1500,
    }));
    containers.push(Box::new(MarkedContainers {
        locator: Locator::css("p"),
        markers: vec!["★"],
        min_chars: 50,
        max_chars: 1500,
    }));

    PlatformProfile {
        platform: Platform::Flipkart,
        rating: locator_ratings(&[
            "div._3LWZlK",
            "div.XQDdHH",
            "div._3LWZlK.FxZV4W",
            "span._1lRcqv",
            r#"div[class*="gUuXy"]"#,
        ]),
        dismiss: vec![
            Locator::css("button._2KpZ6l._2doB4z"),
            Locator::css("span._30XB9F"),
            Locator::css(r#"button[class*="close"]"#),
            Locator::text_control("button", "✕"),
        ],
        scroll_targets: Vec::new(),
        scroll_fraction: 0.6,
        containers,
        reveal: vec![
            Locator::xpath(
                "//a[starts-with(normalize-space(.), 'All') and contains(normalize-space(.), 'reviews')]",
            ),
            Locator::xpath(
                "//span[starts-with(normalize-space(.), 'All') and contains(normalize-space(.), 'reviews')]",
            ),
            Locator::text_control("a", "View all reviews"),
            Locator::text_control("a", "See all reviews"),
        ],
        fields: line_fields(20),
        extra_headers: Vec::new(),
        default_scale: RatingScale::FivePoint,
    }
}

fn myntra() -> PlatformProfile {
    PlatformProfile {
        platform: Platform::Myntra,
        rating: locator_ratings(&[
            "div.index-overallRating",
            "span.index-overallRating",
            r#"div[class*="rating"]"#,
        ]),
        dismiss: Vec::new(),
        scroll_targets: Vec::new(),
        scroll_fraction: 0.7,
        containers: selector_containers(
            &[
                "div.detailed-reviews-userReviewsContainer",
                r#"div[class*="userReview"]"#,
                "div.user-review-main",
            ],
            20,
        ),
        reveal: vec![
            Locator::css("a.detailed-reviews-allReviews"),
            Locator::text_control("a", "View all"),
        ],
        fields: line_fields(20),
        extra_headers: Vec::new(),
        default_scale: RatingScale::FivePoint,
    }
}

fn snapdeal() -> PlatformProfile {
    PlatformProfile {
        platform: Platform::Snapdeal,
        rating: locator_ratings(&["span.avrg-rating", r#"div[class*="rating"]"#, "span.filled-stars"]),
        dismiss: Vec::new(),
        scroll_targets: Vec::new(),
        scroll_fraction: 0.6,
        containers: selector_containers(
            &["div.user-review", r#"div[class*="review-box"]"#, "li.review-list"],
            20,
        ),
        reveal: vec![Locator::text_control("a", "View All Reviews")],
        fields: line_fields(20),
        extra_headers: Vec::new(),
        default_scale: RatingScale::FivePoint,
    }
}

const MEESHO_STAR_WIDGETS: &str =
    r#"div.star-rating, div.rating-stars, span.stars, div[class*="star"]"#;

fn meesho() -> PlatformProfile {
    PlatformProfile {
        platform: Platform::Meesho,
        rating: locator_ratings(&[
            "div.rating",
            "div.average-rating",
            "span.rating",
            r#"div[class*="rating"]"#,
            "div.rating-container",
            "div.product__rating",
            "div.star-rating",
        ]),
        dismiss: Vec::new(),
        scroll_targets: css_all(&[
            "div.reviews",
            "div.customer-reviews",
            "div.feedback",
            "div.review-section",
        ]),
        scroll_fraction: 0.7,
        containers: selector_containers(
            &[
                "div.review-card",
                "div.review-item",
                "div.feedback-card",
                "div.customer-review",
                r#"div[class*="review-card"]"#,
                r#"div[class*="review-item"]"#,
            ],
            10,
        ),
        reveal: vec![
            Locator::text_control("button", "Load More"),
            Locator::text_control("button", "See More Reviews"),
            Locator::css("div.load-more"),
            Locator::css("button.show-more"),
            Locator::text_control("a", "View All Reviews"),
        ],
        fields: ReviewFields {
            body: [
                "div.review-text",
                "div.review-content",
                "div.feedback-text",
                "div.comment",
                "p.review-text",
                "span.review-text",
            ]
            .iter()
            .map(|s| BodySource::Within(Locator::css(s)))
            .chain(std::iter::once(BodySource::LongestLine))
            .collect(),
            stars: vec![
                StarSource::FilledIcons {
                    widget: Locator::css(MEESHO_STAR_WIDGETS),
                    filled: Locator::css(
                        r##"svg[fill*="#FF"], svg[fill*="#ff"], span.filled, div.active"##,
                    ),
                },
                StarSource::Within(Locator::css(&format!(
                    r#"{MEESHO_STAR_WIDGETS}, div[class*="rating"]"#
                ))),
                StarSource::ContainerText,
            ],
            min_chars: 10,
            default_stars: DEFAULT_STARS,
        },
        extra_headers: vec![
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
            ("Accept-Language", "en-US,en;q=0.5"),
            ("DNT", "1"),
            ("Upgrade-Insecure-Requests", "1"),
            ("Sec-Fetch-Dest", "document"),
            ("Sec-Fetch-Mode", "navigate"),
            ("Sec-Fetch-Site", "none"),
            ("Sec-Fetch-User", "?1"),
        ],
        default_scale: RatingScale::Adaptive(10.0),
    }
}
