//! HTML job card extraction.

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use tracing::debug;

use crate::models::NewOffer;

/// Offers found on one page, plus how many job cards the page carried.
///
/// Pagination looks at `cards`, not `offers.len()`: a page of ten cards with
/// one incomplete card is still a full page.
#[derive(Debug, Default)]
pub struct ExtractedPage {
    pub offers: Vec<NewOffer>,
    pub cards: usize,
}

struct CardSelectors {
    item: Selector,
    card: Selector,
    urn: Selector,
    title: Selector,
    company: Selector,
    location: Selector,
    time: Selector,
}

impl CardSelectors {
    fn get() -> Option<&'static Self> {
        static INSTANCE: OnceLock<Option<CardSelectors>> = OnceLock::new();
        INSTANCE
            .get_or_init(|| {
                Some(Self {
                    item: Selector::parse("li").ok()?,
                    card: Selector::parse(".base-search-card").ok()?,
                    urn: Selector::parse("[data-entity-urn]").ok()?,
                    title: Selector::parse(".base-search-card__title").ok()?,
                    company: Selector::parse(".base-search-card__subtitle a").ok()?,
                    location: Selector::parse(".job-search-card__location").ok()?,
                    time: Selector::parse("time").ok()?,
                })
            })
            .as_ref()
    }
}

/// Collapses every run of whitespace, newlines included, into one space.
#[must_use]
pub fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_of(item: &ElementRef<'_>, selector: &Selector) -> String {
    item.select(selector)
        .next()
        .map(|el| normalize(&el.text().collect::<String>()))
        .unwrap_or_default()
}

/// `urn:li:jobPosting:4322119156` -> `4322119156`
fn id_from_urn(urn: &str) -> &str {
    urn.rsplit(':').next().unwrap_or_default().trim()
}

fn parse_card(item: &ElementRef<'_>, sel: &CardSelectors, fallback_date: NaiveDate) -> Option<NewOffer> {
    let id = item
        .select(&sel.urn)
        .next()
        .and_then(|el| el.value().attr("data-entity-urn"))
        .map(id_from_urn)
        .unwrap_or_default()
        .to_string();

    let title = text_of(item, &sel.title);

    if id.is_empty() || title.is_empty() {
        debug!(%id, %title, "Dropping incomplete job card");
        return None;
    }

    let posted_at = item
        .select(&sel.time)
        .next()
        .and_then(|el| el.value().attr("datetime"))
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        .unwrap_or(fallback_date);

    Some(NewOffer {
        id,
        title,
        company: text_of(item, &sel.company),
        location: text_of(item, &sel.location),
        posted_at,
    })
}

/// Parses a search results page into offers. Cards lacking an id or a title are
/// skipped; a missing or malformed posting date falls back to `fallback_date`.
#[must_use]
pub fn extract_offers(html: &str, fallback_date: NaiveDate) -> ExtractedPage {
    let Some(sel) = CardSelectors::get() else {
        return ExtractedPage::default();
    };

    let document = Html::parse_fragment(html);
    let mut page = ExtractedPage::default();

    for item in document.select(&sel.item) {
        if item.select(&sel.card).next().is_none() {
            continue;
        }
        page.cards += 1;

        if let Some(offer) = parse_card(&item, sel, fallback_date) {
            page.offers.push(offer);
        }
    }

    page
}
