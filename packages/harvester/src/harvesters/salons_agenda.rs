//! National trade-show aggregator.
//!
//! Pages embed schema.org `Event` objects as JSON-LD; those are read first.
//! Pages without JSON-LD events are parsed from their HTML cards.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use super::listing::{finalize, parse_listing_page, ListingSelectors, RawListing};
use super::{HarvestBatch, HarvestContext, Harvester, SourcePage, VenueProfile};
use crate::normalize::{absolute_url, clean_text, parse_date, strip_tracking_params, DateSpan};
use crate::types::candidate::CandidateEvent;

pub const SOURCE: &str = "salons-agenda";
const LABEL: &str = "Agenda des salons";

const SELECTORS: ListingSelectors = ListingSelectors {
    containers: &[".salon-card", ".listing-salons .item", ".search-results article"],
    title: &[".salon-card__title", "h3", "h2", ".name"],
    description: &[".salon-card__excerpt", ".excerpt", "p"],
    date: &[".salon-card__dates", ".dates"],
    venue: &[".salon-card__place", ".place", ".lieu"],
    image: &["img"],
    link: &["a.salon-card__link", "h3 a", "h2 a"],
};

lazy_static! {
    static ref JSON_LD: Selector = Selector::parse(r#"script[type="application/ld+json"]"#).unwrap();
}

pub fn pages() -> Vec<SourcePage> {
    let venue = || {
        VenueProfile::new("Lieu à confirmer", "", "").with_attendance(1_000..=50_000, 20..=500)
    };
    vec![
        SourcePage::new("https://www.salons-online.fr/agenda/salons-professionnels", venue()),
        SourcePage::new("https://www.salons-online.fr/agenda/congres", venue()),
    ]
}

pub struct SalonsAgendaHarvester {
    ctx: HarvestContext,
    pages: Vec<SourcePage>,
}

impl SalonsAgendaHarvester {
    pub fn new(ctx: HarvestContext) -> Self {
        Self { ctx, pages: pages() }
    }

    pub fn fallback_events(today: NaiveDate) -> Vec<CandidateEvent> {
        let start = today + Duration::days(35);
        vec![
            CandidateEvent::new(
                "Salon des Entrepreneurs Lyon",
                start,
                "https://www.salons-online.fr/agenda/salons-professionnels#salon-des-entrepreneurs-lyon",
                SOURCE,
            )
            .with_end_date(Some(start + Duration::days(1)))
            .with_description("Salon professionnel des créateurs et dirigeants d'entreprise, conférences et networking")
            .with_venue("Centre de Congrès de Lyon", "Lyon", "50 Quai Charles de Gaulle, 69006 Lyon")
            .with_estimates(Some(12_000), Some(200)),
            CandidateEvent::new(
                "Salon des Maires et des Collectivités Locales",
                today + Duration::days(70),
                "https://www.salons-online.fr/agenda/salons-professionnels#salon-des-maires",
                SOURCE,
            )
            .with_end_date(Some(today + Duration::days(72)))
            .with_description("Salon professionnel des acheteurs publics, fournisseurs et décideurs territoriaux")
            .with_venue(
                "Paris Expo Porte de Versailles",
                "Paris",
                "1 Place de la Porte de Versailles, 75015 Paris",
            )
            .with_estimates(Some(50_000), Some(1_000)),
        ]
    }
}

/// Events from every JSON-LD block of a page, including `@graph` members.
pub fn jsonld_listings(document: &Html, page_url: &str) -> Vec<RawListing> {
    let mut listings = Vec::new();
    for script in document.select(&JSON_LD) {
        let text: String = script.text().collect();
        let Ok(value) = serde_json::from_str::<Value>(&text) else {
            debug!(url = %page_url, "Skipping unparseable JSON-LD block");
            continue;
        };
        let mut events = Vec::new();
        collect_events(&value, &mut events);
        listings.extend(events.into_iter().map(|event| listing_from_event(event, page_url)));
    }
    listings
}

fn is_event_type(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(ty)) => ty.ends_with("Event"),
        Some(Value::Array(types)) => types.iter().any(|ty| is_event_type(Some(ty))),
        _ => false,
    }
}

fn collect_events<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_events(item, out)),
        Value::Object(map) => {
            if is_event_type(map.get("@type")) {
                out.push(value);
            }
            if let Some(graph) = map.get("@graph") {
                collect_events(graph, out);
            }
        }
        _ => {}
    }
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(clean_text(s)).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `"x"`, `["x", ..]` or `{"url": "x"}`.
fn url_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            other => text_field(other, "url"),
        }),
        other => text_field(other, "url"),
    }
}

fn listing_from_event(event: &Value, page_url: &str) -> RawListing {
    let mut raw = RawListing {
        title: text_field(event, "name").unwrap_or_default(),
        description: text_field(event, "description").unwrap_or_default(),
        ..Default::default()
    };

    if let Some(start) = text_field(event, "startDate").as_deref().and_then(parse_date) {
        let end = text_field(event, "endDate").as_deref().and_then(parse_date);
        raw.dates = Some(DateSpan::new(start, end));
    }

    match event.get("location") {
        Some(Value::String(place)) => raw.venue_text = clean_text(place),
        Some(location @ Value::Object(_)) => {
            raw.venue_text = text_field(location, "name").unwrap_or_default();
            match location.get("address") {
                Some(Value::String(address)) => raw.address = Some(clean_text(address)),
                Some(address @ Value::Object(_)) => {
                    let street = text_field(address, "streetAddress");
                    let postal = text_field(address, "postalCode");
                    let locality = text_field(address, "addressLocality");
                    let line = [street, postal.zip(locality.clone()).map(|(p, l)| format!("{} {}", p, l))]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join(", ");
                    if !line.is_empty() {
                        raw.address = Some(line);
                    }
                    raw.city = locality;
                }
                _ => {}
            }
        }
        _ => {}
    }

    raw.organizer = match event.get("organizer") {
        Some(Value::String(name)) => Some(clean_text(name)),
        Some(organizer) => text_field(organizer, "name"),
        None => None,
    };

    let offer = match event.get("offers") {
        Some(Value::Array(offers)) => offers.first(),
        other => other,
    };
    raw.entry_fee = offer.and_then(entry_fee);

    raw.image = url_field(event, "image").and_then(|src| absolute_url(page_url, &src));
    raw.link = url_field(event, "url")
        .and_then(|href| absolute_url(page_url, &href))
        .map(|url| strip_tracking_params(&url));
    raw
}

/// Display text for a schema.org `Offer`; a zero price reads "Gratuit".
fn entry_fee(offer: &Value) -> Option<String> {
    let price = text_field(offer, "price")?;
    let amount = price.trim().replace(',', ".").parse::<f64>().ok();
    if amount == Some(0.0) {
        return Some("Gratuit".to_string());
    }
    Some(match text_field(offer, "priceCurrency") {
        Some(currency) => format!("{} {}", price, currency),
        None => price,
    })
}

/// JSON-LD events when the page has any, else its HTML cards.
pub fn parse_page(html: &str, page: &SourcePage, today: NaiveDate) -> Vec<CandidateEvent> {
    let document = Html::parse_document(html);
    let listings = jsonld_listings(&document, &page.url);
    if listings.is_empty() {
        return parse_listing_page(html, page, &SELECTORS, LABEL, SOURCE, today);
    }
    listings
        .into_iter()
        .enumerate()
        .map(|(index, raw)| finalize(raw, index, page, LABEL, SOURCE, today))
        .collect()
}

#[async_trait]
impl Harvester for SalonsAgendaHarvester {
    fn source(&self) -> &str {
        SOURCE
    }

    async fn scrape_events(&self) -> HarvestBatch {
        let today = Utc::now().date_naive();
        let (events, errors) = self
            .ctx
            .fetch_pages(SOURCE, &self.pages, |page, html| parse_page(html, page, today))
            .await;
        self.ctx
            .finish(SOURCE, events, errors, || Self::fallback_events(today))
    }
}
