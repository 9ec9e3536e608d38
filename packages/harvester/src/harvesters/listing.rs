//! Listing-page extraction shared by the HTML harvesters.
//!
//! A page is split into fragments (one per event card), each fragment is read
//! into a [`RawListing`], and [`finalize`] fills the gaps with page defaults.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

use super::{estimate, SourcePage};
use crate::normalize::{
    absolute_url, clean_text, element_text, first_attr, first_text, fold_accents, parse_date,
    parse_date_range, parse_venue, slugify, strip_tracking_params, DateSpan,
};
use crate::types::candidate::CandidateEvent;

/// Words that mark a block of text as an event listing.
pub const HEURISTIC_KEYWORDS: &[&str] = &["salon", "expo", "congres", "forum", "convention", "conference"];

const HEURISTIC_MIN_CHARS: usize = 10;
const HEURISTIC_MAX_CHARS: usize = 800;

/// Attributes carrying an image URL, lazy-loading attributes first.
const IMAGE_ATTRS: &[&str] = &["data-src", "data-lazy-src", "src"];

lazy_static! {
    static ref HEURISTIC_FRAGMENTS: Selector = Selector::parse("article, li, div").unwrap();
    static ref TIME_DATETIME: Selector = Selector::parse("time[datetime]").unwrap();
    static ref DEFINITION_LIST: Selector = Selector::parse("dl").unwrap();
    static ref DEFINITION_TERM: Selector = Selector::parse("dt").unwrap();
    static ref DEFINITION_VALUE: Selector = Selector::parse("dd").unwrap();
}

/// CSS selector candidates for one site's markup, most specific first.
#[derive(Debug, Clone, Copy)]
pub struct ListingSelectors {
    pub containers: &'static [&'static str],
    pub title: &'static [&'static str],
    pub description: &'static [&'static str],
    pub date: &'static [&'static str],
    pub venue: &'static [&'static str],
    pub image: &'static [&'static str],
    pub link: &'static [&'static str],
}

/// Whatever a fragment said about its event, before defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawListing {
    pub title: String,
    pub description: String,
    pub date_text: String,
    /// Dates read from structured markup; wins over `date_text`
    pub dates: Option<DateSpan>,
    pub venue_text: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub organizer: Option<String>,
    pub entry_fee: Option<String>,
    pub visitors: Option<u32>,
    pub exhibitors: Option<u32>,
    pub image: Option<String>,
    pub link: Option<String>,
}

/// Event fragments of a document: the first container selector with a
/// match, else keyword-bearing blocks of plausible size.
pub fn select_fragments<'a>(document: &'a Html, containers: &[&str]) -> Vec<ElementRef<'a>> {
    for selector_str in containers {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let found: Vec<ElementRef> = document.select(&selector).collect();
        if !found.is_empty() {
            return found;
        }
    }
    heuristic_fragments(document)
}

fn heuristic_fragments(document: &Html) -> Vec<ElementRef<'_>> {
    let candidates: Vec<ElementRef> = document
        .select(&HEURISTIC_FRAGMENTS)
        .filter(|element| {
            let text = element_text(element);
            let length = text.chars().count();
            if !(HEURISTIC_MIN_CHARS..=HEURISTIC_MAX_CHARS).contains(&length) {
                return false;
            }
            let folded = fold_accents(&text);
            HEURISTIC_KEYWORDS.iter().any(|keyword| folded.contains(keyword))
        })
        .collect();

    // Keep the outermost block of nested matches
    let ids: HashSet<_> = candidates.iter().map(|element| element.id()).collect();
    candidates
        .into_iter()
        .filter(|element| !element.ancestors().any(|ancestor| ids.contains(&ancestor.id())))
        .collect()
}

/// Read one fragment. Returns `None` for fragments without any text.
pub fn read_fragment(fragment: &ElementRef, page_url: &str, selectors: &ListingSelectors) -> Option<RawListing> {
    if element_text(fragment).is_empty() {
        return None;
    }

    let mut raw = RawListing {
        title: first_text(fragment, selectors.title),
        description: first_text(fragment, selectors.description),
        date_text: first_text(fragment, selectors.date),
        venue_text: first_text(fragment, selectors.venue),
        ..Default::default()
    };

    let stamps: Vec<NaiveDate> = fragment
        .select(&TIME_DATETIME)
        .filter_map(|time| time.value().attr("datetime"))
        .filter_map(parse_date)
        .collect();
    if let Some(start) = stamps.first() {
        raw.dates = Some(DateSpan::new(*start, stamps.get(1).copied()));
    }
    if raw.dates.is_none() && raw.date_text.is_empty() {
        raw.date_text = element_text(fragment);
    }

    raw.image = first_attr(fragment, selectors.image, IMAGE_ATTRS)
        .and_then(|src| absolute_url(page_url, &src));

    let link = first_attr(fragment, selectors.link, &["href"])
        .or_else(|| fragment.value().attr("href").map(str::to_string))
        .or_else(|| first_attr(fragment, &["a[href]"], &["href"]));
    raw.link = link
        .and_then(|href| absolute_url(page_url, &href))
        .map(|url| strip_tracking_params(&url));

    apply_definition_fields(fragment, &mut raw);
    Some(raw)
}

/// Structured `<dl><dt>Lieu</dt><dd>…</dd></dl>` fields.
fn apply_definition_fields(fragment: &ElementRef, raw: &mut RawListing) {
    for list in fragment.select(&DEFINITION_LIST) {
        let terms = list.select(&DEFINITION_TERM).map(|dt| element_text(&dt));
        let values = list.select(&DEFINITION_VALUE).map(|dd| element_text(&dd));
        for (term, value) in terms.zip(values) {
            if value.is_empty() {
                continue;
            }
            let term = fold_accents(&term);
            let term = term.trim_end_matches(|c: char| c == ':' || c.is_whitespace());
            if term.starts_with("lieu") || term.starts_with("salle") {
                raw.venue_text = value;
            } else if term.starts_with("date") {
                raw.dates = None;
                raw.date_text = value;
            } else if term.starts_with("adresse") {
                raw.address = Some(value);
            } else if term.starts_with("ville") {
                raw.city = Some(value);
            } else if term.starts_with("organisat") {
                raw.organizer = Some(value);
            } else if term.starts_with("tarif") || term.starts_with("prix") || term.starts_with("entree") {
                raw.entry_fee = Some(value);
            } else if term.contains("visiteur") {
                raw.visitors = parse_count(&value);
            } else if term.contains("exposant") {
                raw.exhibitors = parse_count(&value);
            }
        }
    }
}

/// "12 000 visiteurs" -> 12000
pub fn parse_count(text: &str) -> Option<u32> {
    let digits: String = text
        .split(|c: char| !c.is_ascii_digit() && !c.is_whitespace() && c != '.' && c != '\u{a0}')
        .find(|chunk| chunk.chars().any(|c| c.is_ascii_digit()))?
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Parse a whole listing page into raw listings.
pub fn extract_listings(html: &str, page_url: &str, selectors: &ListingSelectors) -> Vec<RawListing> {
    let document = Html::parse_document(html);
    select_fragments(&document, selectors.containers)
        .iter()
        .filter_map(|fragment| read_fragment(fragment, page_url, selectors))
        .collect()
}

/// Turn a raw listing into a candidate, filling gaps with page defaults.
///
/// `index` numbers synthetic titles from 1; `today` stands in for an
/// unreadable date.
pub fn finalize(
    raw: RawListing,
    index: usize,
    page: &SourcePage,
    label: &str,
    source: &str,
    today: NaiveDate,
) -> CandidateEvent {
    let title = match clean_text(&raw.title) {
        title if title.is_empty() => format!("{} — événement {}", label, index + 1),
        title => title,
    };

    let read_dates = raw.dates.or_else(|| parse_date_range(&raw.date_text));
    let span = read_dates.unwrap_or_else(|| DateSpan::single(today));

    let parsed_venue = parse_venue(&raw.venue_text);
    let or_default = |value: String, default: &str| if value.is_empty() { default.to_string() } else { value };
    let venue_name = or_default(parsed_venue.name, &page.venue.name);
    let city = or_default(raw.city.unwrap_or(parsed_venue.city), &page.venue.city);
    let address = or_default(raw.address.unwrap_or(parsed_venue.address), &page.venue.address);

    let website = raw
        .link
        .unwrap_or_else(|| synthetic_website(&page.url, &title, read_dates.map(|d| d.start)));

    let visitors = raw.visitors.unwrap_or_else(|| estimate(&page.venue.visitors));
    let exhibitors = raw.exhibitors.unwrap_or_else(|| estimate(&page.venue.exhibitors));

    let mut candidate = CandidateEvent::new(title, span.start, website, source)
        .with_end_date(Some(span.end))
        .with_description(clean_text(&raw.description))
        .with_venue(venue_name, city, address)
        .with_estimates(Some(visitors), Some(exhibitors));

    if let Some(organizer) = raw.organizer {
        candidate = candidate.with_organizer(organizer);
    }
    if let Some(fee) = raw.entry_fee {
        candidate = candidate.with_entry_fee(fee);
    }
    if let Some(image) = raw.image {
        candidate = candidate.with_image_url(image);
    }
    candidate
}

/// Dedup key for a listing without a detail link. Only a date read from the
/// page goes into the key; the `today` default would change it on every run.
fn synthetic_website(page_url: &str, title: &str, start: Option<NaiveDate>) -> String {
    match start {
        Some(start) => format!("{}#{}-{}", page_url, slugify(title), start),
        None => format!("{}#{}", page_url, slugify(title)),
    }
}

/// Extract and finalize every listing of a page.
pub fn parse_listing_page(
    html: &str,
    page: &SourcePage,
    selectors: &ListingSelectors,
    label: &str,
    source: &str,
    today: NaiveDate,
) -> Vec<CandidateEvent> {
    extract_listings(html, &page.url, selectors)
        .into_iter()
        .enumerate()
        .map(|(index, raw)| finalize(raw, index, page, label, source, today))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvesters::VenueProfile;

    const SELECTORS: ListingSelectors = ListingSelectors {
        containers: &[".event-card", ".agenda-item"],
        title: &["h3", ".title"],
        description: &[".summary"],
        date: &[".dates"],
        venue: &[".place"],
        image: &["img"],
        link: &["a.more"],
    };

    fn page() -> SourcePage {
        SourcePage::new(
            "https://venue.fr/agenda",
            VenueProfile::new("Grand Hall", "Lyon", "1 rue du Parc, 69000 Lyon").with_attendance(5..=5, 9..=9),
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_container_selector_wins() {
        let html = r#"
            <div class="agenda-item"><h3>Ignored</h3></div>
            <div class="event-card">
                <h3>Salon de l'Industrie</h3>
                <p class="summary">Rendez-vous b2b</p>
                <p class="dates">Du 12 au 15 mars 2025</p>
                <p class="place">Eurexpo, Boulevard de l'Europe, 69680 Chassieu</p>
                <img data-src="/img/industrie.jpg" src="/img/placeholder.gif">
                <a class="more" href="/salons/industrie?utm_source=agenda">Voir</a>
            </div>"#;

        let events = parse_listing_page(html, &page(), &SELECTORS, "Venue", "venue", today());
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.title, "Salon de l'Industrie");
        assert_eq!(event.description.as_deref(), Some("Rendez-vous b2b"));
        assert_eq!(event.start_date, date(2025, 3, 12));
        assert_eq!(event.end_date, date(2025, 3, 15));
        assert_eq!(event.venue_name, "Eurexpo");
        assert_eq!(event.city, "Chassieu");
        assert_eq!(event.image_url.as_deref(), Some("https://venue.fr/img/industrie.jpg"));
        assert_eq!(event.website, "https://venue.fr/salons/industrie");
        assert_eq!(event.estimated_visitors, Some(5));
        assert_eq!(event.estimated_exhibitors, Some(9));
        assert_eq!(event.source, "venue");
    }

    #[test]
    fn test_time_datetime_preferred() {
        let html = r#"
            <article class="event-card">
                <h3>Forum Emploi</h3>
                <p class="dates">bientôt</p>
                <time datetime="2025-04-02">2 avril</time>
                <time datetime="2025-04-03">3 avril</time>
            </article>"#;
        let events = parse_listing_page(html, &page(), &SELECTORS, "Venue", "venue", today());
        assert_eq!(events[0].start_date, date(2025, 4, 2));
        assert_eq!(events[0].end_date, date(2025, 4, 3));
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let html = r#"<div class="event-card"><p>Bientôt des nouvelles</p></div>"#;
        let events = parse_listing_page(html, &page(), &SELECTORS, "Venue", "venue", today());
        let event = &events[0];
        assert_eq!(event.title, "Venue — événement 1");
        assert_eq!(event.start_date, today());
        assert_eq!(event.end_date, today());
        assert_eq!(event.venue_name, "Grand Hall");
        assert_eq!(event.city, "Lyon");
        assert_eq!(event.address, "1 rue du Parc, 69000 Lyon");
        assert_eq!(event.website, "https://venue.fr/agenda#venue-evenement-1");
    }

    #[test]
    fn test_undated_listing_key_is_stable_across_days() {
        let html = r#"<div class="event-card"><h3>Salon professionnel b2b de la robotique</h3></div>"#;
        let day1 = parse_listing_page(html, &page(), &SELECTORS, "Venue", "venue", date(2026, 10, 18));
        let day2 = parse_listing_page(html, &page(), &SELECTORS, "Venue", "venue", date(2026, 10, 19));

        assert_eq!(day1[0].website, day2[0].website);
        assert_eq!(
            day1[0].website,
            "https://venue.fr/agenda#salon-professionnel-b2b-de-la-robotique"
        );
        assert_eq!(day2[0].start_date, date(2026, 10, 19));
    }

    #[test]
    fn test_dated_listing_key_carries_start() {
        let html = r#"<div class="event-card"><h3>Forum Emploi</h3><p class="dates">02/04/2025</p></div>"#;
        let events = parse_listing_page(html, &page(), &SELECTORS, "Venue", "venue", today());
        assert_eq!(events[0].website, "https://venue.fr/agenda#forum-emploi-2025-04-02");
    }

    #[test]
    fn test_empty_fragments_are_dropped() {
        let html = r#"<div class="event-card"> </div><div class="event-card"><h3>Expo</h3></div>"#;
        let events = parse_listing_page(html, &page(), &SELECTORS, "Venue", "venue", today());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Expo");
    }

    #[test]
    fn test_keyword_heuristic_fallback() {
        let html = r#"
            <main>
              <section>
                <div class="x1"><strong>Salon du Chocolat</strong> le 28/10/2025</div>
                <div class="x2">Nos horaires d'ouverture changent</div>
                <li>Congrès national des notaires, 05/06/2025</li>
              </section>
            </main>"#;
        let document = Html::parse_document(html);
        let fragments = select_fragments(&document, SELECTORS.containers);
        let texts: Vec<String> = fragments.iter().map(element_text).collect();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].starts_with("Salon du Chocolat"));
        assert!(texts[1].starts_with("Congrès"));

        let events = parse_listing_page(html, &page(), &SELECTORS, "Venue", "venue", today());
        assert_eq!(events[0].start_date, date(2025, 10, 28));
        assert_eq!(events[1].start_date, date(2025, 6, 5));
    }

    #[test]
    fn test_definition_list_fields() {
        let html = r#"
            <div class="event-card">
                <h3>Foire de Marseille</h3>
                <dl>
                    <dt>Dates :</dt><dd>du 26 septembre au 6 octobre 2025</dd>
                    <dt>Lieu</dt><dd>Parc Chanot</dd>
                    <dt>Adresse</dt><dd>114 Rond-Point du Prado</dd>
                    <dt>Ville</dt><dd>Marseille</dd>
                    <dt>Organisateur</dt><dd>SAFIM</dd>
                    <dt>Tarif</dt><dd>8 €</dd>
                    <dt>Visiteurs</dt><dd>300 000 visiteurs</dd>
                    <dt>Exposants</dt><dd>1200</dd>
                </dl>
            </div>"#;
        let events = parse_listing_page(html, &page(), &SELECTORS, "Venue", "venue", today());
        let event = &events[0];
        assert_eq!(event.start_date, date(2025, 9, 26));
        assert_eq!(event.end_date, date(2025, 10, 6));
        assert_eq!(event.venue_name, "Parc Chanot");
        assert_eq!(event.address, "114 Rond-Point du Prado");
        assert_eq!(event.city, "Marseille");
        assert_eq!(event.organizer.as_deref(), Some("SAFIM"));
        assert_eq!(event.entry_fee.as_deref(), Some("8 €"));
        assert_eq!(event.estimated_visitors, Some(300_000));
        assert_eq!(event.estimated_exhibitors, Some(1200));
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("12 000 visiteurs"), Some(12_000));
        assert_eq!(parse_count("env. 450"), Some(450));
        assert_eq!(parse_count("1.500 exposants"), Some(1_500));
        assert_eq!(parse_count("nombreux"), None);
    }
}
