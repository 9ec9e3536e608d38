//! Viparis: the agendas of the three main Paris exhibition venues.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};

use super::listing::{parse_listing_page, ListingSelectors};
use super::{HarvestBatch, HarvestContext, Harvester, SourcePage, VenueProfile};
use crate::types::candidate::CandidateEvent;

pub const SOURCE: &str = "viparis";
const LABEL: &str = "Viparis";

const SELECTORS: ListingSelectors = ListingSelectors {
    containers: &[".event-card", ".agenda-list .agenda-item", "article.event", ".card-event"],
    title: &[".event-card__title", "h3", "h2", ".title"],
    description: &[".event-card__description", ".description", "p.summary"],
    date: &[".event-card__date", ".date", ".dates"],
    venue: &[".event-card__venue", ".location", ".venue"],
    image: &["img"],
    link: &["a.event-card__link", "a[href*='/agenda/']", "a[href]"],
};

pub fn pages() -> Vec<SourcePage> {
    vec![
        SourcePage::new(
            "https://www.viparis.com/agenda/paris-expo-porte-de-versailles",
            VenueProfile::new(
                "Paris Expo Porte de Versailles",
                "Paris",
                "1 Place de la Porte de Versailles, 75015 Paris",
            )
            .with_attendance(20_000..=150_000, 200..=1_500),
        ),
        SourcePage::new(
            "https://www.viparis.com/agenda/paris-nord-villepinte",
            VenueProfile::new("Paris Nord Villepinte", "Villepinte", "ZAC Paris Nord 2, 93420 Villepinte")
                .with_attendance(30_000..=200_000, 300..=2_500),
        ),
        SourcePage::new(
            "https://www.viparis.com/agenda/palais-des-congres-de-paris",
            VenueProfile::new(
                "Palais des Congrès de Paris",
                "Paris",
                "2 Place de la Porte Maillot, 75017 Paris",
            )
            .with_attendance(2_000..=20_000, 20..=200),
        ),
    ]
}

pub struct ViparisHarvester {
    ctx: HarvestContext,
    pages: Vec<SourcePage>,
}

impl ViparisHarvester {
    pub fn new(ctx: HarvestContext) -> Self {
        Self { ctx, pages: pages() }
    }

    /// Example events shown when the agendas cannot be read.
    pub fn fallback_events(today: NaiveDate) -> Vec<CandidateEvent> {
        let pages = pages();
        let [versailles, villepinte, congres] = [&pages[0], &pages[1], &pages[2]];
        let example = |page: &SourcePage, slug: &str, title: &str, offset: i64, days: i64| {
            let start = today + Duration::days(offset);
            CandidateEvent::new(title, start, format!("{}#{}", page.url, slug), SOURCE)
                .with_end_date(Some(start + Duration::days(days - 1)))
                .with_venue(&page.venue.name, &page.venue.city, &page.venue.address)
                .with_estimates(Some(*page.venue.visitors.end()), Some(*page.venue.exhibitors.end()))
        };

        vec![
            example(versailles, "vivatech", "VivaTech", 30, 4)
                .with_description("Salon de l'innovation et des startups, rencontres d'affaires entre entreprises et investisseurs"),
            example(villepinte, "sial-paris", "SIAL Paris", 60, 5)
                .with_description("Salon international de l'alimentation réservé aux professionnels de l'agroalimentaire")
                .with_organizer("Comexposium"),
            example(villepinte, "maison-objet", "Maison&Objet", 90, 5)
                .with_description("Salon professionnel de la décoration, du design et de l'art de vivre"),
            example(congres, "congres-cardiologie", "Congrès de la Société Française de Cardiologie", 45, 3)
                .with_description("Congrès médical annuel, conférences et exposants du secteur santé"),
        ]
    }
}

#[async_trait]
impl Harvester for ViparisHarvester {
    fn source(&self) -> &str {
        SOURCE
    }

    async fn scrape_events(&self) -> HarvestBatch {
        let today = Utc::now().date_naive();
        let (events, errors) = self
            .ctx
            .fetch_pages(SOURCE, &self.pages, |page, html| {
                parse_listing_page(html, page, &SELECTORS, LABEL, SOURCE, today)
            })
            .await;
        self.ctx
            .finish(SOURCE, events, errors, || Self::fallback_events(today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;
    use std::sync::Arc;

    const VERSAILLES_HTML: &str = r#"
        <html><body>
          <div class="agenda-list">
            <div class="event-card">
              <a class="event-card__link" href="https://www.viparis.com/agenda/salon-agriculture?utm_campaign=home">
                <h3 class="event-card__title">Salon International de l'Agriculture</h3>
              </a>
              <p class="event-card__date">Du 22 février au 2 mars 2025</p>
              <p class="event-card__description">Le rendez-vous des filières agricoles</p>
            </div>
            <div class="event-card">
              <a class="event-card__link" href="/agenda/salon-du-chocolat">
                <h3 class="event-card__title">Salon du Chocolat</h3>
              </a>
              <p class="event-card__date">28/10/2025 - 01/11/2025</p>
            </div>
          </div>
        </body></html>"#;

    const VILLEPINTE_HTML: &str = r#"
        <html><body>
          <article class="event">
            <h2>Salon Intermat</h2>
            <time datetime="2025-04-24">24</time><time datetime="2025-04-27">27 avril</time>
            <a href="/agenda/intermat">Découvrir</a>
          </article>
          <article class="event">
            <h2>Salon Intermat</h2>
            <a href="/agenda/intermat">Doublon</a>
          </article>
        </body></html>"#;

    fn fetcher_with_all_pages() -> MockFetcher {
        let pages = pages();
        MockFetcher::new()
            .with_page(&pages[0].url, VERSAILLES_HTML)
            .with_page(&pages[1].url, VILLEPINTE_HTML)
            .with_page(&pages[2].url, "<html><body><p>Aucun événement</p></body></html>")
    }

    #[tokio::test]
    async fn test_scrapes_all_venues() {
        let fetcher = Arc::new(fetcher_with_all_pages());
        let harvester = ViparisHarvester::new(HarvestContext::immediate(fetcher.clone()));

        let batch = harvester.scrape_events().await;
        assert!(!batch.used_fallback);
        assert!(batch.errors.is_empty());
        assert_eq!(fetcher.fetch_count(), 3);
        // pages are fetched one after another, in declaration order
        let expected: Vec<String> = pages().into_iter().map(|p| p.url).collect();
        assert_eq!(fetcher.fetched_urls(), expected);

        let titles: Vec<&str> = batch.events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Salon International de l'Agriculture", "Salon du Chocolat", "Salon Intermat"]
        );

        let agriculture = &batch.events[0];
        assert_eq!(agriculture.website, "https://www.viparis.com/agenda/salon-agriculture");
        assert_eq!(agriculture.start_date, NaiveDate::from_ymd_opt(2025, 2, 22).unwrap());
        assert_eq!(agriculture.end_date, NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        assert_eq!(agriculture.venue_name, "Paris Expo Porte de Versailles");
        assert_eq!(agriculture.source, SOURCE);

        let intermat = &batch.events[2];
        assert_eq!(intermat.venue_name, "Paris Nord Villepinte");
        assert_eq!(intermat.city, "Villepinte");
        assert_eq!(intermat.website, "https://www.viparis.com/agenda/intermat");
        assert_eq!(intermat.end_date, NaiveDate::from_ymd_opt(2025, 4, 27).unwrap());
        let visitors = intermat.estimated_visitors.unwrap();
        assert!((30_000..=200_000).contains(&visitors));
    }

    #[tokio::test]
    async fn test_failing_page_is_reported_not_fatal() {
        let pages = pages();
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_page(&pages[0].url, VERSAILLES_HTML)
                .with_failure(&pages[1].url)
                .with_failure(&pages[2].url),
        );
        let harvester = ViparisHarvester::new(HarvestContext::immediate(fetcher));

        let batch = harvester.scrape_events().await;
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.errors.len(), 2);
        assert!(!batch.used_fallback);
    }

    #[tokio::test]
    async fn test_fallback_when_enabled_and_nothing_live() {
        let fetcher = Arc::new(MockFetcher::new());
        let harvester =
            ViparisHarvester::new(HarvestContext::immediate(fetcher).with_fallback_data(true));

        let batch = harvester.scrape_events().await;
        assert!(batch.used_fallback);
        assert_eq!(batch.events.len(), 4);
        assert_eq!(batch.errors.len(), 3);
        let today = Utc::now().date_naive();
        assert!(batch.events.iter().all(|e| e.start_date > today && e.end_date >= e.start_date));
    }

    #[tokio::test]
    async fn test_no_fallback_by_default() {
        let harvester = ViparisHarvester::new(HarvestContext::immediate(Arc::new(MockFetcher::new())));
        let batch = harvester.scrape_events().await;
        assert!(batch.events.is_empty());
        assert!(!batch.used_fallback);
    }
}
