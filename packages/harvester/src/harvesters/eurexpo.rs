//! Eurexpo Lyon agenda.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};

use super::listing::{parse_listing_page, ListingSelectors};
use super::{HarvestBatch, HarvestContext, Harvester, SourcePage, VenueProfile};
use crate::types::candidate::CandidateEvent;

pub const SOURCE: &str = "eurexpo";
const LABEL: &str = "Eurexpo Lyon";

const SELECTORS: ListingSelectors = ListingSelectors {
    containers: &[".salon-item", ".events-list .event", ".agenda .card"],
    title: &[".salon-item__name", "h3", "h2"],
    description: &[".salon-item__baseline", ".baseline", "p"],
    date: &[".salon-item__dates", ".dates", ".date"],
    venue: &[".salon-item__hall", ".hall"],
    image: &[".salon-item__logo img", "img"],
    link: &["a.salon-item__link", "a[href]"],
};

pub fn pages() -> Vec<SourcePage> {
    vec![SourcePage::new(
        "https://www.eurexpo.com/fr/agenda",
        VenueProfile::new("Eurexpo Lyon", "Chassieu", "Boulevard de l'Europe, 69680 Chassieu")
            .with_attendance(10_000..=100_000, 100..=1_200),
    )]
}

pub struct EurexpoHarvester {
    ctx: HarvestContext,
    pages: Vec<SourcePage>,
}

impl EurexpoHarvester {
    pub fn new(ctx: HarvestContext) -> Self {
        Self { ctx, pages: pages() }
    }

    pub fn fallback_events(today: NaiveDate) -> Vec<CandidateEvent> {
        let pages = pages();
        let page = &pages[0];
        let example = |slug: &str, title: &str, offset: i64, days: i64| {
            let start = today + Duration::days(offset);
            CandidateEvent::new(title, start, format!("{}#{}", page.url, slug), SOURCE)
                .with_end_date(Some(start + Duration::days(days - 1)))
                .with_venue(&page.venue.name, &page.venue.city, &page.venue.address)
                .with_estimates(Some(*page.venue.visitors.start()), Some(*page.venue.exhibitors.start()))
        };

        vec![
            example("global-industrie", "Global Industrie", 40, 4)
                .with_description("Salon professionnel de l'industrie, robotique et sous-traitance industrielle"),
            example("sirha", "Sirha Lyon", 75, 5)
                .with_description("Salon mondial de la restauration et de l'hôtellerie réservé aux professionnels"),
            example("pollutec", "Pollutec", 120, 4)
                .with_description("Salon des solutions pour l'environnement et l'énergie, exposants et conférences"),
        ]
    }
}

#[async_trait]
impl Harvester for EurexpoHarvester {
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
