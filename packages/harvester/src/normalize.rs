//! Text normalization for loosely formatted listing text.
//!
//! Agenda pages print dates as "12/03/2025", "Du 12 au 15 mars 2025",
//! "March 12, 2025" or ISO strings, and venues as comma-joined fragments.
//! Every parser here returns `None`/empty on a miss; callers pick a default.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::collections::HashMap;
use url::Url;

/// Month names and abbreviations, French first, then English.
const MONTHS: &[(&str, u32)] = &[
    ("janvier", 1),
    ("janv", 1),
    ("février", 2),
    ("fevrier", 2),
    ("févr", 2),
    ("fevr", 2),
    ("fév", 2),
    ("fev", 2),
    ("mars", 3),
    ("avril", 4),
    ("avr", 4),
    ("mai", 5),
    ("juin", 6),
    ("juillet", 7),
    ("juil", 7),
    ("août", 8),
    ("aout", 8),
    ("septembre", 9),
    ("sept", 9),
    ("octobre", 10),
    ("novembre", 11),
    ("décembre", 12),
    ("decembre", 12),
    ("déc", 12),
    ("january", 1),
    ("jan", 1),
    ("february", 2),
    ("feb", 2),
    ("march", 3),
    ("mar", 3),
    ("april", 4),
    ("apr", 4),
    ("may", 5),
    ("june", 6),
    ("jun", 6),
    ("july", 7),
    ("jul", 7),
    ("august", 8),
    ("aug", 8),
    ("september", 9),
    ("sep", 9),
    ("october", 10),
    ("oct", 10),
    ("november", 11),
    ("nov", 11),
    ("december", 12),
    ("dec", 12),
];

/// Query parameters that only track the click, never identify the page.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_cid", "mc_eid", "ref", "_ga", "_gl"];

fn month_alternation() -> String {
    let mut names: Vec<&str> = MONTHS.iter().map(|(name, _)| *name).collect();
    // Longest first so "juillet" wins over "juil"
    names.sort_by_key(|name| std::cmp::Reverse(name.chars().count()));
    names.dedup();
    names.join("|")
}

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref MONTH_LOOKUP: HashMap<&'static str, u32> = MONTHS.iter().copied().collect();
    static ref NUMERIC_DMY: Regex =
        Regex::new(r"\b(\d{1,2})\s*[/.\-]\s*(\d{1,2})\s*[/.\-]\s*(\d{4}|\d{2})\b").unwrap();
    static ref DAY_MONTH_YEAR: Regex = Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:er)?\s+({})\.?\s+(\d{{4}})\b",
        month_alternation()
    ))
    .unwrap();
    static ref MONTH_DAY_YEAR: Regex = Regex::new(&format!(
        r"(?i)\b({})\.?\s+(\d{{1,2}})(?:st|nd|rd|th|er)?,?\s+(\d{{4}})\b",
        month_alternation()
    ))
    .unwrap();
    static ref EMBEDDED_ISO: Regex = Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})").unwrap();
    static ref SAME_MONTH_RANGE: Regex = Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:er)?\s*(?:au|et|-|–|—|&)\s*(\d{{1,2}})(?:er)?\s+({})\.?\s+(\d{{4}})\b",
        month_alternation()
    ))
    .unwrap();
    static ref RANGE_SEPARATOR: Regex =
        Regex::new(r"(?i)\s+(?:au|jusqu'au|jusqu’au|to|until)\s+|\s*[–—]\s*|\s+-\s+").unwrap();
    static ref WEEKDAY: Regex = Regex::new(
        r"(?i)\b(?:lundi|mardi|mercredi|jeudi|vendredi|samedi|dimanche|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b,?"
    )
    .unwrap();
    static ref BARE_DAY: Regex = Regex::new(r"(?i)^(?:du\s+|le\s+|from\s+)?(\d{1,2})(?:er|st|nd|rd|th)?$").unwrap();
    static ref POSTAL_CITY: Regex = Regex::new(r"^(\d{5})\s+(.+)$").unwrap();
    static ref DEPARTMENT_SUFFIX: Regex = Regex::new(r"\s*\(\d{2,3}\)$").unwrap();
}

/// Order in which a pattern family's capture groups carry day/month/year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldOrder {
    DayMonthYear,
    MonthDayYear,
}

struct DateFamily {
    pattern: &'static Regex,
    order: FieldOrder,
}

fn date_families() -> [DateFamily; 3] {
    [
        DateFamily {
            pattern: &*NUMERIC_DMY,
            order: FieldOrder::DayMonthYear,
        },
        DateFamily {
            pattern: &*DAY_MONTH_YEAR,
            order: FieldOrder::DayMonthYear,
        },
        DateFamily {
            pattern: &*MONTH_DAY_YEAR,
            order: FieldOrder::MonthDayYear,
        },
    ]
}

/// Trim and collapse runs of whitespace (including non-breaking spaces).
pub fn clean_text(raw: &str) -> String {
    WHITESPACE
        .replace_all(&raw.replace('\u{a0}', " "), " ")
        .trim()
        .to_string()
}

fn parse_month(token: &str) -> Option<u32> {
    let token = token.trim().trim_end_matches('.').to_lowercase();
    if let Ok(month) = token.parse::<u32>() {
        return (1..=12).contains(&month).then_some(month);
    }
    MONTH_LOOKUP.get(token.as_str()).copied()
}

fn parse_year(token: &str) -> Option<i32> {
    let year: i32 = token.parse().ok()?;
    Some(if token.len() == 2 { 2000 + year } else { year })
}

fn try_family(family: &DateFamily, text: &str) -> Option<NaiveDate> {
    for caps in family.pattern.captures_iter(text) {
        let (day, month) = match family.order {
            FieldOrder::DayMonthYear => (caps.get(1)?, caps.get(2)?),
            FieldOrder::MonthDayYear => (caps.get(2)?, caps.get(1)?),
        };
        let day: u32 = match day.as_str().parse() {
            Ok(day) => day,
            Err(_) => continue,
        };
        let (Some(month), Some(year)) = (parse_month(month.as_str()), parse_year(&caps[3])) else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }
    None
}

/// Generic calendar-string parsing, the last resort after the pattern families.
fn parse_generic(text: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }
    for format in ["%Y/%m/%d", "%Y.%m.%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    let caps = EMBEDDED_ISO.captures(text)?;
    NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
}

/// Parse a single calendar date out of free text.
///
/// Families are tried in order: numeric `D/M/Y` (any of `/ . -`),
/// `D <mois> Y`, `<month> D, Y`, then generic calendar formats.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = clean_text(text);
    if text.is_empty() {
        return None;
    }
    date_families()
        .iter()
        .find_map(|family| try_family(family, &text))
        .or_else(|| parse_generic(&text))
}

/// An inclusive calendar span with `end >= start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    /// Build a span; an end before the start collapses onto the start.
    pub fn new(start: NaiveDate, end: Option<NaiveDate>) -> Self {
        let end = match end {
            Some(end) if end >= start => end,
            _ => start,
        };
        Self { start, end }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self::new(date, None)
    }
}

/// Parse a date or a date range ("du 12 au 15 mars 2025", "12/03 - 15/03/2025").
///
/// The start half may omit the year (and month), which is borrowed from the
/// end half. Weekday names are ignored.
pub fn parse_date_range(text: &str) -> Option<DateSpan> {
    let text = clean_text(&WEEKDAY.replace_all(text, ""));
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = SAME_MONTH_RANGE.captures(&text) {
        let month = parse_month(&caps[3]);
        let year = parse_year(&caps[4]);
        if let (Some(month), Some(year)) = (month, year) {
            let start = caps[1]
                .parse()
                .ok()
                .and_then(|d| NaiveDate::from_ymd_opt(year, month, d));
            let end = caps[2]
                .parse()
                .ok()
                .and_then(|d| NaiveDate::from_ymd_opt(year, month, d));
            if let Some(start) = start {
                return Some(DateSpan::new(start, end));
            }
        }
    }

    if let Some(separator) = RANGE_SEPARATOR.find(&text) {
        let left = &text[..separator.start()];
        let right = &text[separator.end()..];
        if let Some(end) = parse_date(right) {
            let start = parse_date(left).or_else(|| borrow_from_end(left, end));
            return Some(match start {
                Some(start) => DateSpan::new(start, Some(end)),
                None => DateSpan::single(end),
            });
        }
    }

    parse_date(&text).map(DateSpan::single)
}

/// Complete a start half missing its year ("28 février", "12/03") or its
/// month and year ("du 12") from the end date.
fn borrow_from_end(partial: &str, end: NaiveDate) -> Option<NaiveDate> {
    let partial = clean_text(partial);
    if let Some(caps) = BARE_DAY.captures(&partial) {
        let day: u32 = caps[1].parse().ok()?;
        if let Some(start) = NaiveDate::from_ymd_opt(end.year(), end.month(), day).filter(|s| *s <= end) {
            return Some(start);
        }
        // "du 28 au 3 avril" starts in the previous month
        let previous = end.checked_sub_months(Months::new(1))?;
        return NaiveDate::from_ymd_opt(previous.year(), previous.month(), day);
    }

    let candidates = [
        format!("{} {}", partial, end.year()),
        format!("{}/{}", partial, end.year()),
    ];
    let start = candidates.iter().find_map(|c| parse_date(c))?;
    if start <= end {
        return Some(start);
    }
    // "du 28 décembre au 3 janvier 2026" spans the new year
    start.with_year(end.year() - 1)
}

/// Text of the first selector (in order) that yields non-empty text.
///
/// Returns an empty string when nothing matches; the caller supplies a default.
pub fn first_text(fragment: &ElementRef, selectors: &[&str]) -> String {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in fragment.select(&selector) {
            let text = element_text(&element);
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// First non-empty attribute among `attrs` (in preference order) on the
/// first selector match that carries one.
pub fn first_attr(fragment: &ElementRef, selectors: &[&str], attrs: &[&str]) -> Option<String> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in fragment.select(&selector) {
            let found = attrs.iter().find_map(|attr| {
                element
                    .value()
                    .attr(attr)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
            });
            if let Some(value) = found {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Whitespace-collapsed text content of an element.
pub fn element_text(element: &ElementRef) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Resolve `href` against `base`; absolute http(s) URLs pass through unchanged.
pub fn absolute_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }

    if let Ok(url) = Url::parse(href) {
        return matches!(url.scheme(), "http" | "https").then(|| href.to_string());
    }

    Url::parse(base).ok()?.join(href).ok().map(|u| u.to_string())
}

/// Drop click-tracking query parameters and the fragment.
pub fn strip_tracking_params(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| {
            let key = key.to_lowercase();
            !key.starts_with("utm_") && !TRACKING_PARAMS.contains(&key.as_str())
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }
    parsed.set_fragment(None);
    parsed.to_string()
}

/// Venue text split into its parts. Any part may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VenueParts {
    pub name: String,
    pub address: String,
    pub city: String,
}

/// Split "Name, street, 75015 Paris" style venue text.
pub fn parse_venue(text: &str) -> VenueParts {
    let text = clean_text(text);
    let parts: Vec<&str> = text
        .split(|c| c == ',' || c == '|' || c == '\n')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let Some((name, rest)) = parts.split_first() else {
        return VenueParts::default();
    };
    let mut venue = VenueParts {
        name: name.to_string(),
        ..Default::default()
    };

    let Some((last, middle)) = rest.split_last() else {
        return venue;
    };

    let last_clean = DEPARTMENT_SUFFIX.replace(last, "");
    if let Some(caps) = POSTAL_CITY.captures(last) {
        venue.city = DEPARTMENT_SUFFIX.replace(caps[2].trim(), "").to_string();
        venue.address = middle
            .iter()
            .copied()
            .chain(std::iter::once(*last))
            .collect::<Vec<_>>()
            .join(", ");
    } else if !last_clean.chars().any(|c| c.is_ascii_digit()) {
        venue.city = last_clean.to_string();
        venue.address = middle.join(", ");
    } else {
        venue.address = rest.join(", ");
    }
    venue
}

/// Lowercase and strip French diacritics for accent-insensitive matching.
pub fn fold_accents(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        match c {
            'à' | 'â' | 'ä' | 'á' => folded.push('a'),
            'ç' => folded.push('c'),
            'é' | 'è' | 'ê' | 'ë' => folded.push('e'),
            'î' | 'ï' | 'í' => folded.push('i'),
            'ô' | 'ö' | 'ó' => folded.push('o'),
            'ù' | 'û' | 'ü' | 'ú' => folded.push('u'),
            'ÿ' => folded.push('y'),
            'œ' => folded.push_str("oe"),
            'æ' => folded.push_str("ae"),
            '’' => folded.push('\''),
            other => folded.push(other),
        }
    }
    folded
}

/// ASCII slug for synthetic identifiers.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in fold_accents(text).chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}
