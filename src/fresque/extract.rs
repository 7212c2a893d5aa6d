use super::{LocationBlock, RawEvent, Schedule};
use chrono::NaiveDate;
use itertools::Itertools;
use lazy_regex::regex;
use lazy_static::lazy_static;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

// Selectors the navigator drives the live session with.
pub(crate) const IFRAME_CSS: &str = "iframe";
pub(crate) const HEADING_CSS: &str = "h3";
pub(crate) const LISTING_LINK_CSS: &str = "a.link-dark";
pub(crate) const NEXT_PAGE_CSS: &str = r#"li.page-item:not(.disabled) > a[aria-label="Next"]"#;

const E: &str = "Invalid selector";
lazy_static! {
    static ref TITLE: Selector = Selector::parse(HEADING_CSS).expect(E);
    static ref LISTING_LINK: Selector = Selector::parse(LISTING_LINK_CSS).expect(E);
    static ref CLOCK_ICON: Selector = Selector::parse(".fa-clock").expect(E);
    static ref VIDEO_ICON: Selector = Selector::parse(".fa-video").expect(E);
    static ref PIN_ICON: Selector = Selector::parse(".fa-map-pin").expect(E);
    static ref REGISTER_ICON: Selector = Selector::parse(".fa-user-plus, .fa-user").expect(E);
    static ref SECTION_LABEL: Selector = Selector::parse("h4, h5, strong").expect(E);
}

const MONTHS: [&str; 12] = [
    "janvier",
    "février",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "août",
    "septembre",
    "octobre",
    "novembre",
    "décembre",
];

const TRAINING_KEYWORDS: [&str; 3] = ["formation", "briefing", "animateur"];

/// Read the raw fields off a rendered detail page. Never fails: missing
/// landmarks leave their field empty (or `schedule` at `None`) and the
/// assembler turns that into the right rejection.
pub fn extract_event(doc: &Html) -> RawEvent {
    let title = doc
        .select(&TITLE)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .unwrap_or_default();

    let schedule = icon_block_text(doc, &CLOCK_ICON)
        .as_deref()
        .and_then(parse_schedule);

    let is_online = doc.select(&VIDEO_ICON).next().is_some();
    let location = if is_online {
        LocationBlock::Online
    } else {
        parse_location(&icon_block_text(doc, &PIN_ICON).unwrap_or_default())
    };

    RawEvent {
        title,
        schedule,
        is_online,
        location,
        description: description_text(doc).unwrap_or_default(),
        ticket_url: ticket_link(doc).unwrap_or_default(),
    }
}

/// Candidate detail links of one listing page, DOM order, deduplicated,
/// absolutized against `base`. Anchors whose label marks the event full are
/// dropped here so their pages are never visited.
pub fn listing_links(doc: &Html, base: &Url) -> Vec<String> {
    doc.select(&LISTING_LINK)
        .filter(|a| {
            !a.text()
                .collect::<String>()
                .to_lowercase()
                .contains("complet")
        })
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(|url| url.to_string())
        .unique()
        .collect()
}

/// `"<day> <month-name> <year>, … de <HHhMM> à <HHhMM>"`, both clock times on
/// the same calendar date. Any deviation from that shape yields `None`.
pub(crate) fn parse_schedule(text: &str) -> Option<Schedule> {
    let text = clean_text(text);
    let (date_part, time_part) = text.split_once(',')?;

    let tokens: Vec<&str> = date_part.split_whitespace().collect();
    let [day, month, year] = tokens[..] else {
        return None;
    };
    let day: u32 = day.parse().ok()?;
    let year: i32 = year.parse().ok()?;
    let month = month_number(month)?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let caps = regex!(r"(\d{2})h(\d{2}) à (\d{2})h(\d{2})").captures(time_part)?;
    let part = |i: usize| caps.get(i).unwrap().as_str().parse::<u32>().ok();
    let start = date.and_hms_opt(part(1)?, part(2)?, 0)?;
    let end = date.and_hms_opt(part(3)?, part(4)?, 0)?;

    (start < end).then_some(Schedule { start, end })
}

/// Comma-count interpretation of the map-pin text. `street` stays empty when
/// no usable address can be derived.
pub(crate) fn parse_location(raw: &str) -> LocationBlock {
    let raw = clean_text(raw);
    let parts: Vec<String> = raw.split(',').map(|p| p.trim().to_string()).collect();
    if parts.len() >= 5 {
        return LocationBlock::TooManyParts {
            parts: parts.len(),
            raw,
        };
    }

    let is_france = |p: &String| p.eq_ignore_ascii_case("france");
    let (venue, street, city) = match parts.as_slice() {
        [street, city, third, ..] if is_france(third) => {
            (String::new(), street.clone(), city.clone())
        }
        [venue, street, city, ..] => (venue.clone(), street.clone(), city.clone()),
        [city, second] if is_france(second) => (String::new(), String::new(), city.clone()),
        [street, city] => (String::new(), street.clone(), city.clone()),
        _ => (String::new(), String::new(), String::new()),
    };

    LocationBlock::Parsed {
        raw,
        venue,
        street,
        city: strip_zip_code(&city),
    }
}

pub(crate) fn strip_zip_code(city: &str) -> String {
    clean_text(&regex!(r"\b\d{5}\b").replace_all(city, ""))
}

pub(crate) fn is_training(title: &str) -> bool {
    let title = title.to_lowercase();
    TRAINING_KEYWORDS.iter().any(|k| title.contains(k))
}

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    MONTHS.iter().position(|m| *m == name).map(|i| i as u32 + 1)
}

fn icon_block_text(doc: &Html, icon: &Selector) -> Option<String> {
    let icon = doc.select(icon).next()?;
    let block = icon.parent().and_then(ElementRef::wrap)?;
    Some(clean_text(&block.text().collect::<String>()))
}

fn description_text(doc: &Html) -> Option<String> {
    let label = doc
        .select(&SECTION_LABEL)
        .find(|el| el.text().collect::<String>().trim() == "Description")?;
    label
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .next()
        .map(|block| clean_text(&block.text().collect::<String>()))
}

fn ticket_link(doc: &Html) -> Option<String> {
    let icon = doc.select(&REGISTER_ICON).next()?;
    icon.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
        .map(ToString::to_string)
}

fn clean_text(text: &str) -> String {
    let text = text.replace('\u{a0}', " ");
    regex!(r"\s+").replace_all(&text, " ").trim().to_string()
}
