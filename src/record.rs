use chrono::NaiveDateTime;
use serde::Serialize;

/// One listing page configuration. `id` tags every record scraped from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    pub id: u32,
    pub url: &'static str,
}

/// A validated event, built once per accepted detail-page visit.
///
/// If `is_online` is true every location field is the empty string; otherwise
/// `street_address` and `department_code` are non-empty (records failing that
/// are rejected before construction, never stored with blanks).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub source_id: u32,
    pub title: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub full_location_text: String,
    pub venue_name: String,
    pub street_address: String,
    pub city: String,
    pub department_code: String,
    pub postal_code: String,
    pub latitude: String,
    pub longitude: String,
    pub is_online: bool,
    pub is_training: bool,
    pub is_sold_out: bool,
    pub is_kid_friendly: bool,
    pub event_page_url: String,
    pub ticket_url: String,
    pub description: String,
}
