mod assemble;
mod crawler;
mod data;
mod extract;

pub use crawler::FresqueCrawler;
pub use data::EventStore;
pub use extract::{extract_event, listing_links};

use crate::Source;
use chrono::NaiveDateTime;

/// Listing pages this crawler knows how to walk.
pub const SOURCES: &[Source] = &[Source {
    id: 200,
    url: "https://fresqueduclimat.org/inscription-atelier/grand-public/",
}];

/// Raw fields read off one detail page, built fresh for every visit and never
/// reused across iterations. No validation lives here; the assembler decides
/// accept/reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub title: String,
    /// `None` when the time sentence did not match the expected shape.
    pub schedule: Option<Schedule>,
    pub is_online: bool,
    pub location: LocationBlock,
    pub description: String,
    pub ticket_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Classification of the map-pin location block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationBlock {
    /// Video-icon event; no location text at all.
    Online,
    /// Five or more comma-separated parts: ambiguous, rejected downstream.
    TooManyParts { raw: String, parts: usize },
    /// Interpreted parts. `street` (and `venue`) may be empty when the text
    /// carried no usable address; the assembler rejects those.
    Parsed {
        raw: String,
        venue: String,
        street: String,
        city: String,
    },
}
