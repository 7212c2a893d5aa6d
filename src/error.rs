use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Http error")]
    Http(#[from] reqwest::Error),

    #[error("Io error")]
    Io(#[from] std::io::Error),

    #[error("Webdriver error {name}: {message}")]
    WebDriver { name: String, message: String },

    #[error("Expected page landmark missing: {0}")]
    StructuralPage(String),

    #[error("Timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },
}

/// Per-record outcome: the record is dropped, the crawl goes on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("bad format in dates")]
    BadTimeFormat,

    #[error("address is too long ({0} parts)")]
    AddressTooLong(usize),

    #[error("empty address")]
    EmptyAddress,

    #[error("no result from the national address API")]
    UnresolvedAddress,
}
