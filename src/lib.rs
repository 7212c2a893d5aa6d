use async_trait::async_trait;
use serde_json::Value;

pub mod fresque;
pub mod geocode;
pub mod webdriver;

mod data;
mod error;
mod record;

pub use data::Table;
pub use error::{CrawlerError, Rejection};
pub use record::{EventRecord, Source};

/// Opaque handle to a DOM element located in the current browsing context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(pub String);

/// The browser automation capability the crawler consumes.
///
/// The navigator is the sole owner of the session and its current context
/// (including which iframe is active); nothing else issues navigation calls.
#[async_trait]
pub trait BrowserSession {
    async fn navigate(&mut self, url: &str) -> Result<(), CrawlerError>;
    async fn go_back(&mut self) -> Result<(), CrawlerError>;

    /// `Ok(None)` means "not present right now" — bounded waits poll on it.
    async fn find_element(&mut self, css: &str) -> Result<Option<ElementHandle>, CrawlerError>;
    async fn find_elements(&mut self, css: &str) -> Result<Vec<ElementHandle>, CrawlerError>;

    async fn click(&mut self, element: &ElementHandle) -> Result<(), CrawlerError>;
    async fn switch_to_frame(&mut self, element: &ElementHandle) -> Result<(), CrawlerError>;
    async fn execute_script(&mut self, script: &str) -> Result<Value, CrawlerError>;

    /// Serialized DOM of the current browsing context (the active frame's
    /// document once `switch_to_frame` has run).
    async fn page_source(&mut self) -> Result<String, CrawlerError>;

    async fn quit(&mut self) -> Result<(), CrawlerError>;
}
