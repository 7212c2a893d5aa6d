use crate::{BrowserSession, CrawlerError, ElementHandle};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;

// W3C WebDriver element identifier key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const NO_SUCH_ELEMENT: &str = "no such element";

/// A live session against a W3C WebDriver endpoint (geckodriver,
/// chromedriver). The driver and browser processes are external; this only
/// speaks the wire protocol.
pub struct WebDriverSession {
    client: reqwest::Client,
    base: String,
    session_id: String,
}

impl WebDriverSession {
    pub async fn connect(endpoint: &str, headless: bool) -> Result<Self, CrawlerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        let base = endpoint.trim_end_matches('/').to_string();

        let body = client
            .post(format!("{base}/session"))
            .json(&capabilities(headless))
            .send()
            .await?
            .text()
            .await?;
        let value: Value = serde_json::from_str(&body).unwrap_or_default();
        if let Some(error) = driver_error(&value) {
            return Err(error);
        }
        let session_id = value
            .pointer("/value/sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| CrawlerError::WebDriver {
                name: "session not created".to_string(),
                message: body,
            })?
            .to_string();

        Ok(WebDriverSession {
            client,
            base,
            session_id,
        })
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, CrawlerError> {
        let url = format!("{}/session/{}{}", self.base, self.session_id, path);
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let value: Value = serde_json::from_str(&text).unwrap_or_default();
        if let Some(error) = driver_error(&value) {
            return Err(error);
        }
        if !status.is_success() {
            return Err(CrawlerError::WebDriver {
                name: format!("http {}", status.as_u16()),
                message: text,
            });
        }
        Ok(value)
    }

    async fn find(&self, path: &str, css: &str) -> Result<Value, CrawlerError> {
        self.command(
            Method::POST,
            path,
            Some(json!({ "using": "css selector", "value": css })),
        )
        .await
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<(), CrawlerError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn go_back(&mut self) -> Result<(), CrawlerError> {
        self.command(Method::POST, "/back", Some(json!({}))).await?;
        Ok(())
    }

    async fn find_element(&mut self, css: &str) -> Result<Option<ElementHandle>, CrawlerError> {
        match self.find("/element", css).await {
            Ok(value) => Ok(element_id(value.pointer("/value")).map(ElementHandle)),
            Err(CrawlerError::WebDriver { name, .. }) if name == NO_SUCH_ELEMENT => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_elements(&mut self, css: &str) -> Result<Vec<ElementHandle>, CrawlerError> {
        let value = self.find("/elements", css).await?;
        Ok(value
            .pointer("/value")
            .and_then(Value::as_array)
            .map(|elements| {
                elements
                    .iter()
                    .filter_map(|e| element_id(Some(e)))
                    .map(ElementHandle)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), CrawlerError> {
        self.command(
            Method::POST,
            &format!("/element/{}/click", element.0),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    async fn switch_to_frame(&mut self, element: &ElementHandle) -> Result<(), CrawlerError> {
        self.command(
            Method::POST,
            "/frame",
            Some(json!({ "id": { ELEMENT_KEY: element.0 } })),
        )
        .await?;
        Ok(())
    }

    async fn execute_script(&mut self, script: &str) -> Result<Value, CrawlerError> {
        let value = self
            .command(
                Method::POST,
                "/execute/sync",
                Some(json!({ "script": script, "args": [] })),
            )
            .await?;
        Ok(value.pointer("/value").cloned().unwrap_or(Value::Null))
    }

    async fn page_source(&mut self) -> Result<String, CrawlerError> {
        let value = self.command(Method::GET, "/source", None).await?;
        Ok(value
            .pointer("/value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn quit(&mut self) -> Result<(), CrawlerError> {
        self.command(Method::DELETE, "", None).await?;
        Ok(())
    }
}

fn driver_error(value: &Value) -> Option<CrawlerError> {
    let name = value.pointer("/value/error")?.as_str()?.to_string();
    let message = value
        .pointer("/value/message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(CrawlerError::WebDriver { name, message })
}

fn element_id(value: Option<&Value>) -> Option<String> {
    value?
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn capabilities(headless: bool) -> Value {
    let mut args = Vec::<String>::new();
    if headless {
        args.push("-headless".to_string());
    }
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "firefox",
                "acceptInsecureCerts": true,
                "moz:firefoxOptions": { "args": args }
            }
        }
    })
}
