use std::time::Duration;

use async_trait::async_trait;
use engine_logging::engine_debug;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;

use crate::session::{BrowserSession, SessionError, SessionFactory};

#[derive(Debug, Clone)]
pub struct WebDriverSettings {
    pub endpoint: String,
    /// Headless browsers cannot show a login page to a human, so this is off
    /// by default.
    pub headless: bool,
    pub extra_args: Vec<String>,
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4444".to_string(),
            headless: false,
            extra_args: Vec::new(),
        }
    }
}

/// Opens Chrome sessions through a running WebDriver server.
#[derive(Debug, Clone)]
pub struct WebDriverSessionFactory {
    settings: WebDriverSettings,
}

impl WebDriverSessionFactory {
    pub fn new(settings: WebDriverSettings) -> Self {
        Self { settings }
    }

    fn capabilities(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut args: Vec<String> = vec!["--start-maximized".to_string()];
        if self.settings.headless {
            args.push("--headless=new".to_string());
        }
        args.extend(self.settings.extra_args.iter().cloned());

        let mut caps = serde_json::Map::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        caps
    }
}

#[async_trait]
impl SessionFactory for WebDriverSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, SessionError> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities());
        let client = builder
            .connect(&self.settings.endpoint)
            .await
            .map_err(|err| SessionError::Unavailable(err.to_string()))?;
        engine_debug!("webdriver session opened at {}", self.settings.endpoint);
        Ok(Box::new(WebDriverSession { client }))
    }
}

pub struct WebDriverSession {
    client: Client,
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.client.goto(url).await.map_err(map_cmd_error)
    }

    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        match self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
        {
            Ok(_) => Ok(()),
            Err(CmdError::WaitTimeout) => Err(SessionError::Timeout {
                selector: selector.to_string(),
                waited: timeout,
            }),
            Err(err) => Err(map_cmd_error(err)),
        }
    }

    async fn find_text(&mut self, selector: &str) -> Result<Option<String>, SessionError> {
        match self.client.find(Locator::Css(selector)).await {
            Ok(element) => {
                let text = element.text().await.map_err(map_cmd_error)?;
                Ok(Some(text.trim().to_string()))
            }
            Err(err) if err.is_no_such_element() => Ok(None),
            Err(err) => Err(map_cmd_error(err)),
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), SessionError> {
        let element = self
            .client
            .find(Locator::Css(selector))
            .await
            .map_err(|err| miss_as_not_found(err, selector))?;
        element.click().await.map_err(map_cmd_error)
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), SessionError> {
        let element = self
            .client
            .find(Locator::Css(selector))
            .await
            .map_err(|err| miss_as_not_found(err, selector))?;
        element.send_keys(text).await.map_err(map_cmd_error)
    }

    async fn page_source(&mut self) -> Result<String, SessionError> {
        self.client.source().await.map_err(map_cmd_error)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.client.clone().close().await.map_err(map_cmd_error)
    }
}

fn miss_as_not_found(err: CmdError, selector: &str) -> SessionError {
    if err.is_no_such_element() {
        SessionError::NotFound(selector.to_string())
    } else {
        map_cmd_error(err)
    }
}

fn map_cmd_error(err: CmdError) -> SessionError {
    if matches!(err, CmdError::Lost(_)) || is_dead_session(&err) {
        SessionError::Unavailable(err.to_string())
    } else {
        SessionError::Command(err.to_string())
    }
}

/// A closed browser window surfaces as a regular command error.
fn is_dead_session(err: &CmdError) -> bool {
    err.is_invalid_session_id() || err.is_no_such_window()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fantoccini::error::{ErrorStatus, WebDriver};

    fn driver_error(status: ErrorStatus) -> CmdError {
        CmdError::Standard(WebDriver::new(status, "reported by chromedriver"))
    }

    #[test]
    fn closed_browser_ends_the_session() {
        for status in [ErrorStatus::InvalidSessionId, ErrorStatus::NoSuchWindow] {
            let mapped = map_cmd_error(driver_error(status));
            assert!(mapped.is_fatal(), "{mapped:?}");
        }
    }

    #[test]
    fn missing_elements_are_not_fatal() {
        let missing = miss_as_not_found(driver_error(ErrorStatus::NoSuchElement), "div.compose");
        assert_eq!(missing, SessionError::NotFound("div.compose".to_string()));

        let blocked = map_cmd_error(driver_error(ErrorStatus::ElementNotInteractable));
        assert!(matches!(blocked, SessionError::Command(_)));
    }
}
