//! W3C WebDriver implementation of the browser capability, aimed at
//! chromedriver.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Map, Value};

use crate::browser::{
    BrowserLauncher, BrowserSession, ElementHandle, Locator, SessionOptions, SCRIPT_TIMEOUT,
};
use crate::error::BrowserError;

/// Key under which W3C WebDriver serializes element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Launches sessions against a WebDriver endpoint such as
/// `http://localhost:9515`.
#[derive(Clone)]
pub struct WebDriverLauncher {
    client: Client,
    base_url: String,
    /// Bound on every command that has no step-specific timeout.
    command_timeout: Duration,
}

impl WebDriverLauncher {
    /// # Errors
    ///
    /// Returns [`BrowserError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, command_timeout: Duration) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            command_timeout,
        })
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn capabilities(options: &SessionOptions) -> Value {
    let (width, height) = options.viewport;
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        format!("--user-agent={}", options.user_agent),
        format!("--window-size={width},{height}"),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
    ];
    if options.headless {
        args.push("--headless=new".to_string());
    }
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "pageLoadStrategy": "eager",
                "timeouts": {
                    "pageLoad": millis(options.page_load_timeout),
                    "script": millis(SCRIPT_TIMEOUT),
                },
                "goog:chromeOptions": {
                    "args": args,
                    "excludeSwitches": ["enable-automation"],
                }
            }
        }
    })
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn open(&self, options: &SessionOptions) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let url = format!("{}/session", self.base_url);
        let value = send_command(
            &self.client,
            Method::POST,
            &url,
            Some(capabilities(options)),
            self.command_timeout,
            "new session",
        )
        .await
        .map_err(|e| match e {
            BrowserError::WebDriver { message, .. } => BrowserError::SessionNotCreated { message },
            other => other,
        })?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::UnexpectedResponse {
                operation: "new session".to_string(),
                reason: "missing sessionId".to_string(),
            })?
            .to_string();

        let session = WebDriverSession {
            client: self.client.clone(),
            session_url: format!("{url}/{session_id}"),
            command_timeout: self.command_timeout,
        };

        if let Err(err) = session.install_shims(options).await {
            // The session exists on the driver side; release it before bailing.
            if let Err(close_err) = session.close().await {
                tracing::warn!(error = %close_err, "failed to close session after shim install error");
            }
            return Err(err);
        }

        tracing::debug!(session_id, "opened WebDriver session");
        Ok(Box::new(session))
    }
}

/// A live WebDriver session.
pub struct WebDriverSession {
    client: Client,
    session_url: String,
    command_timeout: Duration,
}

impl WebDriverSession {
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        timeout: Duration,
        operation: &str,
    ) -> Result<Value, BrowserError> {
        let url = format!("{}{path}", self.session_url);
        send_command(&self.client, method, &url, body, timeout, operation).await
    }

    /// Install the init script and extra headers through chromedriver's CDP
    /// passthrough so they apply to the first navigation.
    async fn install_shims(&self, options: &SessionOptions) -> Result<(), BrowserError> {
        self.cdp(
            "Page.addScriptToEvaluateOnNewDocument",
            json!({ "source": options.init_script }),
        )
        .await?;

        if !options.extra_headers.is_empty() {
            let headers: Map<String, Value> = options
                .extra_headers
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            self.cdp("Network.enable", json!({})).await?;
            self.cdp("Network.setExtraHTTPHeaders", json!({ "headers": headers }))
                .await?;
        }
        Ok(())
    }

    async fn cdp(&self, cmd: &str, params: Value) -> Result<Value, BrowserError> {
        self.command(
            Method::POST,
            "/goog/cdp/execute",
            Some(json!({ "cmd": cmd, "params": params })),
            self.command_timeout,
            cmd,
        )
        .await
    }

    async fn execute(&self, script: &str, args: Value, operation: &str) -> Result<Value, BrowserError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
            self.command_timeout,
            operation,
        )
        .await
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.command(
            Method::POST,
            "/url",
            Some(json!({ "url": url })),
            timeout,
            &format!("navigate to {url}"),
        )
        .await
        .map(|_| ())
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, BrowserError> {
        let value = self
            .command(
                Method::POST,
                "/elements",
                Some(locator_body(locator)),
                self.command_timeout,
                "find elements",
            )
            .await?;
        parse_elements(&value)
    }

    async fn find_within(
        &self,
        element: &ElementHandle,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let value = self
            .command(
                Method::POST,
                &format!("/element/{}/elements", element.0),
                Some(locator_body(locator)),
                self.command_timeout,
                "find child elements",
            )
            .await?;
        parse_elements(&value)
    }

    async fn inner_text(
        &self,
        element: &ElementHandle,
        timeout: Duration,
    ) -> Result<String, BrowserError> {
        let value = self
            .command(
                Method::GET,
                &format!("/element/{}/text", element.0),
                None,
                timeout,
                "read element text",
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn page_source(&self, timeout: Duration) -> Result<String, BrowserError> {
        let value = self
            .command(Method::GET, "/source", None, timeout, "read page source")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn scroll_to_fraction(&self, fraction: f64) -> Result<(), BrowserError> {
        self.execute(
            "window.scrollTo(0, document.body.scrollHeight * arguments[0]);",
            json!([fraction]),
            "scroll",
        )
        .await
        .map(|_| ())
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.execute(
            "arguments[0].scrollIntoView({block: 'center'});",
            json!([{ ELEMENT_KEY: element.0 }]),
            "scroll into view",
        )
        .await
        .map(|_| ())
    }

    async fn click(&self, element: &ElementHandle, timeout: Duration) -> Result<(), BrowserError> {
        self.command(
            Method::POST,
            &format!("/element/{}/click", element.0),
            Some(json!({})),
            timeout,
            "click",
        )
        .await
        .map(|_| ())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.command(
            Method::DELETE,
            "",
            None,
            self.command_timeout,
            "delete session",
        )
        .await
        .map(|_| ())
    }
}

fn locator_body(locator: &Locator) -> Value {
    json!({ "using": locator.strategy(), "value": locator.value() })
}

fn parse_elements(value: &Value) -> Result<Vec<ElementHandle>, BrowserError> {
    let items = value
        .as_array()
        .ok_or_else(|| BrowserError::UnexpectedResponse {
            operation: "find elements".to_string(),
            reason: "value is not an array".to_string(),
        })?;
    Ok(items
        .iter()
        .filter_map(|item| item.get(ELEMENT_KEY).and_then(Value::as_str))
        .map(|id| ElementHandle(id.to_string()))
        .collect())
}

/// Send one WebDriver command and unwrap its `value` field.
///
/// The whole exchange, including reading the body, is bounded by `timeout`.
async fn send_command(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
    timeout: Duration,
    operation: &str,
) -> Result<Value, BrowserError> {
    let exchange = async {
        let mut request = client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        let payload: Value = response.json().await?;
        Ok::<_, BrowserError>((status, payload))
    };

    let (status, mut payload) = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| BrowserError::Timeout {
            operation: operation.to_string(),
            timeout_ms: millis(timeout),
        })??;

    let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Err(BrowserError::WebDriver {
        operation: operation.to_string(),
        status: status.as_u16(),
        error: field("error"),
        message: field("message"),
    })
}
