//! Rating-drop alerts.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;

const RESEND_API_URL: &str = "https://api.resend.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Everything needed to tell an owner their product's rating fell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingDropAlert {
    pub recipient: String,
    pub product_name: String,
    pub old_rating: f64,
    pub new_rating: f64,
    pub product_url: String,
}

/// Best-effort delivery of [`RatingDropAlert`]s.
///
/// Returns whether the alert was accepted for delivery. Implementations log
/// their own failures and never propagate them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &RatingDropAlert) -> bool;
}

/// Used when no e-mail provider is configured.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(&self, alert: &RatingDropAlert) -> bool {
        tracing::info!(
            recipient = %alert.recipient,
            product = %alert.product_name,
            "rating drop alert not sent: notifications are disabled"
        );
        false
    }
}

/// Sends alerts through the Resend e-mail API.
pub struct ResendNotifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: String,
    html: String,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: String,
}

impl ResendNotifier {
    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] if the HTTP client cannot be built.
    pub fn new(api_key: &str, from: &str) -> Result<Self, NotifyError> {
        Self::with_base_url(RESEND_API_URL, api_key, from)
    }

    /// Point the notifier at a different API host.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] if the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str, api_key: &str, from: &str) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        })
    }

    /// Send one alert and return the provider's message id.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the request fails or the API rejects it.
    pub async fn send(&self, alert: &RatingDropAlert) -> Result<String, NotifyError> {
        let request = SendEmailRequest {
            from: &self.from,
            to: [&alert.recipient],
            subject: alert_subject(alert),
            html: render_alert_html(alert),
        };
        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let sent: SendEmailResponse = response.json().await?;
        Ok(sent.id)
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn notify(&self, alert: &RatingDropAlert) -> bool {
        match self.send(alert).await {
            Ok(id) => {
                tracing::info!(recipient = %alert.recipient, message_id = %id, "rating drop alert sent");
                true
            }
            Err(e) => {
                tracing::error!(recipient = %alert.recipient, error = %e, "failed to send rating drop alert");
                false
            }
        }
    }
}

#[must_use]
pub fn alert_subject(alert: &RatingDropAlert) -> String {
    format!("Rating Drop Alert: {}", alert.product_name)
}

/// HTML body of the alert e-mail.
#[must_use]
pub fn render_alert_html(alert: &RatingDropAlert) -> String {
    let name = escape_html(&alert.product_name);
    let url = escape_html(&alert.product_url);
    format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #1f2937;">Rating Drop Detected</h1>
    <p style="color: #4b5563;">A product you track on RepuTrack has had a significant rating drop.</p>
    <div style="background: #ffffff; padding: 20px; border-left: 4px solid #ef4444;">
      <h3 style="margin-top: 0;">{name}</h3>
      <p>Previous rating: <strong>{old:.1}</strong></p>
      <p>Current rating: <strong style="color: #ef4444;">{new:.1}</strong></p>
    </div>
    <p style="color: #4b5563;">This can point to quality problems or a rise in negative reviews.</p>
    <p><a href="{url}">View the product page</a></p>
    <p style="color: #9ca3af; font-size: 12px;">You are receiving this because you track this product on RepuTrack.</p>
  </body>
</html>"#,
        old = alert.old_rating,
        new = alert.new_rating,
    )
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
