//! SMS alerts through the provider messaging API

use async_trait::async_trait;
use serde_json::json;

use callguard_core::{Notifier, NotifyError, PhoneNumber};

use crate::http::ProviderHttp;

/// Sends alerts with `POST /v2/messages`
pub struct TelnyxSmsNotifier {
    http: ProviderHttp,
}

impl TelnyxSmsNotifier {
    pub fn new(http: ProviderHttp) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for TelnyxSmsNotifier {
    async fn send(
        &self,
        from: &PhoneNumber,
        to: &PhoneNumber,
        text: &str,
    ) -> Result<(), NotifyError> {
        let body = json!({
            "from": from.as_str(),
            "to": to.as_str(),
            "text": text,
        });

        self.http
            .post_json(&["v2", "messages"], &body)
            .await
            .map_err(NotifyError::from)?;

        tracing::info!(to = %to, from = %from, "Alert SMS accepted by gateway");
        Ok(())
    }
}
