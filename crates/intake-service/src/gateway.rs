//! Chat gateway client.
//!
//! The gateway is the adjacent process that speaks the actual chat
//! transport. Operator notifications are pushed to it over HTTP; inbound
//! user events arrive the other way, on `/v1/events`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use intake_core::OperatorId;

use crate::notify::{DeliveryError, Notifier};

/// Timeout for gateway requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the chat gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

impl GatewayClient {
    /// Create a new gateway client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with
    /// default settings).
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }
}

#[async_trait]
impl Notifier for GatewayClient {
    async fn notify(&self, operator: OperatorId, text: &str) -> Result<(), DeliveryError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = SendMessageRequest {
            chat_id: operator.get(),
            text,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn notify_posts_message_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("Authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": 1001,
                "text": "hello"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = GatewayClient::new(server.uri(), Some("secret".into()));
        client
            .notify(OperatorId::new(1001), "hello")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn notify_surfaces_gateway_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(403).set_body_string("blocked"))
            .mount(&server)
            .await;

        let client = GatewayClient::new(server.uri(), None);
        let err = client
            .notify(OperatorId::new(1001), "hello")
            .await
            .unwrap_err();

        match err {
            DeliveryError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "blocked");
            }
            DeliveryError::Http(_) => panic!("expected Api error"),
        }
    }

    #[test]
    fn base_url_is_trimmed() {
        let client = GatewayClient::new("http://gateway.local/", None);
        assert_eq!(client.base_url, "http://gateway.local");
    }
}
