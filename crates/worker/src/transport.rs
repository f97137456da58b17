//! HTTP publisher.
//!
//! The worker never talks to the platform directly; it posts a small JSON
//! envelope to the configured publisher endpoint and classifies the reply.

use async_trait::async_trait;
use postq_core::transport::{PublishTransport, TransportError};
use postq_core::types::PostTemplate;
use reqwest::StatusCode;
use serde_json::json;

pub struct HttpTransport {
    client: reqwest::Client,
    publish_url: String,
}

impl HttpTransport {
    pub fn new(publish_url: String, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(HttpTransport {
            client,
            publish_url,
        })
    }
}

/// A 4xx means the envelope itself was refused and a retry cannot help;
/// everything else is treated as the publisher being unavailable.
pub fn classify_status(status: StatusCode) -> Option<TransportError> {
    if status.is_success() {
        None
    } else if status.is_client_error() {
        Some(TransportError::Rejected(format!("HTTP {status}")))
    } else {
        Some(TransportError::Unavailable(format!("HTTP {status}")))
    }
}

#[async_trait]
impl PublishTransport for HttpTransport {
    async fn publish(&self, template: &PostTemplate) -> Result<(), TransportError> {
        let payload = json!({
            "channelId": template.channel_id,
            "mediaRef": template.media_ref,
            "caption": template.caption,
            "mediaType": template.media_type,
        });

        let result = self.client.post(&self.publish_url).json(&payload).send().await;

        match result {
            Ok(resp) => match classify_status(resp.status()) {
                None => Ok(()),
                Some(err) => Err(err),
            },
            Err(err) if err.is_timeout() => Err(TransportError::Timeout),
            Err(err) => Err(TransportError::Unavailable(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_statuses_pass() {
        assert!(classify_status(StatusCode::OK).is_none());
        assert!(classify_status(StatusCode::ACCEPTED).is_none());
    }

    #[test]
    fn test_client_errors_are_rejections() {
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY),
            Some(TransportError::Rejected(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND),
            Some(TransportError::Rejected(_))
        ));
    }

    #[test]
    fn test_server_errors_are_unavailable() {
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY),
            Some(TransportError::Unavailable(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Some(TransportError::Unavailable(_))
        ));
    }
}
