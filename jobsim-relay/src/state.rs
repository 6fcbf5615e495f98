use std::time::Duration;

use dashmap::DashMap;
use reqwest::Client;
use serde_json::Value;

use crate::error::RelayError;

/// Registered callback URLs and the HTTP client used to forward to them.
#[derive(Debug)]
pub struct RelayState {
    clients: DashMap<String, String>,
    http: Client,
}

impl RelayState {
    pub fn new(forward_timeout: Duration) -> Result<Self, RelayError> {
        let http = Client::builder()
            .user_agent(concat!("jobsim-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(forward_timeout)
            .build()?;
        Ok(Self {
            clients: DashMap::new(),
            http,
        })
    }

    /// Register or replace the callback URL of a client.
    pub fn register(&self, client_id: &str, callback_url: &str) -> Option<String> {
        self.clients
            .insert(client_id.to_string(), callback_url.to_string())
    }

    pub fn unregister(&self, client_id: &str) -> Option<String> {
        self.clients.remove(client_id).map(|(_, url)| url)
    }

    pub fn callback_url(&self, client_id: &str) -> Option<String> {
        self.clients.get(client_id).map(|entry| entry.value().clone())
    }

    /// Post `payload` to the client's registered URL once.
    ///
    /// Returns the downstream status code on success.
    pub async fn forward(&self, client_id: &str, payload: &Value) -> Result<u16, RelayError> {
        // Clone out so the map shard is not locked across the request.
        let url = self
            .callback_url(client_id)
            .ok_or_else(|| RelayError::NotRegistered(client_id.to_string()))?;
        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_replaces_previous_url() {
        let state = RelayState::new(Duration::from_secs(1)).unwrap();
        assert_eq!(state.register("c1", "http://a/cb"), None);
        assert_eq!(
            state.register("c1", "http://b/cb").as_deref(),
            Some("http://a/cb")
        );
        assert_eq!(state.callback_url("c1").as_deref(), Some("http://b/cb"));

        assert!(state.unregister("c1").is_some());
        assert_eq!(state.callback_url("c1"), None);
    }

    #[tokio::test]
    async fn forwarding_to_unknown_client_fails() {
        let state = RelayState::new(Duration::from_secs(1)).unwrap();
        let err = state
            .forward("ghost", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotRegistered(_)));
    }
}
