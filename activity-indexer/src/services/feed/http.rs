use async_trait::async_trait;
use reqwest::Client;
use tracing::trace;

use super::ActivityApi;
use crate::interfaces::activity::{ActivityItem, ActivityResponse};
use crate::interfaces::error::FeedError;

/// Client of the backend `/api/activity` endpoints.
pub struct HttpActivityApi {
    client: Client,
    base_url: String,
}

impl HttpActivityApi {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn recent_url(&self, limit: u32) -> String {
        format!("{}/api/activity/recent?limit={}", self.base_url, limit)
    }

    pub fn user_url(&self, address: &str, limit: u32) -> String {
        format!(
            "{}/api/activity/user/{}?limit={}",
            self.base_url, address, limit
        )
    }

    async fn get(&self, url: &str) -> Result<Vec<ActivityItem>, FeedError> {
        trace!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response.json::<ActivityResponse>().await?;
        Ok(body.data)
    }
}

#[async_trait]
impl ActivityApi for HttpActivityApi {
    async fn recent_activity(&self, limit: u32) -> Result<Vec<ActivityItem>, FeedError> {
        self.get(&self.recent_url(limit)).await
    }

    async fn user_activity(&self, address: &str, limit: u32) -> Result<Vec<ActivityItem>, FeedError> {
        self.get(&self.user_url(address, limit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::activity::{ActivityAction, ActivityTokenType};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers a single request with `status` and `body`, returns the base url.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[test]
    fn test_urls() {
        let api = HttpActivityApi::new("https://api.example.com/");

        assert_eq!(
            api.recent_url(20),
            "https://api.example.com/api/activity/recent?limit=20"
        );
        assert_eq!(
            api.user_url("0x70997970c51812dc3a010c7d01b50e0d17dc79c8", 5),
            "https://api.example.com/api/activity/user/0x70997970c51812dc3a010c7d01b50e0d17dc79c8?limit=5"
        );
    }

    #[test]
    fn test_response_envelope() {
        let body = r#"{
            "data": [{
                "id": "evt-1",
                "username": "alice",
                "action": "claimed_freebie",
                "token_name": "Sunset",
                "creator_name": "bob",
                "amount": 1,
                "total_cost": 0,
                "is_freebie": true,
                "type": "creator_token",
                "created_at": "2024-11-04T12:00:00Z"
            }]
        }"#;

        let response: ActivityResponse = serde_json::from_str(body).unwrap();
        let item = &response.data[0];
        assert_eq!(item.action, ActivityAction::ClaimedFreebie);
        assert_eq!(item.token_type, ActivityTokenType::CreatorToken);
        assert!(item.is_freebie);
        assert_eq!(item.total_cost, 0.0);
    }

    #[tokio::test]
    async fn test_server_error_maps_to_status() {
        let base_url = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let api = HttpActivityApi::new(&base_url);

        let result = api.recent_activity(20).await;
        assert!(matches!(result, Err(FeedError::Status(500))));
    }

    #[tokio::test]
    async fn test_unreachable_backend_maps_to_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = HttpActivityApi::new(&format!("http://{}", addr));
        let result = api.user_activity("0xabc", 5).await;
        assert!(matches!(result, Err(FeedError::Transport(_))));
    }

    #[tokio::test]
    async fn test_malformed_body_maps_to_decode() {
        let base_url = serve_once("200 OK", r#"{"items": "not a feed"}"#).await;
        let api = HttpActivityApi::new(&base_url);

        let result = api.recent_activity(20).await;
        assert!(matches!(result, Err(FeedError::Decode(_))));
    }

    #[tokio::test]
    async fn test_successful_response_returns_items() {
        let base_url = serve_once(
            "200 OK",
            r#"{"data":[{"id":"evt-1","username":"alice","action":"bought","token_name":"Sunset","creator_name":"bob","amount":2,"total_cost":0.02,"is_freebie":false,"type":"post_token","created_at":"2024-11-04T12:00:00Z"}]}"#,
        )
        .await;
        let api = HttpActivityApi::new(&base_url);

        let items = api.recent_activity(20).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].action, ActivityAction::Bought);
    }
}
