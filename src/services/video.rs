use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Client for the meeting-room provider. Callers treat every failure as
/// non-fatal.
#[derive(Clone)]
pub struct VideoRoomClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct MeetingResponse {
    #[serde(rename = "roomUrl")]
    room_url: String,
}

impl VideoRoomClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url,
            api_key,
        }
    }

    pub async fn create_room(
        &self,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<String, VideoError> {
        let response = self
            .client
            .post(format!("{}/meetings", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "startDate": starts_at.to_rfc3339(),
                "endDate": ends_at.to_rfc3339(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VideoError::UnexpectedResponse(format!(
                "status {}",
                response.status()
            )));
        }

        let meeting = response
            .json::<MeetingResponse>()
            .await
            .map_err(|e| VideoError::UnexpectedResponse(e.to_string()))?;
        Ok(meeting.room_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_room() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/meetings")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"roomUrl":"https://meet.example.com/room-1"}"#)
            .create_async()
            .await;

        let client = VideoRoomClient::new(server.url(), "video-key".to_string());
        let now = Utc::now();
        let url = client
            .create_room(now, now + chrono::Duration::minutes(60))
            .await
            .unwrap();

        assert_eq!(url, "https://meet.example.com/room-1");
    }

    #[tokio::test]
    async fn test_create_room_provider_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/meetings")
            .with_status(503)
            .create_async()
            .await;

        let client = VideoRoomClient::new(server.url(), "video-key".to_string());
        let now = Utc::now();
        let result = client.create_room(now, now + chrono::Duration::minutes(60)).await;

        assert!(matches!(result, Err(VideoError::UnexpectedResponse(_))));
    }
}
