use super::{Parking, Parkings, ParkingSource};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub const BASE_URL: &str = "https://velobike.ru";
const PARKINGS_PATH: &str = "/ajax/parkings/";

/// HTTP client for the Velobike parkings endpoint.
///
/// Every request is bounded by the configured timeout; a timed out request is
/// reported like any other fetch failure.
pub struct VelobikeClient {
    http_client: Client,
    base_url: String,
}

impl VelobikeClient {
    /// Create a client against `base_url` (the real API or a mock server).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("velostat/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the full parkings list.
    pub async fn fetch_parkings(&self) -> Result<Parkings> {
        let url = format!("{}{}", self.base_url, PARKINGS_PATH);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to send parkings request")?;

        check_response_status(&response)?;
        response
            .json::<Parkings>()
            .await
            .context("Failed to parse parkings response")
    }
}

#[async_trait]
impl ParkingSource for VelobikeClient {
    fn name(&self) -> &str {
        "velobike"
    }

    async fn list_parkings(&self) -> Result<Vec<Parking>> {
        Ok(self.fetch_parkings().await?.items)
    }
}

fn check_response_status(response: &reqwest::Response) -> Result<()> {
    match response.status() {
        StatusCode::TOO_MANY_REQUESTS => Err(anyhow!("Velobike API rate limit exceeded")),
        s if !s.is_success() => Err(anyhow!("Velobike API error: {}", s)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_list_parkings() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/ajax/parkings/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "Items": [
                        {"Id": "0001", "FreePlaces": 4, "Position": {"Lat": 55.1, "Lon": 37.1}},
                        {"Id": "0002", "FreePlaces": 0, "Position": {"Lat": 55.2, "Lon": 37.2}}
                    ]
                }"#,
            )
            .create_async()
            .await;

        let client = VelobikeClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let parkings = client.list_parkings().await.unwrap();

        assert_eq!(parkings.len(), 2);
        assert_eq!(parkings[0].id.as_deref(), Some("0001"));
        assert_eq!(parkings[1].free_places, Some(0));
    }

    #[tokio::test]
    async fn test_server_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/ajax/parkings/")
            .with_status(503)
            .create_async()
            .await;

        let client = VelobikeClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = client.list_parkings().await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_invalid_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/ajax/parkings/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("not json")
            .create_async()
            .await;

        let client = VelobikeClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = client.list_parkings().await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse parkings response"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = VelobikeClient::new("http://localhost:1234/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://localhost:1234");
    }
}
