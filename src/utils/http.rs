// src/utils/http.rs

//! HTTP client utilities.

use reqwest::Response;
use serde_json::Value;

use crate::error::Result;
use crate::models::SourceConfig;

/// Create a configured asynchronous HTTP client.
///
/// The client-wide timeout bounds listing and detail requests; attachment
/// downloads override it per request.
pub fn create_async_client(config: &SourceConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .build()?;
    Ok(client)
}

/// Fetch a URL and decode the body as JSON, failing on non-2xx statuses.
pub async fn fetch_json(client: &reqwest::Client, url: &str) -> Result<Value> {
    let response = client.get(url).send().await?.error_for_status()?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Whether a response declares a JSON body.
pub fn is_json_response(response: &Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_json_decodes_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/items");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"items": [{"id": "A"}]}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/broken");
                then.status(502);
            })
            .await;

        let client = create_async_client(&SourceConfig::default()).unwrap();
        let value = fetch_json(&client, &server.url("/items")).await.unwrap();
        assert_eq!(value["items"][0]["id"], "A");
        assert!(fetch_json(&client, &server.url("/broken")).await.is_err());
    }
}
