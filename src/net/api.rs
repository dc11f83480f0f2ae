//! HTTP client for the Ender backend

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};

use crate::config::Config;
use crate::geom::Vector2;
use crate::net::protocol::{DeathReport, HeroSnapshot, UpdateRequest, WorldDelta};

/// Body for the hero fetch-or-create endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateHeroRequest {
    user_id: i64,
}

/// Body for bulk wall deletion
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteWallsRequest<'a> {
    hero_id: i64,
    cells: &'a [Vector2],
}

/// Body for an authoritative position write
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PositionUpdate {
    hero_id: i64,
    position: Vector2,
}

/// Thin wrapper over the game's HTTP API
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.server_url.clone(),
            timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/ender/{}", self.base_url, path)
    }

    /// POST a JSON body and parse a JSON response
    async fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        data: &T,
    ) -> Result<R, ApiError> {
        let response = self
            .client
            .post(self.api_url(path))
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .json(data)
            .send()
            .await
            .map_err(ApiError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        // An explicit null body is a failure signal, not "no changes".
        let parsed: Option<R> = response.json().await.map_err(ApiError::Parse)?;
        parsed.ok_or(ApiError::EmptyResponse)
    }

    /// POST a JSON body, ignoring the response payload
    async fn post_command<T: Serialize>(&self, path: &str, data: &T) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.api_url(path))
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .json(data)
            .send()
            .await
            .map_err(ApiError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    /// Fetch the hero bound to this user, creating one on first contact
    pub async fn fetch_or_create_hero(&self, user_id: i64) -> Result<HeroSnapshot, ApiError> {
        self.post("hero", &CreateHeroRequest { user_id }).await
    }

    /// Fetch a world delta for the current poll cycle
    pub async fn fetch_updates(&self, request: &UpdateRequest) -> Result<WorldDelta, ApiError> {
        self.post("updates", request).await
    }

    /// Delete specific trail walls owned by a hero
    pub async fn delete_walls(&self, hero_id: i64, cells: &[Vector2]) -> Result<(), ApiError> {
        self.post_command("walls/delete", &DeleteWallsRequest { hero_id, cells })
            .await
    }

    /// Write an authoritative hero position
    pub async fn set_hero_position(
        &self,
        hero_id: i64,
        position: Vector2,
    ) -> Result<(), ApiError> {
        self.post_command("hero/position", &PositionUpdate { hero_id, position })
            .await
    }

    /// Report final run stats after the local hero dies
    pub async fn record_death(&self, report: &DeathReport) -> Result<(), ApiError> {
        self.post_command("hero/death", report).await
    }
}

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),

    #[error("Server returned an empty response")]
    EmptyResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(&Config {
            server_url: base.to_string(),
            user_id: 1,
            log_level: "info".into(),
            poll_interval_ms: 1_000,
            request_timeout_ms: 250,
            wander_enabled: false,
            bot_seed: 0,
        })
    }

    #[test]
    fn endpoints_live_under_the_ender_prefix() {
        let api = client("http://localhost:8080");
        assert_eq!(api.api_url("updates"), "http://localhost:8080/api/ender/updates");
        assert_eq!(api.api_url("hero/death"), "http://localhost:8080/api/ender/hero/death");
    }

    #[test]
    fn unreachable_server_is_a_request_error() {
        // Port 1 refuses connections; the fetch must surface as a transport
        // failure, which the poll cycle counts toward the outage threshold.
        let api = client("http://127.0.0.1:1");
        let result = tokio_test::block_on(api.fetch_or_create_hero(1));
        assert!(matches!(result, Err(ApiError::Request(_))));
    }
}
