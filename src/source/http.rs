// REST client for the ERP backend
// Decision: Plain JSON arrays per resource; wire rows are decoupled from the models
// Decision: Ids may arrive as numbers or strings, both are normalised to strings

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

use crate::models::{CleaningRecord, Magnet, MagnetMapping, TransferSession, TransferStatus};

use super::MonitorSource;

const SESSIONS_PATH: &str = "transfer-sessions";
const MAPPINGS_PATH: &str = "route-magnets";
const MAGNETS_PATH: &str = "magnets";
const CLEANINGS_PATH: &str = "magnet-cleanings";

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

fn de_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

fn de_opt_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(String::from))
}

#[derive(Debug, Deserialize)]
struct SessionRow {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    route_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    source_godown_id: Option<String>,
    #[serde(default, alias = "source_name")]
    source_godown_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    destination_bin_id: Option<String>,
    #[serde(default, alias = "destination_name")]
    destination_bin_name: Option<String>,
    start_timestamp: DateTime<Utc>,
    #[serde(alias = "cleaning_interval_seconds")]
    cleaning_interval: i64,
    status: String,
}

impl From<SessionRow> for TransferSession {
    fn from(row: SessionRow) -> Self {
        let status = match row.status.to_ascii_lowercase().as_str() {
            "active" | "running" | "in_progress" => TransferStatus::Active,
            _ => TransferStatus::Stopped,
        };
        let source_name = row
            .source_godown_name
            .or_else(|| row.source_godown_id.clone())
            .unwrap_or_default();
        let destination_name = row
            .destination_bin_name
            .or_else(|| row.destination_bin_id.clone())
            .unwrap_or_default();

        Self {
            route_id: row.route_id.unwrap_or_else(|| row.id.clone()),
            id: row.id,
            source_name,
            destination_name,
            start_timestamp: row.start_timestamp,
            cleaning_interval_seconds: row.cleaning_interval,
            status,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MappingRow {
    #[serde(deserialize_with = "de_id")]
    magnet_id: String,
    #[serde(deserialize_with = "de_id")]
    route_id: String,
}

#[derive(Debug, Deserialize)]
struct MagnetRow {
    #[serde(deserialize_with = "de_id")]
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CleaningRow {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(deserialize_with = "de_id")]
    magnet_id: String,
    cleaning_timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "de_opt_id")]
    transfer_session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewCleaning<'a> {
    magnet_id: &'a str,
    cleaning_timestamp: DateTime<Utc>,
    transfer_session_id: Option<&'a str>,
}

/// Reads monitor data from the ERP REST API.
#[derive(Debug, Clone)]
pub struct RestSource {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RestSource {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("magnet-watch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!("GET {url}");

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .with_context(|| format!("Failed to send request to {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("GET {} failed with status {}: {}", url, status, error_text);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {url}"))
    }
}

#[async_trait]
impl MonitorSource for RestSource {
    async fn transfer_sessions(&self) -> Result<Vec<TransferSession>> {
        let rows: Vec<SessionRow> = self.get_json(SESSIONS_PATH).await?;
        Ok(rows.into_iter().map(TransferSession::from).collect())
    }

    async fn magnet_mappings(&self) -> Result<Vec<MagnetMapping>> {
        let rows: Vec<MappingRow> = self.get_json(MAPPINGS_PATH).await?;
        Ok(rows
            .into_iter()
            .map(|row| MagnetMapping {
                magnet_id: row.magnet_id,
                route_id: row.route_id,
            })
            .collect())
    }

    async fn magnets(&self) -> Result<Vec<Magnet>> {
        let rows: Vec<MagnetRow> = self.get_json(MAGNETS_PATH).await?;
        Ok(rows
            .into_iter()
            .map(|row| Magnet {
                id: row.id,
                name: row.name,
            })
            .collect())
    }

    async fn cleaning_records(&self) -> Result<Vec<CleaningRecord>> {
        let rows: Vec<CleaningRow> = self.get_json(CLEANINGS_PATH).await?;
        Ok(rows
            .into_iter()
            .map(|row| CleaningRecord {
                id: row.id,
                magnet_id: row.magnet_id,
                cleaning_timestamp: row.cleaning_timestamp,
                transfer_session_id: row.transfer_session_id,
            })
            .collect())
    }

    async fn record_cleaning(&self, record: &CleaningRecord) -> Result<()> {
        let url = self.url(CLEANINGS_PATH);
        let body = NewCleaning {
            magnet_id: &record.magnet_id,
            cleaning_timestamp: record.cleaning_timestamp,
            transfer_session_id: record.transfer_session_id.as_deref(),
        };

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("POST {} failed with status {}: {}", url, status, error_text);
        }
        Ok(())
    }
}
