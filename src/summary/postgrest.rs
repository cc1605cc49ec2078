//! PostgREST (Supabase) summary store
//!
//! Rows live in a table keyed by `fecha` with columns
//! `promedio_temperatura`, `promedio_humedad` and `minimo_temperatura`.

use super::SummaryStore;
use crate::config::SummaryConfig;
use crate::error::{excerpt, Error, Result, StoreError};
use crate::types::DailySummary;
use crate::util::{endpoint, sanitize_url};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Row layout as stored in the table
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SummaryRow {
    fecha: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    promedio_temperatura: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    promedio_humedad: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    minimo_temperatura: Option<f64>,
}

impl From<SummaryRow> for DailySummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            date: row.fecha,
            mean_temperature: row.promedio_temperatura,
            mean_humidity: row.promedio_humedad,
            min_temperature: row.minimo_temperatura,
        }
    }
}

/// Filter that matches rows whose minimum is absent or above `value`
fn lower_min_filter(value: f64) -> String {
    format!(
        "(minimo_temperatura.is.null,minimo_temperatura.gt.{})",
        value
    )
}

/// HTTP client for a PostgREST endpoint
pub struct PostgrestStore {
    config: SummaryConfig,
    client: reqwest::Client,
}

impl PostgrestStore {
    /// Create a store
    ///
    /// Missing settings are reported on each call rather than here.
    pub fn new(config: SummaryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Transport(format!("client setup: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Authenticated request against the table endpoint
    fn request(&self, method: Method) -> Result<RequestBuilder> {
        let (Some(url), Some(key)) = (
            self.config.url.as_deref().filter(|v| !v.trim().is_empty()),
            self.config.service_key.as_deref().filter(|v| !v.trim().is_empty()),
        ) else {
            return Err(Error::Configuration {
                missing: self.config.missing_keys(),
            });
        };
        let table = endpoint(url, &format!("/rest/v1/{}", self.config.table))
            .map_err(StoreError::Transport)?;
        Ok(self
            .client
            .request(method, table)
            .header("apikey", key)
            .header(AUTHORIZATION, format!("Bearer {}", key))
            .header(ACCEPT, "application/json"))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            warn!(
                url = %sanitize_url(self.config.url.as_deref().unwrap_or_default()),
                error = %e,
                "summary store request failed"
            );
            StoreError::Transport(e.without_url().to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "summary store returned an error");
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: excerpt(&body),
            }
            .into());
        }
        Ok(response)
    }

    async fn rows(response: Response) -> Result<Vec<SummaryRow>> {
        let rows = response
            .json::<Vec<SummaryRow>>()
            .await
            .map_err(|e| StoreError::Malformed(e.without_url().to_string()))?;
        Ok(rows)
    }
}

#[async_trait]
impl SummaryStore for PostgrestStore {
    fn store_id(&self) -> &str {
        "postgrest"
    }

    async fn upsert_means(&self, date: NaiveDate, temperature: f64, humidity: f64) -> Result<()> {
        let row = SummaryRow {
            fecha: date,
            promedio_temperatura: Some(temperature),
            promedio_humedad: Some(humidity),
            minimo_temperatura: None,
        };
        let request = self
            .request(Method::POST)?
            .query(&[("on_conflict", "fecha")])
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row]);
        self.send(request).await?;
        debug!(%date, "summary means upserted");
        Ok(())
    }

    async fn lower_min_temperature(&self, date: NaiveDate, value: f64) -> Result<bool> {
        let fecha = format!("eq.{}", date);
        let filter = lower_min_filter(value);
        let request = self
            .request(Method::PATCH)?
            .query(&[("fecha", fecha.as_str()), ("or", filter.as_str())])
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "minimo_temperatura": value }));
        let updated = Self::rows(self.send(request).await?).await?;
        debug!(%date, value, changed = !updated.is_empty(), "minimum temperature checked");
        Ok(!updated.is_empty())
    }

    async fn get(&self, date: NaiveDate) -> Result<Option<DailySummary>> {
        let fecha = format!("eq.{}", date);
        let request = self
            .request(Method::GET)?
            .query(&[("select", "*"), ("fecha", fecha.as_str())]);
        let rows = Self::rows(self.send(request).await?).await?;
        Ok(rows.into_iter().next().map(DailySummary::from))
    }
}
