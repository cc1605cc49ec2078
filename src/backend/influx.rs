//! InfluxDB v2 backend
//!
//! Plans are rendered to Flux and posted to `/api/v2/query`; the annotated CSV
//! answer is returned untouched. Points go to `/api/v2/write` as line
//! protocol with millisecond precision.

use super::flux::{self, FluxTarget};
use super::line::encode_sample;
use super::TimeSeriesBackend;
use crate::config::InfluxConfig;
use crate::error::{excerpt, BackendError, Error, Result};
use crate::query::{QueryPlan, TabularSchema};
use crate::types::Sample;
use crate::util::{endpoint, sanitize_url};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, warn};

/// Settings resolved for one call
struct Connection<'a> {
    url: &'a str,
    org: &'a str,
    token: &'a str,
    target: FluxTarget,
}

/// HTTP client for an InfluxDB v2 instance
pub struct InfluxBackend {
    config: InfluxConfig,
    client: reqwest::Client,
}

impl InfluxBackend {
    /// Create a backend
    ///
    /// Incomplete settings are accepted here and reported on each call, so a
    /// half-configured deployment still starts and answers with the list of
    /// missing keys.
    pub fn new(config: InfluxConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Transport(format!("client setup: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Resolve required settings, failing before any network activity
    fn connection(&self) -> Result<Connection<'_>> {
        let missing = self.config.missing_keys();
        if !missing.is_empty() {
            return Err(Error::Configuration { missing });
        }
        let (Some(url), Some(org), Some(token), Some(target)) = (
            self.config.url.as_deref(),
            self.config.org.as_deref(),
            self.config.token.as_deref(),
            FluxTarget::from_config(&self.config),
        ) else {
            return Err(Error::Configuration {
                missing: self.config.missing_keys(),
            });
        };
        Ok(Connection {
            url,
            org,
            token,
            target,
        })
    }

    async fn post(
        &self,
        conn: &Connection<'_>,
        path: &str,
        query: &[(&str, &str)],
        content_type: &str,
        body: String,
    ) -> Result<String> {
        let url = endpoint(conn.url, path).map_err(BackendError::Transport)?;
        let response = self
            .client
            .post(url)
            .query(query)
            .header(AUTHORIZATION, format!("Token {}", conn.token))
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, "application/csv")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %sanitize_url(conn.url), error = %e, "influx request failed");
                BackendError::Transport(e.without_url().to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.without_url().to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), path, "influx returned an error");
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: excerpt(&text),
            }
            .into());
        }
        Ok(text)
    }
}

#[async_trait]
impl TimeSeriesBackend for InfluxBackend {
    fn backend_id(&self) -> &str {
        "influxdb"
    }

    fn schema(&self) -> TabularSchema {
        TabularSchema::for_fields(
            self.config.temperature_field.as_str(),
            self.config.humidity_field.as_str(),
        )
    }

    async fn execute(&self, plan: &QueryPlan) -> Result<String> {
        let conn = self.connection()?;
        let script = flux::render(&conn.target, plan);
        debug!(kind = plan.kind(), bytes = script.len(), "posting flux query");
        self.post(
            &conn,
            "/api/v2/query",
            &[("org", conn.org)],
            "application/vnd.flux",
            script,
        )
        .await
    }

    async fn write_sample(&self, sample: &Sample) -> Result<()> {
        let conn = self.connection()?;
        let line = encode_sample(
            &conn.target.measurement,
            &conn.target.temperature_field,
            &conn.target.humidity_field,
            sample,
        );
        self.post(
            &conn,
            "/api/v2/write",
            &[
                ("org", conn.org),
                ("bucket", conn.target.bucket.as_str()),
                ("precision", "ms"),
            ],
            "text/plain; charset=utf-8",
            line,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{validate_range, Granularity, StatSet};
    use chrono::Utc;

    #[tokio::test]
    async fn test_missing_configuration_fails_before_network() {
        let backend = InfluxBackend::new(InfluxConfig {
            url: Some("http://127.0.0.1:9".into()),
            token: Some("t".into()),
            ..InfluxConfig::default()
        })
        .unwrap();

        let window = validate_range("2025-09-01T00:00:00Z", "2025-09-02T00:00:00Z").unwrap();
        let plan = QueryPlan::build(window, Granularity::Raw, &StatSet::mean());
        match backend.execute(&plan).await {
            Err(Error::Configuration { missing }) => {
                assert_eq!(missing, vec!["INFLUX_ORG", "INFLUX_BUCKET"]);
            },
            other => panic!("expected configuration error, got {:?}", other),
        }

        let sample = Sample::new(Utc::now(), 20.0, 50.0);
        assert!(matches!(
            backend.write_sample(&sample).await,
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_schema_follows_configured_fields() {
        let backend = InfluxBackend::new(InfluxConfig {
            temperature_field: "temp".into(),
            humidity_field: "hum".into(),
            ..InfluxConfig::default()
        })
        .unwrap();
        let schema = backend.schema();
        assert_eq!(schema.temperature, "temp");
        assert_eq!(schema.humidity, "hum");
        assert_eq!(backend.backend_id(), "influxdb");
    }
}
