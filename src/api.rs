use crate::config::ApiConfig;
use crate::error::{DashboardError, Result};
use crate::ingestion::{rows_from_json, ColumnMapping};
use crate::schema::DetailRow;
use crate::source::ViewSource;
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const API_KEY_HEADER: &str = "X-API-Key";

/// Last refresh of the warehouse, as reported by the legacy API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFreshness {
    pub fecha: String,
    #[serde(default)]
    pub descripcion: Option<String>,
}

impl DataFreshness {
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];
        let fecha = self.fecha.trim();
        FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(fecha, format).ok())
    }
}

/// Reads views from `{base_url}/api/view/{name}`.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
    columns: ColumnMapping,
}

impl ApiClient {
    pub fn new(config: ApiConfig, columns: ColumnMapping) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| DashboardError::ConfigError(format!("Invalid API key: {}", e)))?;
        headers.insert(API_KEY_HEADER, key);

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| DashboardError::ConfigError(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            columns,
        })
    }

    fn view_url(&self, view: &str) -> String {
        format!("{}/api/view/{}", self.config.base_url.trim_end_matches('/'), view)
    }

    fn fetch_error(&self, view: &str, err: reqwest::Error) -> DashboardError {
        if err.is_timeout() {
            DashboardError::FetchTimeout {
                view: view.to_string(),
                seconds: self.config.timeout_secs,
            }
        } else {
            DashboardError::FetchFailed {
                view: view.to_string(),
                details: err.to_string(),
            }
        }
    }

    pub async fn last_update(&self) -> Result<DataFreshness> {
        let url = format!(
            "{}/ultima_actualizacion",
            self.config.legacy_base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.legacy_token)
            .send()
            .await
            .map_err(|e| self.fetch_error("ultima_actualizacion", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::FetchFailed {
                view: "ultima_actualizacion".to_string(),
                details: format!("status {}", status),
            });
        }

        response
            .json::<DataFreshness>()
            .await
            .map_err(|e| self.fetch_error("ultima_actualizacion", e))
    }
}

impl ViewSource for ApiClient {
    async fn fetch_view(&self, view: &str) -> Result<Vec<DetailRow>> {
        let url = self.view_url(view);
        debug!("Fetching view '{}' from {}", view, url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.fetch_error(view, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DashboardError::FetchFailed {
                view: view.to_string(),
                details: format!("status {}: {}", status, body),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.fetch_error(view, e))?;
        let outcome = rows_from_json(&body, &self.columns);
        if outcome.skipped_records > 0 {
            warn!(
                "View '{}': skipped {} records without a usable period",
                view, outcome.skipped_records
            );
        }
        info!("Loaded {} rows from view '{}'", outcome.rows.len(), view);
        Ok(outcome.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_url_ignores_trailing_slash() {
        let config = ApiConfig {
            base_url: "https://bi.example.com/".to_string(),
            api_key: "secret".to_string(),
            ..ApiConfig::default()
        };
        let client = ApiClient::new(config, ColumnMapping::default()).unwrap();
        assert_eq!(
            client.view_url("vw_dashboard_meta_compras"),
            "https://bi.example.com/api/view/vw_dashboard_meta_compras"
        );
    }

    #[test]
    fn test_invalid_api_key_rejected() {
        let config = ApiConfig {
            api_key: "bad\nkey".to_string(),
            ..ApiConfig::default()
        };
        assert!(matches!(
            ApiClient::new(config, ColumnMapping::default()),
            Err(DashboardError::ConfigError(_))
        ));
    }

    #[test]
    fn test_freshness_timestamp() {
        let freshness: DataFreshness = serde_json::from_str(
            r#"{ "fecha": "2025-11-03 06:15:00", "descripcion": "Carga nocturna" }"#,
        )
        .unwrap();
        let ts = freshness.timestamp().unwrap();
        assert_eq!(ts.format("%d/%m/%Y %H:%M").to_string(), "03/11/2025 06:15");

        let unparsed = DataFreshness {
            fecha: "ayer".to_string(),
            descripcion: None,
        };
        assert!(unparsed.timestamp().is_none());
    }
}
