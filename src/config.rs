use crate::compliance::{ComplianceStatus, Thresholds};
use crate::error::{DashboardError, Result};
use crate::ingestion::ColumnMapping;
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Timeout of a single view request.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Views refresh once a day.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ApiConfig {
    #[schemars(description = "Base URL of the views API; views are read from {base_url}/api/view/{name}")]
    pub base_url: String,
    #[schemars(description = "Value of the X-API-Key header")]
    pub api_key: String,
    #[schemars(description = "Base URL of the API that reports the last data refresh")]
    pub legacy_base_url: String,
    #[schemars(description = "Bearer token for the refresh API")]
    pub legacy_token: String,
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            legacy_base_url: String::new(),
            legacy_token: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Overrides endpoints and credentials from `DASHBOARD_API_BASE`,
    /// `DASHBOARD_API_KEY`, `DASHBOARD_LEGACY_API_BASE` and
    /// `DASHBOARD_LEGACY_API_TOKEN` when they are set.
    pub fn apply_env(&mut self) {
        let vars = [
            ("DASHBOARD_API_BASE", &mut self.base_url),
            ("DASHBOARD_API_KEY", &mut self.api_key),
            ("DASHBOARD_LEGACY_API_BASE", &mut self.legacy_base_url),
            ("DASHBOARD_LEGACY_API_TOKEN", &mut self.legacy_token),
        ];
        for (name, slot) in vars {
            if let Ok(value) = std::env::var(name) {
                *slot = value;
            }
        }
    }
}

/// Compliance thresholds per business section. Sections keep their own
/// policy; they are not meant to agree.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SectionPolicies {
    pub purchases: Thresholds,
    pub sellers: Thresholds,
    pub seller_by_line: Thresholds,
    pub line_kpi: Thresholds,
}

impl Default for SectionPolicies {
    fn default() -> Self {
        Self {
            purchases: Thresholds::PURCHASES,
            sellers: Thresholds::PURCHASES,
            seller_by_line: Thresholds::SELLER_BY_LINE,
            line_kpi: Thresholds::LINE_KPI,
        }
    }
}

impl SectionPolicies {
    fn validate(&self) -> Result<()> {
        self.purchases.validate()?;
        self.sellers.validate()?;
        self.seller_by_line.validate()?;
        self.line_kpi.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DashboardConfig {
    pub api: ApiConfig,
    pub policies: SectionPolicies,
    #[schemars(description = "Status -> color passed through to the presentation layer")]
    pub status_colors: BTreeMap<ComplianceStatus, String>,
    pub columns: ColumnMapping,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let status_colors = [
            (ComplianceStatus::Red, "#DC3545"),
            (ComplianceStatus::Yellow, "#FFC107"),
            (ComplianceStatus::Green, "#28A745"),
            (ComplianceStatus::NoTarget, "#1F77B4"),
        ]
        .into_iter()
        .map(|(status, color)| (status, color.to_string()))
        .collect();

        Self {
            api: ApiConfig::default(),
            policies: SectionPolicies::default(),
            status_colors,
            columns: ColumnMapping::default(),
        }
    }
}

impl DashboardConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DashboardConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        info!("Loaded dashboard configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.policies.validate()?;
        if self.api.timeout_secs == 0 {
            return Err(DashboardError::ConfigError(
                "api.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DashboardConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = DashboardConfig::from_json_str(
            r#"{
                "api": { "base_url": "https://api.example.com", "api_key": "k" },
                "policies": { "purchases": { "green": 100.0, "yellow": 92.0 } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.api.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.api.timeout(), Duration::from_secs(120));
        assert_eq!(config.policies.purchases.yellow, 92.0);
        assert_eq!(config.policies.seller_by_line, Thresholds::SELLER_BY_LINE);
        assert_eq!(config.columns.branch, "sucursal");
        assert_eq!(
            config.status_colors.get(&ComplianceStatus::Red).map(String::as_str),
            Some("#DC3545")
        );
    }

    #[test]
    fn test_inverted_policy_rejected() {
        let err = DashboardConfig::from_json_str(
            r#"{ "policies": { "line_kpi": { "green": 80.0, "yellow": 95.0 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, DashboardError::InvalidThresholds { .. }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = DashboardConfig::from_json_str(r#"{ "api": { "timeout_secs": 0 } }"#).unwrap_err();
        assert!(matches!(err, DashboardError::ConfigError(_)));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = DashboardConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("policies"));
        assert!(schema_json.contains("cache_ttl_secs"));
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = std::env::temp_dir().join(format!("dealer-dashboard-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        let json = serde_json::to_string_pretty(&DashboardConfig::default()).unwrap();
        std::fs::write(&path, json).unwrap();

        let loaded = DashboardConfig::load(&path).unwrap();
        assert_eq!(loaded.policies.line_kpi, Thresholds::LINE_KPI);
        std::fs::remove_dir_all(&dir).ok();
    }
}
