use crate::error::{DashboardError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Percent bounds of the status bands: at or above `green` is GREEN, at or
/// above `yellow` is YELLOW, anything lower is RED.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Thresholds {
    pub green: f64,
    pub yellow: f64,
}

impl Thresholds {
    /// Purchases against the purchase target.
    pub const PURCHASES: Thresholds = Thresholds {
        green: 100.0,
        yellow: 90.0,
    };

    /// Seller compliance inside a product line.
    pub const SELLER_BY_LINE: Thresholds = Thresholds {
        green: 95.0,
        yellow: 85.0,
    };

    /// Headline compliance card of the product-line section.
    pub const LINE_KPI: Thresholds = Thresholds {
        green: 95.0,
        yellow: 80.0,
    };

    pub fn new(green: f64, yellow: f64) -> Result<Self> {
        let thresholds = Self { green, yellow };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.green.is_finite() || !self.yellow.is_finite() || self.green < self.yellow {
            return Err(DashboardError::InvalidThresholds {
                green: self.green,
                yellow: self.yellow,
            });
        }
        Ok(())
    }

    pub fn classify(&self, percent: f64) -> ComplianceStatus {
        if percent >= self.green {
            ComplianceStatus::Green
        } else if percent >= self.yellow {
            ComplianceStatus::Yellow
        } else {
            ComplianceStatus::Red
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Red,
    Yellow,
    Green,
    NoTarget,
}

impl ComplianceStatus {
    /// Reads the labels views report (`ROJO`, `AMARILLO`, `VERDE`, `SIN META`)
    /// as well as the English names. Case and surrounding blanks are ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "ROJO" | "RED" => Some(ComplianceStatus::Red),
            "AMARILLO" | "YELLOW" => Some(ComplianceStatus::Yellow),
            "VERDE" | "GREEN" => Some(ComplianceStatus::Green),
            "SIN_META" | "NO_TARGET" => Some(ComplianceStatus::NoTarget),
            _ => None,
        }
    }

    /// Label in the vocabulary the views use.
    pub fn label(&self) -> &'static str {
        match self {
            ComplianceStatus::Red => "ROJO",
            ComplianceStatus::Yellow => "AMARILLO",
            ComplianceStatus::Green => "VERDE",
            ComplianceStatus::NoTarget => "SIN_META",
        }
    }

    /// Higher is worse. A missing target ranks below every measured status.
    pub fn severity(&self) -> u8 {
        match self {
            ComplianceStatus::NoTarget => 0,
            ComplianceStatus::Green => 1,
            ComplianceStatus::Yellow => 2,
            ComplianceStatus::Red => 3,
        }
    }

    /// The most severe status, `None` for an empty input.
    pub fn worst(statuses: impl IntoIterator<Item = ComplianceStatus>) -> Option<Self> {
        statuses.into_iter().max_by_key(|s| s.severity())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub actual: f64,
    pub target: Option<f64>,
    pub percent_compliance: Option<f64>,
    pub status: ComplianceStatus,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compares `actual` to `target`. The percent is rounded to two decimals, the
/// precision it is reported at, before it is classified. A missing, zero or
/// negative target yields `NO_TARGET` without a percent.
pub fn compute_compliance(
    actual: f64,
    target: Option<f64>,
    thresholds: &Thresholds,
) -> ComplianceResult {
    match target.filter(|t| *t > 0.0 && t.is_finite()) {
        Some(t) => {
            let percent = round2(actual * 100.0 / t);
            ComplianceResult {
                actual,
                target,
                percent_compliance: Some(percent),
                status: thresholds.classify(percent),
            }
        }
        None => ComplianceResult {
            actual,
            target,
            percent_compliance: None,
            status: ComplianceStatus::NoTarget,
        },
    }
}

/// Percent change from `previous` to `current`; `None` without a positive
/// previous value.
pub fn compute_variation(current: f64, previous: Option<f64>) -> Option<f64> {
    let previous = previous.filter(|p| *p > 0.0)?;
    Some((current - previous) / previous * 100.0)
}

/// Profit as a percent of revenue; `None` without positive revenue.
pub fn compute_margin_percent(profit: f64, revenue: f64) -> Option<f64> {
    if revenue > 0.0 {
        Some(profit / revenue * 100.0)
    } else {
        None
    }
}

/// Period-over-period variation of a chronologically ordered series. The
/// first period never has a variation.
pub fn variation_series(values: &[f64]) -> Vec<Option<f64>> {
    let mut previous = None;
    values
        .iter()
        .map(|&current| {
            let variation = compute_variation(current, previous);
            previous = Some(current);
            variation
        })
        .collect()
}
