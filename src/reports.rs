//! Section reports built on top of the aggregation and compliance engines.
//!
//! Each builder takes already-filtered rows and returns plain serializable
//! structures; no formatting happens here.

use crate::aggregate::{group_and_reduce, top_n, top_n_breakdown, AggregatedRow, Reduction, ReductionPlan};
use crate::compliance::{
    compute_compliance, compute_margin_percent, variation_series, ComplianceResult,
    ComplianceStatus, Thresholds,
};
use crate::error::Result;
use crate::period::{exclude_future_periods, MonthSelection};
use crate::pivot::{to_pivot_matrix, PivotMatrix, PivotSpec};
use crate::schema::measures::{
    CANCELLED_INVOICES, COMPLIANCE_PCT, COST, MARGIN_PCT, PROFIT, REVENUE, TARGET,
};
use crate::schema::{month_name_es, DetailRow, Dimension, PeriodKey};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Shown in place of a month name when the month number is out of range.
pub const INVALID_MONTH_LABEL: &str = "Mes inválido";

/// One period of an actual-vs-target series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodCompliance {
    pub period: String,
    pub period_key: PeriodKey,
    pub compliance: ComplianceResult,
    /// Change of `actual` against the previous period, in percent.
    pub variation: Option<f64>,
}

/// Monthly `actual` against `target` in chronological order, with the
/// month-over-month variation of `actual`.
pub fn period_compliance<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    actual: &str,
    target: &str,
    thresholds: &Thresholds,
) -> Result<Vec<PeriodCompliance>> {
    let plan = ReductionPlan::new().sum(actual).sum(target);
    let grouped = group_and_reduce(
        rows,
        &[Dimension::FiscalYear, Dimension::FiscalMonthOrder, Dimension::PeriodLabel],
        &plan,
    )?;

    let actuals: Vec<f64> = grouped.iter().map(|r| r.measure(actual)).collect();
    let variations = variation_series(&actuals);

    Ok(grouped
        .iter()
        .zip(variations)
        .map(|(row, variation)| PeriodCompliance {
            period: row.label(Dimension::PeriodLabel),
            period_key: row.first_period,
            compliance: compute_compliance(
                row.measure(actual),
                Some(row.measure(target)),
                thresholds,
            ),
            variation,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCompliance {
    pub entity: String,
    pub compliance: ComplianceResult,
}

/// Actual against target per value of `dimension` (branch, line, seller).
pub fn entity_compliance<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    dimension: Dimension,
    actual: &str,
    target: &str,
    thresholds: &Thresholds,
) -> Result<Vec<EntityCompliance>> {
    let plan = ReductionPlan::new().sum(actual).sum(target);
    let grouped = group_and_reduce(rows, &[dimension], &plan)?;

    Ok(grouped
        .iter()
        .map(|row| EntityCompliance {
            entity: row.label(dimension),
            compliance: compute_compliance(
                row.measure(actual),
                Some(row.measure(target)),
                thresholds,
            ),
        })
        .collect())
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerPerformance {
    pub seller: String,
    pub target: Option<f64>,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub margin_pct: Option<f64>,
    /// Average of the compliance percent the view reported.
    pub reported_compliance: Option<f64>,
    pub compliance: ComplianceResult,
    /// Worst reported status; classified from `compliance` when none was
    /// reported.
    pub status: ComplianceStatus,
}

/// Builds a seller's figures from a group reduced on revenue, cost, profit,
/// margin, compliance and target. Without a reported status the row takes
/// `unreported`, or its own classification when that is `None`.
fn seller_from_group(
    row: &AggregatedRow,
    thresholds: &Thresholds,
    unreported: Option<ComplianceStatus>,
) -> SellerPerformance {
    let target = positive(row.measures.get(TARGET).copied());
    let revenue = row.measure(REVENUE);
    let compliance = compute_compliance(revenue, target, thresholds);
    let status = row
        .status
        .as_deref()
        .and_then(ComplianceStatus::from_label)
        .or(unreported)
        .unwrap_or(compliance.status);
    SellerPerformance {
        seller: row.label(Dimension::Seller),
        target,
        revenue,
        cost: row.measure(COST),
        profit: row.measure(PROFIT),
        margin_pct: row.measures.get(MARGIN_PCT).copied(),
        reported_compliance: row.measures.get(COMPLIANCE_PCT).copied(),
        compliance,
        status,
    }
}

/// Year-to-date results per seller. A seller's target repeats on each of
/// their rows, so only the first one counts. Sellers with a target come first,
/// largest target first.
pub fn seller_performance<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    thresholds: &Thresholds,
) -> Result<Vec<SellerPerformance>> {
    let plan = ReductionPlan::new()
        .first(TARGET)
        .sum(REVENUE)
        .sum(COST)
        .sum(PROFIT)
        .mean(MARGIN_PCT)
        .mean(COMPLIANCE_PCT)
        .status(Reduction::Max);
    let grouped = group_and_reduce(rows, &[Dimension::Seller], &plan)?;

    let mut sellers: Vec<SellerPerformance> = grouped
        .iter()
        .map(|row| seller_from_group(row, thresholds, None))
        .collect();

    sellers.sort_by(|a, b| match (a.target, b.target) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    Ok(sellers)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSellerCompliance {
    /// `"<line> - <seller>"`.
    pub label: String,
    pub product_line: String,
    pub seller: String,
    pub target: f64,
    pub revenue: f64,
    pub compliance: ComplianceResult,
    pub status: ComplianceStatus,
}

/// Seller compliance inside each product line.
///
/// Over a single month the view's own status is kept, and a row the view left
/// without status is `NO_TARGET`. Across all months the reported statuses no
/// longer describe the total, so the status is classified again from the
/// summed figures. Rows with a target come first, then by target and revenue,
/// both descending.
pub fn line_seller_compliance<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    month: &MonthSelection,
    thresholds: &Thresholds,
) -> Result<Vec<LineSellerCompliance>> {
    let plan = ReductionPlan::new()
        .sum(TARGET)
        .sum(REVENUE)
        .status(Reduction::First);
    let grouped = group_and_reduce(rows, &[Dimension::ProductLine, Dimension::Seller], &plan)?;

    let mut result: Vec<LineSellerCompliance> = grouped
        .iter()
        .map(|row| {
            let target = row.measure(TARGET);
            let revenue = row.measure(REVENUE);
            let compliance = compute_compliance(revenue, Some(target), thresholds);
            let reported = row.status.as_deref().and_then(ComplianceStatus::from_label);
            let status = if month.is_all() {
                compliance.status
            } else {
                reported.unwrap_or(ComplianceStatus::NoTarget)
            };
            let product_line = row.label(Dimension::ProductLine);
            let seller = row.label(Dimension::Seller);
            LineSellerCompliance {
                label: format!("{} - {}", product_line, seller),
                product_line,
                seller,
                target,
                revenue,
                compliance,
                status,
            }
        })
        .collect();

    result.sort_by(|a, b| {
        (b.target > 0.0)
            .cmp(&(a.target > 0.0))
            .then_with(|| b.target.total_cmp(&a.target))
            .then_with(|| b.revenue.total_cmp(&a.revenue))
    });
    Ok(result)
}

/// Per-seller table of the product-line section. Line targets add up across
/// the seller's lines and months; margin and reported compliance are averaged
/// and the first reported status is kept, `NO_TARGET` when there is none.
/// Largest revenue first.
pub fn line_seller_table<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    thresholds: &Thresholds,
) -> Result<Vec<SellerPerformance>> {
    let plan = ReductionPlan::new()
        .sum(TARGET)
        .sum(REVENUE)
        .sum(COST)
        .sum(PROFIT)
        .mean(MARGIN_PCT)
        .mean(COMPLIANCE_PCT)
        .status(Reduction::First);
    let grouped = group_and_reduce(rows, &[Dimension::Seller], &plan)?;

    let mut sellers: Vec<SellerPerformance> = grouped
        .iter()
        .map(|row| seller_from_group(row, thresholds, Some(ComplianceStatus::NoTarget)))
        .collect();
    sellers.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    Ok(sellers)
}

/// Headline figures of the product-line section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineKpis {
    pub revenue: f64,
    pub profit: f64,
    pub target: f64,
    /// Only meaningful for one line: targets of different lines do not add up
    /// to a shared target.
    pub compliance: Option<ComplianceResult>,
    /// Profit over revenue of the whole selection.
    pub margin_pct: Option<f64>,
}

pub fn line_kpis<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    line_selected: bool,
    thresholds: &Thresholds,
) -> LineKpis {
    let (mut revenue, mut profit, mut target) = (0.0, 0.0, 0.0);
    for row in rows {
        revenue += row.measure(REVENUE);
        profit += row.measure(PROFIT);
        target += row.measure(TARGET);
    }

    LineKpis {
        revenue,
        profit,
        target,
        compliance: line_selected.then(|| compute_compliance(revenue, Some(target), thresholds)),
        margin_pct: compute_margin_percent(profit, revenue),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailOrder {
    /// Year, month, then entity name.
    ByEntity,
    /// Year, month, then revenue descending.
    ByRevenue,
}

/// Per (year, month, period, entity) totals for the detail tables. Months of
/// the current year that have not started are left out.
pub fn period_detail<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    entity: Dimension,
    today: NaiveDate,
    order: DetailOrder,
) -> Result<Vec<AggregatedRow>> {
    let rows = exclude_future_periods(rows, today);
    let plan = ReductionPlan::new()
        .sum(REVENUE)
        .sum(COST)
        .sum(PROFIT)
        .sum(TARGET)
        .mean(MARGIN_PCT);
    let mut grouped = group_and_reduce(
        rows,
        &[Dimension::Year, Dimension::Month, Dimension::PeriodLabel, entity],
        &plan,
    )?;

    if order == DetailOrder::ByRevenue {
        grouped.sort_by(|a, b| {
            let period = |r: &AggregatedRow| (r.key(Dimension::Year).cloned(), r.key(Dimension::Month).cloned());
            period(a)
                .cmp(&period(b))
                .then_with(|| b.measure(REVENUE).total_cmp(&a.measure(REVENUE)))
        });
    }
    Ok(grouped)
}

/// Total `measure` per value of `dimension`, largest first, cut to `limit`
/// entries when given.
pub fn measure_by<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    dimension: Dimension,
    measure: &str,
    limit: Option<usize>,
) -> Result<Vec<AggregatedRow>> {
    let grouped = group_and_reduce(rows, &[dimension], &ReductionPlan::new().sum(measure))?;
    let n = limit.unwrap_or(grouped.len());
    Ok(top_n(&grouped, measure, n))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCancellations {
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub cancelled_invoices: f64,
}

pub fn cancellations_by_month<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
) -> Result<Vec<MonthlyCancellations>> {
    let grouped = group_and_reduce(
        rows,
        &[Dimension::Year, Dimension::Month],
        &ReductionPlan::new().sum(CANCELLED_INVOICES),
    )?;

    Ok(grouped
        .iter()
        .filter_map(|row| {
            let year = row.key(Dimension::Year)?.as_int()? as i32;
            let month = row.key(Dimension::Month)?.as_int()? as u32;
            Some(MonthlyCancellations {
                year,
                month,
                month_name: month_name_es(month)
                    .unwrap_or(INVALID_MONTH_LABEL)
                    .to_string(),
                cancelled_invoices: row.measure(CANCELLED_INVOICES),
            })
        })
        .collect())
}

/// The `n` values of `dimension` (client, seller, supplier) with the most
/// cancelled invoices.
pub fn top_cancellations<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    dimension: Dimension,
    n: usize,
) -> Result<Vec<AggregatedRow>> {
    let grouped = group_and_reduce(
        rows,
        &[dimension],
        &ReductionPlan::new().sum(CANCELLED_INVOICES),
    )?;
    debug!("Ranking {} {:?} values by cancellations", grouped.len(), dimension);
    Ok(top_n(&grouped, CANCELLED_INVOICES, n))
}

/// [`top_cancellations`] split by sale condition for stacked bars.
pub fn top_cancellations_by_condition<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    dimension: Dimension,
    n: usize,
) -> Result<Vec<AggregatedRow>> {
    top_n_breakdown(rows, dimension, Dimension::SaleCondition, CANCELLED_INVOICES, n)
}

/// Period × branch table of `measure`, periods in fiscal order.
pub fn branch_matrix<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    measure: &str,
) -> Result<PivotMatrix> {
    let grouped = group_and_reduce(
        rows,
        &[Dimension::PeriodLabel, Dimension::Branch],
        &ReductionPlan::new().sum(measure),
    )?;
    Ok(to_pivot_matrix(
        &grouped,
        &PivotSpec::new(Dimension::PeriodLabel, Dimension::Branch, measure),
    ))
}
