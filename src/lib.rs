//! # Dealer Dashboard
//!
//! Period-aware filtering, aggregation, pivoting and target-compliance
//! classification for the sales, purchases and cancellations dashboards of an
//! equipment dealer.
//!
//! ## Core Concepts
//!
//! - **Detail rows**: fact records read from reporting views, carrying a period,
//!   categorical dimensions and named measures
//! - **Cascading selection**: year, month and category selectors whose options
//!   always come from the rows left by the selectors before them
//! - **Aggregation**: group-by with a per-field reduction plan, top-N and pivots
//!   with totals in fiscal order
//! - **Compliance**: actual vs target percent and a GREEN / YELLOW / RED / NO_TARGET
//!   status under section-specific thresholds
//!
//! ## Example
//!
//! ```rust,ignore
//! use dealer_dashboard::*;
//!
//! let outcome = rows_from_json(&body, &ColumnMapping::default());
//! let requested = FilterSelection::new(2025, MonthSelection::All)
//!     .with_category(Dimension::Branch, CategorySelection::All);
//!
//! if let RenderState::Ready(resolved) = prepare_render(&outcome.rows, &requested, true) {
//!     let matrix = branch_matrix(resolved.rows.iter().copied(), measures::PURCHASES)?;
//!     let series = period_compliance(
//!         resolved.rows.iter().copied(),
//!         measures::PURCHASES,
//!         measures::TARGET,
//!         &Thresholds::PURCHASES,
//!     )?;
//! }
//! ```

pub mod aggregate;
pub mod compliance;
pub mod config;
pub mod error;
pub mod geo;
pub mod ingestion;
pub mod memo;
pub mod period;
pub mod pivot;
pub mod reports;
pub mod schema;
pub mod sections;
pub mod source;

#[cfg(feature = "api")]
pub mod api;

pub use aggregate::{
    group_and_reduce, sum_measure, top_n, top_n_breakdown, AggregatedRow, Field, Reduction,
    ReductionPlan,
};
pub use compliance::{
    compute_compliance, compute_margin_percent, compute_variation, variation_series,
    ComplianceResult, ComplianceStatus, Thresholds,
};
pub use config::{ApiConfig, DashboardConfig, SectionPolicies};
pub use error::{DashboardError, Result};
pub use geo::{customer_locations, sanitize_coordinates, LocationPoint};
pub use ingestion::*;
pub use memo::RenderMemo;
pub use period::*;
pub use pivot::{to_pivot_matrix, PivotMatrix, PivotRow, PivotSpec, RowOrder};
pub use reports::*;
pub use schema::*;
pub use sections::Section;
pub use source::{fetch_all, fetch_outcome, InMemorySource, ViewCache, ViewOutcome, ViewSource};

#[cfg(feature = "api")]
pub use api::{ApiClient, DataFreshness};

use log::{debug, info};

/// What a render pass has to work with once the selection is resolved.
#[derive(Debug, Clone)]
pub enum RenderState<'a> {
    /// The view returned no rows; nothing downstream should run.
    Empty,
    /// The data is there but the resolved selection matches none of it.
    NoMatches(ResolvedSelection<'a>),
    Ready(ResolvedSelection<'a>),
}

impl<'a> RenderState<'a> {
    pub fn resolved(&self) -> Option<&ResolvedSelection<'a>> {
        match self {
            RenderState::Empty => None,
            RenderState::NoMatches(resolved) | RenderState::Ready(resolved) => Some(resolved),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, RenderState::Ready(_))
    }
}

/// Resolves `requested` against `rows` and short-circuits the pass when there
/// is nothing to aggregate.
pub fn prepare_render<'a>(
    rows: &'a [DetailRow],
    requested: &FilterSelection,
    allow_all_months: bool,
) -> RenderState<'a> {
    let Some(resolved) = resolve_selection(rows, requested, allow_all_months) else {
        info!("No rows available; rendering empty state");
        return RenderState::Empty;
    };

    if resolved.rows.is_empty() {
        info!("Selection {:?} matches no rows", resolved.selection);
        return RenderState::NoMatches(resolved);
    }

    debug!(
        "Selection {:?} matches {} of {} rows",
        resolved.selection,
        resolved.rows.len(),
        rows.len()
    );
    RenderState::Ready(resolved)
}
