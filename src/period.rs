//! Cascading period and category selection.
//!
//! Every selector's options are computed from the rows left by the selectors
//! before it, so a selection built from the offered options never yields an
//! empty row set except through an explicit [`CategorySelection::All`] on an
//! empty dataset.

use crate::error::{DashboardError, Result};
use crate::schema::{DetailRow, Dimension, DimensionValue, YearBasis, ALL_LABEL};
use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthSelection {
    All,
    Month(u32),
}

impl MonthSelection {
    /// A single calendar month, 1 = January.
    pub fn month(month: u32) -> Result<Self> {
        if (1..=12).contains(&month) {
            Ok(MonthSelection::Month(month))
        } else {
            Err(DashboardError::InvalidMonth(month))
        }
    }

    pub fn matches(&self, month: u32) -> bool {
        match self {
            MonthSelection::All => true,
            MonthSelection::Month(m) => *m == month,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, MonthSelection::All)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySelection {
    All,
    Only(String),
}

impl CategorySelection {
    pub fn matches(&self, value: &DimensionValue) -> bool {
        match self {
            CategorySelection::All => true,
            CategorySelection::Only(wanted) => value.to_string() == *wanted,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CategorySelection::All => ALL_LABEL,
            CategorySelection::Only(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryFilter {
    pub dimension: Dimension,
    pub value: CategorySelection,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSelection {
    pub year: i32,
    #[serde(default)]
    pub year_basis: YearBasis,
    pub month: MonthSelection,
    #[serde(default)]
    pub categories: Vec<CategoryFilter>,
}

impl FilterSelection {
    pub fn new(year: i32, month: MonthSelection) -> Self {
        Self {
            year,
            year_basis: YearBasis::Calendar,
            month,
            categories: Vec::new(),
        }
    }

    pub fn fiscal(mut self) -> Self {
        self.year_basis = YearBasis::Fiscal;
        self
    }

    /// Appends a category filter; filters apply in the order they are added.
    pub fn with_category(mut self, dimension: Dimension, value: CategorySelection) -> Self {
        self.categories.push(CategoryFilter { dimension, value });
        self
    }

    pub fn category(&self, dimension: Dimension) -> Option<&CategorySelection> {
        self.categories
            .iter()
            .find(|c| c.dimension == dimension)
            .map(|c| &c.value)
    }

    /// True when `row` passes the year, the month and the first `categories`
    /// category filters.
    fn matches_upto(&self, row: &DetailRow, categories: usize) -> bool {
        row.year_for(self.year_basis) == self.year
            && self.month.matches(row.month)
            && self
                .categories
                .iter()
                .take(categories)
                .all(|c| c.value.matches(&row.dimension(c.dimension)))
    }

    pub fn matches(&self, row: &DetailRow) -> bool {
        self.matches_upto(row, self.categories.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthOption {
    pub selection: MonthSelection,
    pub label: String,
}

/// Distinct years, most recent first.
pub fn available_years<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    basis: YearBasis,
) -> Vec<i32> {
    let years: BTreeSet<i32> = rows.into_iter().map(|r| r.year_for(basis)).collect();
    years.into_iter().rev().collect()
}

/// Months present in `year`, in month-number order.
pub fn available_months<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    year: i32,
    basis: YearBasis,
    allow_all: bool,
) -> Vec<MonthOption> {
    let mut months: BTreeMap<u32, String> = BTreeMap::new();
    for row in rows.into_iter().filter(|r| r.year_for(basis) == year) {
        months.entry(row.month).or_insert_with(|| row.month_label());
    }

    if months.is_empty() {
        return Vec::new();
    }

    let mut options = Vec::with_capacity(months.len() + 1);
    if allow_all {
        options.push(MonthOption {
            selection: MonthSelection::All,
            label: ALL_LABEL.to_string(),
        });
    }
    options.extend(months.into_iter().map(|(month, label)| MonthOption {
        selection: MonthSelection::Month(month),
        label,
    }));
    options
}

/// Options for `dimension` given the year, month and every category filter in
/// `selection` that precedes `dimension`. Filters on `dimension` itself and
/// after it are ignored.
pub fn available_values<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    selection: &FilterSelection,
    dimension: Dimension,
) -> Vec<CategorySelection> {
    let prior = selection
        .categories
        .iter()
        .position(|c| c.dimension == dimension)
        .unwrap_or(selection.categories.len());

    let values: BTreeSet<DimensionValue> = rows
        .into_iter()
        .filter(|r| selection.matches_upto(r, prior))
        .map(|r| r.dimension(dimension))
        .collect();

    if values.is_empty() {
        return Vec::new();
    }

    let mut options = Vec::with_capacity(values.len() + 1);
    options.push(CategorySelection::All);
    options.extend(
        values
            .into_iter()
            .map(|v| CategorySelection::Only(v.to_string())),
    );
    options
}

/// Rows matching year, month and every category filter, in input order.
pub fn apply_filters<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    selection: &FilterSelection,
) -> Vec<&'a DetailRow> {
    rows.into_iter().filter(|r| selection.matches(r)).collect()
}

/// Drops rows of `today`'s year whose month has not started yet.
pub fn exclude_future_periods<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    today: NaiveDate,
) -> Vec<&'a DetailRow> {
    rows.into_iter()
        .filter(|r| !(r.year == today.year() && r.month > today.month()))
        .collect()
}

/// A selection reconciled against the data, with the options each selector
/// should offer.
#[derive(Debug, Clone)]
pub struct ResolvedSelection<'a> {
    pub selection: FilterSelection,
    pub years: Vec<i32>,
    pub months: Vec<MonthOption>,
    pub categories: Vec<(Dimension, Vec<CategorySelection>)>,
    /// Whether any requested value had to be replaced.
    pub adjusted: bool,
    pub rows: Vec<&'a DetailRow>,
}

/// Walks the cascade year → month → categories. A requested value that the
/// stage does not offer is replaced by the stage default: the most recent
/// year, `TODOS` (or the first month when cross-month totals are not allowed),
/// and `TODOS` for categories. Returns `None` when `rows` is empty.
pub fn resolve_selection<'a>(
    rows: &'a [DetailRow],
    requested: &FilterSelection,
    allow_all_months: bool,
) -> Option<ResolvedSelection<'a>> {
    let basis = requested.year_basis;
    let years = available_years(rows, basis);
    let mut adjusted = false;

    let year = if years.contains(&requested.year) {
        requested.year
    } else {
        adjusted = true;
        *years.first()?
    };

    let months = available_months(rows, year, basis, allow_all_months);
    let month = if months.iter().any(|m| m.selection == requested.month) {
        requested.month
    } else {
        adjusted = true;
        months.first()?.selection
    };

    let mut selection = FilterSelection {
        year,
        year_basis: basis,
        month,
        categories: Vec::with_capacity(requested.categories.len()),
    };

    let mut categories = Vec::with_capacity(requested.categories.len());
    for filter in &requested.categories {
        let options = available_values(rows, &selection, filter.dimension);
        let value = if options.contains(&filter.value) {
            filter.value.clone()
        } else {
            adjusted = true;
            CategorySelection::All
        };
        selection.categories.push(CategoryFilter {
            dimension: filter.dimension,
            value,
        });
        categories.push((filter.dimension, options));
    }

    if adjusted {
        debug!("Requested selection {:?} adjusted to {:?}", requested, selection);
    }

    let filtered = apply_filters(rows, &selection);

    Some(ResolvedSelection {
        selection,
        years,
        months,
        categories,
        adjusted,
        rows: filtered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<DetailRow> {
        vec![
            DetailRow::new(2024, 11, "Culiacán").with_product_line("Tractores"),
            DetailRow::new(2024, 12, "Mazatlán").with_product_line("Llantas"),
            DetailRow::new(2025, 2, "Culiacán").with_product_line("Tractores"),
            DetailRow::new(2025, 1, "Mazatlán").with_product_line("Llantas"),
            DetailRow::new(2025, 1, "Guasave").with_product_line("Tractores"),
            DetailRow::new(2025, 10, "Guasave").with_product_line("Riego"),
        ]
    }

    #[test]
    fn test_years_descending() {
        let rows = sample();
        assert_eq!(available_years(&rows, YearBasis::Calendar), vec![2025, 2024]);
        assert!(available_years(&Vec::<DetailRow>::new(), YearBasis::Calendar).is_empty());
    }

    #[test]
    fn test_months_sorted_by_number_not_label() {
        let rows = sample();
        let months = available_months(&rows, 2025, YearBasis::Calendar, true);
        let labels: Vec<&str> = months.iter().map(|m| m.label.as_str()).collect();
        // Alphabetically "Febrero" < "Octubre" < "Enero" would be wrong.
        assert_eq!(labels, vec!["TODOS", "Enero", "Febrero", "Octubre"]);

        let without_all = available_months(&rows, 2025, YearBasis::Calendar, false);
        assert_eq!(without_all[0].selection, MonthSelection::Month(1));
    }

    #[test]
    fn test_category_options_follow_upstream_filters() {
        let rows = sample();
        let selection = FilterSelection::new(2025, MonthSelection::Month(1))
            .with_category(Dimension::ProductLine, CategorySelection::Only("Llantas".into()))
            .with_category(Dimension::Branch, CategorySelection::All);

        let branches = available_values(&rows, &selection, Dimension::Branch);
        assert_eq!(
            branches,
            vec![CategorySelection::All, CategorySelection::Only("Mazatlán".into())]
        );

        // The line selector itself ignores its own value.
        let lines = available_values(&rows, &selection, Dimension::ProductLine);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_apply_filters_is_conjunctive() {
        let rows = sample();
        let broad = FilterSelection::new(2025, MonthSelection::All);
        let narrow = broad
            .clone()
            .with_category(Dimension::Branch, CategorySelection::Only("Guasave".into()));

        let broad_rows = apply_filters(&rows, &broad);
        let narrow_rows = apply_filters(&rows, &narrow);
        assert_eq!(broad_rows.len(), 4);
        assert_eq!(narrow_rows.len(), 2);
        assert!(narrow_rows.iter().all(|r| broad_rows.contains(r)));
    }

    #[test]
    fn test_resolve_replaces_unavailable_choices() {
        let rows = sample();
        let requested = FilterSelection::new(2023, MonthSelection::Month(12))
            .with_category(Dimension::Branch, CategorySelection::Only("Mazatlán".into()));

        let resolved = resolve_selection(&rows, &requested, true).unwrap();
        assert!(resolved.adjusted);
        assert_eq!(resolved.selection.year, 2025);
        assert_eq!(resolved.selection.month, MonthSelection::All);
        assert_eq!(
            resolved.selection.category(Dimension::Branch),
            Some(&CategorySelection::Only("Mazatlán".into()))
        );
        assert_eq!(resolved.rows.len(), 1);
    }

    #[test]
    fn test_month_selection_bounds() {
        assert_eq!(MonthSelection::month(12).unwrap(), MonthSelection::Month(12));
        assert!(matches!(
            MonthSelection::month(13),
            Err(DashboardError::InvalidMonth(13))
        ));
        assert!(MonthSelection::month(0).is_err());
    }

    #[test]
    fn test_resolve_empty_dataset() {
        let rows: Vec<DetailRow> = Vec::new();
        let requested = FilterSelection::new(2025, MonthSelection::All);
        assert!(resolve_selection(&rows, &requested, true).is_none());
    }

    #[test]
    fn test_exclude_future_periods() {
        let rows = sample();
        let today = NaiveDate::from_ymd_opt(2025, 2, 15).unwrap();
        let kept = exclude_future_periods(&rows, today);
        assert_eq!(kept.len(), 5);
        assert!(kept.iter().all(|r| !(r.year == 2025 && r.month == 10)));
    }
}
