use crate::aggregate::AggregatedRow;
use crate::schema::{Dimension, DimensionValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const TOTAL_COLUMN: &str = "Total";
pub const TOTAL_ROW: &str = "TOTAL";

/// How the rows of a pivot are ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowOrder {
    /// By the earliest period of each row label (fiscal year, month order).
    Chronological,
    /// By the row label itself.
    Natural,
    /// By the values of these grouping keys, taken from each label's first row.
    ByKeys(Vec<Dimension>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotSpec {
    pub row_key: Dimension,
    pub column_key: Dimension,
    pub value: String,
    pub order: RowOrder,
}

impl PivotSpec {
    pub fn new(row_key: Dimension, column_key: Dimension, value: &str) -> Self {
        Self {
            row_key,
            column_key,
            value: value.to_string(),
            order: RowOrder::Chronological,
        }
    }

    pub fn ordered_by(mut self, order: RowOrder) -> Self {
        self.order = order;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    pub label: String,
    /// One cell per entry of [`PivotMatrix::data_columns`].
    pub values: Vec<f64>,
    pub total: f64,
}

/// Wide table: one row per row-key value, one column per column-key value, a
/// trailing Total column and a TOTAL footer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotMatrix {
    pub header_left_columns: Vec<String>,
    pub data_columns: Vec<String>,
    pub header_right_columns: Vec<String>,
    pub rows: Vec<PivotRow>,
    /// Column sums keyed by data column.
    pub footer_totals: BTreeMap<String, f64>,
    /// Sum of every cell; the footer value of the `Total` column.
    pub grand_total: f64,
}

impl PivotMatrix {
    pub fn footer_label(&self) -> &'static str {
        TOTAL_ROW
    }

    pub fn footer_total(&self, column: &str) -> Option<f64> {
        self.footer_totals.get(column).copied()
    }

    pub fn grand_total(&self) -> f64 {
        self.grand_total
    }

    pub fn cell(&self, row_label: &str, column: &str) -> Option<f64> {
        let col = self.data_columns.iter().position(|c| c == column)?;
        self.rows
            .iter()
            .find(|r| r.label == row_label)
            .map(|r| r.values[col])
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

type OrderKey = (Vec<DimensionValue>, DimensionValue);

/// Pivots long-format rows into a [`PivotMatrix`]. Cells with no source row
/// hold zero. Rows sharing a (row, column) pair are summed.
pub fn to_pivot_matrix(rows: &[AggregatedRow], spec: &PivotSpec) -> PivotMatrix {
    let mut columns: BTreeSet<DimensionValue> = BTreeSet::new();
    let mut cells: BTreeMap<DimensionValue, BTreeMap<DimensionValue, f64>> = BTreeMap::new();
    let mut order: BTreeMap<DimensionValue, OrderKey> = BTreeMap::new();

    for row in rows {
        let row_value = row
            .key(spec.row_key)
            .cloned()
            .unwrap_or(DimensionValue::Missing);
        let column_value = row
            .key(spec.column_key)
            .cloned()
            .unwrap_or(DimensionValue::Missing);

        let key = order_key(row, &row_value, &spec.order);
        match order.get_mut(&row_value) {
            Some(current) => {
                if key < *current {
                    *current = key;
                }
            }
            None => {
                order.insert(row_value.clone(), key);
            }
        }

        columns.insert(column_value.clone());
        *cells
            .entry(row_value)
            .or_default()
            .entry(column_value)
            .or_insert(0.0) += row.measure(&spec.value);
    }

    let columns: Vec<DimensionValue> = columns.into_iter().collect();

    let mut row_values: Vec<(OrderKey, DimensionValue)> = order
        .into_iter()
        .map(|(value, key)| (key, value))
        .collect();
    row_values.sort();

    let mut column_totals = vec![0.0; columns.len()];
    let mut pivot_rows = Vec::with_capacity(row_values.len());

    for (_, row_value) in row_values {
        let row_cells = cells.remove(&row_value).unwrap_or_default();
        let values: Vec<f64> = columns
            .iter()
            .map(|c| row_cells.get(c).copied().unwrap_or(0.0))
            .collect();
        for (total, value) in column_totals.iter_mut().zip(&values) {
            *total += value;
        }
        pivot_rows.push(PivotRow {
            label: row_value.to_string(),
            total: values.iter().sum(),
            values,
        });
    }

    let data_columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    let footer_totals: BTreeMap<String, f64> = data_columns
        .iter()
        .cloned()
        .zip(column_totals.iter().copied())
        .collect();

    PivotMatrix {
        header_left_columns: vec![spec.row_key.header().to_string()],
        data_columns,
        header_right_columns: vec![TOTAL_COLUMN.to_string()],
        rows: pivot_rows,
        footer_totals,
        grand_total: column_totals.iter().sum(),
    }
}

fn order_key(row: &AggregatedRow, row_value: &DimensionValue, order: &RowOrder) -> OrderKey {
    let primary = match order {
        RowOrder::Chronological => vec![
            DimensionValue::Int(row.first_period.year as i64),
            DimensionValue::Int(row.first_period.order as i64),
        ],
        RowOrder::Natural => Vec::new(),
        RowOrder::ByKeys(dimensions) => dimensions
            .iter()
            .map(|d| row.key(*d).cloned().unwrap_or(DimensionValue::Missing))
            .collect(),
    };
    (primary, row_value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{group_and_reduce, ReductionPlan};
    use crate::schema::measures::REVENUE;
    use crate::schema::DetailRow;

    fn fiscal_rows() -> Vec<DetailRow> {
        // Fiscal year starting in December: Dec = 1, Jan = 2, Feb = 3.
        vec![
            DetailRow::new(2025, 2, "Culiacán")
                .with_fiscal(2025, 3)
                .with_period_label("Feb")
                .with_measure(REVENUE, 30.0),
            DetailRow::new(2024, 12, "Culiacán")
                .with_fiscal(2025, 1)
                .with_period_label("Dec")
                .with_measure(REVENUE, 10.0),
            DetailRow::new(2025, 1, "Mazatlán")
                .with_fiscal(2025, 2)
                .with_period_label("Jan")
                .with_measure(REVENUE, 20.0),
            DetailRow::new(2025, 1, "Culiacán")
                .with_fiscal(2025, 2)
                .with_period_label("Jan")
                .with_measure(REVENUE, 5.0),
        ]
    }

    fn grouped() -> Vec<AggregatedRow> {
        group_and_reduce(
            &fiscal_rows(),
            &[Dimension::PeriodLabel, Dimension::Branch],
            &ReductionPlan::new().sum(REVENUE),
        )
        .unwrap()
    }

    #[test]
    fn test_rows_follow_fiscal_order() {
        let matrix = to_pivot_matrix(
            &grouped(),
            &PivotSpec::new(Dimension::PeriodLabel, Dimension::Branch, REVENUE),
        );
        let labels: Vec<&str> = matrix.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Dec", "Jan", "Feb"]);

        let natural = to_pivot_matrix(
            &grouped(),
            &PivotSpec::new(Dimension::PeriodLabel, Dimension::Branch, REVENUE)
                .ordered_by(RowOrder::Natural),
        );
        let labels: Vec<&str> = natural.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Dec", "Feb", "Jan"]);
    }

    #[test]
    fn test_missing_cells_are_zero_and_totals_add_up() {
        let matrix = to_pivot_matrix(
            &grouped(),
            &PivotSpec::new(Dimension::PeriodLabel, Dimension::Branch, REVENUE),
        );
        assert_eq!(matrix.data_columns, vec!["Culiacán", "Mazatlán"]);
        assert_eq!(matrix.cell("Dec", "Mazatlán"), Some(0.0));
        assert_eq!(matrix.cell("Jan", "Mazatlán"), Some(20.0));

        let jan = matrix.rows.iter().find(|r| r.label == "Jan").unwrap();
        assert!((jan.total - 25.0).abs() < 1e-9);

        assert_eq!(matrix.footer_total("Culiacán"), Some(45.0));
        assert_eq!(matrix.footer_total("Mazatlán"), Some(20.0));
        assert!((matrix.grand_total() - 65.0).abs() < 1e-9);
        assert_eq!(matrix.header_left_columns, vec!["Periodo"]);
        assert_eq!(matrix.header_right_columns, vec!["Total"]);
    }

    #[test]
    fn test_column_named_total_keeps_its_own_sum() {
        let rows = vec![
            DetailRow::new(2025, 1, "Total").with_measure(REVENUE, 5.0),
            DetailRow::new(2025, 1, "Culiacán").with_measure(REVENUE, 10.0),
        ];
        let grouped = group_and_reduce(
            &rows,
            &[Dimension::PeriodLabel, Dimension::Branch],
            &ReductionPlan::new().sum(REVENUE),
        )
        .unwrap();
        let matrix = to_pivot_matrix(
            &grouped,
            &PivotSpec::new(Dimension::PeriodLabel, Dimension::Branch, REVENUE),
        );

        assert_eq!(matrix.footer_total(TOTAL_COLUMN), Some(5.0));
        assert!((matrix.grand_total() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        let matrix = to_pivot_matrix(
            &[],
            &PivotSpec::new(Dimension::PeriodLabel, Dimension::Branch, REVENUE),
        );
        assert!(matrix.is_empty());
        assert_eq!(matrix.grand_total(), 0.0);
    }
}
