use crate::compliance::ComplianceStatus;
use crate::error::{DashboardError, Result};
use crate::schema::{DetailRow, Dimension, DimensionValue, PeriodKey};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Reduction {
    /// Additive currency and count measures.
    Sum,
    /// Ratios that are already normalized (margin %, compliance %).
    Mean,
    /// Values constant per entity, such as a seller's target.
    First,
    /// Largest value; on status labels, the most severe status.
    Max,
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reduction::Sum => "SUM",
            Reduction::Mean => "MEAN",
            Reduction::First => "FIRST",
            Reduction::Max => "MAX",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Measure(String),
    Status,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Measure(name) => write!(f, "measure '{}'", name),
            Field::Status => f.write_str("status"),
        }
    }
}

/// Which fields survive a grouping and how each is reduced. Measures not in
/// the plan are dropped from the output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReductionPlan {
    entries: Vec<(Field, Reduction)>,
}

impl ReductionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: Field, reduction: Reduction) -> Self {
        self.entries.retain(|(f, _)| *f != field);
        self.entries.push((field, reduction));
        self
    }

    pub fn sum(self, measure: &str) -> Self {
        self.with(Field::Measure(measure.to_string()), Reduction::Sum)
    }

    pub fn mean(self, measure: &str) -> Self {
        self.with(Field::Measure(measure.to_string()), Reduction::Mean)
    }

    pub fn first(self, measure: &str) -> Self {
        self.with(Field::Measure(measure.to_string()), Reduction::First)
    }

    pub fn max(self, measure: &str) -> Self {
        self.with(Field::Measure(measure.to_string()), Reduction::Max)
    }

    pub fn status(self, reduction: Reduction) -> Self {
        self.with(Field::Status, reduction)
    }

    pub fn entries(&self) -> &[(Field, Reduction)] {
        &self.entries
    }

    fn validate(&self) -> Result<()> {
        for (field, reduction) in &self.entries {
            if *field == Field::Status && matches!(reduction, Reduction::Sum | Reduction::Mean) {
                return Err(DashboardError::InvalidReduction {
                    field: field.to_string(),
                    reduction: reduction.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// One row per distinct grouping-key tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    pub keys: Vec<(Dimension, DimensionValue)>,
    pub measures: BTreeMap<String, f64>,
    pub status: Option<String>,
    pub row_count: usize,
    /// Earliest period among the merged rows; orders rows chronologically.
    pub first_period: PeriodKey,
}

impl AggregatedRow {
    pub fn key(&self, dimension: Dimension) -> Option<&DimensionValue> {
        self.keys
            .iter()
            .find(|(d, _)| *d == dimension)
            .map(|(_, v)| v)
    }

    pub fn label(&self, dimension: Dimension) -> String {
        self.key(dimension)
            .map(|v| v.to_string())
            .unwrap_or_default()
    }

    pub fn measure(&self, name: &str) -> f64 {
        self.measures.get(name).copied().unwrap_or(0.0)
    }
}

enum MeasureAcc {
    Sum(f64),
    Mean { total: f64, count: usize },
    First(Option<f64>),
    Max(Option<f64>),
}

impl MeasureAcc {
    fn new(reduction: Reduction) -> Self {
        match reduction {
            Reduction::Sum => MeasureAcc::Sum(0.0),
            Reduction::Mean => MeasureAcc::Mean {
                total: 0.0,
                count: 0,
            },
            Reduction::First => MeasureAcc::First(None),
            Reduction::Max => MeasureAcc::Max(None),
        }
    }

    fn push(&mut self, value: f64) {
        match self {
            MeasureAcc::Sum(total) => *total += value,
            MeasureAcc::Mean { total, count } => {
                *total += value;
                *count += 1;
            }
            MeasureAcc::First(slot) => {
                if slot.is_none() {
                    *slot = Some(value);
                }
            }
            MeasureAcc::Max(slot) => {
                *slot = Some((*slot).map_or(value, |current| current.max(value)));
            }
        }
    }

    fn finish(&self) -> Option<f64> {
        match self {
            MeasureAcc::Sum(total) => Some(*total),
            MeasureAcc::Mean { total, count } => {
                if *count == 0 {
                    None
                } else {
                    Some(total / *count as f64)
                }
            }
            MeasureAcc::First(slot) | MeasureAcc::Max(slot) => *slot,
        }
    }
}

fn status_rank(label: &str) -> i32 {
    ComplianceStatus::from_label(label)
        .map(|s| s.severity() as i32)
        .unwrap_or(-1)
}

struct GroupState {
    measures: Vec<(String, MeasureAcc)>,
    status: Option<String>,
    row_count: usize,
    first_period: PeriodKey,
}

/// Groups `rows` by `keys` and reduces each planned field. Output is ordered
/// by the key tuple. Rows that collide on the keys are merged, never reported.
pub fn group_and_reduce<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    keys: &[Dimension],
    plan: &ReductionPlan,
) -> Result<Vec<AggregatedRow>> {
    plan.validate()?;

    let status_reduction = plan
        .entries
        .iter()
        .find(|(f, _)| *f == Field::Status)
        .map(|(_, r)| *r);

    let mut groups: BTreeMap<Vec<DimensionValue>, GroupState> = BTreeMap::new();
    let mut input_rows = 0usize;

    for row in rows {
        input_rows += 1;
        let key: Vec<DimensionValue> = keys.iter().map(|d| row.dimension(*d)).collect();

        let state = groups.entry(key).or_insert_with(|| GroupState {
            measures: plan
                .entries
                .iter()
                .filter_map(|(field, reduction)| match field {
                    Field::Measure(name) => Some((name.clone(), MeasureAcc::new(*reduction))),
                    Field::Status => None,
                })
                .collect(),
            status: None,
            row_count: 0,
            first_period: row.period_key(),
        });

        state.row_count += 1;
        state.first_period = state.first_period.min(row.period_key());

        for (name, acc) in state.measures.iter_mut() {
            if let Some(value) = row.measures.get(name) {
                acc.push(*value);
            }
        }

        if let (Some(reduction), Some(label)) = (status_reduction, row.status.as_ref()) {
            let replace = match (&state.status, reduction) {
                (None, _) => true,
                (Some(current), Reduction::Max) => status_rank(label) > status_rank(current),
                _ => false,
            };
            if replace {
                state.status = Some(label.clone());
            }
        }
    }

    debug!(
        "Grouped {} rows by {:?} into {} groups",
        input_rows,
        keys,
        groups.len()
    );

    Ok(groups
        .into_iter()
        .map(|(key, state)| AggregatedRow {
            keys: keys.iter().copied().zip(key).collect(),
            measures: state
                .measures
                .iter()
                .filter_map(|(name, acc)| acc.finish().map(|v| (name.clone(), v)))
                .collect(),
            status: state.status,
            row_count: state.row_count,
            first_period: state.first_period,
        })
        .collect())
}

/// The `n` rows with the largest `measure`, descending. Ties keep their input
/// order.
pub fn top_n(rows: &[AggregatedRow], measure: &str, n: usize) -> Vec<AggregatedRow> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| b.measure(measure).total_cmp(&a.measure(measure)));
    sorted.truncate(n);
    sorted
}

/// Top `n` values of `entity` by total `measure`, each expanded into one row
/// per `breakdown` value (e.g. top clients split by sale condition). Entities
/// keep their ranking order; breakdown rows within an entity keep key order.
pub fn top_n_breakdown<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
    entity: Dimension,
    breakdown: Dimension,
    measure: &str,
    n: usize,
) -> Result<Vec<AggregatedRow>> {
    let rows: Vec<&DetailRow> = rows.into_iter().collect();
    let plan = ReductionPlan::new().sum(measure);

    let totals = group_and_reduce(rows.iter().copied(), &[entity], &plan)?;
    let detail = group_and_reduce(rows.iter().copied(), &[entity, breakdown], &plan)?;

    let mut result = Vec::new();
    for top in top_n(&totals, measure, n) {
        let Some(value) = top.key(entity) else {
            continue;
        };
        result.extend(
            detail
                .iter()
                .filter(|row| row.key(entity) == Some(value))
                .cloned(),
        );
    }
    Ok(result)
}

/// Sum of `measure` over `rows`.
pub fn sum_measure<'a>(rows: impl IntoIterator<Item = &'a DetailRow>, measure: &str) -> f64 {
    rows.into_iter().map(|r| r.measure(measure)).sum()
}
