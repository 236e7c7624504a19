use crate::schema::{measures, month_name_es, Coordinates, DetailRow, MISSING_LABEL};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Source column names of a view, keyed by the field they feed.
///
/// Views name their columns in Spanish (`anio`, `sucursal`, `venta_real`, ...).
/// The defaults cover every view the dashboard reads; a view that names a
/// column differently only needs its entry overridden.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ColumnMapping {
    pub year: String,
    pub fiscal_year: String,
    pub month: String,
    pub fiscal_month_order: String,
    pub month_name: String,
    pub period_label: String,
    pub branch: String,
    pub seller: String,
    pub client: String,
    pub supplier: String,
    pub product_line: String,
    pub sale_condition: String,
    pub status: String,
    pub latitude: String,
    pub longitude: String,
    #[schemars(description = "Source column -> canonical measure name")]
    pub measures: BTreeMap<String, String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        let measures = [
            ("venta_real", measures::REVENUE),
            ("costo_real", measures::COST),
            ("utilidad_real", measures::PROFIT),
            ("margen_real", measures::MARGIN_PCT),
            ("porcentaje_cumplimiento", measures::COMPLIANCE_PCT),
            ("meta_vendedor", measures::TARGET),
            ("meta_vendedor_linea", measures::TARGET),
            ("meta_sucursal_linea", measures::TARGET),
            ("meta_sucursal", measures::TARGET),
            ("meta_compra", measures::TARGET),
            ("compra_real", measures::PURCHASES),
            ("facturas", measures::INVOICES),
            ("facturas_canceladas", measures::CANCELLED_INVOICES),
            ("refacciones_canceladas", measures::CANCELLED_PARTS),
            ("clientes_unicos", measures::UNIQUE_CUSTOMERS),
        ]
        .into_iter()
        .map(|(source, name)| (source.to_string(), name.to_string()))
        .collect();

        Self {
            year: "anio".to_string(),
            fiscal_year: "anio_fiscal".to_string(),
            month: "mes".to_string(),
            fiscal_month_order: "orden_mes_fiscal".to_string(),
            month_name: "mes_nombre".to_string(),
            period_label: "periodo_jd".to_string(),
            branch: "sucursal".to_string(),
            seller: "vendedor".to_string(),
            client: "Cliente".to_string(),
            supplier: "Proveedor".to_string(),
            product_line: "linea".to_string(),
            sale_condition: "condicion_venta".to_string(),
            status: "semaforo".to_string(),
            latitude: "latitud".to_string(),
            longitude: "longitud".to_string(),
            measures,
        }
    }
}

/// Rows read from a view plus a tally of what had to be repaired on the way.
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    pub rows: Vec<DetailRow>,
    /// Records dropped because their year or month could not be read.
    pub skipped_records: usize,
    /// Individual values replaced by zero or the placeholder label.
    pub coerced_values: usize,
}

/// Coerces a JSON value to a number. Numeric strings (with optional thousands
/// separators) are parsed; anything else, including null, reads as zero.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Coerces a JSON value to a trimmed label. Null and blank strings are absent;
/// numbers and booleans are stringified; nested values become the placeholder.
pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => Some(MISSING_LABEL.to_string()),
    }
}

fn read_integer(record: &Map<String, Value>, column: &str) -> Option<i64> {
    record
        .get(column)
        .and_then(coerce_number)
        .filter(|v| v.fract() == 0.0)
        .map(|v| v as i64)
}

fn read_text(record: &Map<String, Value>, column: &str) -> Option<String> {
    record.get(column).and_then(coerce_text)
}

/// Converts the records of one view into detail rows.
///
/// Null or non-numeric measure values are left out of the row, so they read
/// as zero but never shadow a value. When several source columns feed the
/// same measure, the first one with a number wins.
pub fn rows_from_records(records: &[Value], mapping: &ColumnMapping) -> IngestOutcome {
    let mut outcome = IngestOutcome::default();

    for (idx, value) in records.iter().enumerate() {
        let Some(record) = value.as_object() else {
            warn!("Record #{} is not an object; skipped", idx);
            outcome.skipped_records += 1;
            continue;
        };

        let year = read_integer(record, &mapping.year).and_then(|y| i32::try_from(y).ok());
        let month = read_integer(record, &mapping.month)
            .and_then(|m| u32::try_from(m).ok())
            .filter(|m| (1..=12).contains(m));

        let (Some(year), Some(month)) = (year, month) else {
            warn!(
                "Record #{} has no usable '{}'/'{}' value; skipped",
                idx, mapping.year, mapping.month
            );
            outcome.skipped_records += 1;
            continue;
        };

        let mut row = DetailRow::new(year, month, MISSING_LABEL);

        row.fiscal_year = read_integer(record, &mapping.fiscal_year).and_then(|y| i32::try_from(y).ok());
        row.fiscal_month_order =
            read_integer(record, &mapping.fiscal_month_order).and_then(|o| u32::try_from(o).ok());
        row.month_name = read_text(record, &mapping.month_name);

        row.period_label = read_text(record, &mapping.period_label).unwrap_or_else(|| {
            let name = row
                .month_name
                .clone()
                .or_else(|| month_name_es(month).map(str::to_string))
                .unwrap_or_default();
            format!("{} {}", name, year)
        });

        match read_text(record, &mapping.branch) {
            Some(branch) => row.branch = branch,
            None => outcome.coerced_values += 1,
        }

        row.seller = read_text(record, &mapping.seller);
        row.client = read_text(record, &mapping.client);
        row.supplier = read_text(record, &mapping.supplier);
        row.product_line = read_text(record, &mapping.product_line);
        row.sale_condition = read_text(record, &mapping.sale_condition);
        row.status = read_text(record, &mapping.status);

        let latitude = record.get(&mapping.latitude).and_then(coerce_number);
        let longitude = record.get(&mapping.longitude).and_then(coerce_number);
        if let (Some(latitude), Some(longitude)) = (latitude, longitude) {
            row.coordinates = Some(Coordinates {
                latitude,
                longitude,
            });
        }

        for (source, name) in &mapping.measures {
            let Some(raw) = record.get(source) else {
                continue;
            };
            let Some(value) = coerce_number(raw) else {
                if !raw.is_null() {
                    debug!(
                        "Record #{}: column '{}' value {} is not numeric; reads as 0",
                        idx, source, raw
                    );
                }
                outcome.coerced_values += 1;
                continue;
            };
            row.measures.entry(name.clone()).or_insert(value);
        }

        outcome.rows.push(row);
    }

    if outcome.skipped_records > 0 || outcome.coerced_values > 0 {
        debug!(
            "Ingested {} rows ({} skipped, {} values coerced)",
            outcome.rows.len(),
            outcome.skipped_records,
            outcome.coerced_values
        );
    }

    outcome
}

/// Parses a JSON array body. Anything other than an array of records is an
/// empty view.
pub fn rows_from_json(body: &Value, mapping: &ColumnMapping) -> IngestOutcome {
    match body {
        Value::Array(records) => rows_from_records(records, mapping),
        Value::Null => IngestOutcome::default(),
        other => {
            warn!("Expected a JSON array of records, got {}", json_kind(other));
            IngestOutcome::default()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
