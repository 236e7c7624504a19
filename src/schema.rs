use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical measure names carried in [`DetailRow::measures`].
pub mod measures {
    pub const REVENUE: &str = "revenue";
    pub const COST: &str = "cost";
    pub const PROFIT: &str = "profit";
    pub const TARGET: &str = "target";
    pub const MARGIN_PCT: &str = "margin_pct";
    pub const COMPLIANCE_PCT: &str = "compliance_pct";
    pub const PURCHASES: &str = "purchases";
    pub const INVOICES: &str = "invoices";
    pub const CANCELLED_INVOICES: &str = "cancelled_invoices";
    pub const CANCELLED_PARTS: &str = "cancelled_parts";
    pub const UNIQUE_CUSTOMERS: &str = "unique_customers";
}

/// Label shown for a categorical value that is absent or could not be read.
pub const MISSING_LABEL: &str = "SIN DATO";

/// Label of the "no filter" option in every selector.
pub const ALL_LABEL: &str = "TODOS";

const MONTH_NAMES_ES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// Spanish month name for a 1-based month number.
pub fn month_name_es(month: u32) -> Option<&'static str> {
    match month {
        1..=12 => Some(MONTH_NAMES_ES[(month - 1) as usize]),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Chronological position of a row: fiscal year (or calendar year) and the
/// month's order inside that year.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct PeriodKey {
    pub year: i32,
    pub order: u32,
}

/// One fact record of a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetailRow {
    pub year: i32,
    #[serde(default)]
    pub fiscal_year: Option<i32>,
    #[schemars(description = "Calendar month, 1 = January")]
    pub month: u32,
    #[serde(default)]
    #[schemars(
        description = "Order of the month inside a fiscal year that may not start in January"
    )]
    pub fiscal_month_order: Option<u32>,
    #[serde(default)]
    pub month_name: Option<String>,
    pub period_label: String,
    pub branch: String,
    #[serde(default)]
    pub seller: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub product_line: Option<String>,
    #[serde(default)]
    pub sale_condition: Option<String>,
    #[serde(default)]
    #[schemars(description = "Status label reported by the view (ROJO / AMARILLO / VERDE / SIN META)")]
    pub status: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub measures: BTreeMap<String, f64>,
}

impl DetailRow {
    pub fn new(year: i32, month: u32, branch: impl Into<String>) -> Self {
        let period_label = match month_name_es(month) {
            Some(name) => format!("{} {}", name, year),
            None => format!("{}-{:02}", year, month),
        };
        Self {
            year,
            fiscal_year: None,
            month,
            fiscal_month_order: None,
            month_name: None,
            period_label,
            branch: branch.into(),
            seller: None,
            client: None,
            supplier: None,
            product_line: None,
            sale_condition: None,
            status: None,
            coordinates: None,
            measures: BTreeMap::new(),
        }
    }

    pub fn with_measure(mut self, name: impl Into<String>, value: f64) -> Self {
        self.measures.insert(name.into(), value);
        self
    }

    pub fn with_fiscal(mut self, fiscal_year: i32, order: u32) -> Self {
        self.fiscal_year = Some(fiscal_year);
        self.fiscal_month_order = Some(order);
        self
    }

    pub fn with_period_label(mut self, label: impl Into<String>) -> Self {
        self.period_label = label.into();
        self
    }

    pub fn with_seller(mut self, seller: impl Into<String>) -> Self {
        self.seller = Some(seller.into());
        self
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn with_supplier(mut self, supplier: impl Into<String>) -> Self {
        self.supplier = Some(supplier.into());
        self
    }

    pub fn with_product_line(mut self, line: impl Into<String>) -> Self {
        self.product_line = Some(line.into());
        self
    }

    pub fn with_sale_condition(mut self, condition: impl Into<String>) -> Self {
        self.sale_condition = Some(condition.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(Coordinates {
            latitude,
            longitude,
        });
        self
    }

    /// Value of a measure; absent measures read as zero.
    pub fn measure(&self, name: &str) -> f64 {
        self.measures.get(name).copied().unwrap_or(0.0)
    }

    pub fn year_for(&self, basis: YearBasis) -> i32 {
        match basis {
            YearBasis::Calendar => self.year,
            YearBasis::Fiscal => self.fiscal_year.unwrap_or(self.year),
        }
    }

    pub fn period_key(&self) -> PeriodKey {
        PeriodKey {
            year: self.fiscal_year.unwrap_or(self.year),
            order: self.fiscal_month_order.unwrap_or(self.month),
        }
    }

    /// Human month label: the view's own name when present, otherwise Spanish.
    pub fn month_label(&self) -> String {
        match &self.month_name {
            Some(name) => name.clone(),
            None => month_name_es(self.month)
                .map(str::to_string)
                .unwrap_or_else(|| self.month.to_string()),
        }
    }

    pub fn dimension(&self, dimension: Dimension) -> DimensionValue {
        match dimension {
            Dimension::Year => DimensionValue::Int(self.year as i64),
            Dimension::FiscalYear => DimensionValue::Int(self.fiscal_year.unwrap_or(self.year) as i64),
            Dimension::Month => DimensionValue::Int(self.month as i64),
            Dimension::FiscalMonthOrder => {
                DimensionValue::Int(self.fiscal_month_order.unwrap_or(self.month) as i64)
            }
            Dimension::MonthName => DimensionValue::Text(self.month_label()),
            Dimension::PeriodLabel => DimensionValue::Text(self.period_label.clone()),
            Dimension::Branch => DimensionValue::from_text(Some(&self.branch)),
            Dimension::Seller => DimensionValue::from_text(self.seller.as_deref()),
            Dimension::Client => DimensionValue::from_text(self.client.as_deref()),
            Dimension::Supplier => DimensionValue::from_text(self.supplier.as_deref()),
            Dimension::ProductLine => DimensionValue::from_text(self.product_line.as_deref()),
            Dimension::SaleCondition => DimensionValue::from_text(self.sale_condition.as_deref()),
            Dimension::Status => DimensionValue::from_text(self.status.as_deref()),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Year,
    FiscalYear,
    Month,
    FiscalMonthOrder,
    MonthName,
    PeriodLabel,
    Branch,
    Seller,
    Client,
    Supplier,
    ProductLine,
    SaleCondition,
    Status,
}

impl Dimension {
    /// Column header used by tables built from this dimension.
    pub fn header(&self) -> &'static str {
        match self {
            Dimension::Year => "Año",
            Dimension::FiscalYear => "Año fiscal",
            Dimension::Month => "Mes",
            Dimension::FiscalMonthOrder => "Orden",
            Dimension::MonthName => "Mes",
            Dimension::PeriodLabel => "Periodo",
            Dimension::Branch => "Sucursal",
            Dimension::Seller => "Vendedor",
            Dimension::Client => "Cliente",
            Dimension::Supplier => "Proveedor",
            Dimension::ProductLine => "Línea",
            Dimension::SaleCondition => "Condición de venta",
            Dimension::Status => "Semáforo",
        }
    }
}

/// Whether years are read from the calendar or the fiscal column.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum YearBasis {
    #[default]
    Calendar,
    Fiscal,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DimensionValue {
    Int(i64),
    Text(String),
    Missing,
}

impl DimensionValue {
    fn from_text(value: Option<&str>) -> Self {
        match value {
            Some(text) if !text.trim().is_empty() => DimensionValue::Text(text.to_string()),
            _ => DimensionValue::Missing,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            DimensionValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for DimensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionValue::Int(v) => write!(f, "{}", v),
            DimensionValue::Text(s) => write!(f, "{}", s),
            DimensionValue::Missing => write!(f, "{}", MISSING_LABEL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_period_label_uses_spanish_month() {
        let row = DetailRow::new(2024, 11, "Culiacán");
        assert_eq!(row.period_label, "Noviembre 2024");
        assert_eq!(row.month_label(), "Noviembre");
    }

    #[test]
    fn test_period_key_prefers_fiscal_columns() {
        let calendar = DetailRow::new(2024, 12, "A");
        assert_eq!(calendar.period_key(), PeriodKey { year: 2024, order: 12 });

        let fiscal = DetailRow::new(2024, 12, "A").with_fiscal(2025, 1);
        assert_eq!(fiscal.period_key(), PeriodKey { year: 2025, order: 1 });
        assert_eq!(fiscal.year_for(YearBasis::Fiscal), 2025);
        assert_eq!(fiscal.year_for(YearBasis::Calendar), 2024);
    }

    #[test]
    fn test_blank_categorical_reads_as_missing() {
        let row = DetailRow::new(2024, 1, "A").with_seller("   ");
        assert_eq!(row.dimension(Dimension::Seller), DimensionValue::Missing);
        assert_eq!(row.dimension(Dimension::Client).to_string(), MISSING_LABEL);
    }

    #[test]
    fn test_serialization() {
        let row = DetailRow::new(2025, 3, "Los Mochis")
            .with_measure(measures::REVENUE, 1500.5)
            .with_coordinates(25.79, -108.99);

        let json = serde_json::to_string(&row).unwrap();
        let back: DetailRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }
}
