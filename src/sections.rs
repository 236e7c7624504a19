use crate::compliance::Thresholds;
use crate::config::SectionPolicies;
use serde::{Deserialize, Serialize};

/// Business sections of the dashboard and the views each one reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Purchases,
    Sales,
    Customers,
    Sellers,
    Cancellations,
    ProductLines,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::Purchases,
        Section::Sales,
        Section::Customers,
        Section::Sellers,
        Section::Cancellations,
        Section::ProductLines,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Section::Purchases => "Compras vs meta",
            Section::Sales => "Facturación por sucursal",
            Section::Customers => "Ubicación de clientes",
            Section::Sellers => "Cumplimiento de vendedores",
            Section::Cancellations => "Cancelaciones",
            Section::ProductLines => "Ventas por línea",
        }
    }

    pub fn views(&self) -> &'static [&'static str] {
        match self {
            Section::Purchases => &[
                "vw_dashboard_avance_jd",
                "vw_dashboard_meta_compras",
                "vw_dashboard_compras_mes",
            ],
            Section::Sales => &[
                "vw_facturacion_sucursal_mes_jd",
                "vw_dashboard_meta_sucursal",
                "vw_clientes_mensuales_venta",
            ],
            Section::Customers => &[
                "vw_dashboard_ubicacion_clientes",
                "vw_dashboard_ubicacion_clientes_mes",
                "vw_dhs_ubi_clientes_espec",
            ],
            Section::Sellers => &["vw_dashboard_meta_vendedor_jd"],
            Section::Cancellations => &[
                "vw_cancelaciones_clientes_detalle",
                "vw_cancelaciones_vendedor_sucursal",
            ],
            Section::ProductLines => &[
                "vw_dashboard_metas_sucursal_por_linea",
                "vw_dashboard_metas_por_linea",
                "vw_dashboard_venta_linea_proveedor",
            ],
        }
    }

    /// Threshold policy used to classify this section's headline compliance.
    /// Sections without targets have none.
    pub fn thresholds(&self, policies: &SectionPolicies) -> Option<Thresholds> {
        match self {
            Section::Purchases | Section::Sales => Some(policies.purchases),
            Section::Sellers => Some(policies.sellers),
            Section::ProductLines => Some(policies.line_kpi),
            Section::Customers | Section::Cancellations => None,
        }
    }
}
