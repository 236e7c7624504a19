use crate::schema::{measures, Coordinates, DetailRow, MISSING_LABEL};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Validates a coordinate pair before it is placed on a map.
///
/// - an exact zero in either component is treated as "not captured";
/// - a pair whose latitude is out of range but whose longitude would be a
///   valid latitude is assumed swapped and corrected;
/// - anything still outside [-90, 90] / [-180, 180] is rejected.
pub fn sanitize_coordinates(coords: Coordinates) -> Option<Coordinates> {
    let Coordinates {
        mut latitude,
        mut longitude,
    } = coords;

    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    if latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    if latitude.abs() > 90.0 && longitude.abs() <= 90.0 {
        std::mem::swap(&mut latitude, &mut longitude);
    }
    if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
        return None;
    }

    Some(Coordinates {
        latitude,
        longitude,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPoint {
    pub client: String,
    pub branch: String,
    pub coordinates: Coordinates,
    pub unique_customers: f64,
    pub revenue: f64,
    pub row_count: usize,
}

/// One map point per (client, branch). Rows without usable coordinates are
/// left out; the first valid coordinate of a group positions the point.
pub fn customer_locations<'a>(
    rows: impl IntoIterator<Item = &'a DetailRow>,
) -> Vec<LocationPoint> {
    let mut points: BTreeMap<(String, String), LocationPoint> = BTreeMap::new();
    let mut rejected = 0usize;

    for row in rows {
        let Some(coordinates) = row.coordinates.and_then(sanitize_coordinates) else {
            rejected += 1;
            continue;
        };
        let client = row
            .client
            .clone()
            .unwrap_or_else(|| MISSING_LABEL.to_string());

        let point = points
            .entry((client.clone(), row.branch.clone()))
            .or_insert_with(|| LocationPoint {
                client,
                branch: row.branch.clone(),
                coordinates,
                unique_customers: 0.0,
                revenue: 0.0,
                row_count: 0,
            });
        point.unique_customers += row.measure(measures::UNIQUE_CUSTOMERS);
        point.revenue += row.measure(measures::REVENUE);
        point.row_count += 1;
    }

    if rejected > 0 {
        debug!("{} rows without valid coordinates left off the map", rejected);
    }

    points.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(latitude: f64, longitude: f64) -> Coordinates {
        Coordinates {
            latitude,
            longitude,
        }
    }

    #[test]
    fn test_zero_and_out_of_range_rejected() {
        assert!(sanitize_coordinates(coords(0.0, -107.4)).is_none());
        assert!(sanitize_coordinates(coords(24.8, 0.0)).is_none());
        assert!(sanitize_coordinates(coords(95.0, 190.0)).is_none());
        assert!(sanitize_coordinates(coords(f64::NAN, -107.4)).is_none());
    }

    #[test]
    fn test_swapped_pair_corrected() {
        let fixed = sanitize_coordinates(coords(-107.39, 24.80)).unwrap();
        assert_eq!(fixed, coords(24.80, -107.39));

        let untouched = sanitize_coordinates(coords(24.80, -107.39)).unwrap();
        assert_eq!(untouched, coords(24.80, -107.39));
    }

    #[test]
    fn test_customer_locations_group_by_client_and_branch() {
        let rows = vec![
            DetailRow::new(2025, 1, "Culiacán")
                .with_client("Agrícola del Valle")
                .with_coordinates(24.80, -107.39)
                .with_measure(measures::UNIQUE_CUSTOMERS, 1.0)
                .with_measure(measures::REVENUE, 100.0),
            DetailRow::new(2025, 2, "Culiacán")
                .with_client("Agrícola del Valle")
                .with_coordinates(24.80, -107.39)
                .with_measure(measures::REVENUE, 50.0),
            DetailRow::new(2025, 2, "Culiacán")
                .with_client("Sin GPS")
                .with_coordinates(0.0, 0.0),
        ];

        let points = customer_locations(&rows);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].row_count, 2);
        assert!((points[0].revenue - 150.0).abs() < 1e-9);
    }
}
