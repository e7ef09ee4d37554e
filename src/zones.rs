//! Static city zone readings and dashboard statistics.

use crate::model::{RiskLevel, ZoneContext};

/// A monitored area of the city.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatZone {
    pub id: &'static str,
    pub name: &'static str,
    /// `(longitude, latitude)`
    pub coordinates: (f64, f64),
    pub risk_level: RiskLevel,
    pub temperature: f64,
    pub humidity: f64,
    pub heat_index: f64,
    pub predicted_peak: f64,
    pub peak_time: &'static str,
}

// Metro Manila sample readings.
pub static HEAT_ZONES: [HeatZone; 8] = [
    HeatZone {
        id: "zone-1",
        name: "Downtown Business District",
        coordinates: (120.9842, 14.5995),
        risk_level: RiskLevel::Extreme,
        temperature: 38.0,
        humidity: 72.0,
        heat_index: 48.0,
        predicted_peak: 51.0,
        peak_time: "2:00 PM",
    },
    HeatZone {
        id: "zone-2",
        name: "Industrial Park East",
        coordinates: (121.0244, 14.5547),
        risk_level: RiskLevel::High,
        temperature: 36.0,
        humidity: 68.0,
        heat_index: 44.0,
        predicted_peak: 47.0,
        peak_time: "3:00 PM",
    },
    HeatZone {
        id: "zone-3",
        name: "Residential North",
        coordinates: (120.9962, 14.6350),
        risk_level: RiskLevel::Moderate,
        temperature: 33.0,
        humidity: 65.0,
        heat_index: 38.0,
        predicted_peak: 41.0,
        peak_time: "2:30 PM",
    },
    HeatZone {
        id: "zone-4",
        name: "University Campus",
        coordinates: (121.0654, 14.6488),
        risk_level: RiskLevel::Moderate,
        temperature: 32.0,
        humidity: 60.0,
        heat_index: 36.0,
        predicted_peak: 39.0,
        peak_time: "1:30 PM",
    },
    HeatZone {
        id: "zone-5",
        name: "Waterfront District",
        coordinates: (120.9569, 14.5833),
        risk_level: RiskLevel::Low,
        temperature: 30.0,
        humidity: 70.0,
        heat_index: 33.0,
        predicted_peak: 35.0,
        peak_time: "2:00 PM",
    },
    HeatZone {
        id: "zone-6",
        name: "Green Park Area",
        coordinates: (121.0456, 14.6200),
        risk_level: RiskLevel::Low,
        temperature: 29.0,
        humidity: 55.0,
        heat_index: 31.0,
        predicted_peak: 33.0,
        peak_time: "1:00 PM",
    },
    HeatZone {
        id: "zone-7",
        name: "Old Town Market",
        coordinates: (120.9750, 14.5700),
        risk_level: RiskLevel::High,
        temperature: 35.0,
        humidity: 70.0,
        heat_index: 43.0,
        predicted_peak: 46.0,
        peak_time: "2:30 PM",
    },
    HeatZone {
        id: "zone-8",
        name: "Transit Hub Central",
        coordinates: (121.0100, 14.5850),
        risk_level: RiskLevel::Extreme,
        temperature: 37.0,
        humidity: 75.0,
        heat_index: 47.0,
        predicted_peak: 50.0,
        peak_time: "3:30 PM",
    },
];

pub fn zone_by_id(id: &str) -> Option<&'static HeatZone> {
    HEAT_ZONES.iter().find(|zone| zone.id == id)
}

impl From<&HeatZone> for ZoneContext {
    fn from(zone: &HeatZone) -> Self {
        ZoneContext {
            name: zone.name.to_string(),
            temperature: zone.temperature,
            humidity: zone.humidity,
            heat_index: zone.heat_index,
            risk_level: zone.risk_level,
            predicted_peak: zone.predicted_peak,
            peak_time: zone.peak_time.to_string(),
        }
    }
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashboardStats {
    pub extreme_zones: usize,
    pub high_zones: usize,
    /// Rounded mean heat index, °C.
    pub avg_heat_index: f64,
    pub max_heat_index: f64,
}

impl DashboardStats {
    /// `None` when there are no zones to summarise.
    pub fn from_zones(zones: &[HeatZone]) -> Option<Self> {
        if zones.is_empty() {
            return None;
        }

        let count = |level| zones.iter().filter(|z| z.risk_level == level).count();
        let total: f64 = zones.iter().map(|z| z.heat_index).sum();
        let max_heat_index = zones
            .iter()
            .map(|z| z.heat_index)
            .fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            extreme_zones: count(RiskLevel::Extreme),
            high_zones: count(RiskLevel::High),
            avg_heat_index: (total / zones.len() as f64).round(),
            max_heat_index,
        })
    }
}
