// src/services/pricing_service.rs
use std::collections::HashMap;

use crate::models::ride_request::{PickupType, PriceBreakdown};

/// Distance assumed for a route missing from the table.
pub const DEFAULT_DISTANCE_KM: f64 = 100.0;
/// Added to the base fare when the driver picks the passenger up at home.
pub const HOME_PICKUP_SURCHARGE: f64 = 3.0;

/// Turns a route into a suggested price. Pure: no state, no I/O.
pub trait PriceCalculator: Send + Sync {
    fn quote(&self, origin: &str, destination: &str, pickup: PickupType) -> PriceBreakdown;
    fn currency(&self) -> &str;
}

pub struct TariffCalculator {
    base_fare: f64,
    per_km_fare: f64,
    service_fee_rate: f64,
    currency: String,
    distances: HashMap<(String, String), f64>,
}

impl TariffCalculator {
    pub fn new(base_fare: f64, per_km_fare: f64, service_fee_rate: f64, currency: impl Into<String>) -> Self {
        Self {
            base_fare,
            per_km_fare,
            service_fee_rate,
            currency: currency.into(),
            distances: HashMap::new(),
        }
    }

    /// Road distances between the main louage stations.
    pub fn with_default_routes(self) -> Self {
        [
            ("Tunis", "Sousse", 140.0),
            ("Tunis", "Sfax", 270.0),
            ("Tunis", "Nabeul", 65.0),
            ("Tunis", "Hammamet", 60.0),
            ("Tunis", "Bizerte", 65.0),
            ("Tunis", "Kairouan", 155.0),
            ("Tunis", "Monastir", 160.0),
            ("Sousse", "Sfax", 130.0),
            ("Sousse", "Monastir", 20.0),
            ("Sfax", "Gabès", 140.0),
        ]
        .into_iter()
        .fold(self, |calc, (a, b, km)| calc.with_distance(a, b, km))
    }

    pub fn with_distance(mut self, origin: &str, destination: &str, km: f64) -> Self {
        self.distances.insert(route_key(origin, destination), km);
        self
    }

    pub fn distance_km(&self, origin: &str, destination: &str) -> f64 {
        self.distances
            .get(&route_key(origin, destination))
            .copied()
            .unwrap_or(DEFAULT_DISTANCE_KM)
    }
}

impl PriceCalculator for TariffCalculator {
    fn currency(&self) -> &str {
        &self.currency
    }

    fn quote(&self, origin: &str, destination: &str, pickup: PickupType) -> PriceBreakdown {
        let base_fare = match pickup {
            PickupType::Station => self.base_fare,
            PickupType::Home => self.base_fare + HOME_PICKUP_SURCHARGE,
        };
        let distance_fee = round2(self.distance_km(origin, destination) * self.per_km_fare);
        let service_fee = round2((base_fare + distance_fee) * self.service_fee_rate);

        PriceBreakdown {
            base_fare: round2(base_fare),
            distance_fee,
            service_fee,
            total: round2(base_fare + distance_fee + service_fee),
            currency: self.currency.clone(),
        }
    }
}

// Symmetric, case-insensitive key
fn route_key(a: &str, b: &str) -> (String, String) {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a <= b { (a, b) } else { (b, a) }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
