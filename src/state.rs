// src/state.rs
use std::{env, str::FromStr, sync::Arc, time::Duration};

use crate::{
    errors::{LouageError, LouageResult},
    services::{
        BookingService, MatchingService, MemoryStore, NotificationService, NotificationStore,
        PriceCalculator, ProfileStore, RatingService, TariffCalculator, TripService,
    },
    simulation::DriverSimulator,
    utils::clock::Clock,
};

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub offer_timeout: Duration,
    pub response_delay: Duration,
    pub response_stagger: Duration,
    pub accept_probability: f64,
    pub currency: String,
    pub base_fare: f64,
    pub per_km_fare: f64,
    pub service_fee_rate: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            offer_timeout: Duration::from_secs(300),
            response_delay: Duration::from_millis(2000),
            response_stagger: Duration::from_millis(2000),
            accept_probability: 0.7,
            currency: "TND".to_string(),
            base_fare: 5.0,
            per_km_fare: 0.35,
            service_fee_rate: 0.10,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> LouageResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LouageResult<Self> {
        let defaults = Self::default();

        let offer_timeout = parse_var(&lookup, "LOUAGE_OFFER_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.offer_timeout);
        let response_delay = parse_var(&lookup, "LOUAGE_RESPONSE_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.response_delay);
        let response_stagger = parse_var(&lookup, "LOUAGE_RESPONSE_STAGGER_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.response_stagger);

        let accept_probability: f64 =
            parse_var(&lookup, "LOUAGE_ACCEPT_PROBABILITY")?.unwrap_or(defaults.accept_probability);
        if !(0.0..=1.0).contains(&accept_probability) {
            return Err(LouageError::InvalidConfiguration(format!(
                "LOUAGE_ACCEPT_PROBABILITY must be between 0 and 1, got {accept_probability}"
            )));
        }

        let currency = lookup("LOUAGE_CURRENCY")
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or(defaults.currency);

        let base_fare = non_negative("LOUAGE_BASE_FARE", parse_var(&lookup, "LOUAGE_BASE_FARE")?.unwrap_or(defaults.base_fare))?;
        let per_km_fare = non_negative("LOUAGE_PER_KM_FARE", parse_var(&lookup, "LOUAGE_PER_KM_FARE")?.unwrap_or(defaults.per_km_fare))?;
        let service_fee_rate = non_negative(
            "LOUAGE_SERVICE_FEE_RATE",
            parse_var(&lookup, "LOUAGE_SERVICE_FEE_RATE")?.unwrap_or(defaults.service_fee_rate),
        )?;

        Ok(Self {
            offer_timeout,
            response_delay,
            response_stagger,
            accept_probability,
            currency,
            base_fare,
            per_km_fare,
            service_fee_rate,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> LouageResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| LouageError::InvalidConfiguration(format!("invalid {key}: {err}"))),
        None => Ok(None),
    }
}

fn non_negative(key: &str, value: f64) -> LouageResult<f64> {
    if value.is_nan() || value < 0.0 {
        Err(LouageError::InvalidConfiguration(format!("{key} must not be negative")))
    } else {
        Ok(value)
    }
}

/// Every service of the booking core, built once and shared by reference.
pub struct AppState {
    pub profile_service: Arc<ProfileStore>,
    pub trip_service: Arc<TripService>,
    pub booking_service: Arc<BookingService>,
    pub matching_service: Arc<MatchingService>,
    pub rating_service: Arc<RatingService>,
    pub notification_service: Arc<dyn NotificationService>,
    pub pricing: Arc<dyn PriceCalculator>,
    pub simulator: DriverSimulator,
    pub clock: Arc<dyn Clock>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig, clock: Arc<dyn Clock>) -> LouageResult<Self> {
        let offer_timeout = chrono::Duration::from_std(config.offer_timeout).map_err(|err| {
            LouageError::InvalidConfiguration(format!("offer timeout out of range: {err}"))
        })?;

        let notification_service: Arc<dyn NotificationService> =
            Arc::new(NotificationStore::new(clock.clone()));
        let profile_service = Arc::new(ProfileStore::new());
        let pricing: Arc<dyn PriceCalculator> = Arc::new(
            TariffCalculator::new(
                config.base_fare,
                config.per_km_fare,
                config.service_fee_rate,
                config.currency.clone(),
            )
            .with_default_routes(),
        );

        // Trips and bookings share the booking table
        let bookings = Arc::new(MemoryStore::new());

        let trip_service = Arc::new(TripService::new(
            Arc::new(MemoryStore::new()),
            bookings.clone(),
            profile_service.clone(),
            notification_service.clone(),
            clock.clone(),
        ));

        let booking_service = Arc::new(BookingService::new(
            bookings,
            trip_service.clone(),
            profile_service.clone(),
            notification_service.clone(),
            clock.clone(),
        ));

        let matching_service = Arc::new(MatchingService::new(
            Arc::new(MemoryStore::new()),
            profile_service.clone(),
            pricing.clone(),
            notification_service.clone(),
            clock.clone(),
            offer_timeout,
        ));

        let rating_service = Arc::new(RatingService::new(profile_service.clone(), clock.clone()));

        let simulator = DriverSimulator::new(
            matching_service.clone(),
            clock.clone(),
            config.response_delay,
            config.response_stagger,
        );

        tracing::debug!("Booking core wired: {:?}", config);

        Ok(Self {
            profile_service,
            trip_service,
            booking_service,
            matching_service,
            rating_service,
            notification_service,
            pricing,
            simulator,
            clock,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(AppConfig::from_lookup(lookup(&[])).unwrap(), AppConfig::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            ("LOUAGE_OFFER_TIMEOUT_SECS", "60"),
            ("LOUAGE_RESPONSE_STAGGER_MS", " 500 "),
            ("LOUAGE_ACCEPT_PROBABILITY", "1"),
            ("LOUAGE_CURRENCY", "EUR"),
        ]))
        .unwrap();

        assert_eq!(config.offer_timeout, Duration::from_secs(60));
        assert_eq!(config.response_stagger, Duration::from_millis(500));
        assert_eq!(config.accept_probability, 1.0);
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.base_fare, 5.0);
    }

    #[test]
    fn malformed_values_are_configuration_errors() {
        for vars in [
            [("LOUAGE_OFFER_TIMEOUT_SECS", "five")],
            [("LOUAGE_ACCEPT_PROBABILITY", "1.5")],
            [("LOUAGE_PER_KM_FARE", "-0.2")],
        ] {
            let err = AppConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert_eq!(err.kind(), crate::errors::ErrorKind::Configuration);
        }
    }
}
