// src/services/user_service.rs
use async_trait::async_trait;
use std::sync::Arc;
use tracing;

use crate::{
    errors::{LouageError as AppError, ValidationError},
    models::{
        booking::LuggageDetails,
        user::{ProfileUpdate, UserProfile, UserRole},
    },
    services::memory_store::MemoryStore,
};

#[async_trait]
pub trait ProfileOperations: Send + Sync {
    async fn register_profile(&self, profile: UserProfile) -> Result<UserProfile, AppError>;
    async fn get_profile(&self, user_id: &str) -> Option<UserProfile>;
    async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> bool;
    async fn list_profiles(&self, role: UserRole) -> Vec<UserProfile>;
    async fn privatization_price(&self, driver_id: &str, origin: &str, destination: &str) -> Option<f64>;
    async fn check_luggage(&self, driver_id: &str, luggage: &LuggageDetails) -> Result<(), AppError>;
    async fn record_rating(&self, driver_id: &str, average: f64) -> bool;
}

/// In-memory profile table. The core only reads luggage capacity,
/// privatization prices and favourites from it.
pub struct ProfileStore {
    profiles: Arc<MemoryStore<UserProfile>>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: Arc::new(MemoryStore::new()),
        }
    }

    fn validate(profile: &UserProfile) -> Result<(), AppError> {
        let mut errors = Vec::new();

        if profile.id.trim().is_empty() {
            errors.push(ValidationError::new("id", "Profile id is required"));
        }
        if profile.name.trim().is_empty() {
            errors.push(ValidationError::new("name", "Name is required"));
        }
        if !profile.email.is_empty() && !is_plausible_email(&profile.email) {
            errors.push(ValidationError::new("email", "Invalid email address"));
        }

        AppError::check(errors)
    }
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[async_trait]
impl ProfileOperations for ProfileStore {
    async fn register_profile(&self, profile: UserProfile) -> Result<UserProfile, AppError> {
        tracing::info!("Registering {:?} profile: {}", profile.role, profile.id);

        Self::validate(&profile)?;

        let mut profiles = self.profiles.write().await;
        if profiles.contains(&profile.id) {
            return Err(AppError::invalid_state(format!(
                "profile {} is already registered",
                profile.id
            )));
        }
        profiles.insert(profile.id.clone(), profile.clone());

        Ok(profile)
    }

    async fn get_profile(&self, user_id: &str) -> Option<UserProfile> {
        tracing::debug!("Getting profile: {}", user_id);
        self.profiles.get(user_id).await
    }

    async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> bool {
        let updated = self
            .profiles
            .update(user_id, |profile| profile.apply(update))
            .await
            .is_some();

        if updated {
            tracing::info!("Profile {} updated", user_id);
        } else {
            tracing::debug!("update_profile: unknown user {}", user_id);
        }
        updated
    }

    async fn list_profiles(&self, role: UserRole) -> Vec<UserProfile> {
        self.profiles.filter(|p| p.role == role).await
    }

    async fn privatization_price(&self, driver_id: &str, origin: &str, destination: &str) -> Option<f64> {
        self.profiles
            .read()
            .await
            .get(driver_id)
            .and_then(|p| p.privatization_price(origin, destination))
    }

    async fn check_luggage(&self, driver_id: &str, luggage: &LuggageDetails) -> Result<(), AppError> {
        let capacity = match self.profiles.read().await.get(driver_id) {
            Some(profile) => profile.luggage_capacity,
            None => None,
        };

        // No declared capacity means no constraint
        let Some(capacity) = capacity else {
            return Ok(());
        };

        let errors = luggage
            .categories()
            .into_iter()
            .zip(capacity.categories())
            .filter(|((_, wanted), (_, allowed))| wanted > allowed)
            .map(|((category, wanted), (_, allowed))| {
                ValidationError::new(
                    category,
                    format!("{wanted} requested, vehicle takes at most {allowed}"),
                )
            })
            .collect::<Vec<_>>();

        if !errors.is_empty() {
            tracing::warn!("Luggage exceeds capacity of driver {}: {:?}", driver_id, errors);
        }
        AppError::check(errors)
    }

    async fn record_rating(&self, driver_id: &str, average: f64) -> bool {
        self.profiles
            .update(driver_id, |profile| profile.stats.average_rating = average)
            .await
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::PrivatizationPrice;
    use chrono::Utc;

    fn driver(id: &str) -> UserProfile {
        let mut profile = UserProfile::new(id, "Hedi", UserRole::Driver, Utc::now());
        profile.luggage_capacity = Some(LuggageDetails {
            sac: 4,
            petite_valise: 2,
            moyenne_valise: 1,
            grande_valise: 0,
        });
        profile.privatization_prices.push(PrivatizationPrice {
            origin: "Tunis".into(),
            destination: "Hammamet".into(),
            base_price: 90.0,
        });
        profile
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_bad_email() {
        let store = ProfileStore::new();
        store.register_profile(driver("drv-1")).await.unwrap();

        let err = store.register_profile(driver("drv-1")).await.unwrap_err();
        assert!(err.is_invalid_state());

        let mut bad = driver("drv-2");
        bad.email = "hedi-at-example".into();
        let err = store.register_profile(bad).await.unwrap_err();
        assert!(err.is_validation());
        assert!(store.get_profile("drv-2").await.is_none());
    }

    #[tokio::test]
    async fn update_unknown_profile_returns_false() {
        let store = ProfileStore::new();
        store.register_profile(driver("drv-1")).await.unwrap();

        let update = ProfileUpdate {
            name: Some("Hedi B.".into()),
            ..Default::default()
        };
        assert!(store.update_profile("drv-1", update.clone()).await);
        assert!(!store.update_profile("drv-404", update).await);
        assert_eq!(store.get_profile("drv-1").await.unwrap().name, "Hedi B.");
    }

    #[tokio::test]
    async fn luggage_checked_per_category() {
        let store = ProfileStore::new();
        store.register_profile(driver("drv-1")).await.unwrap();

        let fits = LuggageDetails { sac: 2, petite_valise: 2, ..Default::default() };
        assert!(store.check_luggage("drv-1", &fits).await.is_ok());

        let too_big = LuggageDetails { grande_valise: 1, sac: 5, ..Default::default() };
        match store.check_luggage("drv-1", &too_big).await {
            Err(AppError::ValidationFailed(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["sac", "grande_valise"]);
            }
            other => panic!("expected validation failure, got {other:?}"),
        }

        // unknown driver is unconstrained
        assert!(store.check_luggage("drv-404", &too_big).await.is_ok());
    }

    #[tokio::test]
    async fn privatization_price_and_listing() {
        let store = ProfileStore::new();
        store.register_profile(driver("drv-1")).await.unwrap();
        store
            .register_profile(UserProfile::new("usr-1", "Amira", UserRole::Passenger, Utc::now()))
            .await
            .unwrap();

        assert_eq!(store.privatization_price("drv-1", "hammamet", "TUNIS").await, Some(90.0));
        assert_eq!(store.privatization_price("usr-1", "Tunis", "Hammamet").await, None);
        assert_eq!(store.list_profiles(UserRole::Driver).await.len(), 1);
        assert_eq!(store.list_profiles(UserRole::Passenger).await[0].id, "usr-1");
    }
}
