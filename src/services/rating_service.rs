// src/services/rating_service.rs
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing;

use crate::{
    errors::LouageError as AppError,
    models::{
        rating::{empty_distribution, RaterRole, Rating, RatingDistribution, MAX_RATING, MIN_RATING},
        user::UserRole,
    },
    services::user_service::ProfileOperations,
    utils::{
        clock::Clock,
        id_generator::{IdGenerator, IdType},
    },
};

#[async_trait]
pub trait RatingOperations: Send + Sync {
    async fn can_rate(&self, trip_id: &str, user_id: &str, role: RaterRole) -> bool;
    /// Passenger rates the driver of a trip.
    async fn add_rating(&self, trip_id: &str, driver_id: &str, passenger_id: &str, rating: u8, comment: &str) -> Result<Rating, AppError>;
    /// Driver rates a passenger of a trip.
    async fn add_driver_rating(&self, trip_id: &str, driver_id: &str, passenger_id: &str, rating: u8, comment: &str) -> Result<Rating, AppError>;
    async fn calculate_average_rating(&self, entity_id: &str, role: UserRole) -> f64;
    async fn get_rating_distribution(&self, driver_id: &str) -> RatingDistribution;
    async fn ratings_for_driver(&self, driver_id: &str) -> Vec<Rating>;
}

/// At most one rating per trip per rater.
pub struct RatingService {
    ratings: RwLock<Vec<Rating>>,
    profiles: Arc<dyn ProfileOperations>,
    clock: Arc<dyn Clock>,
}

impl RatingService {
    pub fn new(profiles: Arc<dyn ProfileOperations>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ratings: RwLock::new(Vec::new()),
            profiles,
            clock,
        }
    }

    fn already_rated(ratings: &[Rating], trip_id: &str, user_id: &str, role: RaterRole) -> bool {
        ratings
            .iter()
            .any(|r| r.trip_id == trip_id && r.rater == role && r.rater_id() == user_id)
    }

    fn average(values: impl Iterator<Item = u8>) -> f64 {
        let (sum, count) = values.fold((0u32, 0u32), |(s, c), v| (s + v as u32, c + 1));
        if count == 0 {
            return 0.0;
        }
        let mean = sum as f64 / count as f64;
        (mean * 10.0).round() / 10.0
    }

    async fn insert(
        &self,
        rater: RaterRole,
        trip_id: &str,
        driver_id: &str,
        passenger_id: &str,
        rating: u8,
        comment: &str,
    ) -> Result<Rating, AppError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(AppError::validation_error(
                "rating",
                format!("rating must be between {MIN_RATING} and {MAX_RATING}"),
            ));
        }

        let now = self.clock.now();
        let created = {
            let mut ratings = self.ratings.write().await;
            let rater_id = match rater {
                RaterRole::Passenger => passenger_id,
                RaterRole::Driver => driver_id,
            };

            if Self::already_rated(&ratings, trip_id, rater_id, rater) {
                tracing::warn!("{} already rated trip {}", rater_id, trip_id);
                return Err(AppError::invalid_state(format!(
                    "{rater_id} has already rated trip {trip_id}"
                )));
            }

            let created = Rating {
                id: IdGenerator::generate_with_timestamp(IdType::Rating, now),
                trip_id: trip_id.to_string(),
                driver_id: driver_id.to_string(),
                passenger_id: passenger_id.to_string(),
                rater,
                rating,
                comment: comment.to_string(),
                timestamp: now,
            };
            ratings.push(created.clone());
            created
        };

        tracing::info!(
            "Rating {} added: {} gave {} {}/5 for trip {}",
            created.id,
            created.rater_id(),
            created.subject_id(),
            created.rating,
            created.trip_id
        );

        Ok(created)
    }
}

#[async_trait]
impl RatingOperations for RatingService {
    async fn can_rate(&self, trip_id: &str, user_id: &str, role: RaterRole) -> bool {
        !Self::already_rated(&self.ratings.read().await, trip_id, user_id, role)
    }

    #[tracing::instrument(skip(self, comment))]
    async fn add_rating(&self, trip_id: &str, driver_id: &str, passenger_id: &str, rating: u8, comment: &str) -> Result<Rating, AppError> {
        let created = self
            .insert(RaterRole::Passenger, trip_id, driver_id, passenger_id, rating, comment)
            .await?;

        let average = self.calculate_average_rating(driver_id, UserRole::Driver).await;
        if !self.profiles.record_rating(driver_id, average).await {
            tracing::debug!("No profile for driver {}, average {} not stored", driver_id, average);
        }

        Ok(created)
    }

    #[tracing::instrument(skip(self, comment))]
    async fn add_driver_rating(&self, trip_id: &str, driver_id: &str, passenger_id: &str, rating: u8, comment: &str) -> Result<Rating, AppError> {
        self.insert(RaterRole::Driver, trip_id, driver_id, passenger_id, rating, comment)
            .await
    }

    async fn calculate_average_rating(&self, entity_id: &str, role: UserRole) -> f64 {
        let ratings = self.ratings.read().await;
        let subject_role = match role {
            UserRole::Driver => RaterRole::Passenger,
            UserRole::Passenger => RaterRole::Driver,
            UserRole::Admin => return 0.0,
        };

        Self::average(
            ratings
                .iter()
                .filter(|r| r.rater == subject_role && r.subject_id() == entity_id)
                .map(|r| r.rating),
        )
    }

    async fn get_rating_distribution(&self, driver_id: &str) -> RatingDistribution {
        let mut distribution = empty_distribution();
        for rating in self.ratings_for_driver(driver_id).await {
            *distribution.entry(rating.rating).or_insert(0) += 1;
        }
        distribution
    }

    async fn ratings_for_driver(&self, driver_id: &str) -> Vec<Rating> {
        self.ratings
            .read()
            .await
            .iter()
            .filter(|r| r.rater == RaterRole::Passenger && r.driver_id == driver_id)
            .cloned()
            .collect()
    }
}
