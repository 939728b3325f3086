// src/services/trip_service.rs
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing;

use crate::{
    errors::{LouageError as AppError, ValidationError},
    models::{
        booking::{BookingRequest, BookingStatus},
        messages::{NewNotification, NotificationType, ALL_PASSENGERS},
        trip::{NewTrip, Trip, TripStatus},
        user::UserRole,
    },
    services::{
        memory_store::MemoryStore, messaging_service::NotificationService,
        user_service::ProfileOperations,
    },
    utils::{
        clock::Clock,
        id_generator::{IdGenerator, IdType},
    },
};

#[async_trait]
pub trait TripOperations: Send + Sync {
    async fn publish_trip(&self, trip: NewTrip) -> Result<Trip, AppError>;
    async fn get_trip(&self, trip_id: &str) -> Result<Trip, AppError>;
    async fn list_trips_by_driver(&self, driver_id: &str) -> Vec<Trip>;
    async fn search_trips(&self, origin: &str, destination: &str) -> Vec<Trip>;
    async fn start_trip(&self, driver_id: &str, trip_id: &str) -> Result<Trip, AppError>;
    async fn complete_trip(&self, driver_id: &str, trip_id: &str) -> Result<Trip, AppError>;
    async fn cancel_trip(&self, driver_id: &str, trip_id: &str) -> Result<Trip, AppError>;
    /// Take `count` seats for an accepted booking, floored at zero.
    /// Returns the seats actually taken.
    async fn reserve_seats(&self, trip_id: &str, count: u32) -> Result<u32, AppError>;
}

pub struct TripService {
    trips: Arc<MemoryStore<Trip>>,
    bookings: Arc<MemoryStore<BookingRequest>>,
    profiles: Arc<dyn ProfileOperations>,
    notification_service: Arc<dyn NotificationService>,
    clock: Arc<dyn Clock>,
}

impl TripService {
    pub fn new(
        trips: Arc<MemoryStore<Trip>>,
        bookings: Arc<MemoryStore<BookingRequest>>,
        profiles: Arc<dyn ProfileOperations>,
        notification_service: Arc<dyn NotificationService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            trips,
            bookings,
            profiles,
            notification_service,
            clock,
        }
    }

    fn validate(trip: &NewTrip) -> Result<(), AppError> {
        let mut errors = Vec::new();

        if trip.origin.trim().is_empty() {
            errors.push(ValidationError::new("origin", "Origin is required"));
        }
        if trip.destination.trim().is_empty() {
            errors.push(ValidationError::new("destination", "Destination is required"));
        }
        if !trip.origin.trim().is_empty()
            && trip.origin.trim().eq_ignore_ascii_case(trip.destination.trim())
        {
            errors.push(ValidationError::new("destination", "Destination must differ from origin"));
        }
        if trip.total_seats < 1 {
            errors.push(ValidationError::new("total_seats", "At least one seat is required"));
        }
        if trip.price_collective.is_nan() || trip.price_collective < 0.0 {
            errors.push(ValidationError::new("price_collective", "Price must be zero or more"));
        }
        if trip.price_private.is_nan() || trip.price_private < 0.0 {
            errors.push(ValidationError::new("price_private", "Price must be zero or more"));
        }

        AppError::check(errors)
    }

    /// Owner-checked status change. Leaves the trip untouched on error.
    async fn transition(&self, driver_id: &str, trip_id: &str, next: TripStatus) -> Result<Trip, AppError> {
        let now = self.clock.now();
        let mut trips = self.trips.write().await;
        let trip = trips
            .get_mut(trip_id)
            .ok_or_else(|| AppError::TripNotFound(trip_id.to_string()))?;

        if trip.driver_id != driver_id {
            tracing::warn!("Driver {} tried to move trip {} it does not own", driver_id, trip_id);
            return Err(AppError::Forbidden(format!(
                "driver {driver_id} is not the owner of trip {trip_id}"
            )));
        }

        if !trip.can_transition_to(next) {
            return Err(AppError::invalid_state(format!(
                "trip {} cannot go from {} to {}",
                trip_id, trip.status, next
            )));
        }

        tracing::info!("Trip {}: {} -> {}", trip_id, trip.status, next);
        trip.status = next;
        trip.updated_at = now;

        Ok(trip.clone())
    }

    async fn notify_booked_passengers(
        &self,
        trip: &Trip,
        notification_type: NotificationType,
        title: &str,
        message: String,
    ) {
        let passengers = self
            .bookings
            .filter(|b| b.trip_id == trip.id && b.status == BookingStatus::Accepted)
            .await;

        for booking in passengers {
            self.notification_service
                .add_notification(
                    NewNotification::new(&booking.passenger_id, notification_type, title, message.clone())
                        .with_data(json!({ "trip_id": trip.id, "booking_id": booking.id })),
                )
                .await;
        }
    }
}

#[async_trait]
impl TripOperations for TripService {
    #[tracing::instrument(skip(self, trip), fields(driver_id = %trip.driver_id))]
    async fn publish_trip(&self, trip: NewTrip) -> Result<Trip, AppError> {
        Self::validate(&trip)?;

        let now = self.clock.now();
        let trip = Trip {
            id: IdGenerator::generate_with_timestamp(IdType::Trip, now),
            driver_id: trip.driver_id,
            origin: trip.origin,
            destination: trip.destination,
            departure_time: trip.departure_time,
            price_collective: trip.price_collective,
            price_private: trip.price_private,
            available_seats: trip.total_seats,
            total_seats: trip.total_seats,
            is_private: trip.is_private,
            status: TripStatus::Pending,
            recurrence_days: trip.recurrence_days,
            created_at: now,
            updated_at: now,
        };

        self.trips.insert(trip.id.clone(), trip.clone()).await;
        tracing::info!("Trip {} published: {}", trip.id, trip.route());

        let departure = trip.departure_time.format("%d/%m %H:%M").to_string();
        self.notification_service
            .add_notification(
                NewNotification::new(
                    ALL_PASSENGERS,
                    NotificationType::NewTripAvailable,
                    "Nouveau trajet disponible",
                    format!("{} le {}, {} places", trip.route(), departure, trip.available_seats),
                )
                .with_data(json!({ "trip_id": trip.id })),
            )
            .await;

        let driver_name = self
            .profiles
            .get_profile(&trip.driver_id)
            .await
            .map(|p| p.name)
            .unwrap_or_else(|| trip.driver_id.clone());

        let fans = self
            .profiles
            .list_profiles(UserRole::Passenger)
            .await
            .into_iter()
            .filter(|p| p.preferences.favorite_drivers.contains(&trip.driver_id));

        for fan in fans {
            self.notification_service
                .add_notification(
                    NewNotification::new(
                        &fan.id,
                        NotificationType::FavoriteDriver,
                        "Votre chauffeur favori a publié un trajet",
                        format!("{} propose {} le {}", driver_name, trip.route(), departure),
                    )
                    .with_data(json!({ "trip_id": trip.id, "driver_id": trip.driver_id })),
                )
                .await;
        }

        Ok(trip)
    }

    async fn get_trip(&self, trip_id: &str) -> Result<Trip, AppError> {
        tracing::debug!("Getting trip: {}", trip_id);
        if !IdGenerator::validate_id(trip_id, Some(IdType::Trip)) {
            return Err(AppError::TripNotFound(trip_id.to_string()));
        }
        self.trips
            .get(trip_id)
            .await
            .ok_or_else(|| AppError::TripNotFound(trip_id.to_string()))
    }

    async fn list_trips_by_driver(&self, driver_id: &str) -> Vec<Trip> {
        self.trips.filter(|t| t.driver_id == driver_id).await
    }

    async fn search_trips(&self, origin: &str, destination: &str) -> Vec<Trip> {
        let same = |a: &str, b: &str| a.trim().eq_ignore_ascii_case(b.trim());
        self.trips
            .filter(|t| {
                t.is_bookable()
                    && t.available_seats > 0
                    && same(&t.origin, origin)
                    && same(&t.destination, destination)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn start_trip(&self, driver_id: &str, trip_id: &str) -> Result<Trip, AppError> {
        let trip = self.transition(driver_id, trip_id, TripStatus::Active).await?;
        self.notify_booked_passengers(
            &trip,
            NotificationType::TripStarted,
            "Votre louage est parti",
            format!("Le trajet {} a commencé", trip.route()),
        )
        .await;
        Ok(trip)
    }

    #[tracing::instrument(skip(self))]
    async fn complete_trip(&self, driver_id: &str, trip_id: &str) -> Result<Trip, AppError> {
        let trip = self.transition(driver_id, trip_id, TripStatus::Completed).await?;
        self.notify_booked_passengers(
            &trip,
            NotificationType::TripCompleted,
            "Vous êtes arrivé",
            format!("Trajet {} terminé, notez votre chauffeur", trip.route()),
        )
        .await;
        Ok(trip)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_trip(&self, driver_id: &str, trip_id: &str) -> Result<Trip, AppError> {
        self.transition(driver_id, trip_id, TripStatus::Cancelled).await
    }

    async fn reserve_seats(&self, trip_id: &str, count: u32) -> Result<u32, AppError> {
        let now = self.clock.now();
        let mut trips = self.trips.write().await;
        let trip = trips
            .get_mut(trip_id)
            .ok_or_else(|| AppError::TripNotFound(trip_id.to_string()))?;

        if !trip.is_bookable() {
            return Err(AppError::invalid_state(format!(
                "trip {} is {} and no longer takes bookings",
                trip_id, trip.status
            )));
        }

        let taken = trip.take_seats(count);
        trip.updated_at = now;

        if taken < count {
            tracing::warn!(
                "Trip {} short of seats: {} requested, {} taken",
                trip_id,
                count,
                taken
            );
        }
        tracing::debug!("Trip {} now has {} seats left", trip_id, trip.available_seats);

        Ok(taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::messages::ReadFilter;
    use crate::models::user::UserProfile;
    use crate::services::messaging_service::NotificationStore;
    use crate::services::user_service::ProfileStore;
    use crate::utils::clock::ManualClock;
    use chrono::Utc;

    struct Fixture {
        trips: TripService,
        profiles: Arc<ProfileStore>,
        notifications: Arc<NotificationStore>,
    }

    fn fixture() -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::fixed());
        let profiles = Arc::new(ProfileStore::new());
        let notifications = Arc::new(NotificationStore::new(clock.clone()));
        let trips = TripService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            profiles.clone(),
            notifications.clone(),
            clock,
        );
        Fixture { trips, profiles, notifications }
    }

    fn new_trip(seats: u32) -> NewTrip {
        NewTrip {
            driver_id: "drv-1".into(),
            origin: "Tunis".into(),
            destination: "Sfax".into(),
            departure_time: Utc::now(),
            price_collective: 25.0,
            price_private: 180.0,
            total_seats: seats,
            is_private: false,
            recurrence_days: None,
        }
    }

    #[tokio::test]
    async fn publish_announces_to_passengers_and_fans() {
        let f = fixture();
        let mut fan = UserProfile::new("usr-fan", "Amira", UserRole::Passenger, Utc::now());
        fan.preferences.favorite_drivers.push("drv-1".into());
        f.profiles.register_profile(fan).await.unwrap();
        f.profiles
            .register_profile(UserProfile::new("usr-other", "Sami", UserRole::Passenger, Utc::now()))
            .await
            .unwrap();

        let trip = f.trips.publish_trip(new_trip(8)).await.unwrap();
        assert_eq!(trip.available_seats, 8);
        assert_eq!(trip.status, TripStatus::Pending);

        let broadcast = f.notifications.get_notifications(ALL_PASSENGERS, ReadFilter::All).await;
        assert_eq!(broadcast.len(), 1);
        assert_eq!(broadcast[0].notification_type, NotificationType::NewTripAvailable);

        let fan_notes = f.notifications.get_notifications("usr-fan", ReadFilter::All).await;
        assert_eq!(fan_notes.len(), 1);
        assert_eq!(fan_notes[0].notification_type, NotificationType::FavoriteDriver);
        assert_eq!(f.notifications.get_unread_count("usr-other").await, 0);
    }

    #[tokio::test]
    async fn publish_validates_input() {
        let f = fixture();
        let mut bad = new_trip(0);
        bad.destination = " tunis ".into();
        bad.price_collective = -1.0;

        match f.trips.publish_trip(bad).await {
            Err(AppError::ValidationFailed(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert!(f.trips.list_trips_by_driver("drv-1").await.is_empty());
    }

    #[tokio::test]
    async fn only_owner_moves_trip_through_lifecycle() {
        let f = fixture();
        let trip = f.trips.publish_trip(new_trip(4)).await.unwrap();

        let err = f.trips.start_trip("drv-2", &trip.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = f.trips.complete_trip("drv-1", &trip.id).await.unwrap_err();
        assert!(err.is_invalid_state());

        f.trips.start_trip("drv-1", &trip.id).await.unwrap();
        let done = f.trips.complete_trip("drv-1", &trip.id).await.unwrap();
        assert_eq!(done.status, TripStatus::Completed);

        assert!(f.trips.cancel_trip("drv-1", &trip.id).await.is_err());
        assert!(f.trips.start_trip("drv-1", "trp-000000-missing0").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn reserve_seats_floors_and_search_skips_full_trips() {
        let f = fixture();
        let trip = f.trips.publish_trip(new_trip(3)).await.unwrap();

        assert_eq!(f.trips.reserve_seats(&trip.id, 2).await.unwrap(), 2);
        assert_eq!(f.trips.search_trips("tunis", "SFAX").await.len(), 1);
        assert_eq!(f.trips.reserve_seats(&trip.id, 5).await.unwrap(), 1);
        assert_eq!(f.trips.get_trip(&trip.id).await.unwrap().available_seats, 0);
        assert!(f.trips.search_trips("Tunis", "Sfax").await.is_empty());
    }

    #[tokio::test]
    async fn cancelled_trip_takes_no_seats() {
        let f = fixture();
        let trip = f.trips.publish_trip(new_trip(3)).await.unwrap();
        f.trips.cancel_trip("drv-1", &trip.id).await.unwrap();

        assert!(f.trips.reserve_seats(&trip.id, 1).await.unwrap_err().is_invalid_state());
        assert_eq!(f.trips.get_trip(&trip.id).await.unwrap().available_seats, 3);
    }
}
