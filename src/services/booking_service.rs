// src/services/booking_service.rs
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing;

use crate::{
    errors::{LouageError as AppError, ValidationError},
    models::{
        booking::{BookingDecision, BookingRequest, BookingStatus, BookingSubmission},
        messages::{NewNotification, NotificationType},
    },
    services::{
        memory_store::MemoryStore, messaging_service::NotificationService,
        trip_service::TripOperations, user_service::ProfileOperations,
    },
    utils::{
        clock::Clock,
        id_generator::{IdGenerator, IdType},
    },
};

#[async_trait]
pub trait BookingOperations: Send + Sync {
    async fn submit_booking_request(&self, submission: BookingSubmission) -> Result<BookingRequest, AppError>;
    async fn resolve_booking_request(&self, request_id: &str, decision: BookingDecision) -> Result<BookingRequest, AppError>;
    async fn resolve_as_driver(&self, driver_id: &str, request_id: &str, decision: BookingDecision) -> Result<BookingRequest, AppError>;
    async fn get_booking_request(&self, request_id: &str) -> Result<BookingRequest, AppError>;
    async fn requests_for_trip(&self, trip_id: &str) -> Vec<BookingRequest>;
    async fn pending_requests_for_driver(&self, driver_id: &str) -> Vec<BookingRequest>;
    async fn requests_for_passenger(&self, passenger_id: &str) -> Vec<BookingRequest>;
}

/// Seat reservations on published trips: pending until the driver accepts
/// or declines, then frozen.
pub struct BookingService {
    bookings: Arc<MemoryStore<BookingRequest>>,
    trip_service: Arc<dyn TripOperations>,
    profiles: Arc<dyn ProfileOperations>,
    notification_service: Arc<dyn NotificationService>,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(
        bookings: Arc<MemoryStore<BookingRequest>>,
        trip_service: Arc<dyn TripOperations>,
        profiles: Arc<dyn ProfileOperations>,
        notification_service: Arc<dyn NotificationService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bookings,
            trip_service,
            profiles,
            notification_service,
            clock,
        }
    }

    async fn notify_passenger(&self, booking: &BookingRequest) {
        let (notification_type, title, message) = match booking.status {
            BookingStatus::Accepted => (
                NotificationType::BookingAccepted,
                "Réservation confirmée",
                format!("{} place(s) confirmée(s) sur {}", booking.passenger_count, booking.route),
            ),
            BookingStatus::Declined => (
                NotificationType::BookingDeclined,
                "Réservation refusée",
                format!("Le chauffeur n'a pas pu accepter votre demande pour {}", booking.route),
            ),
            BookingStatus::Pending => return,
        };

        self.notification_service
            .add_notification(
                NewNotification::new(&booking.passenger_id, notification_type, title, message)
                    .with_action_url(format!("/trips/{}", booking.trip_id))
                    .with_data(json!({ "booking_id": booking.id, "trip_id": booking.trip_id })),
            )
            .await;
    }
}

#[async_trait]
impl BookingOperations for BookingService {
    #[tracing::instrument(skip(self, submission), fields(trip_id = %submission.trip_id))]
    async fn submit_booking_request(&self, submission: BookingSubmission) -> Result<BookingRequest, AppError> {
        let mut errors = Vec::new();
        if submission.passenger_count < 1 {
            errors.push(ValidationError::new("passenger_count", "At least one passenger is required"));
        }
        if submission.passenger_name.trim().is_empty() {
            errors.push(ValidationError::new("passenger_name", "Passenger name is required"));
        }
        let luggage_count = match &submission.luggage_details {
            Some(luggage) => luggage.total().unwrap_or_else(|| {
                errors.push(ValidationError::new("luggage_details", "Too many pieces of luggage"));
                0
            }),
            None => 0,
        };
        AppError::check(errors)?;

        let trip = self.trip_service.get_trip(&submission.trip_id).await?;

        if !trip.is_bookable() {
            return Err(AppError::invalid_state(format!(
                "trip {} is {} and no longer takes bookings",
                trip.id, trip.status
            )));
        }

        if submission.passenger_count > trip.available_seats {
            tracing::warn!(
                "Booking for {} seats rejected, trip {} has {} left",
                submission.passenger_count,
                trip.id,
                trip.available_seats
            );
            return Err(AppError::validation_error(
                "passenger_count",
                format!("only {} seat(s) left on this trip", trip.available_seats),
            ));
        }

        if let Some(luggage) = &submission.luggage_details {
            self.profiles.check_luggage(&trip.driver_id, luggage).await?;
        }

        let now = self.clock.now();
        let booking = BookingRequest {
            id: IdGenerator::generate_with_timestamp(IdType::Booking, now),
            trip_id: trip.id.clone(),
            passenger_id: submission.passenger_id,
            passenger_name: submission.passenger_name,
            passenger_count: submission.passenger_count,
            luggage_count,
            luggage_details: submission.luggage_details,
            status: BookingStatus::Pending,
            timestamp: now,
            resolved_at: None,
            route: trip.route(),
        };

        self.bookings.insert(booking.id.clone(), booking.clone()).await;
        tracing::info!(
            "Booking {} submitted: {} x{} on {}",
            booking.id,
            booking.passenger_name,
            booking.passenger_count,
            booking.route
        );

        self.notification_service
            .add_notification(
                NewNotification::new(
                    &trip.driver_id,
                    NotificationType::BookingRequest,
                    "Nouvelle demande de réservation",
                    format!(
                        "{} demande {} place(s) pour {}",
                        booking.passenger_name, booking.passenger_count, booking.route
                    ),
                )
                .with_data(json!({ "booking_id": booking.id, "trip_id": trip.id })),
            )
            .await;

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn resolve_booking_request(&self, request_id: &str, decision: BookingDecision) -> Result<BookingRequest, AppError> {
        let resolved = {
            // Held across the seat reservation so the check and the
            // transition happen as one step.
            let mut bookings = self.bookings.write().await;
            let booking = bookings
                .get_mut(request_id)
                .ok_or_else(|| AppError::BookingNotFound(request_id.to_string()))?;

            if booking.is_terminal() {
                tracing::warn!("Booking {} already {}", request_id, booking.status);
                return Err(AppError::BookingAlreadyResolved {
                    id: request_id.to_string(),
                    status: booking.status.to_string(),
                });
            }

            if decision == BookingDecision::Accepted {
                self.trip_service
                    .reserve_seats(&booking.trip_id, booking.passenger_count)
                    .await?;
            }

            booking.resolve(decision, self.clock.now());
            booking.clone()
        };

        tracing::info!("Booking {} resolved: {}", resolved.id, resolved.status);
        self.notify_passenger(&resolved).await;

        Ok(resolved)
    }

    async fn resolve_as_driver(&self, driver_id: &str, request_id: &str, decision: BookingDecision) -> Result<BookingRequest, AppError> {
        let booking = self.get_booking_request(request_id).await?;
        let trip = self.trip_service.get_trip(&booking.trip_id).await?;

        if trip.driver_id != driver_id {
            tracing::warn!("Driver {} tried to resolve booking {} on trip {}", driver_id, request_id, trip.id);
            return Err(AppError::Forbidden(format!(
                "driver {driver_id} is not the owner of trip {}",
                trip.id
            )));
        }

        self.resolve_booking_request(request_id, decision).await
    }

    async fn get_booking_request(&self, request_id: &str) -> Result<BookingRequest, AppError> {
        tracing::debug!("Getting booking request: {}", request_id);
        if !IdGenerator::validate_id(request_id, Some(IdType::Booking)) {
            return Err(AppError::BookingNotFound(request_id.to_string()));
        }
        self.bookings
            .get(request_id)
            .await
            .ok_or_else(|| AppError::BookingNotFound(request_id.to_string()))
    }

    async fn requests_for_trip(&self, trip_id: &str) -> Vec<BookingRequest> {
        self.bookings.filter(|b| b.trip_id == trip_id).await
    }

    async fn pending_requests_for_driver(&self, driver_id: &str) -> Vec<BookingRequest> {
        let trip_ids: HashSet<String> = self
            .trip_service
            .list_trips_by_driver(driver_id)
            .await
            .into_iter()
            .map(|t| t.id)
            .collect();

        self.bookings
            .filter(|b| b.status == BookingStatus::Pending && trip_ids.contains(&b.trip_id))
            .await
    }

    async fn requests_for_passenger(&self, passenger_id: &str) -> Vec<BookingRequest> {
        self.bookings.filter(|b| b.passenger_id == passenger_id).await
    }
}
