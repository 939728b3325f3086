// src/services/matching_service.rs
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing;

use crate::{
    errors::{LouageError as AppError, ValidationError},
    models::{
        driver::{DriverReply, DriverResponse, OfferStatus},
        messages::{NewNotification, NotificationType, ALL_DRIVERS},
        ride_request::{Audience, RideRequest, RideRequestDetails, RideRequestStatus},
    },
    services::{
        memory_store::MemoryStore, messaging_service::NotificationService,
        pricing_service::PriceCalculator, user_service::ProfileOperations,
    },
    utils::{
        clock::Clock,
        id_generator::{IdGenerator, IdType},
    },
};

#[async_trait]
pub trait MatchingOperations: Send + Sync {
    async fn broadcast_request(&self, details: RideRequestDetails) -> Result<RideRequest, AppError>;
    async fn record_driver_response(&self, request_id: &str, reply: DriverReply) -> Result<DriverResponse, AppError>;
    async fn accept_driver_offer(&self, request_id: &str, driver_id: &str) -> Result<RideRequest, AppError>;
    async fn accept_best_offer(&self, request_id: &str) -> Result<RideRequest, AppError>;
    async fn cancel_request(&self, request_id: &str, passenger_id: &str) -> Result<RideRequest, AppError>;
    async fn expire_stale_requests(&self) -> Vec<String>;
    async fn get_request(&self, request_id: &str) -> Result<RideRequest, AppError>;
    async fn responses(&self, request_id: &str) -> Result<Vec<DriverResponse>, AppError>;
    async fn best_offer(&self, request_id: &str) -> Result<Option<DriverResponse>, AppError>;
}

/// Fans an on-demand or privatization request out to candidate drivers and
/// collects their offers until the passenger picks one.
pub struct MatchingService {
    requests: Arc<MemoryStore<RideRequest>>,
    profiles: Arc<dyn ProfileOperations>,
    pricing: Arc<dyn PriceCalculator>,
    notification_service: Arc<dyn NotificationService>,
    clock: Arc<dyn Clock>,
    offer_timeout: Duration,
}

impl MatchingService {
    pub fn new(
        requests: Arc<MemoryStore<RideRequest>>,
        profiles: Arc<dyn ProfileOperations>,
        pricing: Arc<dyn PriceCalculator>,
        notification_service: Arc<dyn NotificationService>,
        clock: Arc<dyn Clock>,
        offer_timeout: Duration,
    ) -> Self {
        Self {
            requests,
            profiles,
            pricing,
            notification_service,
            clock,
            offer_timeout,
        }
    }

    fn validate(details: &RideRequestDetails) -> Result<(), AppError> {
        let mut errors = Vec::new();

        if details.passenger_count < 1 {
            errors.push(ValidationError::new("passenger_count", "At least one passenger is required"));
        }
        if details.origin.trim().is_empty() {
            errors.push(ValidationError::new("origin", "Origin is required"));
        }
        if details.destination.trim().is_empty() {
            errors.push(ValidationError::new("destination", "Destination is required"));
        }
        if !details.origin.trim().is_empty()
            && details.origin.trim().eq_ignore_ascii_case(details.destination.trim())
        {
            errors.push(ValidationError::new("destination", "Destination must differ from origin"));
        }
        if let Audience::Drivers(ids) = &details.audience {
            if ids.is_empty() {
                errors.push(ValidationError::new("audience", "At least one driver is required"));
            }
        }

        AppError::check(errors)
    }

    /// Close the offer window once the timeout has passed.
    fn expire_if_stale(request: &mut RideRequest, now: DateTime<Utc>) -> bool {
        if request.is_open() && now >= request.expires_at {
            tracing::info!("Ride request {} expired ({} offers)", request.id, request.responses.len());
            request.status = RideRequestStatus::Expired;
            request.updated_at = now;
            true
        } else {
            false
        }
    }

    fn ensure_open(request: &RideRequest) -> Result<(), AppError> {
        if request.is_open() {
            Ok(())
        } else {
            Err(AppError::RequestClosed {
                id: request.id.clone(),
                status: request.status.to_string(),
            })
        }
    }

    /// Pick `driver_id`'s offer and drop every other one. Caller holds the lock.
    fn finalize(request: &mut RideRequest, driver_id: &str, now: DateTime<Utc>) -> Result<DriverResponse, AppError> {
        Self::ensure_open(request)?;

        let chosen = request
            .response_from(driver_id)
            .cloned()
            .ok_or_else(|| AppError::DriverResponseNotFound {
                request_id: request.id.clone(),
                driver_id: driver_id.to_string(),
            })?;

        if !chosen.is_accepted() {
            return Err(AppError::OfferNotAccepted(driver_id.to_string()));
        }

        let before = request.responses.len();
        request.responses.retain(|r| r.driver_id == driver_id);
        request.discarded_responses += (before - request.responses.len()) as u32;
        request.selected_driver_id = Some(driver_id.to_string());
        request.status = RideRequestStatus::Finalized;
        request.updated_at = now;

        Ok(chosen)
    }

    async fn notify_selected_driver(&self, request: &RideRequest, chosen: &DriverResponse) {
        tracing::info!(
            "Ride request {} finalized with driver {} ({} other offers discarded)",
            request.id,
            chosen.driver_id,
            request.discarded_responses
        );

        self.notification_service
            .add_notification(
                NewNotification::new(
                    &chosen.driver_id,
                    NotificationType::BookingAccepted,
                    "Offre acceptée",
                    format!("{} a accepté votre offre pour {}", request.passenger_name, request.route()),
                )
                .with_data(json!({ "request_id": request.id, "passenger_id": request.passenger_id })),
            )
            .await;
    }

    /// Lazily expire, then clone.
    async fn load(&self, request_id: &str) -> Result<RideRequest, AppError> {
        if !IdGenerator::validate_id(request_id, Some(IdType::RideRequest)) {
            return Err(AppError::RideRequestNotFound(request_id.to_string()));
        }
        let now = self.clock.now();
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(request_id)
            .ok_or_else(|| AppError::RideRequestNotFound(request_id.to_string()))?;
        Self::expire_if_stale(request, now);
        Ok(request.clone())
    }
}

#[async_trait]
impl MatchingOperations for MatchingService {
    #[tracing::instrument(skip(self, details), fields(passenger_id = %details.passenger_id))]
    async fn broadcast_request(&self, mut details: RideRequestDetails) -> Result<RideRequest, AppError> {
        Self::validate(&details)?;

        if let Audience::Drivers(ids) = &mut details.audience {
            let mut seen = std::collections::HashSet::new();
            ids.retain(|id| seen.insert(id.clone()));
        }

        let now = self.clock.now();
        let suggested = self
            .pricing
            .quote(&details.origin, &details.destination, details.pickup_type);
        let request = RideRequest::new(
            IdGenerator::generate_with_timestamp(IdType::RideRequest, now),
            details,
            Some(suggested),
            now,
            now + self.offer_timeout,
        );

        self.requests.insert(request.id.clone(), request.clone()).await;

        let kind = if request.is_privatization { "Privatisation" } else { "Course" };
        let message = format!(
            "{} {} pour {} passager(s), {}",
            kind,
            request.route(),
            request.passenger_count,
            request.passenger_name
        );
        let recipients: Vec<String> = match &request.audience {
            Audience::AllDrivers => vec![ALL_DRIVERS.to_string()],
            Audience::Drivers(ids) => ids.clone(),
        };

        tracing::info!(
            "Ride request {} broadcast to {} recipient(s): {}",
            request.id,
            recipients.len(),
            request.route()
        );

        for recipient in recipients {
            self.notification_service
                .add_notification(
                    NewNotification::new(
                        recipient,
                        NotificationType::BookingRequest,
                        "Nouvelle demande de course",
                        message.clone(),
                    )
                    .with_data(json!({ "request_id": request.id })),
                )
                .await;
        }

        Ok(request)
    }

    #[tracing::instrument(skip(self, reply), fields(driver_id = %reply.driver_id, accept = reply.accept))]
    async fn record_driver_response(&self, request_id: &str, reply: DriverReply) -> Result<DriverResponse, AppError> {
        if reply.price.is_some_and(|p| p.is_nan() || p < 0.0) {
            return Err(AppError::validation_error("price", "Price must be zero or more"));
        }

        // Profile lookups happen before taking the request lock
        let snapshot = self.load(request_id).await?;
        let mut price = reply.price;
        if reply.accept {
            if let Some(luggage) = &snapshot.luggage_details {
                self.profiles.check_luggage(&reply.driver_id, luggage).await?;
            }
            if price.is_none() && snapshot.is_privatization {
                price = self
                    .profiles
                    .privatization_price(&reply.driver_id, &snapshot.origin, &snapshot.destination)
                    .await;
            }
        }

        let now = self.clock.now();
        let (response, request) = {
            let mut requests = self.requests.write().await;
            let request = requests
                .get_mut(request_id)
                .ok_or_else(|| AppError::RideRequestNotFound(request_id.to_string()))?;

            Self::expire_if_stale(request, now);
            if let Err(err) = Self::ensure_open(request) {
                tracing::warn!("Late reply from {} on {} ignored: {}", reply.driver_id, request_id, err);
                return Err(err);
            }

            if !request.is_candidate(&reply.driver_id) {
                return Err(AppError::validation_error(
                    "driver_id",
                    format!("driver {} was not asked for this request", reply.driver_id),
                ));
            }

            if request.response_from(&reply.driver_id).is_some() {
                tracing::warn!("Duplicate reply from {} on {}", reply.driver_id, request_id);
                return Err(AppError::DuplicateResponse(reply.driver_id));
            }

            let response = DriverResponse {
                request_id: request.id.clone(),
                driver_id: reply.driver_id,
                driver_name: reply.driver_name,
                status: if reply.accept { OfferStatus::Accepted } else { OfferStatus::Declined },
                price: if reply.accept { price } else { None },
                estimated_arrival: reply.estimated_arrival,
                message: reply.message,
                timestamp: reply.responded_at,
                sequence: request.next_sequence(),
                rating: reply.rating,
                vehicle: reply.vehicle,
                avatar: reply.avatar,
            };
            request.responses.push(response.clone());

            if response.is_accepted() {
                request.status = RideRequestStatus::HasOffers;
            } else if request.all_candidates_declined() {
                tracing::info!("Every candidate declined ride request {}", request.id);
                request.status = RideRequestStatus::Expired;
            }
            request.updated_at = now;

            (response, request.clone())
        };

        tracing::info!(
            "Ride request {} ({}): {} from {}",
            request.id,
            request.status,
            if response.is_accepted() { "offer" } else { "decline" },
            response.driver_id
        );

        let notification = if response.is_accepted() {
            let currency = self.pricing.currency();
            let price = response
                .price
                .map(|p| format!("{p:.2} {currency}"))
                .unwrap_or_else(|| "prix à convenir".to_string());
            let eta = response.estimated_arrival.as_deref().unwrap_or("?");
            NewNotification::new(
                &request.passenger_id,
                NotificationType::BookingAccepted,
                "Nouvelle offre",
                format!("{} propose {} ({}), arrivée {}", response.driver_name, request.route(), price, eta),
            )
        } else {
            NewNotification::new(
                &request.passenger_id,
                NotificationType::BookingDeclined,
                "Chauffeur indisponible",
                format!("{} ne peut pas assurer {}", response.driver_name, request.route()),
            )
        };

        self.notification_service
            .add_notification(notification.with_data(json!({
                "request_id": request.id,
                "driver_id": response.driver_id,
            })))
            .await;

        Ok(response)
    }

    #[tracing::instrument(skip(self))]
    async fn accept_driver_offer(&self, request_id: &str, driver_id: &str) -> Result<RideRequest, AppError> {
        let now = self.clock.now();
        let (chosen, request) = {
            let mut requests = self.requests.write().await;
            let request = requests
                .get_mut(request_id)
                .ok_or_else(|| AppError::RideRequestNotFound(request_id.to_string()))?;
            Self::expire_if_stale(request, now);
            let chosen = Self::finalize(request, driver_id, now)?;
            (chosen, request.clone())
        };

        self.notify_selected_driver(&request, &chosen).await;
        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn accept_best_offer(&self, request_id: &str) -> Result<RideRequest, AppError> {
        let now = self.clock.now();
        let (chosen, request) = {
            let mut requests = self.requests.write().await;
            let request = requests
                .get_mut(request_id)
                .ok_or_else(|| AppError::RideRequestNotFound(request_id.to_string()))?;
            Self::expire_if_stale(request, now);
            Self::ensure_open(request)?;

            let best = request
                .best_offer()
                .map(|r| r.driver_id.clone())
                .ok_or_else(|| AppError::invalid_state(format!("ride request {request_id} has no accepted offer")))?;

            let chosen = Self::finalize(request, &best, now)?;
            (chosen, request.clone())
        };

        self.notify_selected_driver(&request, &chosen).await;
        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_request(&self, request_id: &str, passenger_id: &str) -> Result<RideRequest, AppError> {
        let now = self.clock.now();
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(request_id)
            .ok_or_else(|| AppError::RideRequestNotFound(request_id.to_string()))?;

        if request.passenger_id != passenger_id {
            return Err(AppError::Forbidden(format!(
                "ride request {request_id} belongs to another passenger"
            )));
        }

        Self::expire_if_stale(request, now);
        Self::ensure_open(request)?;

        request.status = RideRequestStatus::Cancelled;
        request.updated_at = now;
        tracing::info!("Ride request {} cancelled by passenger", request_id);

        Ok(request.clone())
    }

    async fn expire_stale_requests(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut requests = self.requests.write().await;
        let expired: Vec<String> = requests
            .values_mut()
            .filter_map(|r| Self::expire_if_stale(r, now).then(|| r.id.clone()))
            .collect();

        if !expired.is_empty() {
            tracing::debug!("Expired {} stale ride requests", expired.len());
        }
        expired
    }

    async fn get_request(&self, request_id: &str) -> Result<RideRequest, AppError> {
        tracing::debug!("Getting ride request: {}", request_id);
        self.load(request_id).await
    }

    async fn responses(&self, request_id: &str) -> Result<Vec<DriverResponse>, AppError> {
        Ok(self.load(request_id).await?.responses)
    }

    async fn best_offer(&self, request_id: &str) -> Result<Option<DriverResponse>, AppError> {
        Ok(self.load(request_id).await?.best_offer().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::LuggageDetails;
    use crate::models::messages::ReadFilter;
    use crate::models::ride_request::PickupType;
    use crate::models::user::{PrivatizationPrice, UserProfile, UserRole};
    use crate::services::messaging_service::NotificationStore;
    use crate::services::pricing_service::TariffCalculator;
    use crate::services::user_service::ProfileStore;
    use crate::utils::clock::ManualClock;

    struct Fixture {
        matching: MatchingService,
        profiles: Arc<ProfileStore>,
        notifications: Arc<NotificationStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        fixture_in("TND")
    }

    fn fixture_in(currency: &str) -> Fixture {
        let clock = Arc::new(ManualClock::fixed());
        let profiles = Arc::new(ProfileStore::new());
        let notifications = Arc::new(NotificationStore::new(clock.clone()));
        let matching = MatchingService::new(
            Arc::new(MemoryStore::new()),
            profiles.clone(),
            Arc::new(TariffCalculator::new(5.0, 0.35, 0.10, currency).with_default_routes()),
            notifications.clone(),
            clock.clone(),
            Duration::minutes(5),
        );
        Fixture { matching, profiles, notifications, clock }
    }

    fn details(audience: Audience) -> RideRequestDetails {
        RideRequestDetails {
            passenger_id: "usr-1".into(),
            passenger_name: "Sami".into(),
            origin: "Tunis".into(),
            destination: "Hammamet".into(),
            pickup_type: PickupType::Station,
            passenger_count: 2,
            luggage_details: None,
            departure_time: None,
            is_privatization: true,
            audience,
        }
    }

    fn drivers(ids: &[&str]) -> Audience {
        Audience::Drivers(ids.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn broadcast_notifies_each_listed_driver_once() {
        let f = fixture();
        let request = f
            .matching
            .broadcast_request(details(drivers(&["drv-a", "drv-b", "drv-a"])))
            .await
            .unwrap();

        assert_eq!(request.status, RideRequestStatus::Open);
        assert_eq!(request.audience, drivers(&["drv-a", "drv-b"]));
        assert!(request.suggested_price.is_some());
        assert_eq!(f.notifications.get_unread_count("drv-a").await, 1);
        assert_eq!(f.notifications.get_unread_count("drv-b").await, 1);
        assert_eq!(f.notifications.get_unread_count(ALL_DRIVERS).await, 0);
    }

    #[tokio::test]
    async fn broadcast_to_everyone_uses_sentinel() {
        let f = fixture();
        f.matching.broadcast_request(details(Audience::AllDrivers)).await.unwrap();
        let notes = f.notifications.get_notifications(ALL_DRIVERS, ReadFilter::All).await;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].notification_type, NotificationType::BookingRequest);
    }

    #[tokio::test]
    async fn offer_notification_uses_configured_currency() {
        let f = fixture_in("EUR");
        let request = f.matching.broadcast_request(details(drivers(&["drv-a"]))).await.unwrap();
        f.matching
            .record_driver_response(&request.id, DriverReply::accept("drv-a", "Ali", f.clock.now()).with_price(12.0))
            .await
            .unwrap();

        let note = f
            .notifications
            .get_notifications("usr-1", ReadFilter::All)
            .await
            .pop()
            .unwrap();
        assert!(note.message.contains("12.00 EUR"), "{}", note.message);
        assert!(!note.message.contains("TND"));
    }

    #[tokio::test]
    async fn duplicate_and_outsider_replies_rejected() {
        let f = fixture();
        let request = f.matching.broadcast_request(details(drivers(&["drv-a", "drv-b"]))).await.unwrap();
        let now = f.clock.now();

        f.matching
            .record_driver_response(&request.id, DriverReply::accept("drv-a", "Ali", now).with_price(40.0))
            .await
            .unwrap();

        let err = f
            .matching
            .record_driver_response(&request.id, DriverReply::decline("drv-a", "Ali", now))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateResponse(_)));

        let err = f
            .matching
            .record_driver_response(&request.id, DriverReply::accept("drv-z", "Zied", now))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let responses = f.matching.responses(&request.id).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].status, OfferStatus::Accepted);
    }

    #[tokio::test]
    async fn all_declined_expires_immediately() {
        let f = fixture();
        let request = f.matching.broadcast_request(details(drivers(&["drv-a", "drv-b"]))).await.unwrap();
        let now = f.clock.now();

        f.matching
            .record_driver_response(&request.id, DriverReply::decline("drv-a", "Ali", now))
            .await
            .unwrap();
        assert_eq!(f.matching.get_request(&request.id).await.unwrap().status, RideRequestStatus::Open);

        f.matching
            .record_driver_response(&request.id, DriverReply::decline("drv-b", "Bilel", now))
            .await
            .unwrap();
        assert_eq!(f.matching.get_request(&request.id).await.unwrap().status, RideRequestStatus::Expired);

        let declines = f
            .notifications
            .get_notifications("usr-1", ReadFilter::All)
            .await
            .into_iter()
            .filter(|n| n.notification_type == NotificationType::BookingDeclined)
            .count();
        assert_eq!(declines, 2);
    }

    #[tokio::test]
    async fn timeout_expires_lazily_and_in_sweep() {
        let f = fixture();
        let first = f.matching.broadcast_request(details(Audience::AllDrivers)).await.unwrap();
        let second = f.matching.broadcast_request(details(Audience::AllDrivers)).await.unwrap();

        f.clock.advance(Duration::minutes(5));

        let err = f
            .matching
            .record_driver_response(&first.id, DriverReply::accept("drv-a", "Ali", f.clock.now()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RequestClosed { .. }));
        assert_eq!(f.matching.get_request(&first.id).await.unwrap().status, RideRequestStatus::Expired);

        assert_eq!(f.matching.expire_stale_requests().await, vec![second.id.clone()]);
        assert!(f.matching.expire_stale_requests().await.is_empty());
    }

    #[tokio::test]
    async fn cancelled_request_ignores_late_replies() {
        let f = fixture();
        let request = f.matching.broadcast_request(details(Audience::AllDrivers)).await.unwrap();

        assert!(matches!(
            f.matching.cancel_request(&request.id, "usr-2").await.unwrap_err(),
            AppError::Forbidden(_)
        ));
        f.matching.cancel_request(&request.id, "usr-1").await.unwrap();
        let before = f.notifications.all_notifications().await.len();

        let err = f
            .matching
            .record_driver_response(&request.id, DriverReply::accept("drv-a", "Ali", f.clock.now()))
            .await
            .unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(f.notifications.all_notifications().await.len(), before);
    }

    #[tokio::test]
    async fn accepting_declined_or_missing_offer_fails() {
        let f = fixture();
        let request = f.matching.broadcast_request(details(Audience::AllDrivers)).await.unwrap();
        let now = f.clock.now();
        f.matching
            .record_driver_response(&request.id, DriverReply::decline("drv-a", "Ali", now))
            .await
            .unwrap();

        let err = f.matching.accept_driver_offer(&request.id, "drv-a").await.unwrap_err();
        assert!(matches!(err, AppError::OfferNotAccepted(_)));

        let err = f.matching.accept_driver_offer(&request.id, "drv-b").await.unwrap_err();
        assert!(err.is_not_found());

        assert!(f.matching.accept_best_offer(&request.id).await.unwrap_err().is_invalid_state());
        assert_eq!(f.matching.get_request(&request.id).await.unwrap().status, RideRequestStatus::Open);
    }

    #[tokio::test]
    async fn privatization_offer_falls_back_to_profile_price() {
        let f = fixture();
        let mut driver = UserProfile::new("drv-a", "Ali", UserRole::Driver, f.clock.now());
        driver.privatization_prices.push(PrivatizationPrice {
            origin: "Hammamet".into(),
            destination: "Tunis".into(),
            base_price: 85.0,
        });
        driver.luggage_capacity = Some(LuggageDetails { sac: 3, ..Default::default() });
        f.profiles.register_profile(driver).await.unwrap();

        let request = f.matching.broadcast_request(details(Audience::AllDrivers)).await.unwrap();
        let offer = f
            .matching
            .record_driver_response(&request.id, DriverReply::accept("drv-a", "Ali", f.clock.now()))
            .await
            .unwrap();
        assert_eq!(offer.price, Some(85.0));

        let mut heavy = details(Audience::AllDrivers);
        heavy.luggage_details = Some(LuggageDetails { grande_valise: 2, ..Default::default() });
        let heavy = f.matching.broadcast_request(heavy).await.unwrap();
        let err = f
            .matching
            .record_driver_response(&heavy.id, DriverReply::accept("drv-a", "Ali", f.clock.now()))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
