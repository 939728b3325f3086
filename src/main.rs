use std::sync::Arc;

use chrono::Duration;
use louage::{
    models::{
        BookingDecision, BookingSubmission, LuggageDetails, NewTrip, Notification, PrivatizationPrice,
        ReadFilter, RideRequestDetails, UserProfile, UserRole, Audience, PickupType,
    },
    services::{
        BookingOperations, MatchingOperations, NotificationService, ProfileOperations,
        RatingOperations, TripOperations,
    },
    simulation::random_reply,
    AppConfig, AppState, Clock, LouageError, SystemClock,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), LouageError> {
    init_logging();

    let config = AppConfig::from_env()?;
    let state = AppState::new(config, Arc::new(SystemClock))?;

    state
        .notification_service
        .subscribe(Arc::new(|all: &[Notification]| {
            let unread = all.iter().filter(|n| !n.read).count();
            tracing::debug!("{} notifications, {} unread", all.len(), unread);
        }))
        .await;

    seed_profiles(&state).await?;
    booking_flow(&state).await?;
    on_demand_flow(&state).await?;

    for user in ["drv-hedi", "usr-amira", "usr-sami"] {
        info!(
            "{} has {} unread notification(s)",
            user,
            state.notification_service.get_unread_count(user).await
        );
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,louage=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

async fn seed_profiles(state: &AppState) -> Result<(), LouageError> {
    let now = state.clock.now();
    let drivers = [("drv-hedi", "Hedi"), ("drv-ali", "Ali"), ("drv-bilel", "Bilel"), ("drv-chokri", "Chokri")];

    for (id, name) in drivers {
        let mut driver = UserProfile::new(id, name, UserRole::Driver, now);
        driver.is_verified = true;
        driver.luggage_capacity = Some(LuggageDetails {
            sac: 6,
            petite_valise: 4,
            moyenne_valise: 2,
            grande_valise: 1,
        });
        driver.privatization_prices.push(PrivatizationPrice {
            origin: "Tunis".into(),
            destination: "Hammamet".into(),
            base_price: 80.0,
        });
        state.profile_service.register_profile(driver).await?;
    }

    let mut amira = UserProfile::new("usr-amira", "Amira", UserRole::Passenger, now);
    amira.preferences.favorite_drivers.push("drv-hedi".into());
    state.profile_service.register_profile(amira).await?;
    state
        .profile_service
        .register_profile(UserProfile::new("usr-sami", "Sami", UserRole::Passenger, now))
        .await?;

    Ok(())
}

async fn booking_flow(state: &AppState) -> Result<(), LouageError> {
    let trip = state
        .trip_service
        .publish_trip(NewTrip {
            driver_id: "drv-hedi".into(),
            origin: "Tunis".into(),
            destination: "Sousse".into(),
            departure_time: state.clock.now() + Duration::hours(2),
            price_collective: 14.5,
            price_private: 110.0,
            total_seats: 8,
            is_private: false,
            recurrence_days: None,
        })
        .await?;

    let booking = state
        .booking_service
        .submit_booking_request(BookingSubmission {
            trip_id: trip.id.clone(),
            passenger_id: "usr-amira".into(),
            passenger_name: "Amira".into(),
            passenger_count: 2,
            luggage_details: Some(LuggageDetails { sac: 1, petite_valise: 1, ..Default::default() }),
        })
        .await?;

    for pending in state.booking_service.pending_requests_for_driver("drv-hedi").await {
        info!("Hedi sees pending request {} for {} seat(s)", pending.id, pending.passenger_count);
    }

    state
        .booking_service
        .resolve_as_driver("drv-hedi", &booking.id, BookingDecision::Accepted)
        .await?;

    let trip = state.trip_service.get_trip(&trip.id).await?;
    info!("{} now has {}/{} seats left", trip.route(), trip.available_seats, trip.total_seats);

    state.trip_service.start_trip("drv-hedi", &trip.id).await?;
    state.trip_service.complete_trip("drv-hedi", &trip.id).await?;

    state
        .rating_service
        .add_rating(&trip.id, "drv-hedi", "usr-amira", 5, "Très ponctuel")
        .await?;
    state
        .rating_service
        .add_driver_rating(&trip.id, "drv-hedi", "usr-amira", 5, "")
        .await?;
    info!(
        "Hedi average rating: {}",
        state.rating_service.calculate_average_rating("drv-hedi", UserRole::Driver).await
    );

    let amira_inbox = state
        .notification_service
        .get_notifications("usr-amira", ReadFilter::Unread)
        .await;
    for note in &amira_inbox {
        info!("[{}] {}: {}", note.notification_type, note.title, note.message);
    }
    state.notification_service.mark_all_as_read("usr-amira").await;

    Ok(())
}

async fn on_demand_flow(state: &AppState) -> Result<(), LouageError> {
    let candidates = [("drv-ali", "Ali"), ("drv-bilel", "Bilel"), ("drv-chokri", "Chokri")];

    let request = state
        .matching_service
        .broadcast_request(RideRequestDetails {
            passenger_id: "usr-sami".into(),
            passenger_name: "Sami".into(),
            origin: "Tunis".into(),
            destination: "Hammamet".into(),
            pickup_type: PickupType::Home,
            passenger_count: 3,
            luggage_details: None,
            departure_time: None,
            is_privatization: true,
            audience: Audience::Drivers(candidates.iter().map(|(id, _)| id.to_string()).collect()),
        })
        .await?;

    if let Some(price) = &request.suggested_price {
        info!("Suggested price for {}: {:.2} {}", request.route(), price.total, price.currency);
    }

    let replies = candidates
        .iter()
        .map(|(id, name)| {
            random_reply(
                id,
                name,
                state.config.accept_probability,
                request.suggested_price.as_ref(),
                state.clock.as_ref(),
            )
        })
        .collect();

    let handle = state.simulator.run(&request.id, replies);
    let report = handle.finish().await;
    info!(
        "{} replies recorded, {} dropped",
        report.recorded.len(),
        report.rejected.len()
    );

    match state.matching_service.accept_best_offer(&request.id).await {
        Ok(finalized) => info!(
            "Sami rides with {} ({} other offer(s) discarded)",
            finalized.selected_driver_id.as_deref().unwrap_or("?"),
            finalized.discarded_responses
        ),
        Err(err) => warn!("No ride for Sami: {}", err),
    }

    Ok(())
}
