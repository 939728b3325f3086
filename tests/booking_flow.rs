use std::sync::Arc;

use chrono::Utc;
use louage::{
    models::{
        BookingDecision, BookingStatus, BookingSubmission, LuggageDetails, NewTrip, NotificationType, ReadFilter, Trip,
    },
    services::{BookingOperations, NotificationService, TripOperations},
    AppConfig, AppState, LouageError, ManualClock,
};

fn app() -> AppState {
    AppState::new(AppConfig::default(), Arc::new(ManualClock::fixed())).unwrap()
}

async fn publish(state: &AppState, seats: u32) -> Trip {
    state
        .trip_service
        .publish_trip(NewTrip {
            driver_id: "drv-1".into(),
            origin: "Tunis".into(),
            destination: "Sfax".into(),
            departure_time: Utc::now(),
            price_collective: 25.0,
            price_private: 180.0,
            total_seats: seats,
            is_private: false,
            recurrence_days: None,
        })
        .await
        .unwrap()
}

fn submission(trip_id: &str, passenger_id: &str, count: u32) -> BookingSubmission {
    BookingSubmission {
        trip_id: trip_id.to_string(),
        passenger_id: passenger_id.to_string(),
        passenger_name: "Amira".to_string(),
        passenger_count: count,
        luggage_details: None,
    }
}

async fn count_of(state: &AppState, user: &str, kind: NotificationType) -> usize {
    state
        .notification_service
        .get_notifications(user, ReadFilter::All)
        .await
        .iter()
        .filter(|n| n.notification_type == kind)
        .count()
}

#[tokio::test]
async fn accept_flow_takes_seats_and_notifies_passenger() {
    let state = app();
    let trip = publish(&state, 8).await;

    let booking = state
        .booking_service
        .submit_booking_request(submission(&trip.id, "usr-1", 2))
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.route, "Tunis → Sfax");
    assert_eq!(count_of(&state, "drv-1", NotificationType::BookingRequest).await, 1);

    let resolved = state
        .booking_service
        .resolve_booking_request(&booking.id, BookingDecision::Accepted)
        .await
        .unwrap();
    assert_eq!(resolved.status, BookingStatus::Accepted);
    assert!(resolved.resolved_at.is_some());

    assert_eq!(state.trip_service.get_trip(&trip.id).await.unwrap().available_seats, 6);
    assert_eq!(count_of(&state, "usr-1", NotificationType::BookingAccepted).await, 1);
    assert_eq!(count_of(&state, "drv-1", NotificationType::BookingRequest).await, 1);
}

#[tokio::test]
async fn decline_flow_leaves_seats_alone() {
    let state = app();
    let trip = publish(&state, 8).await;

    let booking = state
        .booking_service
        .submit_booking_request(submission(&trip.id, "usr-1", 2))
        .await
        .unwrap();
    state
        .booking_service
        .resolve_booking_request(&booking.id, BookingDecision::Declined)
        .await
        .unwrap();

    assert_eq!(state.trip_service.get_trip(&trip.id).await.unwrap().available_seats, 8);
    assert_eq!(count_of(&state, "usr-1", NotificationType::BookingDeclined).await, 1);
    assert_eq!(count_of(&state, "usr-1", NotificationType::BookingAccepted).await, 0);
}

#[tokio::test]
async fn terminal_bookings_are_immutable() {
    let state = app();
    let trip = publish(&state, 8).await;

    for first in [BookingDecision::Accepted, BookingDecision::Declined] {
        let booking = state
            .booking_service
            .submit_booking_request(submission(&trip.id, "usr-1", 1))
            .await
            .unwrap();
        let resolved = state
            .booking_service
            .resolve_booking_request(&booking.id, first)
            .await
            .unwrap();
        let seats = state.trip_service.get_trip(&trip.id).await.unwrap().available_seats;
        let notes = state.notification_service.all_notifications().await.len();

        for again in [BookingDecision::Accepted, BookingDecision::Declined] {
            let err = state
                .booking_service
                .resolve_booking_request(&booking.id, again)
                .await
                .unwrap_err();
            assert!(matches!(err, LouageError::BookingAlreadyResolved { .. }));
            assert!(err.is_invalid_state());
        }

        let after = state.booking_service.get_booking_request(&booking.id).await.unwrap();
        assert_eq!(after.status, resolved.status);
        assert_eq!(after.resolved_at, resolved.resolved_at);
        assert_eq!(state.trip_service.get_trip(&trip.id).await.unwrap().available_seats, seats);
        assert_eq!(state.notification_service.all_notifications().await.len(), notes);
    }
}

#[tokio::test]
async fn seat_count_matches_accepted_passengers() {
    let state = app();
    let trip = publish(&state, 8).await;

    // Submitted while seats remain, accepted afterwards: acceptance floors at zero
    let mut bookings = Vec::new();
    for (i, count) in [3, 2, 3, 2].into_iter().enumerate() {
        let booking = state
            .booking_service
            .submit_booking_request(submission(&trip.id, &format!("usr-{i}"), count))
            .await
            .unwrap();
        bookings.push(booking);
    }

    let mut accepted = 0u32;
    for booking in &bookings {
        state
            .booking_service
            .resolve_booking_request(&booking.id, BookingDecision::Accepted)
            .await
            .unwrap();
        accepted += booking.passenger_count;

        let seats = state.trip_service.get_trip(&trip.id).await.unwrap().available_seats;
        assert_eq!(seats, 8u32.saturating_sub(accepted));
    }

    assert_eq!(state.trip_service.get_trip(&trip.id).await.unwrap().available_seats, 0);
    assert_eq!(state.booking_service.requests_for_trip(&trip.id).await.len(), 4);
    assert_eq!(state.booking_service.requests_for_passenger("usr-2").await.len(), 1);
}

#[tokio::test]
async fn concurrent_resolutions_apply_once() {
    let state = Arc::new(app());
    let trip = publish(&state, 8).await;
    let booking = state
        .booking_service
        .submit_booking_request(submission(&trip.id, "usr-1", 2))
        .await
        .unwrap();

    let attempts = (0..8).map(|i| {
        let state = state.clone();
        let id = booking.id.clone();
        let decision = if i % 2 == 0 { BookingDecision::Accepted } else { BookingDecision::Declined };
        tokio::spawn(async move { state.booking_service.resolve_booking_request(&id, decision).await })
    });

    let results = futures::future::join_all(attempts).await;
    let successes = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();
    assert_eq!(successes, 1);

    let seats = state.trip_service.get_trip(&trip.id).await.unwrap().available_seats;
    let status = state.booking_service.get_booking_request(&booking.id).await.unwrap().status;
    match status {
        BookingStatus::Accepted => assert_eq!(seats, 6),
        BookingStatus::Declined => assert_eq!(seats, 8),
        BookingStatus::Pending => panic!("booking left pending"),
    }
}

#[tokio::test]
async fn unknown_non_ascii_ids_are_not_found() {
    let state = app();

    let err = state
        .booking_service
        .get_booking_request("bkg-a\u{e9}111-00000000")
        .await
        .unwrap_err();
    assert!(matches!(err, LouageError::BookingNotFound(_)));

    let err = state.trip_service.get_trip("trp-\u{e9}\u{e9}11-a1b2c3d4").await.unwrap_err();
    assert!(matches!(err, LouageError::TripNotFound(_)));
}

#[tokio::test]
async fn overflowing_luggage_is_a_validation_error() {
    let state = app();
    // drv-1 has no profile, so luggage capacity is unconstrained
    let trip = publish(&state, 8).await;

    let mut heavy = submission(&trip.id, "usr-1", 1);
    heavy.luggage_details = Some(LuggageDetails {
        sac: u32::MAX,
        petite_valise: 1,
        ..Default::default()
    });

    let err = state.booking_service.submit_booking_request(heavy).await.unwrap_err();
    match err {
        LouageError::ValidationFailed(errors) => assert_eq!(errors[0].field, "luggage_details"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(state.booking_service.requests_for_trip(&trip.id).await.is_empty());
}
