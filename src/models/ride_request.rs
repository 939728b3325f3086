// src/models/ride_request.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::booking::LuggageDetails;
use super::driver::{DriverResponse, OfferStatus};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RideRequestStatus {
    Open,      // Broadcast sent, no accepted offer yet
    HasOffers, // At least one driver accepted
    Finalized, // Passenger picked a driver
    Expired,   // Everyone declined or the offer window closed
    Cancelled, // Passenger walked away
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PickupType {
    Station, // Meet at the louage station
    Home,    // Driver comes to the passenger's address
}

/// Who the request is fanned out to.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", content = "driver_ids", rename_all = "snake_case")]
pub enum Audience {
    AllDrivers,
    Drivers(Vec<String>),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PriceBreakdown {
    pub base_fare: f64,
    pub distance_fee: f64,
    pub service_fee: f64,
    pub total: f64,
    pub currency: String,
}

/// An on-demand / privatization request broadcast to candidate drivers.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RideRequest {
    pub id: String,
    pub passenger_id: String,
    pub passenger_name: String,
    pub origin: String,
    pub destination: String,
    pub pickup_type: PickupType,
    pub passenger_count: u32,
    pub luggage_details: Option<LuggageDetails>,
    pub departure_time: Option<DateTime<Utc>>,
    pub is_privatization: bool,
    pub audience: Audience,
    pub status: RideRequestStatus,
    pub suggested_price: Option<PriceBreakdown>,

    // Live offers in arrival order; emptied of the losers once finalized
    pub responses: Vec<DriverResponse>,
    pub selected_driver_id: Option<String>,
    pub discarded_responses: u32,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    next_sequence: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RideRequestDetails {
    pub passenger_id: String,
    pub passenger_name: String,
    pub origin: String,
    pub destination: String,
    pub pickup_type: PickupType,
    pub passenger_count: u32,
    pub luggage_details: Option<LuggageDetails>,
    pub departure_time: Option<DateTime<Utc>>,
    pub is_privatization: bool,
    pub audience: Audience,
}

impl RideRequest {
    pub fn new(
        id: String,
        details: RideRequestDetails,
        suggested_price: Option<PriceBreakdown>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            passenger_id: details.passenger_id,
            passenger_name: details.passenger_name,
            origin: details.origin,
            destination: details.destination,
            pickup_type: details.pickup_type,
            passenger_count: details.passenger_count,
            luggage_details: details.luggage_details,
            departure_time: details.departure_time,
            is_privatization: details.is_privatization,
            audience: details.audience,
            status: RideRequestStatus::Open,
            suggested_price,
            responses: Vec::new(),
            selected_driver_id: None,
            discarded_responses: 0,
            created_at,
            expires_at,
            updated_at: created_at,
            next_sequence: 0,
        }
    }

    pub fn route(&self) -> String {
        format!("{} → {}", self.origin, self.destination)
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            RideRequestStatus::Open | RideRequestStatus::HasOffers
        )
    }

    pub fn is_candidate(&self, driver_id: &str) -> bool {
        match &self.audience {
            Audience::AllDrivers => true,
            Audience::Drivers(ids) => ids.iter().any(|id| id == driver_id),
        }
    }

    pub fn response_from(&self, driver_id: &str) -> Option<&DriverResponse> {
        self.responses.iter().find(|r| r.driver_id == driver_id)
    }

    pub fn accepted_offers(&self) -> impl Iterator<Item = &DriverResponse> {
        self.responses.iter().filter(|r| r.is_accepted())
    }

    /// Cheapest / soonest accepted offer, see `DriverResponse::compare_offers`.
    pub fn best_offer(&self) -> Option<&DriverResponse> {
        self.accepted_offers()
            .min_by(|a, b| DriverResponse::compare_offers(a, b))
    }

    /// True once every listed candidate answered and none accepted.
    pub fn all_candidates_declined(&self) -> bool {
        match &self.audience {
            Audience::AllDrivers => false,
            Audience::Drivers(ids) => {
                !ids.is_empty()
                    && ids.iter().all(|id| {
                        self.response_from(id)
                            .is_some_and(|r| r.status == OfferStatus::Declined)
                    })
            }
        }
    }

    pub fn next_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }
}

impl fmt::Display for RideRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RideRequestStatus::Open => "open",
            RideRequestStatus::HasOffers => "has_offers",
            RideRequestStatus::Finalized => "finalized",
            RideRequestStatus::Expired => "expired",
            RideRequestStatus::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}
