// src/models/trip.rs
use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Pending,   // Published, open for booking
    Active,    // Departed / under way
    Completed, // Arrived, ratings open
    Cancelled, // Withdrawn by the driver
}

/// A driver-published collective ride.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Trip {
    pub id: String,
    pub driver_id: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub price_collective: f64, // per seat
    pub price_private: f64,    // whole vehicle
    pub available_seats: u32,
    pub total_seats: u32,
    pub is_private: bool,
    pub status: TripStatus,
    pub recurrence_days: Option<Vec<Weekday>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NewTrip {
    pub driver_id: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub price_collective: f64,
    pub price_private: f64,
    pub total_seats: u32,
    pub is_private: bool,
    pub recurrence_days: Option<Vec<Weekday>>,
}

impl Trip {
    /// Display string used on booking requests and notifications.
    pub fn route(&self) -> String {
        format!("{} → {}", self.origin, self.destination)
    }

    pub fn is_bookable(&self) -> bool {
        self.status == TripStatus::Pending
    }

    pub fn booked_seats(&self) -> u32 {
        self.total_seats - self.available_seats
    }

    /// Decrement seats for an accepted booking, floored at zero.
    /// Returns the number of seats actually taken.
    pub fn take_seats(&mut self, count: u32) -> u32 {
        let taken = count.min(self.available_seats);
        self.available_seats -= taken;
        taken
    }

    pub fn can_transition_to(&self, next: TripStatus) -> bool {
        matches!(
            (self.status, next),
            (TripStatus::Pending, TripStatus::Active)
                | (TripStatus::Active, TripStatus::Completed)
                | (TripStatus::Pending, TripStatus::Cancelled)
                | (TripStatus::Active, TripStatus::Cancelled)
        )
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TripStatus::Pending => "pending",
            TripStatus::Active => "active",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}
