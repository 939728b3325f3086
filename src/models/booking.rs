// src/models/booking.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Declined,
}

/// The driver's answer to a booking request.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingDecision {
    Accepted,
    Declined,
}

/// Per-category luggage counts.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LuggageDetails {
    pub sac: u32,
    pub petite_valise: u32,
    pub moyenne_valise: u32,
    pub grande_valise: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BookingRequest {
    pub id: String,
    pub trip_id: String,
    pub passenger_id: String,
    pub passenger_name: String,
    pub passenger_count: u32,
    pub luggage_count: u32,
    pub luggage_details: Option<LuggageDetails>,
    pub status: BookingStatus,
    pub timestamp: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub route: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BookingSubmission {
    pub trip_id: String,
    pub passenger_id: String,
    pub passenger_name: String,
    pub passenger_count: u32,
    pub luggage_details: Option<LuggageDetails>,
}

impl LuggageDetails {
    /// Total piece count, `None` if it does not fit in a `u32`.
    pub fn total(&self) -> Option<u32> {
        self.sac
            .checked_add(self.petite_valise)?
            .checked_add(self.moyenne_valise)?
            .checked_add(self.grande_valise)
    }

    /// (category, count) pairs in display order.
    pub fn categories(&self) -> [(&'static str, u32); 4] {
        [
            ("sac", self.sac),
            ("petite_valise", self.petite_valise),
            ("moyenne_valise", self.moyenne_valise),
            ("grande_valise", self.grande_valise),
        ]
    }
}

impl BookingRequest {
    pub fn is_terminal(&self) -> bool {
        self.status != BookingStatus::Pending
    }

    /// Apply the driver's decision. Only valid while pending.
    pub fn resolve(&mut self, decision: BookingDecision, at: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }

        self.status = match decision {
            BookingDecision::Accepted => BookingStatus::Accepted,
            BookingDecision::Declined => BookingStatus::Declined,
        };
        self.resolved_at = Some(at);
        true
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Declined => "declined",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_is_one_shot() {
        let mut request = BookingRequest {
            id: "bkg-1".into(),
            trip_id: "trp-1".into(),
            passenger_id: "usr-1".into(),
            passenger_name: "Amira".into(),
            passenger_count: 2,
            luggage_count: 1,
            luggage_details: None,
            status: BookingStatus::Pending,
            timestamp: Utc::now(),
            resolved_at: None,
            route: "Tunis → Sfax".into(),
        };

        assert!(request.resolve(BookingDecision::Declined, Utc::now()));
        assert_eq!(request.status, BookingStatus::Declined);
        assert!(request.is_terminal());

        assert!(!request.resolve(BookingDecision::Accepted, Utc::now()));
        assert_eq!(request.status, BookingStatus::Declined);
    }

    #[test]
    fn luggage_serializes_with_source_category_names() {
        let luggage = LuggageDetails {
            sac: 1,
            petite_valise: 0,
            moyenne_valise: 2,
            grande_valise: 1,
        };
        assert_eq!(luggage.total(), Some(4));

        let overflowing = LuggageDetails {
            sac: u32::MAX,
            petite_valise: 1,
            ..Default::default()
        };
        assert_eq!(overflowing.total(), None);

        let json = serde_json::to_value(luggage).unwrap();
        assert_eq!(json["petiteValise"], 0);
        assert_eq!(json["grandeValise"], 1);
    }
}
