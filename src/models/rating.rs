// src/models/rating.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Who gave the rating.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RaterRole {
    Passenger, // passenger rating the driver
    Driver,    // driver rating the passenger
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Rating {
    pub id: String,
    pub trip_id: String,
    pub driver_id: String,
    pub passenger_id: String,
    pub rater: RaterRole,
    pub rating: u8,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

/// Count of ratings per star value, always keyed 1..=5.
pub type RatingDistribution = BTreeMap<u8, u32>;

impl Rating {
    /// Id of the user who gave this rating.
    pub fn rater_id(&self) -> &str {
        match self.rater {
            RaterRole::Passenger => &self.passenger_id,
            RaterRole::Driver => &self.driver_id,
        }
    }

    /// Id of the user this rating is about.
    pub fn subject_id(&self) -> &str {
        match self.rater {
            RaterRole::Passenger => &self.driver_id,
            RaterRole::Driver => &self.passenger_id,
        }
    }
}

pub fn empty_distribution() -> RatingDistribution {
    (MIN_RATING..=MAX_RATING).map(|star| (star, 0)).collect()
}
