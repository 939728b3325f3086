// src/models/user.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::booking::LuggageDetails;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Passenger, // Books seats and on-demand rides
    Driver,    // Publishes trips, answers requests
    Admin,     // Platform moderation
}

/// Maximum luggage per category a driver's vehicle takes.
pub type LuggageCapacity = LuggageDetails;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct UserStats {
    pub total_trips: u32,
    pub total_revenue: f64,
    pub average_rating: f64,
    pub completion_rate: f64, // 0.0 - 1.0
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserPreferences {
    pub language: String, // e.g. "fr", "ar", "en"
    pub currency: String, // e.g. "TND"
    pub push_notifications: bool,
    pub favorite_drivers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BankDetails {
    pub bank_name: String,
    pub account_holder: String,
    pub rib: String, // Tunisian 20-digit account identifier
}

/// A driver's base price for privatizing the whole vehicle on one route.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PrivatizationPrice {
    pub origin: String,
    pub destination: String,
    pub base_price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: UserRole,
    pub is_verified: bool,
    pub joined_date: DateTime<Utc>,
    pub stats: UserStats,
    pub preferences: UserPreferences,
    pub luggage_capacity: Option<LuggageCapacity>,
    pub bank_details: Option<BankDetails>,
    pub privatization_prices: Vec<PrivatizationPrice>,
}

/// Partial settings update; `None` leaves the field untouched.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_verified: Option<bool>,
    pub preferences: Option<UserPreferences>,
    pub luggage_capacity: Option<LuggageCapacity>,
    pub bank_details: Option<BankDetails>,
    pub privatization_prices: Option<Vec<PrivatizationPrice>>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            language: "fr".to_string(),
            currency: "TND".to_string(),
            push_notifications: true,
            favorite_drivers: Vec::new(),
        }
    }
}

impl PrivatizationPrice {
    /// Routes are priced the same in both directions; names compare case-insensitively.
    pub fn serves(&self, origin: &str, destination: &str) -> bool {
        let same = |a: &str, b: &str| a.trim().eq_ignore_ascii_case(b.trim());
        (same(&self.origin, origin) && same(&self.destination, destination))
            || (same(&self.origin, destination) && same(&self.destination, origin))
    }
}

impl UserProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: UserRole, joined: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: String::new(),
            phone: String::new(),
            role,
            is_verified: false,
            joined_date: joined,
            stats: UserStats::default(),
            preferences: UserPreferences::default(),
            luggage_capacity: None,
            bank_details: None,
            privatization_prices: Vec::new(),
        }
    }

    pub fn privatization_price(&self, origin: &str, destination: &str) -> Option<f64> {
        self.privatization_prices
            .iter()
            .find(|p| p.serves(origin, destination))
            .map(|p| p.base_price)
    }

    /// Apply a partial update.
    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(phone) = update.phone {
            self.phone = phone;
        }
        if let Some(is_verified) = update.is_verified {
            self.is_verified = is_verified;
        }
        if let Some(preferences) = update.preferences {
            self.preferences = preferences;
        }
        if let Some(capacity) = update.luggage_capacity {
            self.luggage_capacity = Some(capacity);
        }
        if let Some(bank_details) = update.bank_details {
            self.bank_details = Some(bank_details);
        }
        if let Some(prices) = update.privatization_prices {
            self.privatization_prices = prices;
        }
    }
}
