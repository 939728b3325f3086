// src/models/messages.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recipient sentinel reaching every driver.
pub const ALL_DRIVERS: &str = "all_drivers";
/// Recipient sentinel reaching every passenger.
pub const ALL_PASSENGERS: &str = "all_passengers";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    BookingRequest,   // "Amira wants 2 seats on Tunis → Sousse"
    BookingAccepted,  // "Your seats are confirmed"
    BookingDeclined,  // "The driver could not take your booking"
    TripStarted,      // "Your louage has left"
    TripCompleted,    // "You have arrived, rate your driver"
    Payment,          // "Payment received"
    Emergency,        // "SOS raised on trip"
    FavoriteDriver,   // "Your favourite driver published a trip"
    NewTripAvailable, // "New departure Tunis → Sfax at 14:00"
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub action_url: Option<String>,
    pub data: Option<serde_json::Value>, // ids the UI needs to act on it
}

/// Everything a caller supplies; id, timestamp and read state are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFilter {
    #[default]
    All,
    Unread,
    Read,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::BookingRequest => "booking_request",
            NotificationType::BookingAccepted => "booking_accepted",
            NotificationType::BookingDeclined => "booking_declined",
            NotificationType::TripStarted => "trip_started",
            NotificationType::TripCompleted => "trip_completed",
            NotificationType::Payment => "payment",
            NotificationType::Emergency => "emergency",
            NotificationType::FavoriteDriver => "favorite_driver",
            NotificationType::NewTripAvailable => "new_trip_available",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booking_request" => Ok(NotificationType::BookingRequest),
            "booking_accepted" => Ok(NotificationType::BookingAccepted),
            "booking_declined" => Ok(NotificationType::BookingDeclined),
            "trip_started" => Ok(NotificationType::TripStarted),
            "trip_completed" => Ok(NotificationType::TripCompleted),
            "payment" => Ok(NotificationType::Payment),
            "emergency" => Ok(NotificationType::Emergency),
            "favorite_driver" => Ok(NotificationType::FavoriteDriver),
            "new_trip_available" => Ok(NotificationType::NewTripAvailable),
            other => Err(format!("unknown notification type: {other}")),
        }
    }
}

impl NewNotification {
    pub fn new(
        user_id: impl Into<String>,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            notification_type,
            title: title.into(),
            message: message.into(),
            action_url: None,
            data: None,
        }
    }

    pub fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl ReadFilter {
    pub fn matches(&self, notification: &Notification) -> bool {
        match self {
            ReadFilter::All => true,
            ReadFilter::Unread => !notification.read,
            ReadFilter::Read => notification.read,
        }
    }
}
