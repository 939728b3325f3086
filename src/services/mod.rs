// src/services/mod.rs
pub mod booking_service;
pub mod matching_service;
pub mod memory_store;
pub mod messaging_service;
pub mod pricing_service;
pub mod rating_service;
pub mod trip_service;
pub mod user_service;

pub use booking_service::{BookingOperations, BookingService};
pub use matching_service::{MatchingOperations, MatchingService};
pub use memory_store::MemoryStore;
pub use messaging_service::{NotificationCallback, NotificationService, NotificationStore, SubscriptionId};
pub use pricing_service::{PriceCalculator, TariffCalculator};
pub use rating_service::{RatingOperations, RatingService};
pub use trip_service::{TripOperations, TripService};
pub use user_service::{ProfileOperations, ProfileStore};
