use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the louage booking core
#[derive(Debug, Error)]
pub enum LouageError {
    // Lookup errors
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Trip not found: {0}")]
    TripNotFound(String),
    #[error("Booking request not found: {0}")]
    BookingNotFound(String),
    #[error("Ride request not found: {0}")]
    RideRequestNotFound(String),
    #[error("No response from driver {driver_id} on request {request_id}")]
    DriverResponseNotFound { request_id: String, driver_id: String },
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    // State machine errors
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Booking request {id} is already {status}")]
    BookingAlreadyResolved { id: String, status: String },
    #[error("Ride request {id} is {status} and no longer accepts changes")]
    RequestClosed { id: String, status: String },
    #[error("Driver {0} has already responded to this request")]
    DuplicateResponse(String),
    #[error("Offer from driver {0} was not accepted by the driver")]
    OfferNotAccepted(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation failed: {} errors", .0.len())]
    ValidationFailed(Vec<ValidationError>),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Coarse classification surfaced to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Validation,
    Configuration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// Serializable error payload handed to whatever renders the failure.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

// Convenience type alias for Results
pub type LouageResult<T> = Result<T, LouageError>;

impl LouageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LouageError::NotFound(_)
            | LouageError::TripNotFound(_)
            | LouageError::BookingNotFound(_)
            | LouageError::RideRequestNotFound(_)
            | LouageError::DriverResponseNotFound { .. }
            | LouageError::ProfileNotFound(_) => ErrorKind::NotFound,

            LouageError::InvalidState(_)
            | LouageError::BookingAlreadyResolved { .. }
            | LouageError::RequestClosed { .. }
            | LouageError::DuplicateResponse(_)
            | LouageError::OfferNotAccepted(_)
            | LouageError::Forbidden(_) => ErrorKind::InvalidState,

            LouageError::ValidationFailed(_) => ErrorKind::Validation,

            LouageError::InvalidConfiguration(_) => ErrorKind::Configuration,
        }
    }

    /// Stable machine-readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            LouageError::NotFound(_) => "not_found",
            LouageError::TripNotFound(_) => "trip_not_found",
            LouageError::BookingNotFound(_) => "booking_not_found",
            LouageError::RideRequestNotFound(_) => "ride_request_not_found",
            LouageError::DriverResponseNotFound { .. } => "driver_response_not_found",
            LouageError::ProfileNotFound(_) => "profile_not_found",
            LouageError::InvalidState(_) => "invalid_state",
            LouageError::BookingAlreadyResolved { .. } => "booking_already_resolved",
            LouageError::RequestClosed { .. } => "request_closed",
            LouageError::DuplicateResponse(_) => "duplicate_response",
            LouageError::OfferNotAccepted(_) => "offer_not_accepted",
            LouageError::Forbidden(_) => "forbidden",
            LouageError::ValidationFailed(_) => "validation_failed",
            LouageError::InvalidConfiguration(_) => "invalid_configuration",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let details = match self {
            LouageError::ValidationFailed(errors) => serde_json::to_value(errors).ok(),
            LouageError::DriverResponseNotFound { request_id, driver_id } => Some(serde_json::json!({
                "request_id": request_id,
                "driver_id": driver_id,
            })),
            _ => None,
        };

        ErrorResponse {
            error: self.code().to_string(),
            kind: self.kind(),
            message: self.to_string(),
            details,
        }
    }
}

// Helper functions for creating common errors
impl LouageError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        LouageError::NotFound(resource.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        LouageError::InvalidState(msg.into())
    }

    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        LouageError::ValidationFailed(vec![ValidationError {
            field: field.into(),
            message: message.into(),
        }])
    }

    /// Turns a list of collected field errors into a result.
    pub fn check(errors: Vec<ValidationError>) -> LouageResult<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(LouageError::ValidationFailed(errors))
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_invalid_state(&self) -> bool {
        self.kind() == ErrorKind::InvalidState
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
