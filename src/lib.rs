pub mod errors;
pub mod models;
pub mod services;
pub mod simulation;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use errors::{ErrorKind, ErrorResponse, LouageError, LouageResult, ValidationError};
pub use state::{AppConfig, AppState};
pub use utils::clock::{Clock, ManualClock, SystemClock};
