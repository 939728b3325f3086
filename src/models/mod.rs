// src/models/mod.rs
pub mod booking;
pub mod driver;
pub mod messages;
pub mod rating;
pub mod ride_request;
pub mod trip;
pub mod user;

pub use booking::*;
pub use driver::*;
pub use messages::*;
pub use rating::*;
pub use ride_request::*;
pub use trip::*;
pub use user::*;
