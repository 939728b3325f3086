// src/models/driver.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Accepted, // Driver is willing to take the ride
    Declined, // Driver passed
}

/// One candidate driver's answer to an on-demand request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DriverResponse {
    pub request_id: String,
    pub driver_id: String,
    pub driver_name: String,
    pub status: OfferStatus,
    pub price: Option<f64>,
    pub estimated_arrival: Option<String>, // e.g. "8 min"
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>, // when the driver answered
    pub sequence: u64,            // arrival order within the request

    // Display only
    pub rating: Option<f32>,
    pub vehicle: Option<String>,
    pub avatar: Option<String>,
}

/// What a driver sends back. Turned into a `DriverResponse` once recorded.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DriverReply {
    pub driver_id: String,
    pub driver_name: String,
    pub accept: bool,
    pub price: Option<f64>,
    pub estimated_arrival: Option<String>,
    pub message: Option<String>,
    pub responded_at: DateTime<Utc>,
    pub rating: Option<f32>,
    pub vehicle: Option<String>,
    pub avatar: Option<String>,
}

impl DriverReply {
    pub fn accept(driver_id: &str, driver_name: &str, responded_at: DateTime<Utc>) -> Self {
        Self {
            driver_id: driver_id.to_string(),
            driver_name: driver_name.to_string(),
            accept: true,
            price: None,
            estimated_arrival: None,
            message: None,
            responded_at,
            rating: None,
            vehicle: None,
            avatar: None,
        }
    }

    pub fn decline(driver_id: &str, driver_name: &str, responded_at: DateTime<Utc>) -> Self {
        Self {
            accept: false,
            ..Self::accept(driver_id, driver_name, responded_at)
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_eta(mut self, eta: impl Into<String>) -> Self {
        self.estimated_arrival = Some(eta.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl DriverResponse {
    pub fn is_accepted(&self) -> bool {
        self.status == OfferStatus::Accepted
    }

    pub fn eta_minutes(&self) -> Option<u32> {
        self.estimated_arrival.as_deref().and_then(parse_eta_minutes)
    }

    /// Total order used to pick the best offer: priced offers first, then
    /// cheaper, then sooner, then whoever answered first.
    pub fn compare_offers(a: &DriverResponse, b: &DriverResponse) -> Ordering {
        let by_price = match (a.price, b.price) {
            (Some(pa), Some(pb)) => pa.total_cmp(&pb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };

        by_price
            .then_with(|| match (a.eta_minutes(), b.eta_minutes()) {
                (Some(ea), Some(eb)) => ea.cmp(&eb),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.sequence.cmp(&b.sequence))
    }
}

/// Parse free-form arrival estimates such as "8 min", "1h 15", "2 h".
/// A bare number counts as minutes.
pub fn parse_eta_minutes(eta: &str) -> Option<u32> {
    let lower = eta.to_lowercase();
    let mut total: Option<u32> = None;
    let mut chars = lower.chars().peekable();

    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            chars.next();
            continue;
        }

        let mut value: u32 = 0;
        while let Some(&d) = chars.peek() {
            match d.to_digit(10) {
                Some(digit) => {
                    value = value.saturating_mul(10).saturating_add(digit);
                    chars.next();
                }
                None => break,
            }
        }

        while chars.peek() == Some(&' ') {
            chars.next();
        }

        let multiplier = if chars.peek() == Some(&'h') { 60 } else { 1 };
        total = Some(total.unwrap_or(0).saturating_add(value.saturating_mul(multiplier)));
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(seq: u64, price: Option<f64>, eta: Option<&str>) -> DriverResponse {
        DriverResponse {
            request_id: "req-1".into(),
            driver_id: format!("drv-{seq}"),
            driver_name: format!("Driver {seq}"),
            status: OfferStatus::Accepted,
            price,
            estimated_arrival: eta.map(str::to_string),
            message: None,
            timestamp: Utc::now(),
            sequence: seq,
            rating: None,
            vehicle: None,
            avatar: None,
        }
    }

    #[test]
    fn eta_parsing() {
        assert_eq!(parse_eta_minutes("8 min"), Some(8));
        assert_eq!(parse_eta_minutes("12min"), Some(12));
        assert_eq!(parse_eta_minutes("1h 15"), Some(75));
        assert_eq!(parse_eta_minutes("2 h"), Some(120));
        assert_eq!(parse_eta_minutes("bientôt"), None);
    }

    #[test]
    fn cheaper_offer_wins() {
        let a = offer(0, Some(15.0), Some("8 min"));
        let b = offer(1, Some(12.0), Some("12 min"));
        assert_eq!(DriverResponse::compare_offers(&b, &a), Ordering::Less);
    }

    #[test]
    fn sooner_offer_wins_without_prices() {
        let a = offer(0, None, Some("10 min"));
        let b = offer(1, None, Some("5 min"));
        assert_eq!(DriverResponse::compare_offers(&b, &a), Ordering::Less);
    }

    #[test]
    fn priced_offers_rank_before_unpriced() {
        let priced = offer(1, Some(40.0), Some("30 min"));
        let unpriced = offer(0, None, Some("2 min"));
        assert_eq!(
            DriverResponse::compare_offers(&priced, &unpriced),
            Ordering::Less
        );
    }

    #[test]
    fn ties_go_to_first_arrival() {
        let first = offer(0, Some(10.0), Some("5 min"));
        let second = offer(1, Some(10.0), Some("5 min"));
        assert_eq!(
            DriverResponse::compare_offers(&first, &second),
            Ordering::Less
        );
    }
}
