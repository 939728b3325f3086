// src/simulation.rs
//! Simulated driver replies for on-demand requests.
//!
//! Each driver is a tokio task that waits its own delay and then sends a
//! reply over a channel. One consumer applies the replies to the matching
//! service in arrival order. Nothing blocks on the full set of replies, so
//! partial state can be queried at any time.
use futures::future::join_all;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing;

use crate::{
    errors::LouageError,
    models::{driver::{DriverReply, DriverResponse}, ride_request::PriceBreakdown},
    services::matching_service::MatchingOperations,
    utils::clock::Clock,
};

/// What happened to the replies of one simulated fan-out.
#[derive(Debug, Default)]
pub struct SimulationReport {
    pub recorded: Vec<DriverResponse>,
    pub rejected: Vec<(String, LouageError)>,
    /// Replies still queued when the simulation was abandoned.
    pub discarded: Vec<String>,
}

pub struct DriverSimulator {
    matching: Arc<dyn MatchingOperations>,
    clock: Arc<dyn Clock>,
    response_delay: Duration,
    stagger: Duration,
}

pub struct SimulationHandle {
    request_id: String,
    abandoned: watch::Sender<bool>,
    drivers: Vec<JoinHandle<()>>,
    consumer: JoinHandle<SimulationReport>,
}

impl DriverSimulator {
    pub fn new(
        matching: Arc<dyn MatchingOperations>,
        clock: Arc<dyn Clock>,
        response_delay: Duration,
        stagger: Duration,
    ) -> Self {
        Self {
            matching,
            clock,
            response_delay,
            stagger,
        }
    }

    /// Schedule `replies` against `request_id`. Driver `i` answers after
    /// `response_delay + i * stagger`.
    #[tracing::instrument(skip(self, replies), fields(drivers = replies.len()))]
    pub fn run(&self, request_id: &str, replies: Vec<DriverReply>) -> SimulationHandle {
        let (tx, mut rx) = mpsc::channel::<DriverReply>(replies.len().max(1));

        let drivers = replies
            .into_iter()
            .enumerate()
            .map(|(i, reply)| {
                let tx = tx.clone();
                let clock = self.clock.clone();
                let delay = self.response_delay + self.stagger * i as u32;

                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let reply = DriverReply {
                        responded_at: clock.now(),
                        ..reply
                    };
                    tracing::debug!("Simulated driver {} answering after {:?}", reply.driver_id, delay);
                    if tx.send(reply).await.is_err() {
                        tracing::debug!("Reply channel closed, simulated driver dropped");
                    }
                })
            })
            .collect();

        // Channel closes once every driver task has sent or been aborted
        drop(tx);

        let (abandoned, abandoned_rx) = watch::channel(false);
        let matching = self.matching.clone();
        let id = request_id.to_string();
        let consumer = tokio::spawn(async move {
            let mut report = SimulationReport::default();
            while let Some(reply) = rx.recv().await {
                let driver_id = reply.driver_id.clone();
                if *abandoned_rx.borrow() {
                    tracing::debug!("Discarding queued reply from {} on abandoned {}", driver_id, id);
                    report.discarded.push(driver_id);
                    continue;
                }
                match matching.record_driver_response(&id, reply).await {
                    Ok(response) => report.recorded.push(response),
                    Err(err) => {
                        tracing::warn!("Dropped simulated reply from {} on {}: {}", driver_id, id, err);
                        report.rejected.push((driver_id, err));
                    }
                }
            }
            report
        });

        SimulationHandle {
            request_id: request_id.to_string(),
            abandoned,
            drivers,
            consumer,
        }
    }
}

impl SimulationHandle {
    /// Stop drivers that have not answered yet and discard replies that
    /// are queued but not yet recorded. A reply already being recorded
    /// completes. The ride request itself stays open; pair this with
    /// `cancel_request` when the passenger leaves.
    pub fn abandon(&self) {
        let pending = self.drivers.iter().filter(|h| !h.is_finished()).count();
        tracing::info!("Abandoning simulation for {} ({} drivers still waiting)", self.request_id, pending);
        self.abandoned.send_replace(true);
        for handle in &self.drivers {
            handle.abort();
        }
    }

    /// Wait for every driver and for the consumer to drain the channel.
    pub async fn finish(self) -> SimulationReport {
        // Aborted tasks come back as cancelled join errors
        join_all(self.drivers).await;

        match self.consumer.await {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!("Reply consumer for {} did not finish: {}", self.request_id, err);
                SimulationReport::default()
            }
        }
    }
}

/// A plausible random reply for the demo binary: accepts with
/// `accept_probability`, prices around the suggested total.
pub fn random_reply(
    driver_id: &str,
    driver_name: &str,
    accept_probability: f64,
    suggested: Option<&PriceBreakdown>,
    clock: &dyn Clock,
) -> DriverReply {
    let mut rng = rand::rng();
    let now = clock.now();

    if !rng.random_bool(accept_probability.clamp(0.0, 1.0)) {
        return DriverReply::decline(driver_id, driver_name, now)
            .with_message("Désolé, je ne suis pas disponible");
    }

    let mut reply = DriverReply::accept(driver_id, driver_name, now)
        .with_eta(format!("{} min", rng.random_range(3..=25)));
    if let Some(price) = suggested {
        let factor: f64 = rng.random_range(0.85..1.15);
        reply = reply.with_price((price.total * factor * 10.0).round() / 10.0);
    }
    reply
}
