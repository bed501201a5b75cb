// src/transport/http.rs
//! HTTP polling transport

use crate::{error::Result, telemetry::Pipeline};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Polls a device endpoint and feeds each response body through the pipeline
#[derive(Debug, Clone)]
pub struct HttpPoller {
    client: reqwest::Client,
    url: String,
    period: Duration,
}

impl HttpPoller {
    pub fn new(url: impl Into<String>, period: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            period,
        })
    }

    /// Fetch the endpoint once and return the body
    pub async fn fetch(&self) -> Result<String> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }

    /// Poll forever; failed requests are logged and retried on the next tick
    pub async fn run(self, mut pipeline: Pipeline, running: Arc<AtomicBool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while running.load(Ordering::Relaxed) {
            ticker.tick().await;
            match self.fetch().await {
                Ok(body) => {
                    debug!("{} returned {} bytes", self.url, body.len());
                    for line in body.lines().filter(|l| !l.trim().is_empty()) {
                        pipeline.handle_line(line);
                    }
                }
                Err(e) => warn!("Waiting for data from {}: {}", self.url, e),
            }
        }
    }
}
