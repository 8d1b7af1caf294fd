//! Active endpoint probing
//!
//! Every configured endpoint gets one GET per tick. Any HTTP response counts
//! as reachable; only transport failures and timeouts count against it.

use std::time::Duration;

use futures::future::join_all;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::config::{ProbeEndpoint, ProbesConfig};
use crate::data::sqlite::SqliteError;
use crate::data::sqlite::repositories::endpoint_status;
use crate::utils::time::{Calendar, format_date};

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Probe of {url} timed out")]
    Timeout { url: String },

    #[error("Probe of {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

pub struct EndpointProber {
    client: reqwest::Client,
    pool: SqlitePool,
    calendar: Calendar,
    interval: Duration,
    endpoints: Vec<ProbeEndpoint>,
}

impl EndpointProber {
    pub fn new(pool: SqlitePool, calendar: Calendar, config: &ProbesConfig) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("BotBoard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ProbeError::Client)?;

        Ok(Self {
            client,
            pool,
            calendar,
            interval: config.interval,
            endpoints: config.endpoints.clone(),
        })
    }

    /// One reachability check, returning the HTTP status on success
    pub async fn check(&self, url: &str) -> Result<u16, ProbeError> {
        match self.client.get(url).send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(e) if e.is_timeout() => Err(ProbeError::Timeout {
                url: url.to_string(),
            }),
            Err(source) => Err(ProbeError::Transport {
                url: url.to_string(),
                source,
            }),
        }
    }

    async fn probe_one(&self, endpoint: &ProbeEndpoint, date: &str) -> Result<bool, SqliteError> {
        let success = match self.check(&endpoint.url).await {
            Ok(status) => {
                tracing::trace!(endpoint = %endpoint.name, status, "Endpoint reachable");
                true
            }
            Err(e) => {
                tracing::warn!(endpoint = %endpoint.name, error = %e, "Endpoint unreachable");
                false
            }
        };
        endpoint_status::record_probe(&self.pool, &endpoint.name, &endpoint.url, date, success)
            .await?;
        Ok(success)
    }

    /// Probe every endpoint concurrently and record the outcomes
    ///
    /// Returns the number of reachable endpoints. A failed write for one
    /// endpoint is logged and does not affect the others.
    pub async fn probe_all(&self) -> usize {
        let date = format_date(self.calendar.today());
        let outcomes = join_all(self.endpoints.iter().map(|e| self.probe_one(e, &date))).await;

        let mut reachable = 0;
        for (endpoint, outcome) in self.endpoints.iter().zip(outcomes) {
            match outcome {
                Ok(true) => reachable += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(endpoint = %endpoint.name, error = %e, "Failed to record probe");
                }
            }
        }
        reachable
    }

    /// Start the probe loop; the first round runs immediately
    pub fn start(self, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if self.endpoints.is_empty() {
                tracing::debug!("No endpoints configured, probe loop idle");
                return;
            }

            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.changed() => {
                        tracing::debug!("Probe loop shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let reachable = self.probe_all().await;
                        tracing::debug!(
                            reachable,
                            total = self.endpoints.len(),
                            "Probe round complete"
                        );
                    }
                }
            }
        })
    }
}
