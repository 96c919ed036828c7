//! Fixed-cadence full-collection fetch. This is the reliability fallback:
//! failures are logged and counted, never fatal, and never change the
//! cadence.

use std::time::Duration;

use reqwest::{Client, Url};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use wall_core::Update;

use crate::config::WallConfig;
use crate::engine::{ChannelMessage, Source};
use crate::error::{Result, SyncError};
use crate::wire::{ParsedIdeas, parse_header, parse_ideas};

/// One successful poll.
#[derive(Debug)]
pub struct PollOutcome {
    pub ideas: ParsedIdeas,
    /// `None` when the header endpoint failed; the idea list still counts.
    pub header: Option<String>,
}

impl PollOutcome {
    /// Removals are only allowed when every entry decoded.
    pub fn into_update(self) -> Update {
        let authoritative = self.ideas.is_complete();
        Update::Snapshot {
            ideas: self.ideas.ideas,
            header: self.header,
            authoritative,
        }
    }
}

pub struct PollChannel {
    client: Client,
    ideas_url: Url,
    header_url: Url,
    interval: Duration,
    timeout: Duration,
    failures: u32,
}

impl PollChannel {
    pub fn new(config: &WallConfig) -> Result<Self> {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &WallConfig) -> Result<Self> {
        Ok(Self {
            client,
            ideas_url: config.ideas_url()?,
            header_url: config.header_url()?,
            interval: config.poll_interval(),
            timeout: config.poll_timeout(),
            failures: 0,
        })
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// Fetch ideas and header concurrently, bounded by the poll timeout.
    pub async fn fetch(&self) -> Result<PollOutcome> {
        let work = async {
            let (ideas, header) =
                tokio::join!(self.get_json(&self.ideas_url), self.get_json(&self.header_url));
            let ideas = parse_ideas(ideas?)?;
            let header = match header.and_then(|v| parse_header(&v)) {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!("header fetch failed, keeping current header: {e}");
                    None
                }
            };
            Ok::<_, SyncError>(PollOutcome { ideas, header })
        };
        tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| SyncError::Timeout("poll"))?
    }

    async fn get_json(&self, url: &Url) -> Result<Value> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Poll until cancelled or the receiver is gone. The first fetch
    /// happens immediately.
    pub async fn run(mut self, tx: mpsc::Sender<ChannelMessage>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            url = %self.ideas_url,
            interval_ms = self.interval.as_millis() as u64,
            "poll channel started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.fetch() => result,
            };

            let message = match result {
                Ok(outcome) => {
                    if self.failures > 0 {
                        tracing::info!(failures = self.failures, "poll recovered");
                    }
                    self.failures = 0;
                    if !outcome.ideas.is_complete() {
                        tracing::warn!(
                            rejected = outcome.ideas.rejected,
                            "poll dropped malformed ideas, skipping removals this cycle"
                        );
                    }
                    tracing::debug!(ideas = outcome.ideas.ideas.len(), "poll ok");
                    ChannelMessage::Update {
                        source: Source::Poll,
                        update: outcome.into_update(),
                    }
                }
                Err(e) => {
                    self.failures = self.failures.saturating_add(1);
                    tracing::warn!(failures = self.failures, kind = ?e.kind(), "poll failed: {e}");
                    ChannelMessage::PollFailed {
                        failures: self.failures,
                    }
                }
            };
            if tx.send(message).await.is_err() {
                break;
            }
        }
        tracing::debug!("poll channel stopped");
    }
}
