use crate::prelude::*;
use crate::registers::Value;
use crate::sink::{MeasurementSink, Snapshot};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use config::WriteMode;
use rinfluxdb::line_protocol::{Line, LineBuilder};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

#[derive(Eq, PartialEq, Clone, Debug)]
pub enum ChannelData {
    Line(String),
    Shutdown,
}

#[derive(Debug, Default)]
struct DeliveryStats {
    written: AtomicU64,
    failed: AtomicU64,
}

/// InfluxDB v2 sink. Points are delivered at most once: a failed write is
/// logged and dropped.
#[derive(Clone)]
pub struct Influx {
    config: config::Influx,
    channels: Channels,
    client: reqwest::Client,
    stats: Arc<DeliveryStats>,
}

impl Influx {
    pub fn new(config: config::Influx, channels: Channels) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            config,
            channels,
            client,
            stats: Arc::new(DeliveryStats::default()),
        })
    }

    /// Spawn the background sender when configured for asynchronous
    /// delivery. Returns `None` when there is nothing to spawn.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        if !self.config.enabled() {
            info!("influx disabled, lines will only be logged");
            return None;
        }

        info!("initializing influx at {}", self.config.url());

        if self.config.mode() != WriteMode::Asynchronous {
            return None;
        }

        // subscribe before spawning so nothing sent in between is missed
        let receiver = self.channels.to_influx.subscribe();
        let self_clone = self.clone();
        let handle = tokio::spawn(async move {
            self_clone.sender(receiver).await;
        });

        info!("InfluxDB sender task spawned");

        Some(handle)
    }

    pub fn stop(&self) {
        let _ = self.channels.to_influx.send(ChannelData::Shutdown);
    }

    pub fn written(&self) -> u64 {
        self.stats.written.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.stats.failed.load(Ordering::Relaxed)
    }

    pub fn log_summary(&self) {
        info!(
            "InfluxDB delivery: {} written, {} dropped",
            self.written(),
            self.failed()
        );
    }

    pub fn build_line(snapshot: &Snapshot, location: &str, timestamp: DateTime<Utc>) -> Line {
        let mut line = LineBuilder::new(snapshot.measurement())
            .insert_tag("location", location)
            .set_timestamp(timestamp);

        for (name, value) in snapshot.fields() {
            line = match value {
                Value::Integer(v) => line.insert_field(name.as_str(), *v),
                Value::Float(v) => line.insert_field(name.as_str(), *v),
                Value::Text(v) => line.insert_field(name.as_str(), v.clone()),
            };
        }

        line.build()
    }

    fn write_url(&self) -> Result<reqwest::Url> {
        let mut base = self.config.url().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        let mut url = reqwest::Url::parse(&base)?.join("api/v2/write")?;
        url.query_pairs_mut()
            .append_pair("org", self.config.org())
            .append_pair("bucket", self.config.bucket())
            .append_pair("precision", "ns");

        Ok(url)
    }

    async fn send(&self, body: String) -> Result<()> {
        let response = self
            .client
            .post(self.write_url()?)
            .header("Authorization", format!("Token {}", self.config.token()))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("InfluxDB returned {}: {}", status, text.trim());
        }

        Ok(())
    }

    async fn deliver(&self, line: String) {
        match self.send(line).await {
            Ok(()) => {
                self.stats.written.fetch_add(1, Ordering::Relaxed);
                debug!("point written to InfluxDB");
            }
            Err(err) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                error!("InfluxDB push failed, dropping point: {:#}", err);
            }
        }
    }

    async fn sender(&self, mut receiver: broadcast::Receiver<ChannelData>) {
        info!("InfluxDB sender started");

        loop {
            match receiver.recv().await {
                Ok(ChannelData::Shutdown) => {
                    info!("InfluxDB sender received shutdown signal");
                    break;
                }
                Ok(ChannelData::Line(line)) => self.deliver(line).await,
                Err(RecvError::Lagged(skipped)) => {
                    self.stats.failed.fetch_add(skipped, Ordering::Relaxed);
                    warn!("InfluxDB sender fell behind, dropped {} points", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }

        info!("InfluxDB sender loop exiting");
    }
}

#[async_trait]
impl MeasurementSink for Influx {
    async fn write(&self, snapshot: &Snapshot) {
        let line = Self::build_line(snapshot, self.config.location(), Utc::now()).to_string();

        info!("Line: {}", line);

        if !self.config.enabled() {
            return;
        }

        match self.config.mode() {
            WriteMode::Synchronous => self.deliver(line).await,
            WriteMode::Asynchronous => {
                if self.channels.to_influx.send(ChannelData::Line(line)).is_err() {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    error!("InfluxDB sender is not running, dropping point");
                }
            }
        }
    }
}
