//! RPC Telemetry
//!
//! Per-endpoint counters: pings, EMA latency, last latency, failures,
//! switches and connectivity. Snapshots are logged on a fixed period and,
//! when a metrics file is configured, appended as JSON lines:
//!
//! `{"ts": "...", "active_url": "...", "metrics": {"<url>": {...}}}`
//!
//! Author: AI-Generated
//! Created: 2026-02-05

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Weight of the newest sample in the latency EMA.
pub const EMA_ALPHA: f64 = 0.2;

const NEVER: u64 = u64::MAX;

/// Health and usage counters for one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EndpointMetrics {
    pub pings: u64,
    pub avg_ms: f64,
    pub last_ms: f64,
    pub fails: u64,
    pub switches: u64,
    pub connected: bool,
}

#[derive(Serialize)]
struct MetricsRecord<'a> {
    ts: DateTime<Utc>,
    active_url: &'a str,
    metrics: BTreeMap<String, EndpointMetrics>,
}

pub struct Telemetry {
    metrics: DashMap<String, EndpointMetrics>,
    log_every: Duration,
    persist_path: Option<PathBuf>,
    started: Instant,
    last_log_ms: AtomicU64,
}

impl Telemetry {
    pub fn new(log_every: Duration, persist_path: Option<PathBuf>) -> Self {
        Self {
            metrics: DashMap::new(),
            log_every,
            persist_path,
            started: Instant::now(),
            last_log_ms: AtomicU64::new(NEVER),
        }
    }

    pub fn record_ping(&self, url: &str, latency: Duration) {
        let ms = latency.as_secs_f64() * 1000.0;
        let mut m = self.metrics.entry(url.to_string()).or_default();
        m.avg_ms = if m.pings == 0 {
            ms
        } else {
            EMA_ALPHA * ms + (1.0 - EMA_ALPHA) * m.avg_ms
        };
        m.last_ms = ms;
        m.pings += 1;
        m.connected = true;
    }

    pub fn record_fail(&self, url: &str) {
        self.metrics.entry(url.to_string()).or_default().fails += 1;
    }

    pub fn record_switch(&self, url: &str) {
        self.metrics.entry(url.to_string()).or_default().switches += 1;
    }

    pub fn set_connected(&self, url: &str, connected: bool) {
        self.metrics.entry(url.to_string()).or_default().connected = connected;
    }

    pub fn get(&self, url: &str) -> Option<EndpointMetrics> {
        self.metrics.get(url).map(|m| m.clone())
    }

    /// Sorted copy of every endpoint's counters.
    pub fn snapshot(&self) -> BTreeMap<String, EndpointMetrics> {
        self.metrics
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Log (and persist) a snapshot when the period has elapsed.
    /// Returns true when a snapshot was emitted.
    pub fn log_if_due(&self, active_url: &str, now: Instant) -> bool {
        if self.metrics.is_empty() {
            return false;
        }
        let now_ms = now.saturating_duration_since(self.started).as_millis() as u64;
        let last = self.last_log_ms.load(Ordering::Relaxed);
        if last != NEVER && now_ms.saturating_sub(last) < self.log_every.as_millis() as u64 {
            return false;
        }
        self.last_log_ms.store(now_ms, Ordering::Relaxed);

        for (url, m) in self.snapshot() {
            info!(
                "📡 RPC {} | pings={} avg={:.1}ms last={:.1}ms fails={} switches={} up={}{}",
                url,
                m.pings,
                m.avg_ms,
                m.last_ms,
                m.fails,
                m.switches,
                m.connected,
                if url == active_url { " (active)" } else { "" }
            );
        }

        if self.persist_path.is_some() {
            if let Err(e) = self.persist(active_url) {
                warn!("Failed to persist RPC metrics: {:#}", e);
            }
        }
        true
    }

    /// Append one JSON line with the current snapshot. No-op without a path.
    pub fn persist(&self, active_url: &str) -> Result<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create metrics directory: {:?}", dir))?;
            }
        }

        let record = MetricsRecord {
            ts: Utc::now(),
            active_url,
            metrics: self.snapshot(),
        };
        let json = serde_json::to_string(&record).context("Failed to serialize RPC metrics")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open metrics file: {:?}", path))?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}
