//! Point-in-time process status for `/health`.

use std::sync::OnceLock;
use std::time::Instant;

use serde::Serialize;

use crate::utils::iso_timestamp;

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

/// Pins the process start time; later calls are no-ops.
pub fn mark_started() {
    STARTED_AT.get_or_init(Instant::now);
}

/// Whole seconds since [`mark_started`] (or since the first health check).
pub fn uptime_secs() -> u64 {
    STARTED_AT.get_or_init(Instant::now).elapsed().as_secs()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub server: &'static str,
    pub timestamp: String,
    pub node_version: String,
    pub uptime: u64,
    pub memory: MemoryUsage,
    pub memory_formatted: MemoryFormatted,
    pub environment: String,
    pub pid: u32,
    pub platform: &'static str,
    pub arch: &'static str,
}

/// Byte counts. The resident size comes from the OS; the heap split has no
/// equivalent here, so heap fields mirror the resident size.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss: u64,
    pub heap_total: u64,
    pub heap_used: u64,
    pub external: u64,
    pub array_buffers: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryFormatted {
    pub rss: String,
    pub heap_total: String,
    pub heap_used: String,
    pub external: String,
    pub array_buffers: String,
}

impl MemoryUsage {
    pub fn current() -> Self {
        match memory_stats::memory_stats() {
            Some(stats) => Self::from_resident(stats.physical_mem as u64),
            None => Self::default(),
        }
    }

    fn from_resident(rss: u64) -> Self {
        Self { rss, heap_total: rss, heap_used: rss, external: 0, array_buffers: 0 }
    }

    pub fn formatted(&self) -> MemoryFormatted {
        MemoryFormatted {
            rss: megabytes(self.rss),
            heap_total: megabytes(self.heap_total),
            heap_used: megabytes(self.heap_used),
            external: megabytes(self.external),
            array_buffers: megabytes(self.array_buffers),
        }
    }
}

fn megabytes(bytes: u64) -> String {
    format!("{} MB", (bytes as f64 / 1024.0 / 1024.0).round() as u64)
}

impl HealthSnapshot {
    pub fn capture(server: &'static str, environment: &str) -> Self {
        let memory = MemoryUsage::current();
        Self {
            status: "ok",
            server,
            timestamp: iso_timestamp(),
            node_version: concat!("duet/", env!("CARGO_PKG_VERSION")).to_owned(),
            uptime: uptime_secs(),
            memory_formatted: memory.formatted(),
            memory,
            environment: environment.to_owned(),
            pid: std::process::id(),
            platform: std::env::consts::OS,
            arch: std::env::consts::ARCH,
        }
    }
}
