use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Request counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub vehicle_lists: Arc<AtomicU64>,
    pub vehicle_lookups: Arc<AtomicU64>,
    pub fallback_reads: Arc<AtomicU64>,
    pub vehicles_created: Arc<AtomicU64>,
    pub vehicles_updated: Arc<AtomicU64>,
    pub uploads: Arc<AtomicU64>,
    pub upload_bytes: Arc<AtomicU64>,
    pub auth_failures: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            vehicle_lists: Arc::new(AtomicU64::new(0)),
            vehicle_lookups: Arc::new(AtomicU64::new(0)),
            fallback_reads: Arc::new(AtomicU64::new(0)),
            vehicles_created: Arc::new(AtomicU64::new(0)),
            vehicles_updated: Arc::new(AtomicU64::new(0)),
            uploads: Arc::new(AtomicU64::new(0)),
            upload_bytes: Arc::new(AtomicU64::new(0)),
            auth_failures: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_vehicle_lists(&self) {
        self.vehicle_lists.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_vehicle_lookups(&self) {
        self.vehicle_lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a read served from sample data; no-op for live reads.
    pub fn record_read(&self, fallback: bool) {
        if fallback {
            self.fallback_reads.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_vehicles_created(&self) {
        self.vehicles_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_vehicles_updated(&self) {
        self.vehicles_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_upload(&self, bytes: u64) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
        self.upload_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn inc_auth_failures(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            vehicle_lists: self.vehicle_lists.load(Ordering::Relaxed),
            vehicle_lookups: self.vehicle_lookups.load(Ordering::Relaxed),
            fallback_reads: self.fallback_reads.load(Ordering::Relaxed),
            vehicles_created: self.vehicles_created.load(Ordering::Relaxed),
            vehicles_updated: self.vehicles_updated.load(Ordering::Relaxed),
            uploads: self.uploads.load(Ordering::Relaxed),
            upload_bytes: self.upload_bytes.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub vehicle_lists: u64,
    pub vehicle_lookups: u64,
    pub fallback_reads: u64,
    pub vehicles_created: u64,
    pub vehicles_updated: u64,
    pub uploads: u64,
    pub upload_bytes: u64,
    pub auth_failures: u64,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    /// Prometheus text exposition format.
    pub fn to_prometheus(&self) -> String {
        let counters: [(&str, &str, u64); 8] = [
            ("vehicle_lists", "Catalog list requests", self.vehicle_lists),
            ("vehicle_lookups", "Single vehicle lookups", self.vehicle_lookups),
            ("fallback_reads", "Reads served from sample data", self.fallback_reads),
            ("vehicles_created", "Vehicles created", self.vehicles_created),
            ("vehicles_updated", "Vehicles updated", self.vehicles_updated),
            ("uploads", "Images uploaded", self.uploads),
            ("upload_bytes", "Bytes uploaded", self.upload_bytes),
            ("auth_failures", "Rejected admin requests", self.auth_failures),
        ];
        let mut out = String::new();
        for (name, help, value) in counters {
            out.push_str(&format!(
                "# HELP dealership_{name} {help}\n# TYPE dealership_{name} counter\ndealership_{name} {value}\n"
            ));
        }
        out.push_str(&format!(
            "# HELP dealership_uptime_seconds Uptime seconds\n# TYPE dealership_uptime_seconds gauge\ndealership_uptime_seconds {}\n",
            self.uptime_seconds
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.inc_vehicle_lists();
        metrics.record_read(true);
        metrics.record_read(false);
        metrics.add_upload(1024);
        let clone = metrics.clone();
        clone.inc_auth_failures();

        let snap = metrics.get_snapshot();
        assert_eq!(snap.vehicle_lists, 1);
        assert_eq!(snap.fallback_reads, 1);
        assert_eq!(snap.uploads, 1);
        assert_eq!(snap.upload_bytes, 1024);
        assert_eq!(snap.auth_failures, 1);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.inc_vehicles_created();
        let text = metrics.get_snapshot().to_prometheus();
        assert!(text.contains("# TYPE dealership_vehicles_created counter\ndealership_vehicles_created 1\n"));
        assert!(text.contains("dealership_uptime_seconds "));
    }
}
