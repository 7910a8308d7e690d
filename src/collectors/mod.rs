pub mod system;

use crate::snapshot::{
    clamp_percent, CpuSnapshot, DiskSnapshot, FullSnapshot, LiveReading, MemorySnapshot,
    NetworkSnapshot, SystemIdentity, UsageStats, UNAVAILABLE,
};
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Fatal collection failures. Everything else degrades in place.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("system metrics are not supported on this platform")]
    Unsupported,
    #[error("memory counters are unavailable")]
    MemoryUnavailable,
}

/// Why a partition was left out of the disk snapshot.
#[derive(Debug, Error)]
pub enum Skipped {
    #[error("permission denied")]
    PermissionDenied,
    #[error("usage query failed: {0}")]
    Io(io::Error),
}

impl From<io::Error> for Skipped {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            Skipped::PermissionDenied
        } else {
            Skipped::Io(err)
        }
    }
}

/// Raw identity strings as the OS reports them.
#[derive(Debug, Clone, Default)]
pub struct RawIdentity {
    pub os_name: Option<String>,
    pub host_name: Option<String>,
    pub os_release: Option<String>,
    pub os_version: Option<String>,
    pub machine_arch: Option<String>,
    pub processor_label: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CpuReadings {
    pub physical_cores: Option<usize>,
    pub per_core_usage: Vec<f32>,
    pub total_usage: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryReadings {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct Partition {
    pub device: String,
    pub mount_point: PathBuf,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

/// Where the collector reads OS counters from.
pub trait MetricsSource {
    fn identity(&mut self) -> RawIdentity;

    /// Takes a new CPU counter reading; usage is measured against the previous one.
    fn refresh_cpu(&mut self);

    fn cpu_readings(&self) -> CpuReadings;

    fn memory(&mut self) -> MemoryReadings;

    fn partitions(&mut self) -> Vec<Partition>;

    fn partition_usage(&self, partition: &Partition) -> Result<UsageStats, Skipped>;

    fn host_name(&self) -> Option<String>;

    fn resolve(&self, host: &str) -> io::Result<IpAddr>;

    /// Shortest window over which CPU usage is meaningful for this source.
    fn min_sample_window(&self) -> Duration {
        Duration::ZERO
    }
}

pub struct Collector<S> {
    source: S,
    sample_window: Duration,
}

impl<S: MetricsSource> Collector<S> {
    /// `sample_window` is the CPU window used by [`Collector::collect_all`].
    pub fn new(source: S, sample_window: Duration) -> Self {
        Self {
            source,
            sample_window,
        }
    }

    pub fn collect_identity(&mut self) -> SystemIdentity {
        let raw = self.source.identity();
        SystemIdentity {
            os_name: raw.os_name.unwrap_or_default(),
            host_name: raw.host_name.unwrap_or_default(),
            os_release: raw.os_release.unwrap_or_default(),
            os_version: raw.os_version.unwrap_or_default(),
            machine_arch: raw.machine_arch.unwrap_or_default(),
            processor_label: raw
                .processor_label
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
        }
    }

    /// A zero window reports usage since the previous refresh of this source.
    /// A non-zero window blocks the calling thread for its duration.
    pub fn collect_cpu(&mut self, sample_window: Duration) -> CpuSnapshot {
        self.source.refresh_cpu();
        if !sample_window.is_zero() {
            let window = sample_window.max(self.source.min_sample_window());
            debug!(window_ms = window.as_millis() as u64, "sampling cpu usage");
            thread::sleep(window);
            self.source.refresh_cpu();
        }

        let readings = self.source.cpu_readings();
        let per_core_usage_percent: Vec<f64> = readings
            .per_core_usage
            .iter()
            .map(|v| clamp_percent(*v as f64))
            .collect();

        CpuSnapshot {
            physical_core_count: readings.physical_cores.filter(|n| *n > 0),
            logical_core_count: per_core_usage_percent.len(),
            per_core_usage_percent,
            total_usage_percent: clamp_percent(readings.total_usage as f64),
        }
    }

    pub fn collect_memory(&mut self) -> Result<MemorySnapshot, CollectError> {
        let readings = self.source.memory();
        if readings.total_bytes == 0 {
            return Err(CollectError::MemoryUnavailable);
        }
        Ok(MemorySnapshot::from_counters(
            readings.total_bytes,
            readings.available_bytes,
            readings.used_bytes,
        ))
    }

    pub fn collect_disk(&mut self) -> DiskSnapshot {
        let mut disk = DiskSnapshot::default();
        for partition in self.source.partitions() {
            match self.source.partition_usage(&partition) {
                Ok(usage) => disk.insert(partition.device, usage),
                Err(Skipped::PermissionDenied) => {
                    debug!(
                        device = %partition.device,
                        mount = %partition.mount_point.display(),
                        "skipping partition, permission denied"
                    );
                }
                Err(err) => {
                    warn!(
                        device = %partition.device,
                        mount = %partition.mount_point.display(),
                        error = %err,
                        "skipping partition"
                    );
                }
            }
        }
        if disk.is_empty() {
            warn!("no readable partitions, disk section is empty");
        } else {
            debug!(devices = disk.len(), "disk snapshot collected");
        }
        disk
    }

    pub fn collect_network(&mut self) -> NetworkSnapshot {
        let host_name = self.source.host_name().unwrap_or_default();
        let ip_address = if host_name.is_empty() {
            debug!("host name unknown, address unavailable");
            UNAVAILABLE.to_string()
        } else {
            match self.source.resolve(&host_name) {
                Ok(ip) => ip.to_string(),
                Err(err) => {
                    warn!(host = %host_name, error = %err, "host name did not resolve");
                    UNAVAILABLE.to_string()
                }
            }
        };

        NetworkSnapshot {
            host_name,
            ip_address,
        }
    }

    pub fn collect_all(&mut self) -> Result<FullSnapshot, CollectError> {
        let system = self.collect_identity();
        let cpu = self.collect_cpu(self.sample_window);
        let memory = self.collect_memory()?;
        let disk = self.collect_disk();
        let network = self.collect_network();

        Ok(FullSnapshot {
            system,
            cpu,
            memory,
            disk,
            network,
        })
    }

    /// CPU and memory usage only. CPU usage covers the time since the previous call.
    pub fn sample_live(&mut self) -> Result<LiveReading, CollectError> {
        let cpu = self.collect_cpu(Duration::ZERO);
        let memory = self.collect_memory()?;
        Ok(LiveReading {
            cpu_usage_percent: cpu.total_usage_percent,
            memory_usage_percent: memory.usage_percent,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fake::{partition, FakeSource, GB};
    use super::*;

    fn collector(source: FakeSource) -> Collector<FakeSource> {
        Collector::new(source, Duration::ZERO)
    }

    #[test]
    fn identity_fills_missing_fields_with_empty_strings() {
        let mut source = FakeSource::healthy();
        source.identity.os_version = None;
        source.identity.processor_label = None;
        let identity = collector(source).collect_identity();
        assert_eq!(identity.os_name, "Linux");
        assert_eq!(identity.os_version, "");
        assert_eq!(identity.processor_label, "");
    }

    #[test]
    fn identity_trims_processor_label() {
        let identity = collector(FakeSource::healthy()).collect_identity();
        assert_eq!(identity.processor_label, "Test CPU @ 3.0GHz");
    }

    #[test]
    fn cpu_reports_unknown_physical_cores_as_none() {
        let mut source = FakeSource::healthy();
        source.cpu.physical_cores = None;
        let cpu = collector(source).collect_cpu(Duration::ZERO);
        assert_eq!(cpu.physical_core_count, None);
        assert_eq!(cpu.logical_core_count, 4);

        let mut source = FakeSource::healthy();
        source.cpu.physical_cores = Some(0);
        let cpu = collector(source).collect_cpu(Duration::ZERO);
        assert_eq!(cpu.physical_core_count, None);
    }

    #[test]
    fn cpu_percentages_stay_in_range() {
        let mut source = FakeSource::healthy();
        source.cpu.per_core_usage = vec![-1.0, 150.0, f32::NAN];
        source.cpu.total_usage = 100.3;
        let cpu = collector(source).collect_cpu(Duration::ZERO);
        assert_eq!(cpu.per_core_usage_percent, vec![0.0, 100.0, 0.0]);
        assert_eq!(cpu.total_usage_percent, 100.0);
    }

    #[test]
    fn cpu_window_refreshes_twice() {
        let mut c = collector(FakeSource::healthy());
        c.collect_cpu(Duration::ZERO);
        assert_eq!(c.source.cpu_refreshes, 1);
        c.collect_cpu(Duration::from_millis(1));
        assert_eq!(c.source.cpu_refreshes, 3);
    }

    #[test]
    fn memory_invariants_hold() {
        let mut source = FakeSource::healthy();
        source.memory.available_bytes = 32 * GB;
        let mem = collector(source).collect_memory().unwrap();
        assert!(mem.available_bytes <= mem.total_bytes);
        assert!((0.0..=100.0).contains(&mem.usage_percent));

        let mem = collector(FakeSource::healthy()).collect_memory().unwrap();
        assert_eq!(mem.usage_percent, 75.0);
        assert_eq!(mem.total_gb(), 16.0);
    }

    #[test]
    fn zero_memory_total_is_fatal() {
        let mut source = FakeSource::healthy();
        source.memory = MemoryReadings::default();
        let err = collector(source).collect_memory().unwrap_err();
        assert!(matches!(err, CollectError::MemoryUnavailable));
    }

    #[test]
    fn disk_skips_permission_denied_partition() {
        let mut source = FakeSource::healthy();
        source.partitions = vec![
            partition("/dev/sda1", "/", 100 * GB, 40 * GB),
            partition("/dev/sdb1", "/secret", 50 * GB, 10 * GB),
            partition("/dev/sdc1", "/data", 500 * GB, 250 * GB),
        ];
        source.denied = vec!["/dev/sdb1".into()];

        let disk = collector(source).collect_disk();
        let devices: Vec<&str> = disk.iter().map(|(d, _)| d).collect();
        assert_eq!(devices, vec!["/dev/sda1", "/dev/sdc1"]);
    }

    #[test]
    fn disk_skips_partitions_with_other_failures() {
        let mut source = FakeSource::healthy();
        source
            .broken
            .insert("/dev/sda2".into(), io::ErrorKind::NotFound);
        let disk = collector(source).collect_disk();
        assert_eq!(disk.len(), 1);
        assert!(disk.get("/dev/sda1").is_some());
    }

    #[test]
    fn disk_entries_are_consistent() {
        let disk = collector(FakeSource::healthy()).collect_disk();
        for (_, usage) in disk.iter() {
            assert_eq!(usage.used_bytes + usage.free_bytes, usage.total_bytes);
            let expected =
                crate::snapshot::percent(usage.used_bytes, usage.used_bytes + usage.free_bytes);
            assert_eq!(usage.usage_percent, expected);
        }
        assert_eq!(disk.get("/dev/sda1").unwrap().usage_percent, 60.0);
    }

    #[test]
    fn network_resolution_failure_yields_marker() {
        let mut source = FakeSource::healthy();
        source.address = None;
        let net = collector(source).collect_network();
        assert_eq!(net.host_name, "testbox");
        assert_eq!(net.ip_address, UNAVAILABLE);
    }

    #[test]
    fn network_without_host_name_yields_marker() {
        let mut source = FakeSource::healthy();
        source.host_name = None;
        let net = collector(source).collect_network();
        assert_eq!(net.host_name, "");
        assert_eq!(net.ip_address, UNAVAILABLE);
    }

    #[test]
    fn network_reports_resolved_address() {
        let net = collector(FakeSource::healthy()).collect_network();
        assert_eq!(net.ip_address, "192.168.1.20");
    }

    #[test]
    fn collect_all_survives_degraded_sections() {
        let mut source = FakeSource::healthy();
        source.denied = vec!["/dev/sda1".into(), "/dev/sda2".into()];
        source.address = None;
        let snapshot = collector(source).collect_all().unwrap();
        assert!(snapshot.disk.is_empty());
        assert_eq!(snapshot.network.ip_address, UNAVAILABLE);
        assert_eq!(snapshot.system.host_name, "testbox");
        assert_eq!(snapshot.cpu.logical_core_count, 4);
    }

    #[test]
    fn collect_all_fails_when_memory_is_unreachable() {
        let mut source = FakeSource::healthy();
        source.memory.total_bytes = 0;
        assert!(collector(source).collect_all().is_err());
    }

    #[test]
    fn live_sample_reads_cpu_and_memory() {
        let reading = collector(FakeSource::healthy()).sample_live().unwrap();
        assert_eq!(reading.cpu_usage_percent, 25.0);
        assert_eq!(reading.memory_usage_percent, 75.0);
    }
}
