use crate::collectors::{
    CollectError, CpuReadings, MemoryReadings, MetricsSource, Partition, RawIdentity, Skipped,
};
use crate::snapshot::UsageStats;
use std::fs;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;
use sysinfo::{CpuExt, DiskExt, System, SystemExt};
use tracing::debug;

/// Host counters read through `sysinfo`.
pub struct SysinfoSource {
    system: System,
}

impl SysinfoSource {
    pub fn new() -> Result<Self, CollectError> {
        if !System::IS_SUPPORTED {
            return Err(CollectError::Unsupported);
        }
        let mut system = System::new();
        system.refresh_cpu();
        Ok(Self { system })
    }
}

impl MetricsSource for SysinfoSource {
    fn identity(&mut self) -> RawIdentity {
        let processor_label = self
            .system
            .cpus()
            .first()
            .map(|c| c.brand().to_string())
            .filter(|b| !b.trim().is_empty());

        RawIdentity {
            os_name: self.system.name(),
            host_name: self.system.host_name(),
            os_release: self.system.kernel_version(),
            os_version: self
                .system
                .long_os_version()
                .or_else(|| self.system.os_version()),
            machine_arch: Some(std::env::consts::ARCH.to_string()),
            processor_label,
        }
    }

    fn refresh_cpu(&mut self) {
        self.system.refresh_cpu();
    }

    fn cpu_readings(&self) -> CpuReadings {
        CpuReadings {
            physical_cores: self.system.physical_core_count(),
            per_core_usage: self.system.cpus().iter().map(|c| c.cpu_usage()).collect(),
            total_usage: self.system.global_cpu_info().cpu_usage(),
        }
    }

    fn memory(&mut self) -> MemoryReadings {
        self.system.refresh_memory();
        MemoryReadings {
            total_bytes: self.system.total_memory(),
            available_bytes: self.system.available_memory(),
            used_bytes: self.system.used_memory(),
        }
    }

    fn partitions(&mut self) -> Vec<Partition> {
        self.system.refresh_disks_list();
        self.system.refresh_disks();
        self.system
            .disks()
            .iter()
            .map(|d| Partition {
                device: d.name().to_string_lossy().to_string(),
                mount_point: d.mount_point().to_path_buf(),
                total_bytes: d.total_space(),
                available_bytes: d.available_space(),
            })
            .collect()
    }

    fn partition_usage(&self, partition: &Partition) -> Result<UsageStats, Skipped> {
        // Same access a statfs on the mount point needs.
        fs::metadata(&partition.mount_point)?;
        Ok(UsageStats::from_space(
            partition.total_bytes,
            partition.available_bytes,
        ))
    }

    fn host_name(&self) -> Option<String> {
        self.system.host_name().filter(|h| !h.trim().is_empty())
    }

    fn resolve(&self, host: &str) -> io::Result<IpAddr> {
        resolve_host(host)
    }

    fn min_sample_window(&self) -> Duration {
        System::MINIMUM_CPU_UPDATE_INTERVAL
    }
}

/// DNS self-lookup. Prefers the first IPv4 address, falls back to the first IPv6 one.
pub fn resolve_host(host: &str) -> io::Result<IpAddr> {
    let addrs: Vec<IpAddr> = (host, 0).to_socket_addrs()?.map(|a| a.ip()).collect();
    debug!(host, candidates = addrs.len(), "resolved host name");
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses found for {host}"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::Collector;

    #[test]
    fn localhost_resolves() {
        let ip = resolve_host("localhost").expect("localhost should resolve");
        assert!(ip.is_loopback());
    }

    #[test]
    fn invalid_host_does_not_resolve() {
        assert!(resolve_host("no-such-host.invalid").is_err());
    }

    #[test]
    fn inaccessible_mount_point_is_skipped() {
        let Ok(source) = SysinfoSource::new() else {
            return;
        };
        let missing = Partition {
            device: "ghost".to_string(),
            mount_point: "/definitely/not/mounted/here".into(),
            total_bytes: 10,
            available_bytes: 5,
        };
        assert!(matches!(
            source.partition_usage(&missing),
            Err(Skipped::Io(_))
        ));
    }

    #[test]
    fn host_memory_snapshot_is_consistent() {
        let Ok(source) = SysinfoSource::new() else {
            return;
        };
        let mut collector = Collector::new(source, Duration::ZERO);
        let mem = collector.collect_memory().expect("memory counters");
        assert!(mem.total_bytes > 0);
        assert!(mem.available_bytes <= mem.total_bytes);
        assert!((0.0..=100.0).contains(&mem.usage_percent));
    }

    #[test]
    fn host_disk_entries_add_up() {
        let Ok(source) = SysinfoSource::new() else {
            return;
        };
        let mut collector = Collector::new(source, Duration::ZERO);
        for (device, usage) in collector.collect_disk().iter() {
            assert_eq!(
                usage.used_bytes + usage.free_bytes,
                usage.total_bytes,
                "device {device}"
            );
        }
    }
}
